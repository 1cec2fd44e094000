//! # Collaborator Traits
//!
//! Abstract contracts for the identity, compute and networking services.
//!
//! Clients are always obtained from a [`ClientFactory`] for a specific
//! [`Endpoint`]: the admin endpoint yields admin-scoped clients, a generated
//! user's endpoint yields clients scoped to that user's tenant.

use crate::clients::CloudError;
use crate::domain::{Endpoint, Network, Tenant};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Well-known service names as they appear in a service catalog.
pub mod service {
    pub const COMPUTE: &str = "compute";
    pub const NETWORK: &str = "network";
    pub const NOVA: &str = "nova";
    pub const NEUTRON: &str = "neutron";
    pub const NOVA_NETWORK: &str = "nova-network";
}

/// The networking implementation behind a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkService {
    Neutron,
    NovaNetwork,
}

impl fmt::Display for NetworkService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkService::Neutron => f.write_str(service::NEUTRON),
            NetworkService::NovaNetwork => f.write_str(service::NOVA_NETWORK),
        }
    }
}

/// A user as returned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityUser {
    pub id: String,
    pub name: String,
}

/// Project and user management (admin scoped).
#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn create_project(&self, name: &str, domain: &str) -> Result<Tenant, CloudError>;

    async fn delete_project(&self, project_id: &str) -> Result<(), CloudError>;

    async fn create_user(
        &self,
        name: &str,
        password: &str,
        email: &str,
        project_id: &str,
        domain: &str,
    ) -> Result<IdentityUser, CloudError>;

    async fn delete_user(&self, user_id: &str) -> Result<(), CloudError>;
}

/// Compute service operations used during teardown.
#[async_trait]
pub trait ComputeClient: Send + Sync {
    /// Service catalog: service type (e.g. `compute`) to implementation name (e.g. `nova`).
    async fn list_services(&self) -> Result<HashMap<String, String>, CloudError>;

    /// Whether the compute service binary (e.g. `nova-network`) is enabled and up.
    async fn service_is_active(&self, binary: &str) -> Result<bool, CloudError>;

    /// The `default` security group of the tenant this client is scoped to.
    async fn find_default_security_group(&self) -> Result<String, CloudError>;

    /// Legacy networks visible to this client.
    async fn list_networks(&self) -> Result<Vec<Network>, CloudError>;

    async fn disassociate_network(&self, network: &Network) -> Result<(), CloudError>;
}

/// Networking service operations used during teardown.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    fn service_impl(&self) -> NetworkService;

    /// `(supported, reason)`; the reason explains why support is missing.
    async fn supports_security_group(&self) -> Result<(bool, Option<String>), CloudError>;

    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError>;
}

/// Builds clients scoped to an endpoint.
pub trait ClientFactory: Send + Sync {
    fn identity(&self, endpoint: &Endpoint) -> Result<Arc<dyn IdentityClient>, CloudError>;

    fn compute(&self, endpoint: &Endpoint) -> Result<Arc<dyn ComputeClient>, CloudError>;

    fn network(&self, endpoint: &Endpoint) -> Result<Arc<dyn NetworkClient>, CloudError>;
}
