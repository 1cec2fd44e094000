//! Broker operations for creating and deleting tenants and users.
//!
//! Each operation holds one admin-scoped [`IdentityClient`] shared by every
//! task in its batch. None of them touch the context's bookkeeping; they return
//! records and let the context store them.

use crate::broker::Operation;
use crate::clients::{CloudError, IdentityClient};
use crate::domain::{Endpoint, EndpointPermission, Tenant, UserRecord};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Name of the `iteration`-th tenant created for `task_id`.
pub fn tenant_name(task_id: &str, iteration: usize) -> String {
    format!("ctx_{task_id}_tenant_{iteration}")
}

/// Name of the `uid`-th user created in `tenant_id`.
pub fn user_name(tenant_id: &str, uid: usize) -> String {
    format!("ctx_{tenant_id}_user_{uid}")
}

pub struct CreateTenant {
    identity: Arc<dyn IdentityClient>,
    task_id: String,
    domain: String,
}

impl CreateTenant {
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        task_id: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            task_id: task_id.into(),
            domain: domain.into(),
        }
    }
}

#[async_trait]
impl Operation for CreateTenant {
    /// Positional index of the tenant within the batch.
    type Payload = usize;
    type Output = Tenant;
    type Error = CloudError;

    async fn execute(&self, iteration: usize) -> Result<Tenant, CloudError> {
        let name = tenant_name(&self.task_id, iteration);
        self.identity.create_project(&name, &self.domain).await
    }
}

/// One user to create: its owning tenant and its position within that tenant.
#[derive(Clone)]
pub struct UserRequest {
    pub tenant: Tenant,
    pub uid: usize,
}

impl fmt::Debug for UserRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user #{} of tenant {}", self.uid, self.tenant.id)
    }
}

pub struct CreateUser {
    identity: Arc<dyn IdentityClient>,
    admin: Endpoint,
    project_domain: String,
    user_domain: String,
}

impl CreateUser {
    /// `admin` is the template for every generated endpoint: its URL, region
    /// and endpoint type are copied onto each user.
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        admin: Endpoint,
        project_domain: impl Into<String>,
        user_domain: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            admin,
            project_domain: project_domain.into(),
            user_domain: user_domain.into(),
        }
    }

    fn user_endpoint(&self, username: String, password: String, tenant: &Tenant) -> Endpoint {
        Endpoint {
            auth_url: self.admin.auth_url.clone(),
            username,
            password,
            tenant_name: Some(tenant.name.clone()),
            permission: EndpointPermission::User,
            region_name: self.admin.region_name.clone(),
            endpoint_type: self.admin.endpoint_type,
            domain_name: None,
            user_domain_name: Some(self.user_domain.clone()),
            project_domain_name: Some(self.project_domain.clone()),
        }
    }
}

#[async_trait]
impl Operation for CreateUser {
    type Payload = UserRequest;
    type Output = UserRecord;
    type Error = CloudError;

    async fn execute(&self, request: UserRequest) -> Result<UserRecord, CloudError> {
        let UserRequest { tenant, uid } = request;
        let username = user_name(&tenant.id, uid);
        let password = Uuid::new_v4().to_string();
        let email = format!("{username}@email.me");

        let user = self
            .identity
            .create_user(&username, &password, &email, &tenant.id, &self.user_domain)
            .await?;

        Ok(UserRecord {
            id: user.id,
            endpoint: self.user_endpoint(user.name, password, &tenant),
            tenant_id: tenant.id,
        })
    }
}

pub struct DeleteUser {
    identity: Arc<dyn IdentityClient>,
}

impl DeleteUser {
    pub fn new(identity: Arc<dyn IdentityClient>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl Operation for DeleteUser {
    /// User id.
    type Payload = String;
    type Output = ();
    type Error = CloudError;

    async fn execute(&self, user_id: String) -> Result<(), CloudError> {
        self.identity.delete_user(&user_id).await
    }
}

pub struct DeleteTenant {
    identity: Arc<dyn IdentityClient>,
}

impl DeleteTenant {
    pub fn new(identity: Arc<dyn IdentityClient>) -> Self {
        Self { identity }
    }
}

#[async_trait]
impl Operation for DeleteTenant {
    /// Tenant id.
    type Payload = String;
    type Output = ();
    type Error = CloudError;

    async fn execute(&self, tenant_id: String) -> Result<(), CloudError> {
        self.identity.delete_project(&tenant_id).await
    }
}
