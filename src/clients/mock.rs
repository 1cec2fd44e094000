//! # Mock Cloud
//!
//! An in-memory backend implementing every collaborator trait.
//!
//! [`MockCloud`] is cheap to clone; clones share the same state, so a test can
//! hand one clone to the context as its [`ClientFactory`] and keep another to
//! inspect what happened.
//!
//! # Example
//! ```ignore
//! let cloud = MockCloud::new().fail_create_users().fail_deletes();
//! let mut ctx = UserGenerator::new(config, admin, "task", Arc::new(cloud.clone()))?;
//! assert!(ctx.setup().await.unwrap_err().is_setup_failure());
//! assert_eq!(cloud.calls_matching(|c| matches!(c, MockCall::DeleteProject(_))), 1);
//! ```

use crate::clients::{
    service, ClientFactory, CloudError, ComputeClient, IdentityClient, IdentityUser,
    NetworkClient, NetworkService,
};
use crate::domain::{Endpoint, Network, Tenant};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Every call the mock received, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    CreateProject { name: String, domain: String },
    DeleteProject(String),
    CreateUser { name: String, project_id: String, domain: String },
    DeleteUser(String),
    ListServices,
    ServiceStatus(String),
    FindDefaultSecurityGroup { tenant_name: Option<String> },
    DeleteSecurityGroup(String),
    ListNetworks,
    DisassociateNetwork(String),
}

struct MockState {
    id_counter: u64,
    projects: BTreeMap<String, Tenant>,
    users: BTreeMap<String, (IdentityUser, String)>,
    /// group id -> owning project id
    security_groups: BTreeMap<String, String>,
    networks: Vec<Network>,
    services: HashMap<String, String>,
    network_backend: NetworkService,
    security_groups_enabled: bool,
    nova_network_active: bool,
    failing_projects: HashSet<String>,
    panicking_projects: HashSet<String>,
    fail_create_users: bool,
    fail_deletes: bool,
    fail_security_group_deletes: bool,
    fail_disassociate: bool,
    calls: Vec<MockCall>,
}

impl Default for MockState {
    fn default() -> Self {
        let services = HashMap::from([
            (service::COMPUTE.to_string(), service::NOVA.to_string()),
            (service::NETWORK.to_string(), service::NEUTRON.to_string()),
        ]);
        Self {
            id_counter: 1,
            projects: BTreeMap::new(),
            users: BTreeMap::new(),
            security_groups: BTreeMap::new(),
            networks: Vec::new(),
            services,
            network_backend: NetworkService::Neutron,
            security_groups_enabled: true,
            nova_network_active: false,
            failing_projects: HashSet::new(),
            panicking_projects: HashSet::new(),
            fail_create_users: false,
            fail_deletes: false,
            fail_security_group_deletes: false,
            fail_disassociate: false,
            calls: Vec::new(),
        }
    }
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        let id = self.id_counter;
        self.id_counter += 1;
        format!("{prefix}_{id}")
    }
}

/// In-memory cloud with failure injection and call recording.
#[derive(Clone, Default)]
pub struct MockCloud {
    state: Arc<Mutex<MockState>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockCloud {
    /// A healthy neutron-backed cloud with security groups enabled and
    /// nova-network inactive.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Configuration ------------------------------------------------------

    /// Sleep this long inside every remote call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_services(self, services: HashMap<String, String>) -> Self {
        self.state().services = services;
        self
    }

    pub fn with_network_backend(self, backend: NetworkService) -> Self {
        self.state().network_backend = backend;
        self
    }

    pub fn without_security_groups(self) -> Self {
        self.state().security_groups_enabled = false;
        self
    }

    pub fn with_nova_network_active(self, active: bool) -> Self {
        self.state().nova_network_active = active;
        self
    }

    pub fn with_network(self, network: Network) -> Self {
        self.state().networks.push(network);
        self
    }

    // --- Failure injection --------------------------------------------------

    /// `create_project` fails for this exact project name.
    pub fn fail_create_project(self, name: impl Into<String>) -> Self {
        self.state().failing_projects.insert(name.into());
        self
    }

    /// `create_project` panics for this exact project name.
    pub fn panic_on_create_project(self, name: impl Into<String>) -> Self {
        self.state().panicking_projects.insert(name.into());
        self
    }

    pub fn fail_create_users(self) -> Self {
        self.state().fail_create_users = true;
        self
    }

    /// Every `delete_project` and `delete_user` call fails and leaves the
    /// resource in place.
    pub fn fail_deletes(self) -> Self {
        self.state().fail_deletes = true;
        self
    }

    pub fn fail_security_group_deletes(self) -> Self {
        self.state().fail_security_group_deletes = true;
        self
    }

    pub fn fail_disassociate(self) -> Self {
        self.state().fail_disassociate = true;
        self
    }

    // --- Inspection ---------------------------------------------------------

    pub fn projects(&self) -> Vec<Tenant> {
        self.state().projects.values().cloned().collect()
    }

    /// `(user, project id)` pairs that still exist.
    pub fn users(&self) -> Vec<(IdentityUser, String)> {
        self.state().users.values().cloned().collect()
    }

    pub fn security_groups(&self) -> Vec<String> {
        self.state().security_groups.keys().cloned().collect()
    }

    pub fn networks(&self) -> Vec<Network> {
        self.state().networks.clone()
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    pub fn calls_matching(&self, predicate: impl Fn(&MockCall) -> bool) -> usize {
        self.state().calls.iter().filter(|&c| predicate(c)).count()
    }

    /// Highest number of remote calls that were in progress at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    // --- Call plumbing ------------------------------------------------------

    async fn remote_call<T>(&self, call: MockCall, f: impl FnOnce(&mut MockState) -> T) -> T {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let result = {
            let mut state = self.state();
            state.calls.push(call);
            f(&mut state)
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn session(&self, endpoint: &Endpoint) -> Arc<MockSession> {
        Arc::new(MockSession {
            cloud: self.clone(),
            endpoint: endpoint.clone(),
        })
    }
}

impl ClientFactory for MockCloud {
    fn identity(&self, endpoint: &Endpoint) -> Result<Arc<dyn IdentityClient>, CloudError> {
        Ok(self.session(endpoint))
    }

    fn compute(&self, endpoint: &Endpoint) -> Result<Arc<dyn ComputeClient>, CloudError> {
        Ok(self.session(endpoint))
    }

    fn network(&self, endpoint: &Endpoint) -> Result<Arc<dyn NetworkClient>, CloudError> {
        Ok(self.session(endpoint))
    }
}

/// A client bound to one endpoint, backed by the shared [`MockCloud`] state.
struct MockSession {
    cloud: MockCloud,
    endpoint: Endpoint,
}

#[async_trait]
impl IdentityClient for MockSession {
    async fn create_project(&self, name: &str, domain: &str) -> Result<Tenant, CloudError> {
        let call = MockCall::CreateProject {
            name: name.to_string(),
            domain: domain.to_string(),
        };
        let (panics, tenant) = self
            .cloud
            .remote_call(call, |state| {
                if state.panicking_projects.contains(name) {
                    return (true, None);
                }
                if state.failing_projects.contains(name) {
                    return (false, None);
                }
                let id = state.next_id("project");
                let tenant = Tenant::new(id.clone(), name);
                state.projects.insert(id.clone(), tenant.clone());
                let group_id = state.next_id("secgroup");
                state.security_groups.insert(group_id, id);
                (false, Some(tenant))
            })
            .await;

        if panics {
            panic!("mock cloud crashed creating project {name}");
        }
        tenant.ok_or_else(|| CloudError::Remote(format!("injected failure creating project {name}")))
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), CloudError> {
        self.cloud
            .remote_call(MockCall::DeleteProject(project_id.to_string()), |state| {
                if state.fail_deletes {
                    return Err(CloudError::Unavailable("identity service".to_string()));
                }
                state
                    .projects
                    .remove(project_id)
                    .map(|_| ())
                    .ok_or_else(|| CloudError::NotFound(project_id.to_string()))
            })
            .await
    }

    async fn create_user(
        &self,
        name: &str,
        _password: &str,
        _email: &str,
        project_id: &str,
        domain: &str,
    ) -> Result<IdentityUser, CloudError> {
        let call = MockCall::CreateUser {
            name: name.to_string(),
            project_id: project_id.to_string(),
            domain: domain.to_string(),
        };
        self.cloud
            .remote_call(call, |state| {
                if state.fail_create_users {
                    return Err(CloudError::Remote(format!("injected failure creating user {name}")));
                }
                if !state.projects.contains_key(project_id) {
                    return Err(CloudError::NotFound(project_id.to_string()));
                }
                let user = IdentityUser {
                    id: state.next_id("user"),
                    name: name.to_string(),
                };
                state
                    .users
                    .insert(user.id.clone(), (user.clone(), project_id.to_string()));
                Ok(user)
            })
            .await
    }

    async fn delete_user(&self, user_id: &str) -> Result<(), CloudError> {
        self.cloud
            .remote_call(MockCall::DeleteUser(user_id.to_string()), |state| {
                if state.fail_deletes {
                    return Err(CloudError::Unavailable("identity service".to_string()));
                }
                state
                    .users
                    .remove(user_id)
                    .map(|_| ())
                    .ok_or_else(|| CloudError::NotFound(user_id.to_string()))
            })
            .await
    }
}

#[async_trait]
impl ComputeClient for MockSession {
    async fn list_services(&self) -> Result<HashMap<String, String>, CloudError> {
        self.cloud
            .remote_call(MockCall::ListServices, |state| Ok(state.services.clone()))
            .await
    }

    async fn service_is_active(&self, binary: &str) -> Result<bool, CloudError> {
        self.cloud
            .remote_call(MockCall::ServiceStatus(binary.to_string()), |state| {
                Ok(binary != service::NOVA_NETWORK || state.nova_network_active)
            })
            .await
    }

    async fn find_default_security_group(&self) -> Result<String, CloudError> {
        let tenant_name = self.endpoint.tenant_name.clone();
        let call = MockCall::FindDefaultSecurityGroup {
            tenant_name: tenant_name.clone(),
        };
        self.cloud
            .remote_call(call, |state| {
                let name = tenant_name.ok_or_else(|| {
                    CloudError::Unauthorized("client is not scoped to a tenant".to_string())
                })?;
                let project_id = state
                    .projects
                    .values()
                    .find(|p| p.name == name)
                    .map(|p| p.id.clone())
                    .ok_or_else(|| CloudError::NotFound(name.clone()))?;
                state
                    .security_groups
                    .iter()
                    .find(|(_, owner)| **owner == project_id)
                    .map(|(group_id, _)| group_id.clone())
                    .ok_or_else(|| CloudError::NotFound(format!("default security group of {name}")))
            })
            .await
    }

    async fn list_networks(&self) -> Result<Vec<Network>, CloudError> {
        self.cloud
            .remote_call(MockCall::ListNetworks, |state| Ok(state.networks.clone()))
            .await
    }

    async fn disassociate_network(&self, network: &Network) -> Result<(), CloudError> {
        self.cloud
            .remote_call(MockCall::DisassociateNetwork(network.id.clone()), |state| {
                if state.fail_disassociate {
                    return Err(CloudError::Remote(format!("cannot disassociate {}", network.id)));
                }
                let stored = state
                    .networks
                    .iter_mut()
                    .find(|n| n.id == network.id)
                    .ok_or_else(|| CloudError::NotFound(network.id.clone()))?;
                stored.project_id = None;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl NetworkClient for MockSession {
    fn service_impl(&self) -> NetworkService {
        self.cloud.state().network_backend
    }

    async fn supports_security_group(&self) -> Result<(bool, Option<String>), CloudError> {
        let enabled = self.cloud.state().security_groups_enabled;
        if enabled {
            Ok((true, None))
        } else {
            Ok((false, Some("security-group extension is not enabled".to_string())))
        }
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError> {
        self.cloud
            .remote_call(MockCall::DeleteSecurityGroup(group_id.to_string()), |state| {
                if state.fail_security_group_deletes {
                    return Err(CloudError::Conflict(format!("{group_id} is in use")));
                }
                state
                    .security_groups
                    .remove(group_id)
                    .map(|_| ())
                    .ok_or_else(|| CloudError::NotFound(group_id.to_string()))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Endpoint {
        Endpoint::new("http://keystone", "admin", "secret")
    }

    #[tokio::test]
    async fn test_projects_get_default_security_group() {
        let cloud = MockCloud::new();
        let identity = cloud.identity(&admin()).unwrap();

        let tenant = identity.create_project("p1", "default").await.unwrap();
        assert_eq!(cloud.projects(), vec![tenant.clone()]);
        assert_eq!(cloud.security_groups().len(), 1);

        let scoped = admin().with_tenant_name("p1");
        let group = cloud.compute(&scoped).unwrap().find_default_security_group().await;
        assert_eq!(group.unwrap(), cloud.security_groups()[0]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let cloud = MockCloud::new().fail_create_project("bad").fail_deletes();
        let identity = cloud.identity(&admin()).unwrap();

        assert!(identity.create_project("bad", "default").await.is_err());
        let good = identity.create_project("good", "default").await.unwrap();
        assert_eq!(
            identity.delete_project(&good.id).await,
            Err(CloudError::Unavailable("identity service".to_string()))
        );
        assert_eq!(cloud.projects().len(), 1);
        assert_eq!(cloud.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_user_requires_existing_project() {
        let cloud = MockCloud::new();
        let identity = cloud.identity(&admin()).unwrap();

        let result = identity.create_user("u", "pw", "u@email.me", "missing", "default").await;
        assert_eq!(result, Err(CloudError::NotFound("missing".to_string())));
        assert!(cloud.users().is_empty());
    }
}
