use crate::broker::{partition_results, Broker, Task};
use crate::clients::ClientFactory;
use crate::domain::{Endpoint, Tenant, UserRecord};
use crate::lifecycle::network_cleanup::{remove_associated_networks, remove_default_security_groups};
use crate::lifecycle::tasks::{CreateTenant, CreateUser, DeleteTenant, DeleteUser, UserRequest};
use crate::lifecycle::{ContextError, ContextState, UsersConfig};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Name under which this context reports itself.
pub const CONTEXT_NAME: &str = "users";

/// The tenants and users a workload runs with, handed out by
/// [`UserGenerator::scoped`].
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub task_id: String,
    pub tenants: BTreeMap<String, Tenant>,
    pub users: Vec<UserRecord>,
}

/// Provisions tenants and users for a workload and guarantees they are torn
/// down again.
///
/// `UserGenerator` is responsible for:
/// - **Provisioning**: creating `tenants` projects, then `users_per_tenant`
///   users in each, through the [`Broker`]
/// - **Bookkeeping**: owning the tenant map and user list; broker workers only
///   return records, every mutation happens here
/// - **Teardown**: network hygiene, then user and tenant deletion, always
///   ending with empty local state
///
/// # Example
///
/// ```ignore
/// let ctx = UserGenerator::new(config, admin_endpoint, task_id, factory)?;
/// let report = ctx.scoped(|resources| async move {
///     run_workload(&resources.users).await
/// }).await?;
/// ```
pub struct UserGenerator {
    config: UsersConfig,
    admin: Endpoint,
    task_id: String,
    factory: Arc<dyn ClientFactory>,
    broker: Broker,
    state: ContextState,
    tenants: BTreeMap<String, Tenant>,
    users: Vec<UserRecord>,
}

impl UserGenerator {
    /// Validates `config` and builds an idle context. No remote call is made.
    pub fn new(
        config: UsersConfig,
        admin: Endpoint,
        task_id: impl Into<String>,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self, ContextError> {
        config.validate()?;
        let broker =
            Broker::new(config.resource_management_workers).with_throttle(config.throttle());
        Ok(Self {
            config,
            admin,
            task_id: task_id.into(),
            factory,
            broker,
            state: ContextState::Unconfigured,
            tenants: BTreeMap::new(),
            users: Vec::new(),
        })
    }

    pub fn config(&self) -> &UsersConfig {
        &self.config
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Tenants currently tracked, keyed by id.
    pub fn tenants(&self) -> &BTreeMap<String, Tenant> {
        &self.tenants
    }

    /// Users currently tracked, tenant by tenant in creation order.
    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    pub fn snapshot(&self) -> Provisioned {
        Provisioned {
            task_id: self.task_id.clone(),
            tenants: self.tenants.clone(),
            users: self.users.clone(),
        }
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Creates every requested tenant and user.
    ///
    /// Any failed creation aborts the setup: whatever was created is cleaned
    /// up first, then [`ContextError::SetupFailure`] is returned and the
    /// context is `Closed`.
    #[instrument(skip(self), fields(ctx = CONTEXT_NAME, task_id = %self.task_id))]
    pub async fn setup(&mut self) -> Result<(), ContextError> {
        if self.state != ContextState::Unconfigured {
            return Err(ContextError::InvalidState {
                state: self.state,
                operation: "set up",
            });
        }
        info!("Enter context: `{CONTEXT_NAME}`");
        self.state = ContextState::SettingUp;

        match self.provision().await {
            Ok(()) => {
                self.state = ContextState::Active;
                info!(
                    tenants = self.tenants.len(),
                    users = self.users.len(),
                    "Context ready"
                );
                Ok(())
            }
            Err(msg) => {
                error!(%msg, "Context setup failed, removing partial resources");
                self.cleanup().await;
                Err(ContextError::SetupFailure {
                    ctx_name: CONTEXT_NAME.to_string(),
                    msg,
                })
            }
        }
    }

    async fn provision(&mut self) -> Result<(), String> {
        let identity = self
            .factory
            .identity(&self.admin)
            .map_err(|e| format!("cannot build identity client: {e}"))?;

        // Tenants first: every user task needs its tenant's id.
        let requested = self.config.tenants;
        debug!(
            tenants = requested,
            workers = self.broker.workers_for(requested),
            "Creating tenants"
        );
        let op = CreateTenant::new(
            identity.clone(),
            self.task_id.clone(),
            self.config.project_domain.clone(),
        );
        let (created, failed) = partition_results(self.broker.run(Task::batch(op, 0..requested)).await);
        let tenants: Vec<Tenant> = created.into_iter().map(|(_, tenant)| tenant).collect();
        self.tenants
            .extend(tenants.iter().map(|t| (t.id.clone(), t.clone())));
        if !failed.is_empty() {
            return Err(format!(
                "Failed to create the requested number of tenants ({} of {requested} failed)",
                failed.len()
            ));
        }

        let per_tenant = self.config.users_per_tenant;
        let mut requests = Vec::with_capacity(self.config.users_total());
        requests.extend(tenants.iter().flat_map(|tenant| {
            (0..per_tenant).map(move |uid| UserRequest {
                tenant: tenant.clone(),
                uid,
            })
        }));
        let requested = requests.len();
        debug!(
            users = requested,
            workers = self.broker.workers_for(requested),
            "Creating users"
        );
        let op = CreateUser::new(
            identity,
            self.admin.clone(),
            self.config.project_domain.clone(),
            self.config.user_domain.clone(),
        );
        let (created, failed) = partition_results(self.broker.run(Task::batch(op, requests)).await);
        self.users.extend(created.into_iter().map(|(_, user)| user));
        if !failed.is_empty() {
            return Err(format!(
                "Failed to create the requested number of users ({} of {requested} failed)",
                failed.len()
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Tears down everything the context tracks.
    ///
    /// Never fails: every remote error is logged and skipped, and local state
    /// is empty afterwards whether or not the deletions went through. Calling
    /// it again once the context is `Closed` does nothing.
    #[instrument(skip(self), fields(ctx = CONTEXT_NAME, task_id = %self.task_id))]
    pub async fn cleanup(&mut self) {
        if self.state == ContextState::Closed {
            debug!("Context already closed");
            return;
        }
        self.state = ContextState::CleaningUp;

        remove_default_security_groups(self.factory.as_ref(), &self.admin, &self.users).await;
        remove_associated_networks(self.factory.as_ref(), &self.admin, &self.tenants).await;
        self.delete_users().await;
        self.delete_tenants().await;

        self.state = ContextState::Closed;
        info!("Exit context: `{CONTEXT_NAME}`");
    }

    async fn delete_users(&mut self) {
        let users = std::mem::take(&mut self.users);
        if users.is_empty() {
            return;
        }
        let identity = match self.factory.identity(&self.admin) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, orphaned = users.len(), "Cannot build identity client, users left behind");
                return;
            }
        };

        let total = users.len();
        let ids = users.into_iter().map(|user| user.id);
        let results = self.broker.run(Task::batch(DeleteUser::new(identity), ids)).await;
        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            warn!(failed, total, "Some users could not be deleted and are no longer tracked");
        }
    }

    async fn delete_tenants(&mut self) {
        let tenants = std::mem::take(&mut self.tenants);
        if tenants.is_empty() {
            return;
        }
        let identity = match self.factory.identity(&self.admin) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, orphaned = tenants.len(), "Cannot build identity client, tenants left behind");
                return;
            }
        };

        let total = tenants.len();
        let ids = tenants.into_keys();
        let results = self.broker.run(Task::batch(DeleteTenant::new(identity), ids)).await;
        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            warn!(failed, total, "Some tenants could not be deleted and are no longer tracked");
        }
    }

    // =========================================================================
    // Scoped acquisition
    // =========================================================================

    /// Sets up, runs `body` with the provisioned resources, and cleans up,
    /// whatever happened in between.
    ///
    /// Returns the setup failure if provisioning failed (in which case `body`
    /// never runs), otherwise `body`'s output.
    pub async fn scoped<F, Fut, T>(mut self, body: F) -> Result<T, ContextError>
    where
        F: FnOnce(Provisioned) -> Fut,
        Fut: Future<Output = T>,
    {
        let outcome = match self.setup().await {
            Ok(()) => Ok(body(self.snapshot()).await),
            Err(e) => Err(e),
        };
        self.cleanup().await;
        outcome
    }

    fn holds_resources(&self) -> bool {
        !self.tenants.is_empty() || !self.users.is_empty()
    }
}

/// Last-resort release: a context dropped while still holding resources (for
/// example because the workload panicked) hands them to a detached cleanup
/// task on the current runtime.
impl Drop for UserGenerator {
    fn drop(&mut self) {
        if !self.holds_resources() {
            return;
        }
        let tenants = std::mem::take(&mut self.tenants);
        let users = std::mem::take(&mut self.users);

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                tenants = tenants.len(),
                users = users.len(),
                "Context dropped outside a runtime, resources left behind"
            );
            return;
        };
        warn!(
            tenants = tenants.len(),
            users = users.len(),
            "Context dropped without cleanup, releasing in background"
        );
        let mut orphan = UserGenerator {
            config: self.config.clone(),
            admin: self.admin.clone(),
            task_id: self.task_id.clone(),
            factory: self.factory.clone(),
            broker: self.broker,
            state: ContextState::Active,
            tenants,
            users,
        };
        runtime.spawn(async move { orphan.cleanup().await });
    }
}
