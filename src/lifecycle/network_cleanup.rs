//! Network hygiene run before tenants are deleted.
//!
//! Both routines are best effort: they log every failure, never return an
//! error, and keep going after a single item fails. They run sequentially on
//! the caller's task.

use crate::clients::{service, ClientFactory, CloudError, NetworkClient, NetworkService};
use crate::domain::{iterate_per_tenants, Endpoint, Tenant, UserRecord};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What a cleanup routine did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Set when the routine did not apply to this deployment.
    pub skipped: Option<String>,
    pub attempted: usize,
    pub removed: usize,
    pub failed: usize,
}

impl CleanupReport {
    fn skipped(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug!(%reason, "Cleanup step skipped");
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

async fn compute_is_nova(factory: &dyn ClientFactory, admin: &Endpoint) -> Result<bool, CloudError> {
    let services = factory.compute(admin)?.list_services().await?;
    Ok(services.values().any(|name| name == service::NOVA))
}

/// Deletes the `default` security group of every tenant that has users.
///
/// Only applies to a nova + neutron deployment with the security-group
/// extension enabled. The group is looked up with one user's credentials per
/// tenant and deleted with the admin network client.
pub async fn remove_default_security_groups(
    factory: &dyn ClientFactory,
    admin: &Endpoint,
    users: &[UserRecord],
) -> CleanupReport {
    match compute_is_nova(factory, admin).await {
        Ok(true) => {}
        Ok(false) => return CleanupReport::skipped("compute service is not nova"),
        Err(e) => return CleanupReport::skipped(format!("cannot list services: {e}")),
    }

    let network = match factory.network(admin) {
        Ok(network) => network,
        Err(e) => return CleanupReport::skipped(format!("cannot build network client: {e}")),
    };
    if network.service_impl() != NetworkService::Neutron {
        return CleanupReport::skipped(format!("network backend is {}", network.service_impl()));
    }
    match network.supports_security_group().await {
        Ok((true, _)) => {}
        Ok((false, reason)) => {
            return CleanupReport::skipped(
                reason.unwrap_or_else(|| "security groups are not supported".to_string()),
            )
        }
        Err(e) => return CleanupReport::skipped(format!("cannot query security groups: {e}")),
    }

    let mut report = CleanupReport::default();
    for user in iterate_per_tenants(users) {
        report.attempted += 1;
        match delete_default_group(factory, network.as_ref(), user).await {
            Ok(group_id) => {
                debug!(tenant_id = %user.tenant_id, %group_id, "Deleted default security group");
                report.removed += 1;
            }
            Err(e) => {
                warn!(tenant_id = %user.tenant_id, error = %e, "Unable to delete default security group");
                report.failed += 1;
            }
        }
    }
    info!(removed = report.removed, failed = report.failed, "Default security groups removed");
    report
}

async fn delete_default_group(
    factory: &dyn ClientFactory,
    network: &dyn NetworkClient,
    user: &UserRecord,
) -> Result<String, CloudError> {
    let group_id = factory
        .compute(&user.endpoint)?
        .find_default_security_group()
        .await?;
    network.delete_security_group(&group_id).await?;
    Ok(group_id)
}

/// Disassociates every legacy (nova-network) network owned by one of `tenants`.
///
/// Legacy networks can only be disassociated with admin credentials, so the
/// whole pass runs on the admin compute client.
pub async fn remove_associated_networks(
    factory: &dyn ClientFactory,
    admin: &Endpoint,
    tenants: &BTreeMap<String, Tenant>,
) -> CleanupReport {
    match compute_is_nova(factory, admin).await {
        Ok(true) => {}
        Ok(false) => return CleanupReport::skipped("compute service is not nova"),
        Err(e) => return CleanupReport::skipped(format!("cannot list services: {e}")),
    }

    let compute = match factory.compute(admin) {
        Ok(compute) => compute,
        Err(e) => return CleanupReport::skipped(format!("cannot build compute client: {e}")),
    };
    match compute.service_is_active(service::NOVA_NETWORK).await {
        Ok(true) => {}
        Ok(false) => return CleanupReport::skipped("nova-network is not active"),
        Err(e) => return CleanupReport::skipped(format!("cannot check nova-network: {e}")),
    }

    let networks = match compute.list_networks().await {
        Ok(networks) => networks,
        Err(e) => {
            warn!(error = %e, "Unable to list networks");
            return CleanupReport {
                failed: 1,
                ..CleanupReport::default()
            };
        }
    };

    let mut report = CleanupReport::default();
    for network in networks {
        let owned = network
            .project_id
            .as_ref()
            .is_some_and(|project_id| tenants.contains_key(project_id));
        if !owned {
            continue;
        }
        report.attempted += 1;
        match compute.disassociate_network(&network).await {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!(network_id = %network.id, error = %e, "Failed to disassociate network");
                report.failed += 1;
            }
        }
    }
    info!(removed = report.removed, failed = report.failed, "Associated networks released");
    report
}
