//! Demo: provision a few tenants against the in-memory cloud, run a fake
//! workload, and tear everything down. Then do it again with a tenant that
//! refuses to be created.

use std::sync::Arc;
use std::time::Duration;
use tenant_broker::clients::mock::MockCloud;
use tenant_broker::domain::{Endpoint, EndpointPermission};
use tenant_broker::lifecycle::{setup_tracing, UserGenerator, UsersConfig};
use tracing::{error, info};

const CONFIG: &str = r#"{
    "tenants": 3,
    "users_per_tenant": 2,
    "resource_management_workers": 4
}"#;

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = UsersConfig::from_json(CONFIG).map_err(|e| e.to_string())?;
    let admin = Endpoint::new("http://keystone.local:5000/v3", "admin", "admin-secret")
        .with_tenant_name("admin")
        .with_permission(EndpointPermission::Admin)
        .with_region_name("RegionOne");

    // 1. Happy path
    let cloud = MockCloud::new().with_latency(Duration::from_millis(20));
    let ctx = UserGenerator::new(
        config.clone(),
        admin.clone(),
        "demo",
        Arc::new(cloud.clone()),
    )
    .map_err(|e| e.to_string())?;

    let logins = ctx
        .scoped(|resources| async move {
            info!(
                tenants = resources.tenants.len(),
                users = resources.users.len(),
                "Running workload"
            );
            resources
                .users
                .iter()
                .map(|user| user.endpoint.username.clone())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| e.to_string())?;
    info!(
        logins = logins.len(),
        remaining_projects = cloud.projects().len(),
        peak_concurrency = cloud.peak_concurrency(),
        "Workload finished"
    );

    // 2. One tenant fails: setup reports it, partial resources are removed
    let cloud = MockCloud::new().fail_create_project("ctx_demo-failing_tenant_1");
    let ctx = UserGenerator::new(config, admin, "demo-failing", Arc::new(cloud.clone()))
        .map_err(|e| e.to_string())?;
    match ctx.scoped(|_| async {}).await {
        Ok(()) => info!("Unexpected success"),
        Err(e) if e.is_setup_failure() => {
            error!(error = %e, remaining_projects = cloud.projects().len(), "Environment could not be prepared")
        }
        Err(e) => return Err(e.to_string()),
    }

    info!("Demo completed");
    Ok(())
}
