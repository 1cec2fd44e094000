use std::sync::Arc;
use std::time::Duration;
use tenant_broker::clients::mock::{MockCall, MockCloud};
use tenant_broker::domain::Endpoint;
use tenant_broker::lifecycle::{ContextError, ContextState, UserGenerator, UsersConfig};

fn admin() -> Endpoint {
    Endpoint::new("http://keystone:5000/v3", "admin", "secret")
}

fn config(tenants: usize, users_per_tenant: usize, workers: usize) -> UsersConfig {
    UsersConfig {
        tenants,
        users_per_tenant,
        resource_management_workers: workers,
        ..UsersConfig::default()
    }
}

/// The k-th tenant failing tears down the ones that did get created.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_tenant_failure_leaves_nothing_tracked() {
    let tenants = 5;
    for k in 0..tenants - 1 {
        let cloud = MockCloud::new().fail_create_project(format!("ctx_task_tenant_{k}"));
        let mut ctx =
            UserGenerator::new(config(tenants, 2, 3), admin(), "task", Arc::new(cloud.clone())).unwrap();

        let err = ctx.setup().await.expect_err("setup must fail");

        assert!(err.is_setup_failure(), "unexpected error kind: {err}");
        assert_eq!(ctx.state(), ContextState::Closed);
        assert!(ctx.tenants().is_empty());
        assert!(ctx.users().is_empty());
        assert!(cloud.projects().is_empty(), "created tenants must be deleted");
        assert_eq!(
            cloud.calls_matching(|c| matches!(c, MockCall::DeleteProject(_))),
            tenants - 1
        );
    }
}

#[tokio::test]
async fn test_user_failure_reports_setup_failure() {
    let cloud = MockCloud::new().fail_create_users();
    let mut ctx = UserGenerator::new(config(1, 5, 10), admin(), "task", Arc::new(cloud.clone())).unwrap();

    let err = ctx.setup().await.unwrap_err();

    match &err {
        ContextError::SetupFailure { ctx_name, msg } => {
            assert_eq!(ctx_name, "users");
            assert!(msg.contains("users"), "message should name the users step: {msg}");
        }
        other => panic!("expected a setup failure, got {other:?}"),
    }
    assert!(ctx.tenants().is_empty());
    assert!(cloud.projects().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_panicking_backend_is_a_setup_failure() {
    let cloud = MockCloud::new().panic_on_create_project("ctx_task_tenant_0");
    let mut ctx = UserGenerator::new(config(3, 1, 3), admin(), "task", Arc::new(cloud.clone())).unwrap();

    let err = ctx.setup().await.unwrap_err();

    assert!(err.is_setup_failure());
    assert!(ctx.tenants().is_empty());
    assert!(cloud.projects().is_empty());
}

#[tokio::test]
async fn test_scoped_setup_failure_skips_body() {
    let cloud = MockCloud::new().fail_create_project("ctx_task_tenant_0");
    let ctx = UserGenerator::new(config(2, 1, 2), admin(), "task", Arc::new(cloud.clone())).unwrap();

    let result: Result<(), ContextError> =
        ctx.scoped(|_| async { panic!("body must not run") }).await;

    assert!(matches!(result, Err(ContextError::SetupFailure { .. })));
    assert!(cloud.projects().is_empty());
    // Cleanup ran once, during the failed setup.
    assert_eq!(cloud.calls_matching(|c| matches!(c, MockCall::DeleteProject(_))), 1);
}

#[tokio::test]
async fn test_every_deletion_failing_still_empties_state() {
    let cloud = MockCloud::new()
        .fail_deletes()
        .fail_security_group_deletes()
        .with_nova_network_active(true)
        .fail_disassociate();
    let mut ctx = UserGenerator::new(config(3, 2, 4), admin(), "task", Arc::new(cloud.clone())).unwrap();
    ctx.setup().await.unwrap();

    ctx.cleanup().await;

    assert_eq!(ctx.state(), ContextState::Closed);
    assert!(ctx.tenants().is_empty());
    assert!(ctx.users().is_empty());
    assert_eq!(cloud.projects().len(), 3);
    assert_eq!(cloud.users().len(), 6);
    assert_eq!(cloud.calls_matching(|c| matches!(c, MockCall::DeleteUser(_))), 6);
    assert_eq!(cloud.calls_matching(|c| matches!(c, MockCall::DeleteProject(_))), 3);
}

#[tokio::test]
async fn test_cleanup_before_setup_is_harmless() {
    let cloud = MockCloud::new();
    let mut ctx = UserGenerator::new(config(1, 1, 1), admin(), "task", Arc::new(cloud.clone())).unwrap();

    ctx.cleanup().await;

    assert_eq!(ctx.state(), ContextState::Closed);
    assert!(matches!(
        ctx.setup().await,
        Err(ContextError::InvalidState { .. })
    ));
    assert_eq!(cloud.calls_matching(|c| matches!(c, MockCall::CreateProject { .. })), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelled_setup_leaves_no_remote_projects() {
    let cloud = MockCloud::new().with_latency(Duration::from_millis(100));
    let mut ctx = UserGenerator::new(config(3, 2, 3), admin(), "task", Arc::new(cloud.clone())).unwrap();

    let cancelled = tokio::time::timeout(Duration::from_millis(30), ctx.setup()).await;
    assert!(cancelled.is_err(), "setup should still be creating tenants");
    assert!(ctx.tenants().is_empty());
    drop(ctx);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(cloud.projects().is_empty());
    assert!(cloud.users().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_workload_still_releases_resources() {
    let cloud = MockCloud::new();
    let ctx = UserGenerator::new(config(2, 3, 4), admin(), "task", Arc::new(cloud.clone())).unwrap();

    let workload = tokio::spawn(async move {
        ctx.scoped(|_| async {
            panic!("workload crashed");
        })
        .await
    });
    let joined: Result<Result<(), ContextError>, _> = workload.await;
    assert!(joined.unwrap_err().is_panic());

    // The dropped context releases everything on a background task.
    for _ in 0..50 {
        if cloud.projects().is_empty() && cloud.users().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(cloud.projects().is_empty());
    assert!(cloud.users().is_empty());
    assert_eq!(cloud.calls_matching(|c| matches!(c, MockCall::DeleteProject(_))), 2);
}
