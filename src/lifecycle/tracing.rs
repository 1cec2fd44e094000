//! # Observability & Tracing
//!
//! Structured logging for the provisioning context, built on `tracing`.
//!
//! ## What Gets Traced
//!
//! - **Context lifecycle**: `Enter context` / `Exit context`, inside a span
//!   carrying the context name and task id
//! - **Broker batches**: batch size and worker count at `debug`
//! - **Per-item failures**: task index, payload and error at `warn`
//! - **Teardown**: skipped network steps at `debug`, orphaned resources at `warn`
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle milestones and failures
//! RUST_LOG=info cargo run
//!
//! # Include batch sizes and skipped cleanup steps
//! RUST_LOG=debug cargo run
//!
//! # Only the broker
//! RUST_LOG=tenant_broker::broker=debug cargo run
//! ```
//!
//! With `RUST_LOG=info` a run with one failing tenant looks like:
//!
//! ```text
//! INFO setup{ctx="users" task_id=demo}: Enter context: `users`
//! WARN setup{ctx="users" task_id=demo}: Task failed worker_id=1 index=1 payload=1 error=Remote call failed: ...
//! ERROR setup{ctx="users" task_id=demo}: Context setup failed, removing partial resources msg=...
//! INFO setup{ctx="users" task_id=demo}:cleanup{ctx="users" task_id=demo}: Exit context: `users`
//! ```

/// Installs a compact fmt subscriber filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
