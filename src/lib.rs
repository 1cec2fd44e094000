//! # Tenant Broker
//!
//! > **Ephemeral tenants and users for load-generation workloads, with guaranteed teardown.**
//!
//! Before a benchmark can run it needs somewhere to run: a handful of projects
//! ("tenants") and users inside them. This crate creates them concurrently,
//! hands them to the workload, and removes them afterwards, even when part of
//! the setup failed.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### The Broker does the fan-out, the Context does the bookkeeping
//!
//! - **Broker**: a bounded worker pool. It runs N independent operations on K
//!   workers, isolates failures per item, and returns results in submission
//!   order no matter which finished first.
//! - **Context**: the single owner of what was created. Workers only return
//!   records; every insertion into and removal from the tenant map and user
//!   list happens on the caller's task, so the state needs no locks.
//!
//! ### Teardown always completes
//!
//! Cleanup never returns an error. A failed deletion is logged and the record
//! is dropped from local state anyway: there is no retry queue, and orphaned
//! remote resources are reported, not hidden.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Engine ([`broker`])
//! - **Role**: Runs a batch of [`Task`](broker::Task)s with bounded concurrency.
//! - **Key items**: [`Operation`](broker::Operation), [`Broker`](broker::Broker), [`TaskError`](broker::TaskError).
//!
//! ### 2. The Orchestrator ([`lifecycle`])
//! - **Role**: Builds the create/delete batches, drives the broker, and enforces the setup/cleanup contract.
//! - **Key items**: [`UserGenerator`](lifecycle::UserGenerator), [`UsersConfig`](lifecycle::UsersConfig), [`ContextError`](lifecycle::ContextError).
//!
//! ### 3. The Boundary ([`clients`])
//! - **Role**: Abstract identity, compute and network clients. Swap in any backend.
//! - **Key items**: [`ClientFactory`](clients::ClientFactory), [`IdentityClient`](clients::IdentityClient), [`mock::MockCloud`](clients::mock::MockCloud).
//!
//! ### 4. The Records ([`domain`])
//! - **Role**: Plain data: [`Tenant`](domain::Tenant), [`UserRecord`](domain::UserRecord), [`Endpoint`](domain::Endpoint).
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Provision and tear down against the in-memory cloud
//! RUST_LOG=info cargo run
//!
//! # Tests
//! cargo test
//! ```

pub mod broker;
pub mod clients;
pub mod domain;
pub mod lifecycle;
