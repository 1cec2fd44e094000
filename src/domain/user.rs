use crate::domain::Endpoint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A user created inside one of the context's tenants.
///
/// `endpoint` carries the credentials the workload logs in with; `tenant_id`
/// always names a tenant that existed when the user was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub endpoint: Endpoint,
    pub tenant_id: String,
}

/// Yields the first user of every distinct tenant, in user order.
///
/// Per-tenant resources (such as the default security group) only need one
/// set of credentials per tenant.
pub fn iterate_per_tenants(users: &[UserRecord]) -> impl Iterator<Item = &UserRecord> {
    let mut seen = HashSet::new();
    users
        .iter()
        .filter(move |&user| seen.insert(user.tenant_id.as_str()))
}
