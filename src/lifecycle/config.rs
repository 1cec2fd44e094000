//! Configuration for the `users` context.

use crate::lifecycle::ContextError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_tenants() -> usize {
    1
}

fn default_users_per_tenant() -> usize {
    1
}

fn default_workers() -> usize {
    20
}

fn default_domain() -> String {
    "default".to_string()
}

/// How many tenants and users to provision, and how hard to hit the backend
/// while doing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UsersConfig {
    #[serde(default = "default_tenants")]
    pub tenants: usize,

    #[serde(default = "default_users_per_tenant")]
    pub users_per_tenant: usize,

    /// Broker concurrency for every create and delete batch.
    #[serde(default = "default_workers")]
    pub resource_management_workers: usize,

    #[serde(default = "default_domain")]
    pub project_domain: String,

    #[serde(default = "default_domain")]
    pub user_domain: String,

    /// Pause after each dequeue, per worker. 0 disables throttling.
    #[serde(default)]
    pub resource_management_throttle_ms: u64,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self {
            tenants: default_tenants(),
            users_per_tenant: default_users_per_tenant(),
            resource_management_workers: default_workers(),
            project_domain: default_domain(),
            user_domain: default_domain(),
            resource_management_throttle_ms: 0,
        }
    }
}

impl UsersConfig {
    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ContextError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ContextError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ContextError> {
        if self.tenants == 0 {
            return Err(ContextError::InvalidConfig(
                "tenants must be at least 1".to_string(),
            ));
        }
        if self.resource_management_workers == 0 {
            return Err(ContextError::InvalidConfig(
                "resource_management_workers must be at least 1".to_string(),
            ));
        }
        if self.tenants.checked_mul(self.users_per_tenant).is_none() {
            return Err(ContextError::InvalidConfig(
                "tenants * users_per_tenant overflows".to_string(),
            ));
        }
        if self.project_domain.is_empty() || self.user_domain.is_empty() {
            return Err(ContextError::InvalidConfig(
                "project_domain and user_domain must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Users created across all tenants. Saturates; `validate` rejects
    /// configs where the product overflows.
    pub fn users_total(&self) -> usize {
        self.tenants.saturating_mul(self.users_per_tenant)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.resource_management_throttle_ms)
    }
}
