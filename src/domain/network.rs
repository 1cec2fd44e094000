use serde::{Deserialize, Serialize};

/// A legacy (nova-network) network as listed by the admin compute client.
///
/// `project_id` is set while the network is associated with a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub label: String,
    pub project_id: Option<String>,
}

impl Network {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            project_id: None,
        }
    }

    pub fn associated_with(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}
