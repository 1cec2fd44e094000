//! Credentials and URL bundle used to build scoped clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which catalog endpoint a client should talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointType {
    #[default]
    Public,
    Internal,
    Admin,
}

impl EndpointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointType::Public => "public",
            EndpointType::Internal => "internal",
            EndpointType::Admin => "admin",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointPermission {
    Admin,
    #[default]
    User,
}

/// An authentication endpoint: where to log in, as whom, and with which scope.
///
/// The admin endpoint handed to the context is the template for every user
/// endpoint it creates. In particular `endpoint_type` is copied verbatim, so a
/// deployment that talks to internal URLs keeps doing so as the generated users.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub auth_url: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub permission: EndpointPermission,
    #[serde(default)]
    pub region_name: Option<String>,
    #[serde(default)]
    pub endpoint_type: EndpointType,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub user_domain_name: Option<String>,
    #[serde(default)]
    pub project_domain_name: Option<String>,
}

impl Endpoint {
    /// Creates a user-scoped, public endpoint with no tenant or region.
    pub fn new(
        auth_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            auth_url: auth_url.into(),
            username: username.into(),
            password: password.into(),
            tenant_name: None,
            permission: EndpointPermission::default(),
            region_name: None,
            endpoint_type: EndpointType::default(),
            domain_name: None,
            user_domain_name: None,
            project_domain_name: None,
        }
    }

    pub fn with_tenant_name(mut self, tenant_name: impl Into<String>) -> Self {
        self.tenant_name = Some(tenant_name.into());
        self
    }

    pub fn with_permission(mut self, permission: EndpointPermission) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_region_name(mut self, region_name: impl Into<String>) -> Self {
        self.region_name = Some(region_name.into());
        self
    }

    pub fn with_endpoint_type(mut self, endpoint_type: EndpointType) -> Self {
        self.endpoint_type = endpoint_type;
        self
    }
}

// Passwords stay out of logs.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("auth_url", &self.auth_url)
            .field("username", &self.username)
            .field("password", &"***")
            .field("tenant_name", &self.tenant_name)
            .field("permission", &self.permission)
            .field("region_name", &self.region_name)
            .field("endpoint_type", &self.endpoint_type)
            .field("user_domain_name", &self.user_domain_name)
            .field("project_domain_name", &self.project_domain_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_type_defaults_to_public() {
        let json = r#"{"auth_url": "http://keystone:5000/v3", "username": "admin", "password": "secret"}"#;
        let endpoint: Endpoint = serde_json::from_str(json).unwrap();
        assert_eq!(endpoint.endpoint_type, EndpointType::Public);
        assert_eq!(endpoint.permission, EndpointPermission::User);
    }

    #[test]
    fn test_endpoint_type_is_read_from_template() {
        let json = r#"{"auth_url": "u", "username": "a", "password": "p", "endpoint_type": "internal"}"#;
        let endpoint: Endpoint = serde_json::from_str(json).unwrap();
        assert_eq!(endpoint.endpoint_type.as_str(), "internal");
    }

    #[test]
    fn test_debug_hides_password() {
        let endpoint = Endpoint::new("http://keystone", "admin", "hunter2");
        let rendered = format!("{endpoint:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("admin"));
    }
}
