// Authorization data models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role carried in the access token claims
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator (finance, disputes, configuration)
    Admin,
    /// Beauty-service provider managing their own business
    Provider,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Provider => write!(f, "provider"),
            Role::Customer => write!(f, "customer"),
        }
    }
}
