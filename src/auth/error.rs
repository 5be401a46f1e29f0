// Authentication and authorization error types

use thiserror::Error;

use crate::auth::models::Role;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid scheduler secret")]
    InvalidCronSecret,

    #[error("Token generation error: {0}")]
    TokenGenerationError(String),

    /// Caller is authenticated but lacks the role the endpoint requires
    #[error("Insufficient permissions: required role '{required}', but user has role '{actual}'")]
    InsufficientPermissions { required: Role, actual: Role },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(AuthError::MissingToken.to_string(), "Missing authentication token");
        assert_eq!(
            AuthError::InsufficientPermissions {
                required: Role::Admin,
                actual: Role::Customer,
            }
            .to_string(),
            "Insufficient permissions: required role 'admin', but user has role 'customer'"
        );
    }
}
