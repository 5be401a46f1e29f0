// Request guards for protected routes

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{error::AuthError, models::Role, token::TokenService};
use crate::AppState;

/// Authenticated administrator. Extracting it rejects any other role.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: Uuid,
    pub email: String,
}

/// Marker for a request that passed the scheduler secret check
#[derive(Debug, Clone, Copy)]
pub struct CronCaller;

/// Scheduler shared secret, held as a SHA-256 digest.
///
/// Comparing fixed-length digests keeps the comparison independent of
/// the length of whatever the caller presents.
#[derive(Clone)]
pub struct CronSecret {
    digest: [u8; 32],
}

impl CronSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: sha256(secret),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        sha256(presented)
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for CronSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CronSecret(..)")
    }
}

fn sha256(value: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(value.as_bytes()));
    out
}

/// Pull the bearer token out of the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidToken)
}

/// Validate a bearer JWT and require the given role
pub fn authorize(
    tokens: &TokenService,
    headers: &HeaderMap,
    required_role: Role,
) -> Result<(Uuid, String), AuthError> {
    let token = bearer_token(headers)?;
    let claims = tokens.validate_access_token(token)?;

    if claims.role != required_role {
        return Err(AuthError::InsufficientPermissions {
            required: required_role,
            actual: claims.role,
        });
    }

    Ok((claims.sub, claims.email))
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = crate::error::ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let endpoint = parts.uri.path().to_string();

        match authorize(&state.tokens, &parts.headers, Role::Admin) {
            Ok((user_id, email)) => {
                debug!("Admin authorized: user_id={}, endpoint={}", user_id, endpoint);
                Ok(AdminUser { user_id, email })
            }
            Err(e) => {
                warn!("Admin authorization failed for {}: {}", endpoint, e);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CronCaller {
    type Rejection = crate::error::ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(secret) = state.cron_secret.as_ref() else {
            warn!("CRON_SECRET is not configured; automation execution endpoint is open");
            return Ok(CronCaller);
        };

        let presented = bearer_token(&parts.headers)?;
        if secret.verify(presented) {
            Ok(CronCaller)
        } else {
            Err(AuthError::InvalidCronSecret.into())
        }
    }
}
