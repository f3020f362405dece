use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::{error::AppError, models::Role};

pub mod access;
pub mod password;
pub mod token;

pub use access::{CAPABILITIES, Capability, require_capability};
pub use password::{HashError, PasswordHasher};
pub use token::{Claims, TokenError, TokenIssuer};

/// AuthUser
///
/// The resolved identity of an admitted request. Handlers take it as an
/// argument to learn who is calling.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

/// AuthUser Extractor Implementation
///
/// Reads the identity that `require_capability` attached to the request. The
/// middleware is the only place tokens are verified, so a handler mounted
/// outside the protected router simply fails with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::MissingCredentials)
    }
}
