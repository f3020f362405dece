use axum::{
    extract::{MatchedPath, Request, State},
    http::{Method, header},
    middleware::Next,
    response::Response,
};

use crate::{AppState, auth::AuthUser, error::AppError, models::Role};

const ANY: &[Role] = &[Role::Candidate, Role::Employer];
const EMPLOYER: &[Role] = &[Role::Employer];
const CANDIDATE: &[Role] = &[Role::Candidate];

/// Capability
///
/// One row of the capability table: which roles may call `method` on the
/// route registered as `path` (axum route syntax, e.g. `/jobs/{id}`).
#[derive(Debug, Clone, Copy)]
pub struct Capability {
    pub method: &'static str,
    pub path: &'static str,
    pub roles: &'static [Role],
}

/// CAPABILITIES
///
/// The single declarative source of role requirements for every protected
/// route. Handlers never check roles themselves; ownership rules (e.g. "only
/// the posting employer") are enforced by the repository.
///
/// A protected route missing from this table is rejected for everyone.
pub static CAPABILITIES: &[Capability] = &[
    Capability { method: "GET", path: "/me", roles: ANY },
    Capability { method: "GET", path: "/jobs", roles: ANY },
    Capability { method: "POST", path: "/jobs", roles: EMPLOYER },
    Capability { method: "GET", path: "/jobs/{id}", roles: ANY },
    Capability { method: "PUT", path: "/jobs/{id}", roles: EMPLOYER },
    Capability { method: "DELETE", path: "/jobs/{id}", roles: EMPLOYER },
    Capability { method: "GET", path: "/employer/jobs", roles: EMPLOYER },
    Capability { method: "GET", path: "/employer/stats", roles: EMPLOYER },
    Capability { method: "POST", path: "/applications", roles: CANDIDATE },
    Capability { method: "GET", path: "/applications", roles: EMPLOYER },
    Capability { method: "GET", path: "/applications/mine", roles: CANDIDATE },
    Capability { method: "PATCH", path: "/applications/{id}/status", roles: EMPLOYER },
    Capability { method: "POST", path: "/uploads/resume", roles: CANDIDATE },
];

/// Looks up the roles allowed to call `method` on `path`. HEAD is served by
/// the GET handler, so it shares the GET entry.
pub fn allowed_roles(method: &Method, path: &str) -> Option<&'static [Role]> {
    let method = if *method == Method::HEAD { &Method::GET } else { method };
    CAPABILITIES
        .iter()
        .find(|cap| cap.method == method.as_str() && cap.path == path)
        .map(|cap| cap.roles)
}

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// require_capability
///
/// Access control middleware for the protected router. Walks the request
/// through `TokenPresent? -> TokenValid? -> RoleAuthorized?` and short-circuits
/// on the first failed step:
///
/// - no bearer token: 401 `missing_credentials`
/// - token fails verification: 401 (`token_expired` / `invalid_token` / `malformed_token`)
/// - role not allowed for the route: 403 `forbidden`
///
/// On success the verified identity is stored in the request extensions, where
/// the `AuthUser` extractor picks it up.
pub async fn require_capability(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request).ok_or(AppError::MissingCredentials)?;

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::debug!(reason = %e, "bearer token rejected");
        AppError::from(e)
    })?;

    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned())
        .unwrap_or_else(|| request.uri().path().to_owned());

    let Some(roles) = allowed_roles(request.method(), &route) else {
        tracing::warn!(method = %request.method(), route = %route, "protected route has no capability entry");
        return Err(AppError::forbidden("this operation is not available"));
    };

    if !roles.contains(&claims.role) {
        tracing::info!(user_id = %claims.sub, role = %claims.role, route = %route, "role not permitted");
        return Err(AppError::forbidden(format!(
            "{} accounts may not perform this operation",
            claims.role
        )));
    }

    request.extensions_mut().insert(AuthUser {
        id: claims.sub,
        role: claims.role,
    });

    Ok(next.run(request).await)
}
