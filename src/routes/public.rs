use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a bearer token: the health probe and the two
/// identity gateways. Everything else in the API lives behind the capability
/// middleware.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates a candidate or employer account. The role is fixed here for good.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        // Exchanges credentials for a signed, time-limited bearer token.
        .route("/auth/login", post(handlers::login))
}
