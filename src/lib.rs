use std::sync::Arc;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderName, header},
    middleware,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;

// Module for routing segregation (Public, Authenticated).
pub mod routes;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use auth::{PasswordHasher, TokenIssuer};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{CredentialStoreState, JobRepositoryState, PostgresRepository};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Auto-generates the OpenAPI document for every handler decorated with
/// `#[utoipa::path]`. Served at `/api-docs/openapi.json` and browsable through
/// the Swagger UI.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::get_me,
        handlers::list_jobs, handlers::create_job, handlers::get_job,
        handlers::update_job, handlers::delete_job, handlers::list_my_jobs,
        handlers::employer_stats, handlers::create_application,
        handlers::list_applications, handlers::list_my_applications,
        handlers::update_application_status, handlers::presign_resume_upload
    ),
    components(
        schemas(
            models::Role, models::JobType, models::ApplicationStatus,
            models::User, models::Job, models::Application, models::ApplicationSummary,
            models::RegisterRequest, models::LoginRequest, models::LoginResponse,
            models::CreateJobRequest, models::UpdateJobRequest, models::JobListResponse,
            models::CreateApplicationRequest, models::UpdateApplicationStatusRequest,
            models::ApplicationListResponse, models::EmployerStats,
            models::ResumeUploadRequest, models::ResumeUploadResponse,
            models::MessageResponse, error::ErrorBody,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "careerlaunch", description = "CareerLaunch job board API")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single, immutable container of services shared by every request. All
/// members are cheap to clone and read-only after startup.
#[derive(Clone)]
pub struct AppState {
    /// Identity records (register, login, `/me`).
    pub users: CredentialStoreState,
    /// Job postings and applications.
    pub jobs: JobRepositoryState,
    /// Presigned resume uploads.
    pub storage: StorageState,
    pub hasher: PasswordHasher,
    /// Holds the signing key loaded at startup.
    pub tokens: Arc<TokenIssuer>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for CredentialStoreState {
    fn from_ref(app_state: &AppState) -> CredentialStoreState {
        app_state.users.clone()
    }
}

impl FromRef<AppState> for JobRepositoryState {
    fn from_ref(app_state: &AppState) -> JobRepositoryState {
        app_state.jobs.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing tree, applies the capability middleware to the
/// protected routes and wraps everything in the observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Public Routes: No middleware applied.
        .merge(public::public_routes())
        // Authenticated Routes: `route_layer` runs the middleware only for matched
        // routes, so `MatchedPath` is available for the capability lookup.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_capability,
            )),
        )
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Mark the bearer token sensitive before anything can log it.
                .layer(SetSensitiveRequestHeadersLayer::new(std::iter::once(
                    header::AUTHORIZATION,
                )))
                // 3b. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3c. Request Tracing: one span per request, tagged with the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3d. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the `http_request` span for `TraceLayer`, carrying method, URI and
/// the `x-request-id` so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
