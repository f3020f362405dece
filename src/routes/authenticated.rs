use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Authenticated Router Module
///
/// Every route a signed-in candidate or employer can reach. The router is
/// wrapped in `require_capability`, which admits a request only if its token
/// verifies and its role appears next to the route in `CAPABILITIES`.
///
/// A route added here without a matching capability entry is rejected for
/// every caller.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // --- Job Postings ---
        // GET /jobs?page&search&jobType&location (any role)
        // POST /jobs (employer)
        .route("/jobs", get(handlers::list_jobs).post(handlers::create_job))
        // GET /jobs/{id} (any role); PUT/DELETE (owning employer only).
        .route(
            "/jobs/{id}",
            get(handlers::get_job)
                .put(handlers::update_job)
                .delete(handlers::delete_job),
        )
        // --- Employer Dashboard ---
        .route("/employer/jobs", get(handlers::list_my_jobs))
        .route("/employer/stats", get(handlers::employer_stats))
        // --- Applications ---
        // POST /applications (candidate); GET /applications (employer, received).
        .route(
            "/applications",
            post(handlers::create_application).get(handlers::list_applications),
        )
        .route("/applications/mine", get(handlers::list_my_applications))
        // PATCH /applications/{id}/status
        // Status changes are restricted to the employer who owns the job.
        .route(
            "/applications/{id}/status",
            patch(handlers::update_application_status),
        )
        // --- Resume Uploads ---
        // POST /uploads/resume
        // Returns a 10-minute presigned PUT URL so the file goes straight to the bucket.
        .route("/uploads/resume", post(handlers::presign_resume_upload))
}
