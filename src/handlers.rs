use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult, ErrorBody},
    extract::{ApiPath, ApiQuery, ValidJson},
    models::{
        Application, ApplicationListResponse, CreateApplicationRequest, CreateJobRequest,
        EmployerStats, Job, JobListResponse, JobType, LoginRequest, LoginResponse,
        MessageResponse, NewApplication, NewUser, RegisterRequest, ResumeUploadRequest,
        ResumeUploadResponse, UpdateApplicationStatusRequest, UpdateJobRequest, User,
    },
    repository::{JobFilter, PageRequest},
    storage,
};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// JobQuery
///
/// Accepted query parameters for `GET /jobs`. Every filter is optional; blank
/// values are ignored.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct JobQuery {
    /// 1-indexed page number, defaults to 1.
    pub page: Option<u32>,
    /// Case-insensitive substring matched against title and description.
    pub search: Option<String>,
    /// One of `full-time`, `part-time`, `contract`. Any other value matches nothing.
    pub job_type: Option<String>,
    /// Exact location match.
    pub location: Option<String>,
}

/// PageQuery
///
/// The `?page=` parameter shared by the remaining paginated listings.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<u32>,
}

fn page_request(page: Option<u32>) -> AppResult<PageRequest> {
    match page {
        None => Ok(PageRequest::first()),
        Some(n) => PageRequest::new(n).ok_or_else(|| AppError::validation("page must be 1 or greater")),
    }
}

/// The `jobType` filter as requested. A value outside the known job types is
/// still a predicate; it simply matches no posting.
enum JobTypeFilter {
    Any,
    Only(JobType),
    Unmatchable,
}

fn parse_job_type(raw: Option<String>) -> JobTypeFilter {
    match non_blank(raw) {
        None => JobTypeFilter::Any,
        Some(value) => value
            .parse()
            .map(JobTypeFilter::Only)
            .unwrap_or(JobTypeFilter::Unmatchable),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// --- Identity ---

/// register_user
///
/// [Public Route] Creates a candidate or employer account.
///
/// *Flow*: The email is normalized to lower case and the password hashed on the
/// blocking pool before the credential store is touched. A duplicate email is
/// reported as `400 email_taken`; the unique index makes the check race-free.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = MessageResponse),
        (status = 400, description = "Invalid input or email taken", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let email = payload.email.trim().to_lowercase();
    let hasher = state.hasher;
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password)).await??;

    let new_user = NewUser {
        name: payload.name.trim().to_string(),
        email,
        password_hash,
        role: payload.role,
    };

    let user = match state.users.create_user(new_user).await {
        Ok(user) => user,
        Err(AppError::Conflict(_)) => return Err(AppError::EmailTaken),
        Err(e) => return Err(e),
    };

    tracing::info!(user_id = %user.id, role = %user.role, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("registration successful")),
    ))
}

/// login
///
/// [Public Route] Exchanges an email and password for a bearer token.
///
/// Unknown email and wrong password produce the same `401 invalid_credentials`,
/// and both pay for a full bcrypt check.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let email = payload.email.trim().to_lowercase();
    let hasher = state.hasher;
    let password = payload.password;

    let Some(credentials) = state.users.find_by_email(&email).await? else {
        tokio::task::spawn_blocking(move || hasher.verify_decoy(&password)).await?;
        return Err(AppError::InvalidCredentials);
    };

    let stored_hash = credentials.password_hash;
    let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash)).await??;
    if !matches {
        return Err(AppError::InvalidCredentials);
    }

    let user = credentials.user;
    let token = state
        .tokens
        .issue(user.id, user.role, state.tokens.default_ttl())?;

    tracing::debug!(user_id = %user.id, "login succeeded");
    Ok(Json(LoginResponse {
        token,
        role: user.role,
    }))
}

/// get_me
///
/// [Authenticated Route] Returns the caller's profile.
#[utoipa::path(
    get,
    path = "/me",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Unauthenticated", body = ErrorBody)
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<User>> {
    let user = state
        .users
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(user))
}

// --- Jobs ---

/// list_jobs
///
/// [Authenticated Route] Lists postings newest first, ten per page, with
/// optional free-text, job type and location filters.
#[utoipa::path(
    get,
    path = "/jobs",
    params(JobQuery),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "One page of jobs", body = JobListResponse),
        (status = 400, description = "Invalid page", body = ErrorBody)
    )
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<JobQuery>,
) -> AppResult<Json<JobListResponse>> {
    let page = page_request(query.page)?;
    let job_type = match parse_job_type(query.job_type) {
        JobTypeFilter::Any => None,
        JobTypeFilter::Only(job_type) => Some(job_type),
        JobTypeFilter::Unmatchable => {
            tracing::debug!("unknown jobType filter; returning an empty page");
            return Ok(Json(JobListResponse {
                jobs: Vec::new(),
                total_pages: 0,
            }));
        }
    };
    let filter = JobFilter::from_query(query.search, job_type, query.location);

    let result = state.jobs.list_jobs(&filter, page).await?;
    Ok(Json(JobListResponse {
        jobs: result.items,
        total_pages: result.total_pages,
    }))
}

/// create_job
///
/// [Employer Route] Publishes a new posting owned by the caller.
#[utoipa::path(
    post,
    path = "/jobs",
    request_body = CreateJobRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Created", body = Job),
        (status = 403, description = "Not an employer", body = ErrorBody)
    )
)]
pub async fn create_job(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<Job>)> {
    let job = state.jobs.create_job(id, payload).await?;
    tracing::info!(job_id = %job.id, employer_id = %id, "job created");
    Ok((StatusCode::CREATED, Json(job)))
}

/// get_job
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Found", body = Job),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<Job>> {
    Ok(Json(state.jobs.get_job(id).await?))
}

/// update_job
///
/// [Employer Route] Partially updates a posting.
///
/// *Authorization*: **Owner-Only**, enforced by the repository: another
/// employer's posting yields 403, a missing one 404.
#[utoipa::path(
    put,
    path = "/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    request_body = UpdateJobRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated", body = Job),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_job(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(payload): ValidJson<UpdateJobRequest>,
) -> AppResult<Json<Job>> {
    Ok(Json(state.jobs.update_job(id, user_id, payload).await?))
}

/// delete_job
///
/// [Employer Route] Removes a posting and, by cascade, its applications.
///
/// *Authorization*: **Owner-Only**, same rules as `update_job`.
#[utoipa::path(
    delete,
    path = "/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not Owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_job(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    state.jobs.delete_job(id, user_id).await?;
    tracing::info!(job_id = %id, employer_id = %user_id, "job deleted");
    Ok(Json(MessageResponse::new("job deleted")))
}

/// list_my_jobs
///
/// [Employer Route] The caller's own postings, paginated like `list_jobs`.
#[utoipa::path(
    get,
    path = "/employer/jobs",
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "My postings", body = JobListResponse))
)]
pub async fn list_my_jobs(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<JobListResponse>> {
    let page = page_request(query.page)?;
    let filter = JobFilter {
        employer_id: Some(id),
        ..JobFilter::default()
    };

    let result = state.jobs.list_jobs(&filter, page).await?;
    Ok(Json(JobListResponse {
        jobs: result.items,
        total_pages: result.total_pages,
    }))
}

/// employer_stats
///
/// [Employer Route] Dashboard counters for the caller's own postings.
#[utoipa::path(
    get,
    path = "/employer/stats",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Stats", body = EmployerStats))
)]
pub async fn employer_stats(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<EmployerStats>> {
    Ok(Json(state.jobs.employer_stats(id).await?))
}

// --- Applications ---

/// create_application
///
/// [Candidate Route] Applies to a job with a cover letter, a previously
/// uploaded resume, or both.
///
/// *Idempotency*: the `(job_id, candidate_id)` unique constraint rejects a
/// second application to the same job with 409 Conflict, including when two
/// requests race.
#[utoipa::path(
    post,
    path = "/applications",
    request_body = CreateApplicationRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Submitted", body = Application),
        (status = 403, description = "Not a candidate or foreign resume", body = ErrorBody),
        (status = 404, description = "Unknown job", body = ErrorBody),
        (status = 409, description = "Duplicate", body = ErrorBody)
    )
)]
pub async fn create_application(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<CreateApplicationRequest>,
) -> AppResult<(StatusCode, Json<Application>)> {
    let resume_key = non_blank(payload.resume_key);
    if let Some(key) = resume_key.as_deref() {
        if !storage::is_own_resume(id, key) {
            return Err(AppError::forbidden("resumeKey does not belong to the caller"));
        }
    }

    let fields = NewApplication {
        cover_letter: non_blank(payload.cover_letter),
        resume_key,
    };

    let application = state
        .jobs
        .create_application(id, payload.job_id, fields)
        .await?;
    tracing::info!(application_id = %application.id, job_id = %application.job_id, "application submitted");
    Ok((StatusCode::CREATED, Json(application)))
}

/// list_applications
///
/// [Employer Route] Applications to any of the caller's postings, joined with
/// the candidate's name and the job title.
#[utoipa::path(
    get,
    path = "/applications",
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Applications received", body = ApplicationListResponse))
)]
pub async fn list_applications(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<ApplicationListResponse>> {
    let page = page_request(query.page)?;
    let result = state.jobs.list_applications_for_employer(id, page).await?;
    Ok(Json(ApplicationListResponse {
        applications: result.items,
        total_pages: result.total_pages,
    }))
}

/// list_my_applications
///
/// [Candidate Route] The caller's own applications.
#[utoipa::path(
    get,
    path = "/applications/mine",
    params(PageQuery),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "My applications", body = ApplicationListResponse))
)]
pub async fn list_my_applications(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<ApplicationListResponse>> {
    let page = page_request(query.page)?;
    let result = state.jobs.list_applications_for_candidate(id, page).await?;
    Ok(Json(ApplicationListResponse {
        applications: result.items,
        total_pages: result.total_pages,
    }))
}

/// update_application_status
///
/// [Employer Route] Moves an application through its lifecycle. Only the
/// employer owning the referenced job may do so.
#[utoipa::path(
    patch,
    path = "/applications/{id}/status",
    params(("id" = Uuid, Path, description = "Application ID")),
    request_body = UpdateApplicationStatusRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated", body = Application),
        (status = 403, description = "Not the job owner", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_application_status(
    AuthUser { id: employer_id, .. }: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ValidJson(payload): ValidJson<UpdateApplicationStatusRequest>,
) -> AppResult<Json<Application>> {
    let application = state
        .jobs
        .update_application_status(id, employer_id, payload.status)
        .await?;
    Ok(Json(application))
}

// --- Uploads ---

/// presign_resume_upload
///
/// [Candidate Route] Issues a short-lived presigned PUT URL for a resume.
///
/// *Security*: Only PDF, DOC and DOCX are accepted, the URL is pinned to the
/// declared content type, and the object key is generated server-side under
/// the caller's own `resumes/<id>/` prefix. The client filename contributes
/// nothing but a consistency check on its extension.
#[utoipa::path(
    post,
    path = "/uploads/resume",
    request_body = ResumeUploadRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "URL", body = ResumeUploadResponse),
        (status = 400, description = "Unsupported file type", body = ErrorBody)
    )
)]
pub async fn presign_resume_upload(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<ResumeUploadRequest>,
) -> AppResult<Json<ResumeUploadResponse>> {
    let content_type = payload.file_type.trim();
    let extension = storage::resume_extension(content_type)
        .ok_or_else(|| AppError::validation("fileType must be a PDF, DOC or DOCX document"))?;

    if !storage::filename_matches(&payload.filename, extension) {
        return Err(AppError::validation(format!(
            "filename must end in .{extension} for {content_type}"
        )));
    }

    let object_key = storage::resume_key(id, extension);
    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, content_type)
        .await?;

    Ok(Json(ResumeUploadResponse {
        upload_url,
        resource_key: object_key,
    }))
}
