use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- Enumerations (mapped to Postgres enum types) ---

/// Role
///
/// Coarse-grained capability classification. Fixed at registration and carried
/// inside every bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Candidate,
    Employer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Employer => "employer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JobType
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(type_name = "job_type", rename_all = "kebab-case")]
#[ts(export)]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
}

impl FromStr for JobType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full-time" => Ok(JobType::FullTime),
            "part-time" => Ok(JobType::PartTime),
            "contract" => Ok(JobType::Contract),
            other => Err(format!(
                "unknown jobType '{other}', expected one of full-time, part-time, contract"
            )),
        }
    }
}

/// ApplicationStatus
///
/// Lifecycle of an application. New applications start as `Submitted`; only the
/// employer owning the job moves it forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[ts(export)]
pub enum ApplicationStatus {
    #[default]
    Submitted,
    Interview,
    Rejected,
    Hired,
}

// --- Core Schemas (Mapped to Database) ---

/// User
///
/// The public identity record. The password hash lives only in `Credentials`
/// and is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    // Stored lower-cased; uniqueness is case-insensitive.
    pub email: String,
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Credentials
///
/// A user row together with its bcrypt hash, as needed by the login flow.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// NewUser
///
/// Insert payload for the credential store. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Job
///
/// A job posting from the `jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Job {
    pub id: Uuid,
    // FK to users.id (owning employer).
    pub employer_id: Uuid,
    pub title: String,
    pub description: String,
    pub requirements: String,
    pub company: String,
    pub location: String,
    // Free text ("55000", "competitive", "40-50k").
    pub salary: Option<String>,
    pub job_type: JobType,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Application
///
/// A candidate's application from the `applications` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub candidate_id: Uuid,
    pub cover_letter: Option<String>,
    // Object-store key of an uploaded resume.
    pub resume_key: Option<String>,
    pub status: ApplicationStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ApplicationSummary
///
/// An application joined with its job and candidate, as shown on the employer
/// and candidate dashboards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApplicationSummary {
    pub id: Uuid,
    pub job_id: Uuid,
    pub job_title: String,
    pub company: String,
    pub candidate_id: Uuid,
    pub candidate_name: String,
    pub cover_letter: Option<String>,
    pub resume_key: Option<String>,
    pub status: ApplicationStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input payload for `POST /auth/register`. The password is hashed before it
/// reaches the credential store and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(
        length(min = 8, message = "password must be at least 8 characters"),
        custom(function = "password_fits_hash")
    )]
    pub password: String,
    pub role: Role,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// CreateJobRequest
///
/// Input payload for `POST /jobs`. `salary` accepts either a JSON string or a
/// number; numbers are kept as their decimal text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "description is required"))]
    pub description: String,
    #[serde(default)]
    pub requirements: String,
    #[validate(length(min = 1, max = 200, message = "company must be 1-200 characters"))]
    pub company: String,
    #[validate(length(min = 1, max = 200, message = "location must be 1-200 characters"))]
    pub location: String,
    #[serde(default, deserialize_with = "salary_text")]
    #[ts(type = "string | number | null")]
    pub salary: Option<String>,
    pub job_type: JobType,
}

/// UpdateJobRequest
///
/// Partial update payload for `PUT /jobs/{id}`; absent fields keep their value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateJobRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "description must not be empty"))]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "company must be 1-200 characters"))]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 200, message = "location must be 1-200 characters"))]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "salary_text", skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | number | null")]
    pub salary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_type: Option<JobType>,
}

/// CreateApplicationRequest
///
/// Input payload for `POST /applications`. At least one of `coverLetter` or
/// `resumeKey` must be present.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "application_has_content"))]
#[ts(export)]
pub struct CreateApplicationRequest {
    pub job_id: Uuid,
    #[validate(length(max = 10000, message = "coverLetter must be at most 10000 characters"))]
    pub cover_letter: Option<String>,
    pub resume_key: Option<String>,
}

/// NewApplication
///
/// Normalized application fields handed to the repository.
#[derive(Debug, Clone, Default)]
pub struct NewApplication {
    pub cover_letter: Option<String>,
    pub resume_key: Option<String>,
}

/// UpdateApplicationStatusRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[ts(export)]
pub struct UpdateApplicationStatusRequest {
    pub status: ApplicationStatus,
}

/// ResumeUploadRequest
///
/// Input payload for requesting a short-lived upload URL (`POST /uploads/resume`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResumeUploadRequest {
    /// The original filename, used to derive the file extension.
    #[schema(example = "jane_doe_cv.pdf")]
    #[validate(length(min = 1, max = 255, message = "filename must be 1-255 characters"))]
    pub filename: String,
    /// The MIME type the upload is pinned to.
    #[schema(example = "application/pdf")]
    pub file_type: String,
}

// --- Response Schemas (Output) ---

/// MessageResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// LoginResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

/// JobListResponse
///
/// One page of jobs: `{"jobs": [...], "totalPages": n}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct JobListResponse {
    pub jobs: Vec<Job>,
    pub total_pages: i64,
}

/// ApplicationListResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApplicationListResponse {
    pub applications: Vec<ApplicationSummary>,
    pub total_pages: i64,
}

/// EmployerStats
///
/// Dashboard counters scoped to the requesting employer's own postings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EmployerStats {
    pub active_jobs: i64,
    pub total_applications: i64,
    pub interviews_scheduled: i64,
}

/// ResumeUploadResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ResumeUploadResponse {
    /// Presigned PUT URL, valid for ten minutes.
    pub upload_url: String,
    /// Key to send back as `resumeKey` when applying.
    pub resource_key: String,
}

// --- Validation helpers ---

/// bcrypt only reads the first 72 bytes of its input.
pub const MAX_PASSWORD_BYTES: usize = 72;

fn password_fits_hash(password: &str) -> Result<(), ValidationError> {
    if password.len() > MAX_PASSWORD_BYTES {
        let mut err = ValidationError::new("password_too_long");
        err.message = Some("password must be at most 72 bytes".into());
        return Err(err);
    }
    Ok(())
}

fn application_has_content(req: &CreateApplicationRequest) -> Result<(), ValidationError> {
    let has_text = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    if has_text(&req.cover_letter) || has_text(&req.resume_key) {
        Ok(())
    } else {
        let mut err = ValidationError::new("missing_content");
        err.message = Some("a coverLetter or resumeKey is required".into());
        Err(err)
    }
}

fn salary_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    }))
}
