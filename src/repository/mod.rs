use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Application, ApplicationStatus, ApplicationSummary, CreateJobRequest, Credentials,
        EmployerStats, Job, JobType, NewApplication, NewUser, UpdateJobRequest, User,
    },
};

pub mod postgres;

pub use postgres::PostgresRepository;

/// Fixed number of items per page for every paginated listing.
pub const PAGE_SIZE: i64 = 10;

/// CredentialStore Trait
///
/// Persistence contract for user identity records. Independent of the job
/// repository; the two are composed only at the handler layer.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Inserts a user. Fails with `Conflict` when the email (compared
    /// case-insensitively) is already registered.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    /// Case-insensitive lookup used by the login flow.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<Credentials>>;
    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>>;
}

/// JobRepository Trait
///
/// Defines the abstract contract for job postings and applications. Ownership
/// rules live here, next to the data: a caller can only change a posting it
/// owns, and the repository reports `Forbidden` versus `NotFound` precisely.
#[async_trait]
pub trait JobRepository: Send + Sync {
    // --- Jobs ---
    /// Fails with `Forbidden` unless `employer_id` is an existing employer.
    async fn create_job(&self, employer_id: Uuid, job: CreateJobRequest) -> AppResult<Job>;
    async fn list_jobs(&self, filter: &JobFilter, page: PageRequest) -> AppResult<Page<Job>>;
    async fn get_job(&self, id: Uuid) -> AppResult<Job>;
    // Owner-Only: absent fields keep their value.
    async fn update_job(&self, id: Uuid, requester_id: Uuid, changes: UpdateJobRequest) -> AppResult<Job>;
    // Owner-Only.
    async fn delete_job(&self, id: Uuid, requester_id: Uuid) -> AppResult<()>;

    // --- Applications ---
    /// Fails with `Conflict` if the candidate already applied to the job and
    /// with `NotFound` if the job does not exist.
    async fn create_application(
        &self,
        candidate_id: Uuid,
        job_id: Uuid,
        application: NewApplication,
    ) -> AppResult<Application>;
    /// Applications to any of the employer's postings, joined with candidate name and job title.
    async fn list_applications_for_employer(
        &self,
        employer_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<ApplicationSummary>>;
    async fn list_applications_for_candidate(
        &self,
        candidate_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<ApplicationSummary>>;
    // Only the employer owning the referenced job may change the status.
    async fn update_application_status(
        &self,
        application_id: Uuid,
        employer_id: Uuid,
        status: ApplicationStatus,
    ) -> AppResult<Application>;

    async fn employer_stats(&self, employer_id: Uuid) -> AppResult<EmployerStats>;
}

/// CredentialStoreState / JobRepositoryState
///
/// The concrete types used to share persistence access across the application state.
pub type CredentialStoreState = Arc<dyn CredentialStore>;
pub type JobRepositoryState = Arc<dyn JobRepository>;

/// JobFilter
///
/// Combinable predicates for `list_jobs`. `None` means "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobFilter {
    /// Case-insensitive substring match on title or description.
    pub search: Option<String>,
    pub job_type: Option<JobType>,
    /// Exact match.
    pub location: Option<String>,
    pub employer_id: Option<Uuid>,
}

impl JobFilter {
    /// Builds a filter from raw query parameters; blank strings count as absent.
    pub fn from_query(
        search: Option<String>,
        job_type: Option<JobType>,
        location: Option<String>,
    ) -> Self {
        Self {
            search: non_blank(search),
            job_type,
            location: non_blank(location),
            employer_id: None,
        }
    }
}

/// PageRequest
///
/// A validated 1-indexed page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    number: i64,
}

impl PageRequest {
    /// `None` when `number` is zero; pages start at 1.
    pub fn new(number: u32) -> Option<Self> {
        (number >= 1).then_some(Self {
            number: i64::from(number),
        })
    }

    pub fn first() -> Self {
        Self { number: 1 }
    }

    pub fn number(&self) -> i64 {
        self.number
    }

    pub fn limit(&self) -> i64 {
        PAGE_SIZE
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * PAGE_SIZE
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// Page
///
/// One slice of a listing plus the page count of the whole filtered result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: i64) -> Self {
        Self {
            items,
            total_pages: total_pages(total_count, PAGE_SIZE),
        }
    }
}

/// `ceil(total_count / page_size)`, zero for an empty result.
pub fn total_pages(total_count: i64, page_size: i64) -> i64 {
    if total_count <= 0 || page_size <= 0 {
        return 0;
    }
    (total_count + page_size - 1) / page_size
}

/// Escapes `%`, `_` and `\` so user input matches literally inside a LIKE pattern.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
