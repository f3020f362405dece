#![allow(dead_code)]

use async_trait::async_trait;
use axum::{body::Body, http::Request};
use careerlaunch_api::{
    AppConfig, AppState, MockStorageService,
    auth::{PasswordHasher, TokenIssuer},
    error::{AppError, AppResult},
    models::{
        Application, ApplicationStatus, ApplicationSummary, CreateJobRequest, Credentials,
        EmployerStats, Job, JobType, NewApplication, NewUser, Role, UpdateJobRequest, User,
    },
    repository::{CredentialStore, JobFilter, JobRepository, Page, PageRequest},
    storage::StorageState,
};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

// --- IN-MEMORY STORE ---

// Stands in for Postgres in handler and router tests. Each write happens under
// a single lock, so the uniqueness checks behave like the database constraints
// even when requests race.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<Credentials>,
    jobs: Vec<Job>,
    applications: Vec<Application>,
    // Monotonic clock so "newest first" ordering is deterministic.
    tick: i64,
}

impl Tables {
    fn next_timestamp(&mut self) -> chrono::DateTime<Utc> {
        self.tick += 1;
        Utc::now() + ChronoDuration::seconds(self.tick)
    }

    fn summary(&self, application: &Application) -> Option<ApplicationSummary> {
        let job = self.jobs.iter().find(|j| j.id == application.job_id)?;
        let candidate = self.users.iter().find(|u| u.user.id == application.candidate_id)?;
        Some(ApplicationSummary {
            id: application.id,
            job_id: job.id,
            job_title: job.title.clone(),
            company: job.company.clone(),
            candidate_id: candidate.user.id,
            candidate_name: candidate.user.name.clone(),
            cover_letter: application.cover_letter.clone(),
            resume_key: application.resume_key.clone(),
            status: application.status,
            created_at: application.created_at,
        })
    }
}

fn paginate<T: Clone>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as i64;
    let start = (page.offset() as usize).min(items.len());
    let end = (start + page.limit() as usize).min(items.len());
    let slice = items.drain(start..end).collect();
    Page::new(slice, total)
}

fn job_matches(job: &Job, filter: &JobFilter) -> bool {
    let search_ok = filter.search.as_ref().is_none_or(|needle| {
        let needle = needle.to_lowercase();
        job.title.to_lowercase().contains(&needle) || job.description.to_lowercase().contains(&needle)
    });
    search_ok
        && filter.job_type.is_none_or(|t| job.job_type == t)
        && filter.location.as_ref().is_none_or(|l| &job.location == l)
        && filter.employer_id.is_none_or(|id| job.employer_id == id)
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn application_count(&self) -> usize {
        self.inner.lock().unwrap().applications.len()
    }

    pub fn job_count(&self) -> usize {
        self.inner.lock().unwrap().jobs.len()
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut tables = self.inner.lock().unwrap();
        let email = user.email.to_lowercase();
        if tables.users.iter().any(|c| c.user.email == email) {
            return Err(AppError::conflict("email address is already registered"));
        }
        let created_at = tables.next_timestamp();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email,
            role: user.role,
            created_at,
        };
        tables.users.push(Credentials {
            user: record.clone(),
            password_hash: user.password_hash,
        });
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Credentials>> {
        let tables = self.inner.lock().unwrap();
        let email = email.to_lowercase();
        Ok(tables.users.iter().find(|c| c.user.email == email).cloned())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let tables = self.inner.lock().unwrap();
        Ok(tables.users.iter().find(|c| c.user.id == id).map(|c| c.user.clone()))
    }
}

#[async_trait]
impl JobRepository for InMemoryStore {
    async fn create_job(&self, employer_id: Uuid, job: CreateJobRequest) -> AppResult<Job> {
        let mut tables = self.inner.lock().unwrap();
        let is_employer = tables
            .users
            .iter()
            .any(|c| c.user.id == employer_id && c.user.role == Role::Employer);
        if !is_employer {
            return Err(AppError::forbidden("only employer accounts may post jobs"));
        }
        let created_at = tables.next_timestamp();
        let record = Job {
            id: Uuid::new_v4(),
            employer_id,
            title: job.title,
            description: job.description,
            requirements: job.requirements,
            company: job.company,
            location: job.location,
            salary: job.salary,
            job_type: job.job_type,
            created_at,
        };
        tables.jobs.push(record.clone());
        Ok(record)
    }

    async fn list_jobs(&self, filter: &JobFilter, page: PageRequest) -> AppResult<Page<Job>> {
        let tables = self.inner.lock().unwrap();
        let mut matching: Vec<Job> = tables.jobs.iter().filter(|j| job_matches(j, filter)).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(matching, page))
    }

    async fn get_job(&self, id: Uuid) -> AppResult<Job> {
        let tables = self.inner.lock().unwrap();
        tables
            .jobs
            .iter()
            .find(|j| j.id == id)
            .cloned()
            .ok_or_else(|| AppError::not_found("job not found"))
    }

    async fn update_job(&self, id: Uuid, requester_id: Uuid, changes: UpdateJobRequest) -> AppResult<Job> {
        let mut tables = self.inner.lock().unwrap();
        let job = tables
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::not_found("job not found"))?;
        if job.employer_id != requester_id {
            return Err(AppError::forbidden("only the employer who posted this job may modify it"));
        }
        if let Some(title) = changes.title {
            job.title = title;
        }
        if let Some(description) = changes.description {
            job.description = description;
        }
        if let Some(requirements) = changes.requirements {
            job.requirements = requirements;
        }
        if let Some(company) = changes.company {
            job.company = company;
        }
        if let Some(location) = changes.location {
            job.location = location;
        }
        if changes.salary.is_some() {
            job.salary = changes.salary;
        }
        if let Some(job_type) = changes.job_type {
            job.job_type = job_type;
        }
        Ok(job.clone())
    }

    async fn delete_job(&self, id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let mut tables = self.inner.lock().unwrap();
        let job = tables
            .jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| AppError::not_found("job not found"))?;
        if job.employer_id != requester_id {
            return Err(AppError::forbidden("only the employer who posted this job may delete it"));
        }
        tables.jobs.retain(|j| j.id != id);
        tables.applications.retain(|a| a.job_id != id);
        Ok(())
    }

    async fn create_application(
        &self,
        candidate_id: Uuid,
        job_id: Uuid,
        application: NewApplication,
    ) -> AppResult<Application> {
        let mut tables = self.inner.lock().unwrap();
        if !tables.jobs.iter().any(|j| j.id == job_id) {
            return Err(AppError::not_found("job not found"));
        }
        if tables
            .applications
            .iter()
            .any(|a| a.job_id == job_id && a.candidate_id == candidate_id)
        {
            return Err(AppError::conflict("you have already applied to this job"));
        }
        let created_at = tables.next_timestamp();
        let record = Application {
            id: Uuid::new_v4(),
            job_id,
            candidate_id,
            cover_letter: application.cover_letter,
            resume_key: application.resume_key,
            status: ApplicationStatus::Submitted,
            created_at,
        };
        tables.applications.push(record.clone());
        Ok(record)
    }

    async fn list_applications_for_employer(
        &self,
        employer_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<ApplicationSummary>> {
        let tables = self.inner.lock().unwrap();
        let mut items: Vec<ApplicationSummary> = tables
            .applications
            .iter()
            .filter_map(|a| tables.summary(a))
            .filter(|s| tables.jobs.iter().any(|j| j.id == s.job_id && j.employer_id == employer_id))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(items, page))
    }

    async fn list_applications_for_candidate(
        &self,
        candidate_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<ApplicationSummary>> {
        let tables = self.inner.lock().unwrap();
        let mut items: Vec<ApplicationSummary> = tables
            .applications
            .iter()
            .filter(|a| a.candidate_id == candidate_id)
            .filter_map(|a| tables.summary(a))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(items, page))
    }

    async fn update_application_status(
        &self,
        application_id: Uuid,
        employer_id: Uuid,
        status: ApplicationStatus,
    ) -> AppResult<Application> {
        let mut guard = self.inner.lock().unwrap();
        let tables = &mut *guard;
        let application = tables
            .applications
            .iter_mut()
            .find(|a| a.id == application_id)
            .ok_or_else(|| AppError::not_found("application not found"))?;
        let owns_job = tables
            .jobs
            .iter()
            .any(|j| j.id == application.job_id && j.employer_id == employer_id);
        if !owns_job {
            return Err(AppError::forbidden(
                "only the employer who posted this job may update its applications",
            ));
        }
        application.status = status;
        Ok(application.clone())
    }

    async fn employer_stats(&self, employer_id: Uuid) -> AppResult<EmployerStats> {
        let tables = self.inner.lock().unwrap();
        let own_jobs: Vec<Uuid> = tables
            .jobs
            .iter()
            .filter(|j| j.employer_id == employer_id)
            .map(|j| j.id)
            .collect();
        let received: Vec<&Application> = tables
            .applications
            .iter()
            .filter(|a| own_jobs.contains(&a.job_id))
            .collect();
        Ok(EmployerStats {
            active_jobs: own_jobs.len() as i64,
            total_applications: received.len() as i64,
            interviews_scheduled: received
                .iter()
                .filter(|a| a.status == ApplicationStatus::Interview)
                .count() as i64,
        })
    }
}

// --- STATE & FIXTURES ---

pub fn test_config() -> AppConfig {
    AppConfig::default()
}

pub fn test_state(store: Arc<InMemoryStore>) -> AppState {
    test_state_with_storage(store, Arc::new(MockStorageService::new()))
}

pub fn test_state_with_storage(store: Arc<InMemoryStore>, storage: StorageState) -> AppState {
    let config = test_config();
    let hasher = PasswordHasher::new(config.bcrypt_cost).unwrap();
    let tokens = Arc::new(TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl).unwrap());
    AppState {
        users: store.clone(),
        jobs: store,
        storage,
        hasher,
        tokens,
        config,
    }
}

/// Inserts a user directly, skipping bcrypt; such users cannot log in.
pub async fn seed_user(store: &InMemoryStore, role: Role) -> User {
    let id = Uuid::new_v4();
    store
        .create_user(NewUser {
            name: format!("{role} {}", &id.simple().to_string()[..6]),
            email: format!("{id}@example.test"),
            password_hash: "not-a-real-hash".to_string(),
            role,
        })
        .await
        .unwrap()
}

pub fn bearer_for(state: &AppState, user: &User) -> String {
    let token = state
        .tokens
        .issue(user.id, user.role, state.tokens.default_ttl())
        .unwrap();
    format!("Bearer {token}")
}

pub fn job_request(title: &str, job_type: JobType) -> CreateJobRequest {
    CreateJobRequest {
        title: title.to_string(),
        description: format!("{title} description"),
        requirements: "Rust".to_string(),
        company: "Acme".to_string(),
        location: "Dublin".to_string(),
        salary: Some("55000".to_string()),
        job_type,
    }
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header("Authorization", auth);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
