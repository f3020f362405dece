use std::{future::Future, str::FromStr, time::Duration};

use async_trait::async_trait;
use sqlx::{
    PgPool, Postgres, QueryBuilder,
    postgres::{PgConnectOptions, PgPoolOptions},
};
use uuid::Uuid;

use super::{CredentialStore, JobFilter, JobRepository, Page, PageRequest, escape_like};
use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        Application, ApplicationStatus, ApplicationSummary, CreateJobRequest, Credentials,
        EmployerStats, Job, NewApplication, NewUser, UpdateJobRequest, User,
    },
};

const USER_COLUMNS: &str = "id, name, email, role, created_at";

const JOB_COLUMNS: &str =
    "id, employer_id, title, description, requirements, company, location, salary, job_type, created_at";

const APPLICATION_COLUMNS: &str = "id, job_id, candidate_id, cover_letter, resume_key, status, created_at";

const SUMMARY_SELECT: &str = r#"
    SELECT a.id, a.job_id, j.title AS job_title, j.company, a.candidate_id,
           u.name AS candidate_name, a.cover_letter, a.resume_key, a.status, a.created_at
    FROM applications a
    JOIN jobs j ON a.job_id = j.id
    JOIN users u ON a.candidate_id = u.id
"#;

/// PostgresRepository
///
/// The concrete implementation of `CredentialStore` and `JobRepository`, backed
/// by PostgreSQL. Every call is bounded by `query_timeout`; an elapsed timeout
/// surfaces as `AppError::Transient`, distinct from data errors.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresRepository {
    /// Creates a new repository instance around an initialized connection pool.
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self { pool, query_timeout }
    }

    /// Opens a bounded pool from configuration. Connections carry a server-side
    /// `statement_timeout` matching the client-side bound.
    pub async fn connect(config: &AppConfig) -> Result<PgPool, sqlx::Error> {
        let options = PgConnectOptions::from_str(&config.db_url)?
            .options([("statement_timeout", config.db_timeout.as_millis().to_string())]);

        PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_timeout)
            .connect_with(options)
            .await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs a database future under the configured timeout, leaving error
    /// classification to the caller.
    async fn bounded_raw<T, F>(&self, operation: &'static str, fut: F) -> AppResult<Result<T, sqlx::Error>>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => Ok(result),
            Err(_) => {
                tracing::warn!(operation, timeout_ms = self.query_timeout.as_millis() as u64, "database call timed out");
                Err(AppError::Transient("the database did not respond in time".to_string()))
            }
        }
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        self.bounded_raw(operation, fut)
            .await?
            .map_err(|e| AppError::from_db(operation, e))
    }

    /// Explains why an owner-guarded statement on a job touched no row.
    async fn job_access_error(&self, job_id: Uuid, action: &str) -> AppError {
        let owner = self
            .bounded(
                "job_owner",
                sqlx::query_scalar::<_, Uuid>("SELECT employer_id FROM jobs WHERE id = $1")
                    .bind(job_id)
                    .fetch_optional(&self.pool),
            )
            .await;

        match owner {
            Ok(None) => AppError::not_found("job not found"),
            Ok(Some(_)) => AppError::forbidden(format!("only the employer who posted this job may {action} it")),
            Err(e) => e,
        }
    }

    async fn count(&self, operation: &'static str, sql: &'static str, id: Uuid) -> AppResult<i64> {
        self.bounded(
            operation,
            sqlx::query_scalar::<_, i64>(sql).bind(id).fetch_one(&self.pool),
        )
        .await
    }

    async fn application_page(
        &self,
        operation: &'static str,
        scope_column: &'static str,
        count_sql: &'static str,
        id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<ApplicationSummary>> {
        let total = self.count(operation, count_sql, id).await?;

        let sql = format!(
            "{SUMMARY_SELECT} WHERE {scope_column} = $1 ORDER BY a.created_at DESC, a.id DESC LIMIT $2 OFFSET $3"
        );
        let items = self
            .bounded(
                operation,
                sqlx::query_as::<_, ApplicationSummary>(&sql)
                    .bind(id)
                    .bind(page.limit())
                    .bind(page.offset())
                    .fetch_all(&self.pool),
            )
            .await?;

        Ok(Page::new(items, total))
    }
}

/// Appends the `AND ...` clauses for `filter` to a query whose base ends in `WHERE 1=1`.
/// Shared by the count and item queries so both see exactly the same rows.
fn push_job_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &JobFilter) {
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR description ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    if let Some(job_type) = filter.job_type {
        builder.push(" AND job_type = ");
        builder.push_bind(job_type);
    }

    if let Some(location) = &filter.location {
        builder.push(" AND location = ");
        builder.push_bind(location.clone());
    }

    if let Some(employer_id) = filter.employer_id {
        builder.push(" AND employer_id = ");
        builder.push_bind(employer_id);
    }
}

fn constraint_of(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.constraint().map(str::to_owned),
        _ => None,
    }
}

#[async_trait]
impl CredentialStore for PostgresRepository {
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, role) VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let result = self
            .bounded(
                "create_user",
                sqlx::query_as::<_, User>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(&user.name)
                    .bind(user.email.to_lowercase())
                    .bind(&user.password_hash)
                    .bind(user.role)
                    .fetch_one(&self.pool),
            )
            .await;

        match result {
            // The unique index on LOWER(email) is the only uniqueness constraint on users.
            Err(AppError::Conflict(_)) => Err(AppError::conflict("email address is already registered")),
            other => other,
        }
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Credentials>> {
        let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE LOWER(email) = LOWER($1)");
        self.bounded(
            "find_by_email",
            sqlx::query_as::<_, Credentials>(&sql)
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn get_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.bounded(
            "get_user",
            sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl JobRepository for PostgresRepository {
    /// create_job
    ///
    /// The employer check and the insert are one statement: the row is only
    /// written when `employer_id` names a user with role `employer`.
    async fn create_job(&self, employer_id: Uuid, job: CreateJobRequest) -> AppResult<Job> {
        let sql = format!(
            r#"
            INSERT INTO jobs (id, employer_id, title, description, requirements, company, location, salary, job_type)
            SELECT $1, u.id, $3, $4, $5, $6, $7, $8, $9
            FROM users u
            WHERE u.id = $2 AND u.role = 'employer'
            RETURNING {JOB_COLUMNS}
            "#
        );
        let created = self
            .bounded(
                "create_job",
                sqlx::query_as::<_, Job>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(employer_id)
                    .bind(&job.title)
                    .bind(&job.description)
                    .bind(&job.requirements)
                    .bind(&job.company)
                    .bind(&job.location)
                    .bind(&job.salary)
                    .bind(job.job_type)
                    .fetch_optional(&self.pool),
            )
            .await?;

        created.ok_or_else(|| AppError::forbidden("only employer accounts may post jobs"))
    }

    /// list_jobs
    ///
    /// Builds the filtered query with `QueryBuilder` so every user-supplied value
    /// is a bound parameter. Ordered by `created_at DESC, id DESC` so pages stay
    /// stable between calls.
    async fn list_jobs(&self, filter: &JobFilter, page: PageRequest) -> AppResult<Page<Job>> {
        let mut count_builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM jobs WHERE 1=1");
        push_job_filters(&mut count_builder, filter);
        let total = self
            .bounded(
                "count_jobs",
                count_builder.build_query_scalar::<i64>().fetch_one(&self.pool),
            )
            .await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1=1"));
        push_job_filters(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let items = self
            .bounded("list_jobs", builder.build_query_as::<Job>().fetch_all(&self.pool))
            .await?;

        Ok(Page::new(items, total))
    }

    async fn get_job(&self, id: Uuid) -> AppResult<Job> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        self.bounded(
            "get_job",
            sqlx::query_as::<_, Job>(&sql).bind(id).fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| AppError::not_found("job not found"))
    }

    /// update_job
    ///
    /// Owner-guarded partial update. `COALESCE` keeps the stored value for every
    /// field the request leaves out.
    async fn update_job(&self, id: Uuid, requester_id: Uuid, changes: UpdateJobRequest) -> AppResult<Job> {
        let sql = format!(
            r#"
            UPDATE jobs
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                requirements = COALESCE($5, requirements),
                company = COALESCE($6, company),
                location = COALESCE($7, location),
                salary = COALESCE($8, salary),
                job_type = COALESCE($9, job_type)
            WHERE id = $1 AND employer_id = $2
            RETURNING {JOB_COLUMNS}
            "#
        );
        let updated = self
            .bounded(
                "update_job",
                sqlx::query_as::<_, Job>(&sql)
                    .bind(id)
                    .bind(requester_id)
                    .bind(changes.title)
                    .bind(changes.description)
                    .bind(changes.requirements)
                    .bind(changes.company)
                    .bind(changes.location)
                    .bind(changes.salary)
                    .bind(changes.job_type)
                    .fetch_optional(&self.pool),
            )
            .await?;

        match updated {
            Some(job) => Ok(job),
            None => Err(self.job_access_error(id, "modify").await),
        }
    }

    async fn delete_job(&self, id: Uuid, requester_id: Uuid) -> AppResult<()> {
        let result = self
            .bounded(
                "delete_job",
                sqlx::query("DELETE FROM jobs WHERE id = $1 AND employer_id = $2")
                    .bind(id)
                    .bind(requester_id)
                    .execute(&self.pool),
            )
            .await?;

        if result.rows_affected() > 0 {
            Ok(())
        } else {
            Err(self.job_access_error(id, "delete").await)
        }
    }

    /// create_application
    ///
    /// Duplicate prevention is the `applications_job_candidate_key` UNIQUE
    /// constraint: of two concurrent identical inserts exactly one commits and
    /// the other reports `Conflict`.
    async fn create_application(
        &self,
        candidate_id: Uuid,
        job_id: Uuid,
        application: NewApplication,
    ) -> AppResult<Application> {
        let sql = format!(
            "INSERT INTO applications (id, job_id, candidate_id, cover_letter, resume_key) VALUES ($1, $2, $3, $4, $5) RETURNING {APPLICATION_COLUMNS}"
        );
        let result = self
            .bounded_raw(
                "create_application",
                sqlx::query_as::<_, Application>(&sql)
                    .bind(Uuid::new_v4())
                    .bind(job_id)
                    .bind(candidate_id)
                    .bind(application.cover_letter)
                    .bind(application.resume_key)
                    .fetch_one(&self.pool),
            )
            .await?;

        result.map_err(|err| match constraint_of(&err).as_deref() {
            Some("applications_job_candidate_key") => AppError::conflict("you have already applied to this job"),
            Some("applications_job_id_fkey") => AppError::not_found("job not found"),
            Some("applications_candidate_id_fkey") => AppError::not_found("candidate account not found"),
            Some("applications_has_content") => AppError::validation("a coverLetter or resumeKey is required"),
            _ => AppError::from_db("create_application", err),
        })
    }

    async fn list_applications_for_employer(
        &self,
        employer_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<ApplicationSummary>> {
        self.application_page(
            "list_applications_for_employer",
            "j.employer_id",
            "SELECT COUNT(*) FROM applications a JOIN jobs j ON a.job_id = j.id WHERE j.employer_id = $1",
            employer_id,
            page,
        )
        .await
    }

    async fn list_applications_for_candidate(
        &self,
        candidate_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<ApplicationSummary>> {
        self.application_page(
            "list_applications_for_candidate",
            "a.candidate_id",
            "SELECT COUNT(*) FROM applications WHERE candidate_id = $1",
            candidate_id,
            page,
        )
        .await
    }

    async fn update_application_status(
        &self,
        application_id: Uuid,
        employer_id: Uuid,
        status: ApplicationStatus,
    ) -> AppResult<Application> {
        let updated = self
            .bounded(
                "update_application_status",
                sqlx::query_as::<_, Application>(
                    r#"
                    UPDATE applications a
                    SET status = $3
                    FROM jobs j
                    WHERE a.id = $1 AND a.job_id = j.id AND j.employer_id = $2
                    RETURNING a.id, a.job_id, a.candidate_id, a.cover_letter, a.resume_key, a.status, a.created_at
                    "#,
                )
                .bind(application_id)
                .bind(employer_id)
                .bind(status)
                .fetch_optional(&self.pool),
            )
            .await?;

        if let Some(application) = updated {
            return Ok(application);
        }

        let exists = self
            .bounded(
                "application_exists",
                sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM applications WHERE id = $1)")
                    .bind(application_id)
                    .fetch_one(&self.pool),
            )
            .await?;

        if exists {
            Err(AppError::forbidden("only the employer who posted this job may update its applications"))
        } else {
            Err(AppError::not_found("application not found"))
        }
    }

    async fn employer_stats(&self, employer_id: Uuid) -> AppResult<EmployerStats> {
        let (active_jobs, total_applications, interviews_scheduled) = self
            .bounded(
                "employer_stats",
                sqlx::query_as::<_, (i64, i64, i64)>(
                    r#"
                    SELECT
                        (SELECT COUNT(*) FROM jobs WHERE employer_id = $1),
                        (SELECT COUNT(*) FROM applications a JOIN jobs j ON a.job_id = j.id
                            WHERE j.employer_id = $1),
                        (SELECT COUNT(*) FROM applications a JOIN jobs j ON a.job_id = j.id
                            WHERE j.employer_id = $1 AND a.status = 'interview')
                    "#,
                )
                .bind(employer_id)
                .fetch_one(&self.pool),
            )
            .await?;

        Ok(EmployerStats {
            active_jobs,
            total_applications,
            interviews_scheduled,
        })
    }
}
