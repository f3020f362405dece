use careerlaunch_api::{
    AppState,
    auth::{PasswordHasher, TokenIssuer},
    config::{AppConfig, Env},
    create_router,
    repository::{CredentialStoreState, JobRepositoryState, PostgresRepository},
    storage::{S3StorageClient, StorageService, StorageState},
};
use std::{error::Error, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// The asynchronous entry point: loads configuration, initializes logging,
/// connects and migrates the database, wires the services into `AppState`
/// and serves HTTP until the process is stopped.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load()?;

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise debug for this crate and info for the HTTP layer.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "careerlaunch_api=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PostgresRepository::connect(&config).await.map_err(|e| {
        tracing::error!(error = %e, "failed to connect to Postgres, check DATABASE_URL");
        e
    })?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("database migrations applied");

    // One repository serves both the credential store and the job repository.
    let repo = Arc::new(PostgresRepository::new(pool, config.db_timeout));
    let users = repo.clone() as CredentialStoreState;
    let jobs = repo as JobRepositoryState;

    // 5. Credential Services
    let hasher = PasswordHasher::new(config.bcrypt_cost)?;
    let tokens = Arc::new(TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl)?);

    // 6. Storage Initialization (S3/MinIO)
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    );

    // LOCAL-ONLY: create the MinIO bucket on first run.
    if config.env == Env::Local {
        if let Err(e) = s3_client.ensure_bucket_exists().await {
            tracing::warn!(error = %e, bucket = %config.s3_bucket, "could not ensure storage bucket exists");
        }
    }

    let storage = Arc::new(s3_client) as StorageState;

    // 7. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        users,
        jobs,
        storage,
        hasher,
        tokens,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Listening on {}", listener.local_addr()?);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app).await?;
    Ok(())
}
