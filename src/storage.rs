use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Presigned upload URLs expire after ten minutes.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// Resume formats accepted for upload, with the extension each is stored under.
pub const RESUME_CONTENT_TYPES: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid presigning configuration: {0}")]
    Presigning(String),

    #[error("object store request failed: {0}")]
    Request(String),
}

/// StorageService
///
/// Contract for the object store that receives resume uploads. The server only
/// hands out presigned URLs; file bytes travel directly from the client to the
/// bucket.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Ensures the configured bucket exists. Used by the local MinIO setup.
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError>;

    /// Generates a temporary, signed URL allowing a client to PUT a single object.
    ///
    /// # Arguments
    /// * `key`: The final object key in the bucket.
    /// * `content_type`: The MIME type the upload is pinned to.
    async fn get_presigned_upload_url(&self, key: &str, content_type: &str) -> Result<String, StorageError>;
}

/// StorageState
///
/// The concrete type used to share storage access across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// S3StorageClient
///
/// `StorageService` backed by the AWS SDK. Works against any S3-compatible
/// endpoint; `force_path_style(true)` is required for MinIO.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub fn new(endpoint: &str, region: &str, access_key: &str, secret_key: &str, bucket: &str) -> Self {
        let credentials = s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        let exists = self.client.head_bucket().bucket(&self.bucket_name).send().await.is_ok();
        if exists {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Request(e.to_string()))
    }

    async fn get_presigned_upload_url(&self, key: &str, content_type: &str) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(UPLOAD_URL_TTL).map_err(|e| StorageError::Presigning(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            // The signature covers Content-Type, so the client cannot upload a different format.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

/// Returns the stored extension for an accepted resume MIME type.
pub fn resume_extension(content_type: &str) -> Option<&'static str> {
    RESUME_CONTENT_TYPES
        .iter()
        .find(|(mime, _)| mime.eq_ignore_ascii_case(content_type.trim()))
        .map(|(_, ext)| *ext)
}

/// Key prefix under which a candidate's resumes are stored.
pub fn resume_prefix(candidate_id: Uuid) -> String {
    format!("resumes/{candidate_id}/")
}

/// Builds a fresh object key `resumes/<candidate>/<uuid>.<ext>`. The client
/// filename never reaches the key; only the validated extension does.
pub fn resume_key(candidate_id: Uuid, extension: &str) -> String {
    format!("{}{}.{}", resume_prefix(candidate_id), Uuid::new_v4(), extension)
}

/// True when `key` names an object inside the candidate's own prefix.
pub fn is_own_resume(candidate_id: Uuid, key: &str) -> bool {
    let sanitized = sanitize_key(key);
    sanitized == key && key.starts_with(&resume_prefix(candidate_id))
}

/// Whether the uploaded filename's extension agrees with the declared type.
pub fn filename_matches(filename: &str, extension: &str) -> bool {
    Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) and empty segments from a key.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// MockStorageService
///
/// An in-process `StorageService` for tests and for running without an object
/// store. Returns deterministic local-style URLs.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_presigned_upload_url(&self, key: &str, _content_type: &str) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Request("mock storage failure requested".to_string()));
        }

        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}
