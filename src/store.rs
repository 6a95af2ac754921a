//! Persistence collaborators: upload records and blob storage.
//!
//! [`LeaseService`](crate::service::LeaseService) only sees the two traits;
//! the composition root chooses the backends. [`InMemoryRecordStore`] and
//! [`LocalBlobStore`] are the bundled implementations used by the CLI and
//! the tests.

use crate::error::CollaboratorError;
use crate::lease::{ExtractedLeaseFields, FileKind, RawModelExchange};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

// ── Records ──────────────────────────────────────────────────────────────

/// Lifecycle status of one upload.
///
/// Transitions only move forward through
/// `uploaded → extracting → extracted → generating → complete`; `failed`
/// can be entered from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Uploaded,
    Extracting,
    Extracted,
    Generating,
    Complete,
    Failed,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Uploaded => "uploaded",
            UploadStatus::Extracting => "extracting",
            UploadStatus::Extracted => "extracted",
            UploadStatus::Generating => "generating",
            UploadStatus::Complete => "complete",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Complete | UploadStatus::Failed)
    }

    pub fn can_advance_to(self, next: UploadStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == UploadStatus::Failed || (next as u8) > (self as u8)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for a new upload record.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub user_id: String,
    pub file_name: String,
    pub file_type: FileKind,
    pub file_path: String,
    pub file_size: usize,
}

/// One upload and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaseUpload {
    pub id: Uuid,
    pub user_id: String,
    pub file_name: String,
    pub file_type: FileKind,
    pub file_path: String,
    pub file_size: usize,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated fields plus the model traffic that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub upload_id: Uuid,
    pub fields: ExtractedLeaseFields,
    pub raw_model_exchange: RawModelExchange,
    pub created_at: DateTime<Utc>,
}

/// Where a generated Welcome Pack is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomePackRecord {
    pub upload_id: Uuid,
    pub file_path: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

/// Upload records, scoped by user.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record in status `uploaded`.
    async fn create_upload(&self, upload: NewUpload) -> Result<LeaseUpload, CollaboratorError>;

    async fn update_file_path(&self, upload_id: Uuid, file_path: &str) -> Result<(), CollaboratorError>;

    /// Move an upload to `status`, optionally recording an error message.
    async fn update_status(
        &self,
        upload_id: Uuid,
        user_id: &str,
        status: UploadStatus,
        error_message: Option<&str>,
    ) -> Result<(), CollaboratorError>;

    async fn save_extracted(
        &self,
        upload_id: Uuid,
        fields: &ExtractedLeaseFields,
        raw: &RawModelExchange,
    ) -> Result<ExtractedRecord, CollaboratorError>;

    async fn save_welcome_pack(
        &self,
        upload_id: Uuid,
        file_path: &str,
        file_name: &str,
    ) -> Result<WelcomePackRecord, CollaboratorError>;

    /// The upload, if it exists and belongs to `user_id`.
    async fn fetch_upload(&self, upload_id: Uuid, user_id: &str) -> Result<Option<LeaseUpload>, CollaboratorError>;

    async fn fetch_extracted(&self, upload_id: Uuid) -> Result<Option<ExtractedRecord>, CollaboratorError>;

    async fn fetch_welcome_pack(&self, upload_id: Uuid) -> Result<Option<WelcomePackRecord>, CollaboratorError>;

    /// Every upload of `user_id`, most recent first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<LeaseUpload>, CollaboratorError>;
}

// ── Blobs ────────────────────────────────────────────────────────────────

/// Storage buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Leases,
    WelcomePacks,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Leases => "leases",
            Bucket::WelcomePacks => "welcome-packs",
        }
    }
}

/// Object path convention: `<user>/<upload>/<file name>`.
pub fn object_path(user_id: &str, upload_id: Uuid, file_name: &str) -> String {
    format!("{user_id}/{upload_id}/{file_name}")
}

/// Binary object storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return the stored path.
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, CollaboratorError>;

    async fn get(&self, bucket: Bucket, path: &str) -> Result<Vec<u8>, CollaboratorError>;

    /// A time-limited download URL.
    async fn signed_url(&self, bucket: Bucket, path: &str, ttl_secs: u64) -> Result<String, CollaboratorError>;
}

// ── In-memory record store ───────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    uploads: Vec<LeaseUpload>,
    extracted: HashMap<Uuid, ExtractedRecord>,
    welcome_packs: HashMap<Uuid, WelcomePackRecord>,
}

/// Process-local [`RecordStore`]. Status transitions are checked.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<Tables>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, CollaboratorError> {
        self.tables
            .lock()
            .map_err(|_| CollaboratorError::Store("record store lock poisoned".into()))
    }
}

fn upload_not_found(upload_id: Uuid) -> CollaboratorError {
    CollaboratorError::NotFound {
        what: format!("lease upload {upload_id}"),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_upload(&self, upload: NewUpload) -> Result<LeaseUpload, CollaboratorError> {
        let record = LeaseUpload {
            id: Uuid::new_v4(),
            user_id: upload.user_id,
            file_name: upload.file_name,
            file_type: upload.file_type,
            file_path: upload.file_path,
            file_size: upload.file_size,
            status: UploadStatus::Uploaded,
            error_message: None,
            created_at: Utc::now(),
        };
        self.lock()?.uploads.push(record.clone());
        debug!("Created upload record {}", record.id);
        Ok(record)
    }

    async fn update_file_path(&self, upload_id: Uuid, file_path: &str) -> Result<(), CollaboratorError> {
        let mut tables = self.lock()?;
        let upload = tables
            .uploads
            .iter_mut()
            .find(|u| u.id == upload_id)
            .ok_or_else(|| upload_not_found(upload_id))?;
        upload.file_path = file_path.to_string();
        Ok(())
    }

    async fn update_status(
        &self,
        upload_id: Uuid,
        user_id: &str,
        status: UploadStatus,
        error_message: Option<&str>,
    ) -> Result<(), CollaboratorError> {
        let mut tables = self.lock()?;
        let upload = tables
            .uploads
            .iter_mut()
            .find(|u| u.id == upload_id && u.user_id == user_id)
            .ok_or_else(|| upload_not_found(upload_id))?;

        if !upload.status.can_advance_to(status) {
            return Err(CollaboratorError::Store(format!(
                "illegal status transition {} → {} for {}",
                upload.status, status, upload_id
            )));
        }
        upload.status = status;
        if let Some(message) = error_message {
            upload.error_message = Some(message.to_string());
        }
        Ok(())
    }

    async fn save_extracted(
        &self,
        upload_id: Uuid,
        fields: &ExtractedLeaseFields,
        raw: &RawModelExchange,
    ) -> Result<ExtractedRecord, CollaboratorError> {
        let record = ExtractedRecord {
            upload_id,
            fields: fields.clone(),
            raw_model_exchange: raw.clone(),
            created_at: Utc::now(),
        };
        self.lock()?.extracted.insert(upload_id, record.clone());
        Ok(record)
    }

    async fn save_welcome_pack(
        &self,
        upload_id: Uuid,
        file_path: &str,
        file_name: &str,
    ) -> Result<WelcomePackRecord, CollaboratorError> {
        let record = WelcomePackRecord {
            upload_id,
            file_path: file_path.to_string(),
            file_name: file_name.to_string(),
            created_at: Utc::now(),
        };
        self.lock()?.welcome_packs.insert(upload_id, record.clone());
        Ok(record)
    }

    async fn fetch_upload(&self, upload_id: Uuid, user_id: &str) -> Result<Option<LeaseUpload>, CollaboratorError> {
        Ok(self
            .lock()?
            .uploads
            .iter()
            .find(|u| u.id == upload_id && u.user_id == user_id)
            .cloned())
    }

    async fn fetch_extracted(&self, upload_id: Uuid) -> Result<Option<ExtractedRecord>, CollaboratorError> {
        Ok(self.lock()?.extracted.get(&upload_id).cloned())
    }

    async fn fetch_welcome_pack(&self, upload_id: Uuid) -> Result<Option<WelcomePackRecord>, CollaboratorError> {
        Ok(self.lock()?.welcome_packs.get(&upload_id).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<LeaseUpload>, CollaboratorError> {
        let mut uploads: Vec<LeaseUpload> = self
            .lock()?
            .uploads
            .iter()
            .rev()
            .filter(|u| u.user_id == user_id)
            .cloned()
            .collect();
        // Stable: equal timestamps keep newest-inserted first.
        uploads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(uploads)
    }
}

// ── Local blob store ─────────────────────────────────────────────────────

/// Filesystem [`BlobStore`] rooted at a directory: `<root>/<bucket>/<path>`.
///
/// Signed URLs are `file://` URLs carrying an `expires` Unix timestamp.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object path, refusing anything that escapes the bucket.
    fn resolve(&self, bucket: Bucket, path: &str) -> Result<PathBuf, CollaboratorError> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            return Err(CollaboratorError::Storage(format!("invalid object path '{path}'")));
        }
        Ok(self.root.join(bucket.as_str()).join(relative))
    }
}

fn storage_error(path: &Path, e: std::io::Error) -> CollaboratorError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CollaboratorError::NotFound {
            what: format!("object {}", path.display()),
        }
    } else {
        CollaboratorError::Storage(format!("{}: {e}", path.display()))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, CollaboratorError> {
        let target = self.resolve(bucket, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(parent, e))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| storage_error(&target, e))?;
        debug!(
            "Stored {} bytes ({}) at {}",
            bytes.len(),
            content_type,
            target.display()
        );
        Ok(path.to_string())
    }

    async fn get(&self, bucket: Bucket, path: &str) -> Result<Vec<u8>, CollaboratorError> {
        let target = self.resolve(bucket, path)?;
        tokio::fs::read(&target)
            .await
            .map_err(|e| storage_error(&target, e))
    }

    async fn signed_url(&self, bucket: Bucket, path: &str, ttl_secs: u64) -> Result<String, CollaboratorError> {
        let target = self.resolve(bucket, path)?;
        if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(CollaboratorError::NotFound {
                what: format!("object {}", target.display()),
            });
        }
        let absolute = std::path::absolute(&target).map_err(|e| storage_error(&target, e))?;
        let expires = Utc::now().timestamp() + ttl_secs as i64;
        Ok(format!("file://{}?expires={}", absolute.display(), expires))
    }
}
