//! Lease processing orchestration.
//!
//! [`LeaseService::process_lease`] drives one upload through six stages:
//!
//! ```text
//! 1 store upload      → uploaded
//! 2 extract text      → extracting
//! 3 extract fields
//! 4 save fields       → extracted
//! 5 generate pack     → generating
//! 6 complete          → complete (+ signed download URL)
//! ```
//!
//! Each status is written before the next stage's work begins. Any stage
//! error is caught once here: the upload is marked `failed` with the error
//! message (best effort; a failing status write is only logged) and the
//! error is returned as [`ProcessingError::Failed`].

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::docx::WelcomePackGenerator;
use crate::error::{CollaboratorError, ProcessingError, ValidationError, WelcomePackError};
use crate::lease::{ExtractedLeaseFields, FileKind, DOCX_CONTENT_TYPE};
use crate::pipeline::extraction::extract_fields;
use crate::pipeline::llm::ModelClient;
use crate::pipeline::text::extract_text_from;
use crate::progress::{NoopObserver, Observer, Stage};
use crate::store::{object_path, BlobStore, Bucket, NewUpload, RecordStore, UploadStatus};

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedLease {
    pub upload_id: Uuid,
    pub status: UploadStatus,
    pub extracted_data: ExtractedLeaseFields,
    pub welcome_pack_url: String,
}

/// One row of a user's lease history.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseHistoryItem {
    pub upload_id: Uuid,
    pub file_name: String,
    pub status: UploadStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub tenant_name: Option<String>,
    pub property_address: Option<String>,
    pub has_welcome_pack: bool,
}

/// Everything known about one upload.
#[derive(Debug, Clone, Serialize)]
pub struct LeaseDetail {
    pub upload_id: Uuid,
    pub file_name: String,
    pub file_type: FileKind,
    pub status: UploadStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub error_message: Option<String>,
    pub extracted_data: Option<ExtractedLeaseFields>,
    pub welcome_pack_url: Option<String>,
}

/// A Welcome Pack ready to hand to a client.
#[derive(Debug, Clone)]
pub struct WelcomePackDownload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
}

impl WelcomePackDownload {
    /// `Content-Disposition` header value.
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}

/// Orchestrates upload → text → fields → Welcome Pack.
///
/// Collaborators are injected at construction; the service holds no global
/// state and can be shared behind an `Arc`.
pub struct LeaseService {
    config: PipelineConfig,
    model: Arc<dyn ModelClient>,
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
    generator: WelcomePackGenerator,
    observer: Observer,
}

/// Tracks how far a run got, for failure reporting.
struct RunState {
    upload_id: Option<Uuid>,
    stage: Stage,
}

impl LeaseService {
    pub fn new(
        config: PipelineConfig,
        model: Arc<dyn ModelClient>,
        records: Arc<dyn RecordStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let generator = WelcomePackGenerator::from_config(&config);
        Self {
            config,
            model,
            records,
            blobs,
            generator,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Observer) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Pre-flight checks; nothing is stored when these fail.
    pub fn validate(&self, file_size: usize, file_type: &str) -> Result<FileKind, ValidationError> {
        let kind = file_type
            .parse::<FileKind>()
            .map_err(|_| ValidationError::InvalidFileType {
                file_type: file_type.to_string(),
            })?;
        if file_size > self.config.max_file_size {
            return Err(ValidationError::too_large(file_size, self.config.max_file_size));
        }
        Ok(kind)
    }

    /// Run the full pipeline for one uploaded lease.
    ///
    /// `file_type` is the lower-case extension (`pdf` / `docx`).
    pub async fn process_lease(
        &self,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        file_type: &str,
    ) -> Result<ProcessedLease, ProcessingError> {
        let kind = self.validate(bytes.len(), file_type)?;

        let pipeline_start = Instant::now();
        let mut state = RunState {
            upload_id: None,
            stage: Stage::StoreUpload,
        };

        match self.run(&mut state, user_id, file_name, bytes, kind).await {
            Ok(processed) => {
                info!(
                    "[{}] Pipeline complete: status {} ({:.1}s total)",
                    file_name,
                    processed.status,
                    pipeline_start.elapsed().as_secs_f64()
                );
                Ok(processed)
            }
            Err(e) => {
                error!("[{}] Pipeline failed at {}: {}", file_name, state.stage, e);
                self.observer.on_pipeline_failed(state.stage, &e.to_string());
                if let Some(upload_id) = state.upload_id {
                    let message = e.to_string();
                    if let Err(status_err) = self
                        .records
                        .update_status(upload_id, user_id, UploadStatus::Failed, Some(&message))
                        .await
                    {
                        error!("Failed to update status to 'failed': {}", status_err);
                    }
                }
                Err(ProcessingError::failed(state.upload_id, e))
            }
        }
    }

    fn begin(&self, state: &mut RunState, file_name: &str, stage: Stage) -> Instant {
        state.stage = stage;
        info!("[{}] {}", file_name, stage);
        self.observer.on_stage_start(stage);
        Instant::now()
    }

    fn finish(&self, file_name: &str, stage: Stage, started: Instant) {
        let elapsed = started.elapsed().as_secs_f64();
        info!(
            "[{}] Stage {}/{} complete ({:.1}s)",
            file_name,
            stage.number(),
            Stage::COUNT,
            elapsed
        );
        self.observer.on_stage_complete(stage, elapsed);
    }

    async fn set_status(
        &self,
        upload_id: Uuid,
        user_id: &str,
        status: UploadStatus,
    ) -> Result<(), WelcomePackError> {
        Ok(self.records.update_status(upload_id, user_id, status, None).await?)
    }

    async fn run(
        &self,
        state: &mut RunState,
        user_id: &str,
        file_name: &str,
        bytes: Vec<u8>,
        kind: FileKind,
    ) -> Result<ProcessedLease, WelcomePackError> {
        // 1. Store the upload.
        let started = self.begin(state, file_name, Stage::StoreUpload);
        let upload = self
            .records
            .create_upload(NewUpload {
                user_id: user_id.to_string(),
                file_name: file_name.to_string(),
                file_type: kind,
                file_path: format!("{user_id}/pending/{file_name}"),
                file_size: bytes.len(),
            })
            .await?;
        let upload_id = upload.id;
        state.upload_id = Some(upload_id);

        let lease_path = self
            .blobs
            .put(
                Bucket::Leases,
                &object_path(user_id, upload_id, file_name),
                &bytes,
                kind.content_type(),
            )
            .await?;
        self.records.update_file_path(upload_id, &lease_path).await?;
        self.finish(file_name, Stage::StoreUpload, started);

        // 2. Text.
        self.set_status(upload_id, user_id, UploadStatus::Extracting).await?;
        let started = self.begin(state, file_name, Stage::ExtractText);
        let lease_text =
            extract_text_from(bytes, kind, self.config.pdfium_library_path.as_deref()).await?;
        self.finish(file_name, Stage::ExtractText, started);

        // 3. Fields.
        let started = self.begin(state, file_name, Stage::ExtractFields);
        let (fields, raw) =
            extract_fields(self.model.as_ref(), &lease_text, self.observer.as_ref()).await?;
        self.finish(file_name, Stage::ExtractFields, started);

        // 4. Persist fields.
        let started = self.begin(state, file_name, Stage::SaveFields);
        self.records.save_extracted(upload_id, &fields, &raw).await?;
        self.set_status(upload_id, user_id, UploadStatus::Extracted).await?;
        self.finish(file_name, Stage::SaveFields, started);

        // 5. Welcome Pack.
        self.set_status(upload_id, user_id, UploadStatus::Generating).await?;
        let started = self.begin(state, file_name, Stage::GenerateWelcomePack);
        let pack = self.generator.generate(&fields.to_values()).await?;
        let pack_name = fields.welcome_pack_file_name();
        let pack_path = self
            .blobs
            .put(
                Bucket::WelcomePacks,
                &object_path(user_id, upload_id, &pack_name),
                &pack,
                DOCX_CONTENT_TYPE,
            )
            .await?;
        self.records
            .save_welcome_pack(upload_id, &pack_path, &pack_name)
            .await?;
        self.finish(file_name, Stage::GenerateWelcomePack, started);

        // 6. Complete.
        let started = self.begin(state, file_name, Stage::Complete);
        let welcome_pack_url = self
            .blobs
            .signed_url(Bucket::WelcomePacks, &pack_path, self.config.signed_url_ttl_secs)
            .await?;
        // Terminal status goes last: nothing may fail after it.
        self.set_status(upload_id, user_id, UploadStatus::Complete).await?;
        self.finish(file_name, Stage::Complete, started);

        Ok(ProcessedLease {
            upload_id,
            status: UploadStatus::Complete,
            extracted_data: fields,
            welcome_pack_url,
        })
    }

    // ── Read side ────────────────────────────────────────────────────────

    /// All uploads of a user, most recent first.
    pub async fn lease_history(&self, user_id: &str) -> Result<Vec<LeaseHistoryItem>, CollaboratorError> {
        let uploads = self.records.list_for_user(user_id).await?;
        let mut items = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let extracted = self.records.fetch_extracted(upload.id).await?;
            let has_welcome_pack = self.records.fetch_welcome_pack(upload.id).await?.is_some();
            items.push(LeaseHistoryItem {
                upload_id: upload.id,
                file_name: upload.file_name,
                status: upload.status,
                created_at: upload.created_at,
                tenant_name: extracted.as_ref().map(|r| r.fields.tenant_name.clone()),
                property_address: extracted.as_ref().map(|r| r.fields.property_address.clone()),
                has_welcome_pack,
            });
        }
        Ok(items)
    }

    /// One upload with its fields and a fresh Welcome Pack URL.
    ///
    /// An upload owned by someone else is reported as not found.
    pub async fn lease_detail(&self, upload_id: Uuid, user_id: &str) -> Result<LeaseDetail, CollaboratorError> {
        let upload = self
            .records
            .fetch_upload(upload_id, user_id)
            .await?
            .ok_or_else(|| CollaboratorError::NotFound {
                what: "Lease upload".into(),
            })?;

        let extracted = self.records.fetch_extracted(upload_id).await?;
        let welcome_pack_url = match self.records.fetch_welcome_pack(upload_id).await? {
            Some(pack) => Some(
                self.blobs
                    .signed_url(Bucket::WelcomePacks, &pack.file_path, self.config.signed_url_ttl_secs)
                    .await?,
            ),
            None => None,
        };

        Ok(LeaseDetail {
            upload_id: upload.id,
            file_name: upload.file_name,
            file_type: upload.file_type,
            status: upload.status,
            created_at: upload.created_at,
            error_message: upload.error_message,
            extracted_data: extracted.map(|r| r.fields),
            welcome_pack_url,
        })
    }

    /// The stored Welcome Pack bytes for an upload the user owns.
    pub async fn download_welcome_pack(
        &self,
        upload_id: Uuid,
        user_id: &str,
    ) -> Result<WelcomePackDownload, CollaboratorError> {
        if self.records.fetch_upload(upload_id, user_id).await?.is_none() {
            return Err(CollaboratorError::NotFound {
                what: "Lease upload".into(),
            });
        }
        let pack = self
            .records
            .fetch_welcome_pack(upload_id)
            .await?
            .ok_or_else(|| CollaboratorError::NotFound {
                what: "Welcome Pack for this upload".into(),
            })?;

        let bytes = self.blobs.get(Bucket::WelcomePacks, &pack.file_path).await?;
        Ok(WelcomePackDownload {
            bytes,
            file_name: pack.file_name,
            content_type: DOCX_CONTENT_TYPE,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::ScriptedModel;
    use crate::store::{InMemoryRecordStore, LocalBlobStore};

    fn service(dir: &std::path::Path, model: ScriptedModel) -> (LeaseService, Arc<InMemoryRecordStore>) {
        let records = Arc::new(InMemoryRecordStore::new());
        let config = PipelineConfig::builder()
            .template_path(dir.join("missing-template.docx"))
            .max_file_size(1024)
            .build()
            .unwrap();
        let svc = LeaseService::new(
            config,
            Arc::new(model),
            records.clone(),
            Arc::new(LocalBlobStore::new(dir.join("blobs"))),
        );
        (svc, records)
    }

    #[tokio::test]
    async fn wrong_type_is_rejected_without_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, records) = service(dir.path(), ScriptedModel::default());

        let err = svc
            .process_lease("alice", "lease.txt", b"hello".to_vec(), "txt")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(
            err.to_string(),
            "Invalid file type 'txt'. Only PDF and DOCX are accepted."
        );
        assert!(records.list_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, records) = service(dir.path(), ScriptedModel::default());

        let err = svc
            .process_lease("alice", "lease.pdf", vec![0; 2048], "pdf")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 413);
        assert!(records.list_for_user("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stage_failure_marks_upload_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, records) = service(dir.path(), ScriptedModel::default());

        let err = svc
            .process_lease("alice", "lease.docx", b"not a zip".to_vec(), "docx")
            .await
            .unwrap_err();
        let ProcessingError::Failed { upload_id, message, .. } = &err else {
            panic!("expected a processing failure, got {err:?}");
        };
        assert!(message.contains("Could not read docx document"));
        assert_eq!(err.status_code(), 500);

        let stored = records
            .fetch_upload(upload_id.unwrap(), "alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, UploadStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some(message.as_str()));
        assert_eq!(stored.file_path, format!("alice/{}/lease.docx", stored.id));
    }

    #[tokio::test]
    async fn detail_and_download_check_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let (svc, _records) = service(dir.path(), ScriptedModel::default());
        let missing = Uuid::new_v4();

        assert!(matches!(
            svc.lease_detail(missing, "alice").await,
            Err(CollaboratorError::NotFound { .. })
        ));
        assert!(matches!(
            svc.download_welcome_pack(missing, "alice").await,
            Err(CollaboratorError::NotFound { .. })
        ));
    }

    #[test]
    fn content_disposition_is_an_attachment() {
        let download = WelcomePackDownload {
            bytes: Vec::new(),
            file_name: "Welcome_Pack_Sarah_Chen.docx".into(),
            content_type: DOCX_CONTENT_TYPE,
        };
        assert_eq!(
            download.content_disposition(),
            "attachment; filename=\"Welcome_Pack_Sarah_Chen.docx\""
        );
    }
}
