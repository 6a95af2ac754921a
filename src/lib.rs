//! # lease-welcome-pack
//!
//! Read a residential lease (PDF or DOCX), extract fourteen tenancy fields
//! with a language model, and render them into a tenant Welcome Pack built
//! from a `.docx` template.
//!
//! ## Pipeline Overview
//!
//! ```text
//! lease upload
//!  │
//!  ├─ 1. Store    original file to blob storage, record `uploaded`
//!  ├─ 2. Text     pdfium text layer or DOCX paragraphs/tables (`extracting`)
//!  ├─ 3. Fields   model call, JSON parse, normalize, validate, one correction round
//!  ├─ 4. Save     fields + raw model exchange (`extracted`)
//!  ├─ 5. Generate fill the template, drop empty sections (`generating`)
//!  └─ 6. Complete signed download URL (`complete`)
//! ```
//!
//! Any stage error marks the upload `failed` and surfaces as
//! [`ProcessingError::Failed`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lease_welcome_pack::{
//!     InMemoryRecordStore, LeaseService, LocalBlobStore, PipelineConfig, ProviderModel,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ...
//!     let config = PipelineConfig::builder()
//!         .template_path("template/Tenant Welcome Pack Template.docx")
//!         .build()?;
//!     let model = Arc::new(ProviderModel::from_config(&config)?);
//!     let service = LeaseService::new(
//!         config,
//!         model,
//!         Arc::new(InMemoryRecordStore::new()),
//!         Arc::new(LocalBlobStore::new("storage")),
//!     );
//!
//!     let bytes = std::fs::read("lease.pdf")?;
//!     let done = service.process_lease("user-1", "lease.pdf", bytes, "pdf").await?;
//!     println!("{} -> {}", done.extracted_data.tenant_name, done.welcome_pack_url);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `welcome-pack` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod docx;
pub mod error;
pub mod lease;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scoring;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder, SectionLayout};
pub use docx::{fill_template, splice_placeholder, FillSummary, TemplateDocument, WelcomePackGenerator};
pub use error::{CollaboratorError, ProcessingError, ValidationError, WelcomePackError};
pub use lease::{ExtractedLeaseFields, FieldName, FieldValues, FileKind, RawModelExchange};
pub use pipeline::extraction::{extract_fields, parse_model_output};
pub use pipeline::llm::{ModelClient, ProviderModel, ScriptedModel, ScriptedReply};
pub use pipeline::rent::normalize_rent;
pub use pipeline::text::extract_text;
pub use progress::{NoopObserver, Observer, PipelineObserver, Stage};
pub use scoring::{compare_fields, FieldReport, ScoreReport};
pub use service::{LeaseDetail, LeaseHistoryItem, LeaseService, ProcessedLease, WelcomePackDownload};
pub use store::{
    BlobStore, Bucket, InMemoryRecordStore, LeaseUpload, LocalBlobStore, RecordStore, UploadStatus,
};
