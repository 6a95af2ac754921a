//! Error types for the lease-welcome-pack library.
//!
//! Four types reflect four audiences:
//!
//! * [`WelcomePackError`]: fatal for one pipeline stage. The lease could
//!   not be read, the model output was unusable even after the correction
//!   round, the template is missing or has drifted, or a collaborator failed.
//!
//! * [`ValidationError`]: the upload itself is unacceptable (wrong type, too
//!   large). Raised before any state is created and never retried; the
//!   boundary maps it to a client error.
//!
//! * [`CollaboratorError`]: the record store or blob storage failed.
//!
//! * [`ProcessingError`]: the single typed error [`crate::service::LeaseService`]
//!   returns to its caller once a stage error has been recorded as `failed`.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

const MIB: f64 = 1024.0 * 1024.0;

/// All fatal stage errors returned by the lease-welcome-pack library.
#[derive(Debug, Error)]
pub enum WelcomePackError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The type tag handed to the text extractor is neither `pdf` nor `docx`.
    ///
    /// The orchestrator validates types before extraction, so reaching this
    /// means a caller skipped validation.
    #[error("Unsupported file type '{file_type}': expected 'pdf' or 'docx'")]
    UnsupportedFileType { file_type: String },

    /// The bytes could not be opened as the declared document type.
    #[error("Could not read {kind} document: {detail}")]
    UnreadableDocument { kind: &'static str, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium on the library path."
    )]
    PdfiumBindingFailed(String),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call itself failed.
    #[error("LLM API error: {message}")]
    ModelCall { message: String },

    /// The model call did not answer within the configured timeout.
    #[error("LLM call timed out after {secs}s")]
    ModelTimeout { secs: u64 },

    /// The response was not JSON, or lacked required keys.
    ///
    /// `raw` holds the verbatim response for offline diagnosis; it is kept
    /// out of the display string so log lines stay readable.
    #[error("Model returned unusable output: {reason}")]
    MalformedModelOutput { reason: String, raw: String },

    /// The final record breaks the "non-null fields are non-empty" rule.
    #[error("Extracted record is missing values for: {}", .fields.join(", "))]
    SchemaViolation { fields: Vec<&'static str> },

    // ── Template errors ───────────────────────────────────────────────────
    /// The Welcome Pack template is not where the configuration says.
    #[error("Welcome Pack template not found at '{path}'")]
    TemplateNotFound { path: PathBuf },

    /// The template no longer matches the layout this build expects.
    #[error("Welcome Pack template structure mismatch: {detail}")]
    TemplateStructure { detail: String },

    /// A replacement value contains placeholder syntax.
    #[error("Value for '{field}' contains placeholder syntax and cannot be substituted")]
    PlaceholderInValue { field: &'static str },

    // ── Collaborator errors ───────────────────────────────────────────────
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Pre-flight rejection of an upload.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid file type '{file_type}'. Only PDF and DOCX are accepted.")]
    InvalidFileType { file_type: String },

    #[error("File too large ({size_mb:.1}MB). Maximum size is {limit_mb}MB.")]
    FileTooLarge { size_mb: f64, limit_mb: f64 },
}

impl ValidationError {
    pub(crate) fn too_large(size: usize, limit: usize) -> Self {
        ValidationError::FileTooLarge {
            size_mb: size as f64 / MIB,
            limit_mb: limit as f64 / MIB,
        }
    }
}

/// Failure reported by a record store or blob storage backend.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("record store error: {0}")]
    Store(String),

    #[error("blob storage error: {0}")]
    Storage(String),

    #[error("{what} not found")]
    NotFound { what: String },
}

/// The error [`crate::service::LeaseService`] hands back to the boundary.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Client-correctable upload problem; no record was created.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A stage failed after the run was created (or while creating it).
    #[error("Processing failed: {message}")]
    Failed {
        upload_id: Option<Uuid>,
        message: String,
        #[source]
        source: WelcomePackError,
    },
}

impl ProcessingError {
    pub(crate) fn failed(upload_id: Option<Uuid>, source: WelcomePackError) -> Self {
        ProcessingError::Failed {
            upload_id,
            message: source.to_string(),
            source,
        }
    }

    /// HTTP status the inbound boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ProcessingError::Validation(ValidationError::InvalidFileType { .. }) => 422,
            ProcessingError::Validation(ValidationError::FileTooLarge { .. }) => 413,
            ProcessingError::Failed { .. } => 500,
        }
    }

    /// `true` when the caller can fix the problem by uploading a different file.
    pub fn is_client_error(&self) -> bool {
        matches!(self, ProcessingError::Validation(_))
    }
}
