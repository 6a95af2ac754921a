//! Observer trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] into [`crate::service::LeaseService`]
//! to receive events as an upload moves through its six stages.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a progress bar, a broadcast channel or an
//! audit log without the library knowing how the host communicates.
//!
//! # Example
//!
//! ```rust
//! use lease_welcome_pack::{PipelineObserver, Stage};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingObserver {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineObserver for CountingObserver {
//!     fn on_stage_complete(&self, stage: Stage, elapsed_secs: f64) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} done in {:.1}s", stage, elapsed_secs);
//!     }
//! }
//!
//! let observer = CountingObserver { completed: AtomicUsize::new(0) };
//! observer.on_stage_complete(Stage::ExtractText, 0.4);
//! assert_eq!(observer.completed.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::sync::Arc;

/// The six stages of lease processing, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    StoreUpload,
    ExtractText,
    ExtractFields,
    SaveFields,
    GenerateWelcomePack,
    Complete,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::StoreUpload,
        Stage::ExtractText,
        Stage::ExtractFields,
        Stage::SaveFields,
        Stage::GenerateWelcomePack,
        Stage::Complete,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// 1-based position.
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::StoreUpload => "storing upload",
            Stage::ExtractText => "extracting text",
            Stage::ExtractFields => "extracting fields",
            Stage::SaveFields => "saving extracted fields",
            Stage::GenerateWelcomePack => "generating Welcome Pack",
            Stage::Complete => "finishing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Stage {}/{}: {}", self.number(), Self::COUNT, self.description())
    }
}

/// Called by the orchestrator as an upload is processed.
///
/// All methods have default no-op implementations so implementors only
/// override what they care about.
pub trait PipelineObserver: Send + Sync {
    /// Called just before a stage starts.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    fn on_stage_complete(&self, stage: Stage, elapsed_secs: f64) {
        let _ = (stage, elapsed_secs);
    }

    /// Called when validation warnings send the model a correction prompt.
    fn on_correction_round(&self, warnings: &[String]) {
        let _ = warnings;
    }

    /// Called once when a stage fails and the upload is marked failed.
    fn on_pipeline_failed(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }
}

/// A no-op observer; the default when none is configured.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias for the shared observer handle.
pub type Observer = Arc<dyn PipelineObserver>;
