//! Stages that turn an uploaded lease into validated fields.
//!
//! ```text
//! text ──▶ extraction ──▶ (record)
//! (pdfium/docx) (model + correction round)
//!                  │
//!                  └─ rent  normalizes "$X per week|fortnight" to per month
//! ```
//!
//! 1. [`text`]: plain-text transcript of a PDF or DOCX; runs in
//!    `spawn_blocking` because pdfium and the XML parser are synchronous
//! 2. [`llm`]: the [`llm::ModelClient`] seam and its provider-backed adapter
//! 3. [`extraction`]: prompt, parse, normalize, validate, and at most one
//!    correction round
//! 4. [`rent`]: weekly/fortnightly to monthly conversion used when filling
//!    the Welcome Pack

pub mod extraction;
pub mod llm;
pub mod rent;
pub mod text;
