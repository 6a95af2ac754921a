//! DOCX support: reading lease text and filling the Welcome Pack template.
//!
//! * [`package`]: zip container access, raw-copying untouched parts.
//! * [`xml`]: lossless owned tree over `word/document.xml`.
//! * [`document`]: body paragraphs, tables and runs.
//! * [`template`]: placeholder substitution and the Special Conditions section.

pub mod document;
pub mod package;
pub mod template;
pub mod xml;

pub use document::TemplateDocument;
pub use template::{fill_template, splice_placeholder, FillSummary, WelcomePackGenerator};
