//! Lease text extraction: PDF or DOCX bytes → one plain-text transcript.
//!
//! ## Why spawn_blocking?
//!
//! Both formats are parsed synchronously: pdfium is a C++ library behind a
//! synchronous API, and a DOCX is unzipped and XML-parsed in memory. Running
//! either on a tokio worker would stall every other task on that thread, so
//! both run on the blocking pool.

use crate::docx::TemplateDocument;
use crate::error::WelcomePackError;
use crate::lease::FileKind;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Extract text from a lease given its lower-case type tag (`pdf` / `docx`).
///
/// Any other tag is [`WelcomePackError::UnsupportedFileType`].
pub async fn extract_text(
    bytes: Vec<u8>,
    type_tag: &str,
    pdfium_library: Option<&Path>,
) -> Result<String, WelcomePackError> {
    let kind: FileKind = type_tag.parse()?;
    extract_text_from(bytes, kind, pdfium_library).await
}

/// Extract text from a lease of a known kind.
pub async fn extract_text_from(
    bytes: Vec<u8>,
    kind: FileKind,
    pdfium_library: Option<&Path>,
) -> Result<String, WelcomePackError> {
    let library = pdfium_library.map(Path::to_path_buf);
    let text = tokio::task::spawn_blocking(move || match kind {
        FileKind::Docx => docx_text(&bytes),
        FileKind::Pdf => pdf_text(&bytes, library.as_deref()),
    })
    .await
    .map_err(|e| WelcomePackError::Internal(format!("Text extraction task panicked: {}", e)))??;

    info!("Extracted {} characters from {} lease", text.len(), kind);
    Ok(text)
}

/// DOCX transcript: paragraphs one per line, table rows as `a | b | c`.
pub fn docx_text(bytes: &[u8]) -> Result<String, WelcomePackError> {
    TemplateDocument::from_bytes(bytes)?.transcript()
}

/// PDF transcript: `--- Page N ---` blocks, blank pages skipped.
pub fn pdf_text(bytes: &[u8], library: Option<&Path>) -> Result<String, WelcomePackError> {
    let pdfium = bind_pdfium(library)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| WelcomePackError::UnreadableDocument {
            kind: "pdf",
            detail: format!("{:?}", e),
        })?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::new();
    for (index, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| WelcomePackError::UnreadableDocument {
                kind: "pdf",
                detail: format!("page {}: {:?}", index + 1, e),
            })?
            .all();
        texts.push(text);
    }
    Ok(join_pages(&texts))
}

/// Join per-page texts, numbering pages by their position in the file.
fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("--- Page {} ---\n{}", i + 1, text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, WelcomePackError> {
    let library: Option<PathBuf> = library
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match &library {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(path)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| WelcomePackError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}
