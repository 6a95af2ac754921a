//! DOCX package access: a DOCX file is a zip archive of XML parts.
//!
//! Only `word/document.xml` is ever edited. Every other entry (styles,
//! numbering, headers, footers, media, relationships) is copied raw, so it
//! keeps its original compression and bytes.

use crate::error::WelcomePackError;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// The main document part.
pub const DOCUMENT_PART: &str = "word/document.xml";

/// Largest up-front allocation made from a zip header's declared size.
const PREALLOC_LIMIT: usize = 8 * 1024 * 1024;

fn unreadable(e: impl std::fmt::Display) -> WelcomePackError {
    WelcomePackError::UnreadableDocument {
        kind: "docx",
        detail: e.to_string(),
    }
}

fn write_failed(e: impl std::fmt::Display) -> WelcomePackError {
    WelcomePackError::Internal(format!("failed to write DOCX package: {e}"))
}

/// Buffer size to reserve for an entry. The declared size comes from the
/// uploaded zip header and is only trusted up to [`PREALLOC_LIMIT`].
fn prealloc_capacity(declared: u64) -> usize {
    usize::try_from(declared).map_or(PREALLOC_LIMIT, |n| n.min(PREALLOC_LIMIT))
}

/// Read one part out of a DOCX archive.
pub fn read_part(archive: &[u8], name: &str) -> Result<Vec<u8>, WelcomePackError> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(unreadable)?;
    let mut entry = zip
        .by_name(name)
        .map_err(|e| unreadable(format!("{name}: {e}")))?;
    let mut buf = Vec::with_capacity(prealloc_capacity(entry.size()));
    entry.read_to_end(&mut buf).map_err(unreadable)?;
    Ok(buf)
}

/// Rebuild `archive` with `name` replaced by `contents`.
///
/// Entry order is preserved; `[Content_Types].xml` must stay first for some
/// consumers.
pub fn replace_part(archive: &[u8], name: &str, contents: &[u8]) -> Result<Vec<u8>, WelcomePackError> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(unreadable)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(archive.len())));
    let mut replaced = false;

    for i in 0..zip.len() {
        let entry = zip.by_index_raw(i).map_err(unreadable)?;
        if entry.name() == name {
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            writer
                .start_file(name.to_string(), options)
                .map_err(write_failed)?;
            writer.write_all(contents).map_err(write_failed)?;
            replaced = true;
        } else {
            writer.raw_copy_file(entry).map_err(write_failed)?;
        }
    }

    if !replaced {
        return Err(unreadable(format!("package has no {name}")));
    }

    let cursor = writer.finish().map_err(write_failed)?;
    Ok(cursor.into_inner())
}

/// List the entry names of an archive.
pub fn part_names(archive: &[u8]) -> Result<Vec<String>, WelcomePackError> {
    let zip = ZipArchive::new(Cursor::new(archive)).map_err(unreadable)?;
    Ok(zip.file_names().map(str::to_string).collect())
}
