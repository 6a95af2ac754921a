//! WordprocessingML document view: body paragraphs, tables and runs.
//!
//! Paragraph indices always count **top-level body paragraphs** (`w:body/w:p`),
//! never paragraphs nested inside tables. That is the numbering the
//! Special Conditions layout is expressed in.

use super::package::{self, DOCUMENT_PART};
use super::xml::{XmlDocument, XmlElement, XmlNode};
use crate::error::WelcomePackError;

pub(crate) const BODY: &str = "w:body";
pub(crate) const PARAGRAPH: &str = "w:p";
pub(crate) const RUN: &str = "w:r";
pub(crate) const TEXT: &str = "w:t";
pub(crate) const TABLE: &str = "w:tbl";
pub(crate) const ROW: &str = "w:tr";
pub(crate) const CELL: &str = "w:tc";

/// A loaded DOCX: the original archive plus the parsed main document part.
#[derive(Debug, Clone)]
pub struct TemplateDocument {
    archive: Vec<u8>,
    xml: XmlDocument,
}

impl TemplateDocument {
    /// Open a DOCX from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WelcomePackError> {
        let part = package::read_part(bytes, DOCUMENT_PART)?;
        let xml = XmlDocument::parse(&part)?;
        let doc = Self {
            archive: bytes.to_vec(),
            xml,
        };
        doc.body()?;
        Ok(doc)
    }

    /// Re-package the (possibly edited) document.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WelcomePackError> {
        let part = self.xml.to_bytes()?;
        package::replace_part(&self.archive, DOCUMENT_PART, &part)
    }

    fn body(&self) -> Result<&XmlElement, WelcomePackError> {
        self.xml
            .root()
            .and_then(|root| root.child_elements().find(|e| e.is(BODY)))
            .ok_or_else(no_body)
    }

    fn body_mut(&mut self) -> Result<&mut XmlElement, WelcomePackError> {
        self.xml
            .root_mut()
            .and_then(|root| root.child_elements_mut().find(|e| e.is(BODY)))
            .ok_or_else(no_body)
    }

    /// Top-level body paragraphs, in order.
    pub fn body_paragraphs(&self) -> Result<Vec<&XmlElement>, WelcomePackError> {
        Ok(self.body()?.child_elements().filter(|e| e.is(PARAGRAPH)).collect())
    }

    /// Visible text of the body paragraph at `index`.
    pub fn body_paragraph_text(&self, index: usize) -> Result<Option<String>, WelcomePackError> {
        Ok(self
            .body_paragraphs()?
            .get(index)
            .map(|p| paragraph_text(p)))
    }

    /// Remove body paragraphs by index.
    ///
    /// Indices refer to the document *before* any removal; all are checked
    /// first so that a bad index leaves the document untouched.
    pub fn remove_body_paragraphs(&mut self, indices: &[usize]) -> Result<(), WelcomePackError> {
        let body = self.body_mut()?;
        let positions: Vec<usize> = body
            .children
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, XmlNode::Element(e) if e.is(PARAGRAPH)))
            .map(|(i, _)| i)
            .collect();

        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if let Some(&bad) = sorted.iter().find(|&&i| i >= positions.len()) {
            return Err(WelcomePackError::TemplateStructure {
                detail: format!(
                    "paragraph index {bad} out of range ({} body paragraphs)",
                    positions.len()
                ),
            });
        }

        // Highest first, so earlier child positions stay valid.
        for &idx in sorted.iter().rev() {
            body.children.remove(positions[idx]);
        }
        Ok(())
    }

    /// Every paragraph the template engine substitutes into: top-level body
    /// paragraphs and paragraphs directly inside table cells.
    pub fn paragraphs_mut(&mut self) -> Result<Vec<&mut XmlElement>, WelcomePackError> {
        let body = self.body_mut()?;
        let mut out = Vec::new();
        for block in body.child_elements_mut() {
            if block.is(PARAGRAPH) {
                out.push(block);
            } else if block.is(TABLE) {
                for row in block.child_elements_mut().filter(|e| e.is(ROW)) {
                    for cell in row.child_elements_mut().filter(|e| e.is(CELL)) {
                        out.extend(cell.child_elements_mut().filter(|e| e.is(PARAGRAPH)));
                    }
                }
            }
        }
        Ok(out)
    }

    /// Reading-order plain text.
    ///
    /// Body paragraphs become one line each (empty ones dropped); each table
    /// row becomes one line with non-empty cell texts joined by `" | "`.
    pub fn transcript(&self) -> Result<String, WelcomePackError> {
        let mut lines = Vec::new();
        for block in self.body()?.child_elements() {
            if block.is(PARAGRAPH) {
                let text = paragraph_text(block);
                if !text.trim().is_empty() {
                    lines.push(text.trim().to_string());
                }
            } else if block.is(TABLE) {
                for row in block.descendants(ROW) {
                    let cells: Vec<String> = row
                        .descendants(CELL)
                        .into_iter()
                        .map(|cell| {
                            cell.descendants(PARAGRAPH)
                                .into_iter()
                                .map(paragraph_text)
                                .collect::<Vec<_>>()
                                .join("\n")
                                .trim()
                                .to_string()
                        })
                        .filter(|t| !t.is_empty())
                        .collect();
                    if !cells.is_empty() {
                        lines.push(cells.join(" | "));
                    }
                }
            }
        }
        Ok(lines.join("\n"))
    }
}

fn no_body() -> WelcomePackError {
    WelcomePackError::UnreadableDocument {
        kind: "docx",
        detail: format!("{DOCUMENT_PART} has no <{BODY}>"),
    }
}

/// Visible text of a paragraph: every `w:t` beneath it, concatenated.
pub fn paragraph_text(paragraph: &XmlElement) -> String {
    paragraph.descendant_text(TEXT)
}

/// The paragraph's runs (direct `w:r` children).
pub fn runs_mut(paragraph: &mut XmlElement) -> Vec<&mut XmlElement> {
    paragraph.child_elements_mut().filter(|e| e.is(RUN)).collect()
}

/// Text of one run: its direct `w:t` children, concatenated.
pub fn run_text(run: &XmlElement) -> String {
    run.child_elements()
        .filter(|e| e.is(TEXT))
        .map(XmlElement::own_text)
        .collect()
}

/// Set a run's text, keeping its properties (`w:rPr`) and other children.
///
/// The first `w:t` receives the whole text and any further `w:t` are
/// dropped; a run without one gets a new `w:t` appended.
pub fn set_run_text(run: &mut XmlElement, text: &str) {
    let mut seen_text = false;
    run.children.retain(|n| match n {
        XmlNode::Element(e) if e.is(TEXT) => !std::mem::replace(&mut seen_text, true),
        _ => true,
    });

    if !run.child_elements().any(|e| e.is(TEXT)) {
        if text.is_empty() {
            return;
        }
        run.children.push(XmlNode::Element(XmlElement::new(TEXT)));
    }
    let Some(target) = run.child_elements_mut().find(|e| e.is(TEXT)) else {
        return;
    };

    target.set_own_text(text);
    if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
        target.set_attribute("xml:space", "preserve");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::package::fixtures;

    fn doc(body: &str) -> TemplateDocument {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="urn:w"><w:body>{body}</w:body></w:document>"#
        );
        let bytes = fixtures::archive(&[(DOCUMENT_PART, xml.as_bytes())]);
        TemplateDocument::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn transcript_flattens_paragraphs_and_tables() {
        let d = doc(concat!(
            "<w:p><w:r><w:t>Residential Tenancy Agreement</w:t></w:r></w:p>",
            "<w:p/>",
            "<w:tbl><w:tr>",
            "<w:tc><w:p><w:r><w:t>Tenant</w:t></w:r></w:p></w:tc>",
            "<w:tc><w:p/></w:tc>",
            "<w:tc><w:p><w:r><w:t>Lisa </w:t></w:r><w:r><w:t>Johnson</w:t></w:r></w:p></w:tc>",
            "</w:tr></w:tbl>",
        ));
        assert_eq!(
            d.transcript().unwrap(),
            "Residential Tenancy Agreement\nTenant | Lisa Johnson"
        );
    }

    #[test]
    fn table_paragraphs_do_not_count_as_body_paragraphs() {
        let d = doc(concat!(
            "<w:p><w:r><w:t>zero</w:t></w:r></w:p>",
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>cell</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            "<w:p><w:r><w:t>one</w:t></w:r></w:p>",
        ));
        assert_eq!(d.body_paragraphs().unwrap().len(), 2);
        assert_eq!(d.body_paragraph_text(1).unwrap().as_deref(), Some("one"));
    }

    #[test]
    fn removal_uses_original_indices() {
        let mut d = doc(concat!(
            "<w:p><w:r><w:t>a</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>b</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>c</w:t></w:r></w:p>",
            "<w:p><w:r><w:t>d</w:t></w:r></w:p>",
        ));
        d.remove_body_paragraphs(&[1, 2]).unwrap();
        assert_eq!(d.transcript().unwrap(), "a\nd");
    }

    #[test]
    fn out_of_range_removal_changes_nothing() {
        let mut d = doc("<w:p><w:r><w:t>a</w:t></w:r></w:p>");
        assert!(matches!(
            d.remove_body_paragraphs(&[0, 5]),
            Err(WelcomePackError::TemplateStructure { .. })
        ));
        assert_eq!(d.transcript().unwrap(), "a");
    }

    #[test]
    fn set_run_text_keeps_properties() {
        let mut d = doc(r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t>x</w:t><w:t>y</w:t></w:r></w:p>"#);
        {
            let mut paragraphs = d.paragraphs_mut().unwrap();
            let mut runs = runs_mut(&mut *paragraphs[0]);
            set_run_text(&mut *runs[0], " padded ");
            assert_eq!(run_text(&*runs[0]), " padded ");
        }
        let bytes = d.to_bytes().unwrap();
        let xml = String::from_utf8(package::read_part(&bytes, DOCUMENT_PART).unwrap()).unwrap();
        assert!(xml.contains("<w:rPr><w:b/></w:rPr>"));
        assert!(xml.contains(r#"<w:t xml:space="preserve"> padded </w:t>"#));
    }

    #[test]
    fn document_without_body_is_unreadable() {
        let bytes = fixtures::archive(&[(DOCUMENT_PART, b"<w:document xmlns:w=\"urn:w\"/>")]);
        assert!(matches!(
            TemplateDocument::from_bytes(&bytes),
            Err(WelcomePackError::UnreadableDocument { .. })
        ));
    }
}
