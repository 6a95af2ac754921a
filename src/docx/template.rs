//! Welcome Pack rendering: placeholder substitution and conditional sections.
//!
//! Word splits visible text into runs wherever formatting, spell-check or
//! edit history changes, so `{{tenant_name}}` can end up as `{{`, `tenant_`,
//! `name}}`. Substitution therefore works on a paragraph's run texts as one
//! logical string: the replacement goes into the run where the match starts
//! (inheriting its formatting) and the matched characters are cut from the
//! following runs. Runs are never created, merged or deleted.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::document::{run_text, runs_mut, set_run_text, TemplateDocument};
use super::xml::XmlElement;
use crate::config::{PipelineConfig, SectionLayout};
use crate::error::WelcomePackError;
use crate::lease::{FieldName, FieldValues};
use crate::pipeline::rent::normalize_rent;

/// Replace every occurrence of `placeholder` in the logical string formed by
/// `runs`, mutating the run texts in place. Returns the number of replacements.
///
/// Matches may span any number of runs. Text outside the matches is left in
/// the run it came from.
///
/// ```rust
/// use lease_welcome_pack::docx::splice_placeholder;
///
/// let mut runs = vec!["Dear {{".to_string(), "tenant_".into(), "name}}, welcome".into()];
/// assert_eq!(splice_placeholder(&mut runs, "{{tenant_name}}", "Lisa"), 1);
/// assert_eq!(runs, ["Dear Lisa", "", ", welcome"]);
/// ```
pub fn splice_placeholder(runs: &mut [String], placeholder: &str, replacement: &str) -> usize {
    if placeholder.is_empty() {
        return 0;
    }
    // Bounded by the initial occurrence count; a replacement can never
    // re-create a placeholder and loop forever.
    let budget = runs.concat().matches(placeholder).count();
    let mut replaced = 0;

    while replaced < budget {
        let full = runs.concat();
        let Some(start) = full.find(placeholder) else {
            break;
        };
        let end = start + placeholder.len();

        let mut offset = 0;
        let spans: Vec<(usize, usize)> = runs
            .iter()
            .map(|r| {
                let span = (offset, offset + r.len());
                offset += r.len();
                span
            })
            .collect();
        let mut affected = spans
            .iter()
            .enumerate()
            .filter(|(_, span)| span.1 > start && span.0 < end)
            .map(|(i, _)| i);

        let Some(first) = affected.next() else {
            break;
        };
        let (first_start, first_end) = spans[first];
        let cut_from = start - first_start;
        let cut_to = end.min(first_end) - first_start;
        let text = &runs[first];
        runs[first] = format!("{}{}{}", &text[..cut_from], replacement, &text[cut_to..]);

        for i in affected {
            let (run_start, _) = spans[i];
            let cut_to = (end - run_start).min(runs[i].len());
            runs[i] = runs[i][cut_to..].to_string();
        }
        replaced += 1;
    }
    replaced
}

/// Substitute `placeholder` in one paragraph. Returns the replacement count.
pub fn replace_in_paragraph(paragraph: &mut XmlElement, placeholder: &str, replacement: &str) -> usize {
    let mut runs = runs_mut(paragraph);
    let before: Vec<String> = runs.iter().map(|r| run_text(r)).collect();
    if !before.concat().contains(placeholder) {
        return 0;
    }

    let mut after = before.clone();
    let count = splice_placeholder(&mut after, placeholder, replacement);
    for ((run, old), new) in runs.iter_mut().zip(&before).zip(&after) {
        if old != new {
            set_run_text(run, new);
        }
    }
    count
}

/// What a fill pass did, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillSummary {
    pub section_removed: bool,
    pub replacements: usize,
}

/// Fill an opened template in place.
///
/// 1. Values containing placeholder syntax are rejected.
/// 2. If special conditions are absent or null, the Special Conditions
///    heading and body are removed (after checking they are where `layout`
///    says).
/// 3. Every present field is substituted; rent goes through
///    [`normalize_rent`] first.
pub fn fill_template(
    doc: &mut TemplateDocument,
    values: &FieldValues,
    layout: SectionLayout,
) -> Result<FillSummary, WelcomePackError> {
    for (field, value) in values {
        if let Some(v) = value {
            if v.contains("{{") || v.contains("}}") {
                return Err(WelcomePackError::PlaceholderInValue { field: field.key() });
            }
        }
    }

    let mut summary = FillSummary::default();

    let special = values.get(&FieldName::SpecialConditions).cloned().flatten();
    if special.is_none() {
        check_special_conditions_layout(doc, layout)?;
        doc.remove_body_paragraphs(&[layout.heading_index, layout.body_index])?;
        summary.section_removed = true;
        info!(
            "No special conditions; removed template paragraphs {} and {}",
            layout.heading_index, layout.body_index
        );
    }

    let mut paragraphs = doc.paragraphs_mut()?;
    for (field, value) in values {
        let Some(value) = value else { continue };
        let replacement = if *field == FieldName::RentAmount {
            normalize_rent(value)
        } else {
            value.clone()
        };

        let count: usize = paragraphs
            .iter_mut()
            .map(|p| replace_in_paragraph(p, field.placeholder(), &replacement))
            .sum();
        debug!("{} → {} occurrence(s)", field.placeholder(), count);
        summary.replacements += count;
    }

    Ok(summary)
}

fn check_special_conditions_layout(
    doc: &TemplateDocument,
    layout: SectionLayout,
) -> Result<(), WelcomePackError> {
    let heading = doc.body_paragraph_text(layout.heading_index)?;
    let body = doc.body_paragraph_text(layout.body_index)?;
    let heading_ok = heading
        .as_deref()
        .is_some_and(|t| t.to_lowercase().contains("special conditions"));
    let body_ok = body
        .as_deref()
        .is_some_and(|t| t.contains(FieldName::SpecialConditions.placeholder()));

    if heading_ok && body_ok {
        Ok(())
    } else {
        Err(WelcomePackError::TemplateStructure {
            detail: format!(
                "expected the Special Conditions heading at body paragraph {} and \
                 {} at {}, found {:?} and {:?}",
                layout.heading_index,
                FieldName::SpecialConditions.placeholder(),
                layout.body_index,
                heading.unwrap_or_default(),
                body.unwrap_or_default(),
            ),
        })
    }
}

/// Renders Welcome Packs from the configured template.
///
/// The template is read from disk on every call and never modified, so
/// repeated generations are independent.
#[derive(Debug, Clone)]
pub struct WelcomePackGenerator {
    template_path: PathBuf,
    layout: SectionLayout,
}

impl WelcomePackGenerator {
    pub fn new(template_path: impl Into<PathBuf>, layout: SectionLayout) -> Self {
        Self {
            template_path: template_path.into(),
            layout,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.template_path.clone(), config.special_conditions)
    }

    pub fn template_path(&self) -> &Path {
        &self.template_path
    }

    async fn read_template(&self) -> Result<Vec<u8>, WelcomePackError> {
        tokio::fs::read(&self.template_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WelcomePackError::TemplateNotFound {
                    path: self.template_path.clone(),
                }
            } else {
                WelcomePackError::Internal(format!(
                    "could not read template '{}': {e}",
                    self.template_path.display()
                ))
            }
        })
    }

    /// Load a fresh copy of the template.
    pub async fn load_template(&self) -> Result<TemplateDocument, WelcomePackError> {
        let bytes = self.read_template().await?;
        TemplateDocument::from_bytes(&bytes)
    }

    /// Produce the filled Welcome Pack as DOCX bytes.
    ///
    /// Parsing, substitution and re-packaging run on the blocking pool.
    pub async fn generate(&self, values: &FieldValues) -> Result<Vec<u8>, WelcomePackError> {
        let bytes = self.read_template().await?;
        let values = values.clone();
        let layout = self.layout;

        tokio::task::spawn_blocking(move || {
            let mut doc = TemplateDocument::from_bytes(&bytes)?;
            let summary = fill_template(&mut doc, &values, layout)?;
            info!(
                "Filled Welcome Pack template: {} replacement(s), special conditions {}",
                summary.replacements,
                if summary.section_removed { "removed" } else { "kept" }
            );
            doc.to_bytes()
        })
        .await
        .map_err(|e| WelcomePackError::Internal(format!("Template task panicked: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::package::{fixtures, read_part, DOCUMENT_PART};

    fn runs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_run_replacement() {
        let mut r = runs(&["Hello {{tenant_name}}!"]);
        assert_eq!(splice_placeholder(&mut r, "{{tenant_name}}", "Marcus"), 1);
        assert_eq!(r, ["Hello Marcus!"]);
    }

    #[test]
    fn placeholder_split_across_three_runs() {
        let mut r = runs(&["{{", "tenant_name", "}}"]);
        splice_placeholder(&mut r, "{{tenant_name}}", "Lisa Johnson");
        assert_eq!(r, ["Lisa Johnson", "", ""]);
    }

    #[test]
    fn surrounding_text_stays_in_its_run() {
        let mut r = runs(&["Rent: {{rent", "_amount}} due", " monthly"]);
        splice_placeholder(&mut r, "{{rent_amount}}", "$2,000.00 per month");
        assert_eq!(r, ["Rent: $2,000.00 per month", " due", " monthly"]);
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let mut r = runs(&["{{x}} and {{", "x}} and {{x}}"]);
        assert_eq!(splice_placeholder(&mut r, "{{x}}", "y"), 3);
        assert_eq!(r.concat(), "y and y and y");
    }

    #[test]
    fn replacement_containing_the_placeholder_terminates() {
        let mut r = runs(&["{{x}}"]);
        assert_eq!(splice_placeholder(&mut r, "{{x}}", "{{x}}{{x}}"), 1);
        assert_eq!(r.concat(), "{{x}}{{x}}");
    }

    #[test]
    fn no_match_leaves_runs_alone() {
        let mut r = runs(&["{{tenant", " name}}"]);
        assert_eq!(splice_placeholder(&mut r, "{{tenant_name}}", "x"), 0);
        assert_eq!(r, ["{{tenant", " name}}"]);
    }

    #[test]
    fn multibyte_text_around_match() {
        let mut r = runs(&["Café {{", "tenant_name}} – ", "bienvenue"]);
        splice_placeholder(&mut r, "{{tenant_name}}", "Zoë");
        assert_eq!(r, ["Café Zoë", " – ", "bienvenue"]);
    }

    #[test]
    fn split_placeholder_takes_first_run_formatting() {
        let paragraph = concat!(
            "<w:p>",
            "<w:r><w:rPr><w:b/></w:rPr><w:t>{{ten</w:t></w:r>",
            "<w:r><w:rPr><w:i/></w:rPr><w:t>ant_na</w:t></w:r>",
            r#"<w:r><w:rPr><w:u w:val="single"/></w:rPr><w:t>me}}</w:t></w:r>"#,
            "</w:p>",
        );
        let xml = format!(r#"<w:document xmlns:w="urn:w"><w:body>{paragraph}</w:body></w:document>"#);
        let archive = fixtures::archive(&[(DOCUMENT_PART, xml.as_bytes())]);
        let mut doc = TemplateDocument::from_bytes(&archive).unwrap();
        {
            let mut paragraphs = doc.paragraphs_mut().unwrap();
            assert_eq!(replace_in_paragraph(&mut *paragraphs[0], "{{tenant_name}}", "Lisa"), 1);
        }

        let out = read_part(&doc.to_bytes().unwrap(), DOCUMENT_PART).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(
            out.contains(concat!(
                "<w:p>",
                "<w:r><w:rPr><w:b/></w:rPr><w:t>Lisa</w:t></w:r>",
                "<w:r><w:rPr><w:i/></w:rPr><w:t></w:t></w:r>",
                r#"<w:r><w:rPr><w:u w:val="single"/></w:rPr><w:t></w:t></w:r>"#,
                "</w:p>",
            )),
            "{out}"
        );
    }
}
