//! Extraction accuracy scoring against known-good records.
//!
//! Identity fields (names, dates, bond, occupants, contacts) must match
//! exactly. Descriptive fields (rent, pets, parking, special conditions) are
//! compared by keyword: a model may reorder or lightly rephrase them, so a
//! field passes when every significant expected word appears in the actual
//! value.

use crate::lease::{ExtractedLeaseFields, FieldName};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "of", "and", "or", "to", "in", "for", "with", "by", "at", "on", "it",
    "be", "as", "if", "may", "can", "not", "no", "are", "was", "has", "its", "per", "any", "all",
];

const PUNCTUATION: &[char] = &['(', ')', '[', ']', ',', ':', ';', '.', '"', '\''];

/// How a field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Keyword,
}

impl MatchKind {
    pub fn for_field(field: FieldName) -> Self {
        match field {
            FieldName::RentAmount
            | FieldName::PetPermission
            | FieldName::Parking
            | FieldName::SpecialConditions => MatchKind::Keyword,
            _ => MatchKind::Exact,
        }
    }
}

/// Significant lower-cased words of `text`.
pub fn keywords(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .replace(PUNCTUATION, " ")
        .split(|c: char| c.is_whitespace() || c == '/')
        .filter(|w| w.chars().count() > 1 && !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Every significant expected keyword appears in `actual`.
///
/// Two nulls match; a null against a value does not.
pub fn keyword_match(expected: Option<&str>, actual: Option<&str>) -> bool {
    match (expected, actual) {
        (None, None) => true,
        (Some(expected), Some(actual)) => keywords(expected).is_subset(&keywords(actual)),
        _ => false,
    }
}

/// Outcome for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    pub field: FieldName,
    pub kind: MatchKind,
    pub passed: bool,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Outcome for a whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub fields: Vec<FieldReport>,
}

impl ScoreReport {
    pub fn passed(&self) -> usize {
        self.fields.iter().filter(|f| f.passed).count()
    }

    pub fn total(&self) -> usize {
        self.fields.len()
    }

    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldReport> {
        self.fields.iter().filter(|f| !f.passed)
    }
}

impl fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.fields {
            let verdict = if report.passed { "PASS" } else { "FAIL" };
            let kind = match report.kind {
                MatchKind::Exact => "exact",
                MatchKind::Keyword => "keyword",
            };
            write!(f, "{verdict} ({kind}) {}", report.field)?;
            if !report.passed {
                write!(f, ": expected {:?}, got {:?}", report.expected, report.actual)?;
            }
            writeln!(f)?;
        }
        write!(f, "{}/{} fields correct", self.passed(), self.total())
    }
}

/// Compare an extracted record with the expected one, field by field.
pub fn compare_fields(expected: &ExtractedLeaseFields, actual: &ExtractedLeaseFields) -> ScoreReport {
    let fields = FieldName::ALL
        .into_iter()
        .map(|field| {
            let kind = MatchKind::for_field(field);
            let want = expected.get(field);
            let got = actual.get(field);
            let passed = match kind {
                MatchKind::Exact => want.map(str::trim) == got.map(str::trim),
                MatchKind::Keyword => keyword_match(want, got),
            };
            FieldReport {
                field,
                kind,
                passed,
                expected: want.map(str::to_string),
                actual: got.map(str::to_string),
            }
        })
        .collect();
    ScoreReport { fields }
}
