//! Field extraction: lease transcript → validated [`ExtractedLeaseFields`].
//!
//! ## Flow
//!
//! ```text
//! prompt ─► model ─► parse ─► normalise ─► validate ──(warnings)──► correction
//!                                              │                        │
//!                                              └──────(none)──► build ◄─┘
//! ```
//!
//! At most two model calls are made. Validation never fails on its own; it
//! only produces warnings that trigger the single correction round. A
//! correction reply that cannot be parsed is logged and ignored, and the
//! first-attempt fields are used. A correction *call* that fails is a stage
//! failure like any other model error.

use crate::error::WelcomePackError;
use crate::lease::{ExtractedLeaseFields, FieldName, FieldValues, ModelExchange, RawModelExchange};
use crate::pipeline::llm::ModelClient;
use crate::progress::PipelineObserver;
use crate::prompts::{correction_prompt, extraction_prompt};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use tracing::{debug, error, info, warn};

static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```(?:json)?\s*").unwrap());
static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*```$").unwrap());

/// Lease date format, e.g. `15 April 2026`.
const DATE_FORMAT: &str = "%d %B %Y";

/// Longest slice of a model response written to failure logs.
const RAW_LOG_CHARS: usize = 500;

/// Phrases that mean "there are no special conditions".
const NO_CONDITIONS: &[&str] = &[
    "none",
    "nil",
    "null",
    "n/a",
    "no special conditions",
    "no special conditions apply",
];

// ── Candidate record ─────────────────────────────────────────────────────

/// Parsed, not yet validated model output: every key present, each value a
/// string or null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFields {
    values: FieldValues,
}

impl CandidateFields {
    pub fn get(&self, field: FieldName) -> Option<&str> {
        self.values.get(&field).and_then(|v| v.as_deref())
    }

    pub fn set(&mut self, field: FieldName, value: Option<String>) {
        self.values.insert(field, value);
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Pretty JSON in canonical key order, as shown to the model.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Overlay another candidate, field by field.
    fn overlay(&mut self, other: CandidateFields) {
        self.values.extend(other.values);
    }

    /// Enforce the record invariant: every non-nullable field non-empty.
    pub fn into_record(self) -> Result<ExtractedLeaseFields, WelcomePackError> {
        let empty: Vec<&'static str> = FieldName::ALL
            .into_iter()
            .filter(|f| !f.is_nullable())
            .filter(|f| self.get(*f).map_or(true, |v| v.trim().is_empty()))
            .map(FieldName::key)
            .collect();
        if !empty.is_empty() {
            return Err(WelcomePackError::SchemaViolation { fields: empty });
        }

        let take = |f: FieldName| self.get(f).unwrap_or_default().to_string();
        Ok(ExtractedLeaseFields {
            tenant_name: take(FieldName::TenantName),
            property_address: take(FieldName::PropertyAddress),
            lease_start_date: take(FieldName::LeaseStartDate),
            lease_end_date: take(FieldName::LeaseEndDate),
            rent_amount: take(FieldName::RentAmount),
            bond_amount: take(FieldName::BondAmount),
            num_occupants: take(FieldName::NumOccupants),
            pet_permission: take(FieldName::PetPermission),
            parking: take(FieldName::Parking),
            special_conditions: self.get(FieldName::SpecialConditions).map(str::to_string),
            landlord_name: take(FieldName::LandlordName),
            property_manager_name: take(FieldName::PropertyManagerName),
            property_manager_email: take(FieldName::PropertyManagerEmail),
            property_manager_phone: take(FieldName::PropertyManagerPhone),
        })
    }
}

impl Serialize for CandidateFields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FieldName::ALL.len()))?;
        for field in FieldName::ALL {
            map.serialize_entry(field.key(), &self.get(field))?;
        }
        map.end()
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_fences(raw: &str) -> String {
    let opened = RE_FENCE_OPEN.replace(raw.trim(), "");
    RE_FENCE_CLOSE.replace(&opened, "").into_owned()
}

/// Parse a model reply into [`CandidateFields`].
///
/// JSON syntax is checked first, key presence second.
pub fn parse_model_output(raw: &str) -> Result<CandidateFields, WelcomePackError> {
    let malformed = |reason: String| WelcomePackError::MalformedModelOutput {
        reason,
        raw: raw.to_string(),
    };

    let cleaned = strip_fences(raw);
    let data: Value = serde_json::from_str(&cleaned)
        .map_err(|e| malformed(format!("response is not valid JSON: {e}")))?;
    let Value::Object(object) = data else {
        return Err(malformed("response is not a JSON object".into()));
    };

    let missing: Vec<&str> = FieldName::ALL
        .into_iter()
        .filter(|f| !object.contains_key(f.key()))
        .map(FieldName::key)
        .collect();
    if !missing.is_empty() {
        return Err(malformed(format!("response missing fields: {}", missing.join(", "))));
    }

    let mut values = FieldValues::new();
    for field in FieldName::ALL {
        let value = match &object[field.key()] {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(malformed(format!(
                    "field '{}' must be a string or null",
                    field.key()
                )))
            }
        };
        values.insert(field, value);
    }

    let extra = object.len() - FieldName::ALL.len();
    if extra > 0 {
        debug!("Ignoring {} unexpected key(s) in model output", extra);
    }

    let mut candidate = CandidateFields { values };
    normalize(&mut candidate);
    Ok(candidate)
}

/// Whether a special-conditions value actually says "there are none".
pub fn is_no_conditions(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    let phrase = lowered.strip_suffix('.').unwrap_or(lowered.as_str()).trim_end();
    NO_CONDITIONS.contains(&phrase)
}

/// Coerce "no conditions" phrasing to null and drop one leading zero from dates.
pub fn normalize(fields: &mut CandidateFields) {
    if fields
        .get(FieldName::SpecialConditions)
        .is_some_and(is_no_conditions)
    {
        fields.set(FieldName::SpecialConditions, None);
    }

    for field in [FieldName::LeaseStartDate, FieldName::LeaseEndDate] {
        if let Some(stripped) = fields.get(field).and_then(|v| v.strip_prefix('0')) {
            let stripped = stripped.to_string();
            fields.set(field, Some(stripped));
        }
    }
}

// ── Validation ───────────────────────────────────────────────────────────

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

/// Sanity checks on a candidate. Returns human-readable warnings.
pub fn validate_fields(fields: &CandidateFields) -> Vec<String> {
    let mut warnings = Vec::new();

    for field in [FieldName::LeaseStartDate, FieldName::LeaseEndDate] {
        if let Some(value) = fields.get(field).filter(|v| !v.is_empty()) {
            if parse_date(value).is_none() {
                warnings.push(format!("{field} '{value}' is not in 'DD Month YYYY' format"));
            }
        }
    }

    let start = fields.get(FieldName::LeaseStartDate).and_then(parse_date);
    let end = fields.get(FieldName::LeaseEndDate).and_then(parse_date);
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            warnings.push("lease_end_date is before or equal to lease_start_date".to_string());
        }
    }

    let rent = fields.get(FieldName::RentAmount).unwrap_or_default();
    if !rent.to_lowercase().contains("per") {
        warnings.push(format!(
            "rent_amount '{rent}' may be missing frequency (per month/fortnight)"
        ));
    }

    let bond = fields.get(FieldName::BondAmount).unwrap_or_default();
    if !bond.starts_with('$') {
        warnings.push(format!("bond_amount '{bond}' does not start with '$'"));
    }

    warnings
}

// ── Extraction loop ──────────────────────────────────────────────────────

/// First [`RAW_LOG_CHARS`] characters of a model response.
fn raw_excerpt(response: &str) -> &str {
    match response.char_indices().nth(RAW_LOG_CHARS) {
        Some((end, _)) => &response[..end],
        None => response,
    }
}

/// Extract the fourteen lease fields from a transcript.
pub async fn extract_fields(
    model: &dyn ModelClient,
    lease_text: &str,
    observer: &dyn PipelineObserver,
) -> Result<(ExtractedLeaseFields, RawModelExchange), WelcomePackError> {
    let prompt = extraction_prompt(lease_text);
    info!("Sending lease text for extraction ({} chars)", lease_text.len());
    let response = model.generate(&prompt).await?;
    info!("Model response received ({} chars)", response.len());

    let mut fields = match parse_model_output(&response) {
        Ok(fields) => fields,
        Err(e) => {
            error!("Extraction failed: {}. Raw: {}", e, raw_excerpt(&response));
            return Err(e);
        }
    };
    let mut exchange = RawModelExchange {
        initial: ModelExchange { prompt, response },
        correction: None,
        correction_applied: false,
    };

    let warnings = validate_fields(&fields);
    if !warnings.is_empty() {
        warn!("Extraction validation warnings: {:?}", warnings);
        observer.on_correction_round(&warnings);

        let correction = correction_prompt(&warnings, &fields.to_json_pretty());
        let retry = model.generate(&correction).await?;
        info!("Model correction response received ({} chars)", retry.len());

        match parse_model_output(&retry) {
            Ok(corrected) => {
                fields.overlay(corrected);
                exchange.correction_applied = true;
            }
            Err(e) => warn!("Correction parse failed, using original: {}", e),
        }
        exchange.correction = Some(ModelExchange {
            prompt: correction,
            response: retry,
        });
    }

    let record = match fields.into_record() {
        Ok(record) => record,
        Err(e) => {
            error!(
                "Extraction failed: {}. Raw: {}",
                e,
                raw_excerpt(exchange.final_response())
            );
            return Err(e);
        }
    };
    if record.special_conditions.is_none() {
        info!("special_conditions is null; section will be omitted from the Welcome Pack");
    }
    Ok((record, exchange))
}
