//! Prompts for lease field extraction.
//!
//! Every prompt lives here so that the extraction loop in
//! [`crate::pipeline::extraction`] only deals with control flow, and so tests
//! can inspect the exact text a model will see.

/// Extraction prompt. `{lease_text}` is replaced with the transcript.
pub const EXTRACTION_PROMPT: &str = r#"You are a precise document extraction assistant specialising in Australian residential lease agreements.

Extract the following 14 fields from the lease agreement text provided. Return ONLY a valid JSON object. No markdown, no explanation, no extra text.

FIELDS TO EXTRACT:

{
  "tenant_name": "Full name(s). If joint tenancy, format as 'Marcus Johnson & Lisa Johnson'. Never truncate.",
  "property_address": "Full address including unit/apartment number, street, suburb, state and postcode. E.g. '18 River Road, Unit 7, Abbotsford VIC 3067'",
  "lease_start_date": "Standardise to D Month YYYY format. E.g. '15 April 2026' or '1 April 2026'. Input may be '15/04/2026', '01 April 2026', 'April 1, 2026'; normalise all to this format.",
  "lease_end_date": "Same format as lease_start_date.",
  "rent_amount": "Include amount, currency and frequency. E.g. '$2,650.00 per month' or '$1,150.00 per fortnight'. Never strip the frequency.",
  "bond_amount": "Dollar amount only. E.g. '$5,300.00'",
  "num_occupants": "Integer as a string. E.g. '1' or '2'",
  "pet_permission": "One of two formats: (A) If pets are not permitted: 'Not permitted'. (B) If pets are permitted with conditions: the pet type allowed and ALL conditions in a single sentence, starting with the pet type. Use the exact terms from the lease; do not substitute synonyms.",
  "parking": "One of two formats: (A) If no parking: 'Not included'. (B) If parking is included: describe it fully including space number, level, and access method if stated.",
  "special_conditions": "If the lease states there are no special conditions (e.g. 'Nil', 'None', 'N/A', 'No special conditions', 'No special conditions apply', 'Nil. No special conditions apply.') return JSON null, not the string 'null' or 'None'. Only return text if REAL special conditions exist, one sentence per condition, using the exact terminology from the lease.",
  "landlord_name": "Full name as listed in the parties section.",
  "property_manager_name": "The contact person's name only. E.g. 'Julia Torres'",
  "property_manager_email": "Email address. E.g. 'julia.torres@acmepg.com.au'",
  "property_manager_phone": "Phone number as listed. E.g. '+61 3 9555 0142'"
}

CRITICAL RULES:
1. special_conditions must be JSON null if no real conditions exist. This controls whether the section appears in the output document at all.
2. For rent_amount, always include the payment frequency (per week / per fortnight / per month). Never omit it.
3. For joint tenancies, include both full names joined with ' & '.
4. For pet_permission, if permitted, include ALL conditions listed, not just "Permitted".
5. For property_address, always include the unit/apartment/flat/studio number if present.
6. Do not invent or assume any data not present in the document.
7. For pet_permission, parking and special_conditions, use the exact terminology from the lease. Do not paraphrase legal terms.
8. Return ONLY the JSON object with exactly these 14 keys. No markdown fences. No explanation.

LEASE AGREEMENT TEXT:
{lease_text}"#;

/// Correction prompt. `{warnings}` and `{previous_json}` are replaced.
pub const CORRECTION_PROMPT: &str = r#"Your previous extraction had the following issues:
{warnings}

Here is what you returned:
{previous_json}

Please fix only the problematic fields and return the corrected full JSON object with all 14 keys.
Do not change fields that were correct.
Return ONLY the JSON object. No markdown fences. No explanation."#;

/// Build the first-attempt prompt for a lease transcript.
pub fn extraction_prompt(lease_text: &str) -> String {
    EXTRACTION_PROMPT.replace("{lease_text}", lease_text)
}

/// Build the correction-round prompt from validation warnings and the
/// previous (normalised) JSON.
pub fn correction_prompt(warnings: &[String], previous_json: &str) -> String {
    let bullet_list = warnings
        .iter()
        .map(|w| format!("- {w}"))
        .collect::<Vec<_>>()
        .join("\n");
    CORRECTION_PROMPT
        .replace("{warnings}", &bullet_list)
        .replace("{previous_json}", previous_json)
}
