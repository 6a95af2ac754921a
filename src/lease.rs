//! Lease data types shared by every pipeline stage.
//!
//! [`ExtractedLeaseFields`] is the validated record: once built it is only
//! read, by the template engine, the record store and the scorer.
//! [`FieldName`] enumerates the fourteen keys so that prompts, parsing,
//! placeholder lookup and persistence all agree on spelling and order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WelcomePackError;

/// MIME type of a WordprocessingML document.
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type of a PDF document.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

// ── File kinds ───────────────────────────────────────────────────────────

/// The lease formats the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Docx,
}

impl FileKind {
    /// Lower-case type tag, as stored on the upload record.
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::Pdf => "pdf",
            FileKind::Docx => "docx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            FileKind::Pdf => PDF_CONTENT_TYPE,
            FileKind::Docx => DOCX_CONTENT_TYPE,
        }
    }

    /// Derive the type tag from a file name's extension (case-insensitive).
    ///
    /// Returns the lower-cased extension, or an empty string when there is
    /// none, so callers can report exactly what they were given.
    pub fn tag_from_file_name(file_name: &str) -> String {
        match file_name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => String::new(),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = WelcomePackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pdf" => Ok(FileKind::Pdf),
            "docx" => Ok(FileKind::Docx),
            other => Err(WelcomePackError::UnsupportedFileType {
                file_type: other.to_string(),
            }),
        }
    }
}

// ── Field names ──────────────────────────────────────────────────────────

/// The fourteen lease fields, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldName {
    TenantName,
    PropertyAddress,
    LeaseStartDate,
    LeaseEndDate,
    RentAmount,
    BondAmount,
    NumOccupants,
    PetPermission,
    Parking,
    SpecialConditions,
    LandlordName,
    PropertyManagerName,
    PropertyManagerEmail,
    PropertyManagerPhone,
}

impl FieldName {
    pub const ALL: [FieldName; 14] = [
        FieldName::TenantName,
        FieldName::PropertyAddress,
        FieldName::LeaseStartDate,
        FieldName::LeaseEndDate,
        FieldName::RentAmount,
        FieldName::BondAmount,
        FieldName::NumOccupants,
        FieldName::PetPermission,
        FieldName::Parking,
        FieldName::SpecialConditions,
        FieldName::LandlordName,
        FieldName::PropertyManagerName,
        FieldName::PropertyManagerEmail,
        FieldName::PropertyManagerPhone,
    ];

    /// JSON key used in model output and persisted records.
    pub fn key(self) -> &'static str {
        match self {
            FieldName::TenantName => "tenant_name",
            FieldName::PropertyAddress => "property_address",
            FieldName::LeaseStartDate => "lease_start_date",
            FieldName::LeaseEndDate => "lease_end_date",
            FieldName::RentAmount => "rent_amount",
            FieldName::BondAmount => "bond_amount",
            FieldName::NumOccupants => "num_occupants",
            FieldName::PetPermission => "pet_permission",
            FieldName::Parking => "parking",
            FieldName::SpecialConditions => "special_conditions",
            FieldName::LandlordName => "landlord_name",
            FieldName::PropertyManagerName => "property_manager_name",
            FieldName::PropertyManagerEmail => "property_manager_email",
            FieldName::PropertyManagerPhone => "property_manager_phone",
        }
    }

    /// Token that marks this field in the Welcome Pack template.
    ///
    /// The template names parking `{{parking_included}}`; every other
    /// placeholder is the key in double braces.
    pub fn placeholder(self) -> &'static str {
        match self {
            FieldName::TenantName => "{{tenant_name}}",
            FieldName::PropertyAddress => "{{property_address}}",
            FieldName::LeaseStartDate => "{{lease_start_date}}",
            FieldName::LeaseEndDate => "{{lease_end_date}}",
            FieldName::RentAmount => "{{rent_amount}}",
            FieldName::BondAmount => "{{bond_amount}}",
            FieldName::NumOccupants => "{{num_occupants}}",
            FieldName::PetPermission => "{{pet_permission}}",
            FieldName::Parking => "{{parking_included}}",
            FieldName::SpecialConditions => "{{special_conditions}}",
            FieldName::LandlordName => "{{landlord_name}}",
            FieldName::PropertyManagerName => "{{property_manager_name}}",
            FieldName::PropertyManagerEmail => "{{property_manager_email}}",
            FieldName::PropertyManagerPhone => "{{property_manager_phone}}",
        }
    }

    pub fn is_nullable(self) -> bool {
        self == FieldName::SpecialConditions
    }

    pub fn from_key(key: &str) -> Option<FieldName> {
        FieldName::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for FieldName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

// ── Validated record ─────────────────────────────────────────────────────

/// The validated fourteen-field lease record.
///
/// Only [`crate::pipeline::extraction`] constructs it from model output; the
/// constructor there enforces that every non-nullable field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLeaseFields {
    pub tenant_name: String,
    pub property_address: String,
    pub lease_start_date: String,
    pub lease_end_date: String,
    pub rent_amount: String,
    pub bond_amount: String,
    pub num_occupants: String,
    pub pet_permission: String,
    pub parking: String,
    pub special_conditions: Option<String>,
    pub landlord_name: String,
    pub property_manager_name: String,
    pub property_manager_email: String,
    pub property_manager_phone: String,
}

impl ExtractedLeaseFields {
    /// Value of one field; `None` only for absent special conditions.
    pub fn get(&self, field: FieldName) -> Option<&str> {
        let value = match field {
            FieldName::TenantName => &self.tenant_name,
            FieldName::PropertyAddress => &self.property_address,
            FieldName::LeaseStartDate => &self.lease_start_date,
            FieldName::LeaseEndDate => &self.lease_end_date,
            FieldName::RentAmount => &self.rent_amount,
            FieldName::BondAmount => &self.bond_amount,
            FieldName::NumOccupants => &self.num_occupants,
            FieldName::PetPermission => &self.pet_permission,
            FieldName::Parking => &self.parking,
            FieldName::SpecialConditions => return self.special_conditions.as_deref(),
            FieldName::LandlordName => &self.landlord_name,
            FieldName::PropertyManagerName => &self.property_manager_name,
            FieldName::PropertyManagerEmail => &self.property_manager_email,
            FieldName::PropertyManagerPhone => &self.property_manager_phone,
        };
        Some(value.as_str())
    }

    /// The record as a template value map (every key present).
    pub fn to_values(&self) -> FieldValues {
        FieldName::ALL
            .into_iter()
            .map(|f| (f, self.get(f).map(str::to_string)))
            .collect()
    }

    /// Welcome Pack file name derived from the tenant name.
    pub fn welcome_pack_file_name(&self) -> String {
        let tenant = if self.tenant_name.trim().is_empty() {
            "Tenant"
        } else {
            self.tenant_name.trim()
        };
        let tenant: String = tenant
            .chars()
            .map(|c| match c {
                ' ' | '"' | '/' | '\\' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        format!("Welcome_Pack_{tenant}.docx")
    }
}

/// Field → value mapping consumed by the template engine.
///
/// A missing key and a `None` value both mean "do not substitute".
pub type FieldValues = std::collections::BTreeMap<FieldName, Option<String>>;

// ── Audit trail ──────────────────────────────────────────────────────────

/// One prompt and the verbatim text the model returned for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelExchange {
    pub prompt: String,
    pub response: String,
}

/// Verbatim model traffic for one extraction, kept for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawModelExchange {
    pub initial: ModelExchange,
    /// Present when validation warnings triggered the correction round.
    pub correction: Option<ModelExchange>,
    /// Whether the correction response parsed and was applied.
    pub correction_applied: bool,
}

impl RawModelExchange {
    /// The transcript the final record was built from.
    pub fn final_response(&self) -> &str {
        match (&self.correction, self.correction_applied) {
            (Some(c), true) => &c.response,
            _ => &self.initial.response,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_from_tag() {
        assert_eq!("pdf".parse::<FileKind>().unwrap(), FileKind::Pdf);
        assert_eq!("docx".parse::<FileKind>().unwrap(), FileKind::Docx);
        assert!(matches!(
            "doc".parse::<FileKind>(),
            Err(WelcomePackError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn tag_from_file_name_lowercases_extension() {
        assert_eq!(FileKind::tag_from_file_name("Lease.DOCX"), "docx");
        assert_eq!(FileKind::tag_from_file_name("a.b.pdf"), "pdf");
        assert_eq!(FileKind::tag_from_file_name("lease"), "");
    }

    #[test]
    fn parking_uses_template_specific_placeholder() {
        assert_eq!(FieldName::Parking.key(), "parking");
        assert_eq!(FieldName::Parking.placeholder(), "{{parking_included}}");
        for f in FieldName::ALL {
            if f != FieldName::Parking {
                assert_eq!(f.placeholder(), format!("{{{{{}}}}}", f.key()));
            }
        }
    }

    #[test]
    fn from_key_round_trips_every_field() {
        for f in FieldName::ALL {
            assert_eq!(FieldName::from_key(f.key()), Some(f));
        }
        assert_eq!(FieldName::from_key("parking_included"), None);
    }

    fn sample_fields() -> ExtractedLeaseFields {
        ExtractedLeaseFields {
            tenant_name: "Marcus Johnson & Lisa Johnson".into(),
            property_address: "x".into(),
            lease_start_date: "x".into(),
            lease_end_date: "x".into(),
            rent_amount: "x".into(),
            bond_amount: "x".into(),
            num_occupants: "x".into(),
            pet_permission: "x".into(),
            parking: "x".into(),
            special_conditions: None,
            landlord_name: "x".into(),
            property_manager_name: "x".into(),
            property_manager_email: "x".into(),
            property_manager_phone: "x".into(),
        }
    }

    #[test]
    fn welcome_pack_file_name_replaces_spaces() {
        let fields = sample_fields();
        assert_eq!(
            fields.welcome_pack_file_name(),
            "Welcome_Pack_Marcus_Johnson_&_Lisa_Johnson.docx"
        );
        assert_eq!(fields.to_values().len(), 14);
        assert_eq!(fields.to_values()[&FieldName::SpecialConditions], None);
    }

    #[test]
    fn welcome_pack_file_name_is_path_and_header_safe() {
        let mut fields = ExtractedLeaseFields {
            tenant_name: r#"Ana "AJ" O'Neil / Bo\Li"#.into(),
            ..sample_fields()
        };
        assert_eq!(
            fields.welcome_pack_file_name(),
            "Welcome_Pack_Ana__AJ__O'Neil___Bo_Li.docx"
        );
        fields.tenant_name = "  ".into();
        assert_eq!(fields.welcome_pack_file_name(), "Welcome_Pack_Tenant.docx");
    }
}
