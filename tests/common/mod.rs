//! Shared fixtures: in-test DOCX packages and canned model replies.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// A bold run.
pub fn run(text: &str) -> String {
    format!(
        r#"<w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">{}</w:t></w:r>"#,
        escape(text)
    )
}

/// A paragraph made of one run per piece.
pub fn paragraph(pieces: &[&str]) -> String {
    let runs: String = pieces.iter().map(|p| run(p)).collect();
    format!("<w:p>{runs}</w:p>")
}

/// A table, one `w:tr` per row.
pub fn table(rows: &[&[&str]]) -> String {
    let rows: String = rows
        .iter()
        .map(|cells| {
            let cells: String = cells
                .iter()
                .map(|c| format!("<w:tc>{}</w:tc>", paragraph(&[c])))
                .collect();
            format!("<w:tr>{cells}</w:tr>")
        })
        .collect();
    format!("<w:tbl>{rows}</w:tbl>")
}

/// `word/document.xml` wrapping `body`.
pub fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
    )
}

/// A minimal `.docx` package around `body`.
pub fn docx(body: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in [
        ("[Content_Types].xml", CONTENT_TYPES.to_string()),
        ("_rels/.rels", RELS.to_string()),
        ("word/document.xml", document_xml(body)),
    ] {
        writer.start_file(name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Body of the Welcome Pack template.
///
/// Top-level paragraphs 11 and 12 hold the Special Conditions heading and
/// placeholder. The tenant placeholder is split across three runs and the
/// property manager placeholders sit inside a table.
pub fn template_body() -> String {
    [
        paragraph(&["Tenant Welcome Pack"]),
        paragraph(&["Dear ", "{{ten", "ant_na", "me}}", ","]),
        paragraph(&["Welcome to {{property_address}}."]),
        paragraph(&["Your lease runs from {{lease_start_date}} to {{lease_end_date}}."]),
        paragraph(&["Rent: {{rent_amount}}"]),
        paragraph(&["Bond: {{bond_amount}}"]),
        paragraph(&["Occupants: {{num_occupants}}"]),
        paragraph(&["Pets: {{pet_permission}}"]),
        paragraph(&["Parking: {{parking_included}}"]),
        paragraph(&["Landlord: {{landlord_name}}"]),
        "<w:p/>".to_string(),
        paragraph(&["Special Conditions"]),
        paragraph(&["{{special_conditions}}"]),
        table(&[
            &["Property Manager", "{{property_manager_name}}"],
            &["Email", "{{property_manager_email}}"],
            &["Phone", "{{property_manager_phone}}"],
        ]),
        paragraph(&["We look forward to working with you."]),
    ]
    .concat()
}

/// The template written to `dir`, returning its path.
pub fn write_template(dir: &Path) -> PathBuf {
    write_template_body(dir, &template_body())
}

pub fn write_template_body(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("Tenant Welcome Pack Template.docx");
    std::fs::write(&path, docx(body)).unwrap();
    path
}

/// A short residential lease as a DOCX upload.
pub fn lease_docx() -> Vec<u8> {
    docx(
        &[
            paragraph(&["Residential Tenancy Agreement"]),
            table(&[
                &["Tenant", "Marcus Johnson & Lisa Johnson"],
                &["Premises", "18 River Road, Unit 7, Abbotsford VIC 3067"],
                &["Term", "01 April 2026 to 31 March 2027"],
                &["Rent", "$1,150.00 per fortnight"],
                &["Bond", "$5,300.00"],
            ]),
            paragraph(&["Special conditions: Nil."]),
        ]
        .concat(),
    )
}

/// A well-formed model reply for [`lease_docx`].
pub fn model_reply() -> Value {
    json!({
        "tenant_name": "Marcus Johnson & Lisa Johnson",
        "property_address": "18 River Road, Unit 7, Abbotsford VIC 3067",
        "lease_start_date": "01 April 2026",
        "lease_end_date": "31 March 2027",
        "rent_amount": "$1,150.00 per fortnight",
        "bond_amount": "$5,300.00",
        "num_occupants": "2",
        "pet_permission": "Not permitted",
        "parking": "Not included",
        "special_conditions": "Nil.",
        "landlord_name": "Harbour Holdings Pty Ltd",
        "property_manager_name": "Julia Torres",
        "property_manager_email": "julia.torres@acmepg.com.au",
        "property_manager_phone": "+61 3 9555 0142"
    })
}

/// [`model_reply`] with `key` replaced.
pub fn model_reply_with(key: &str, value: Value) -> Value {
    let mut reply = model_reply();
    reply[key] = value;
    reply
}
