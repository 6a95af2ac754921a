//! Offline integration tests: a scripted model drives the full service
//! against in-test DOCX leases and templates.

mod common;

use common::*;
use async_trait::async_trait;
use lease_welcome_pack::{
    BlobStore, Bucket, CollaboratorError, FieldName, InMemoryRecordStore, LeaseService, LocalBlobStore,
    PipelineConfig, ProcessingError, RecordStore, ScriptedModel, ScriptedReply, SectionLayout,
    TemplateDocument, UploadStatus, WelcomePackError, WelcomePackGenerator,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

struct Harness {
    service: LeaseService,
    records: Arc<InMemoryRecordStore>,
    model: Arc<ScriptedModel>,
    _dir: tempfile::TempDir,
}

fn harness(replies: &[Value]) -> Harness {
    harness_with_model(ScriptedModel::with_texts(replies.iter().map(Value::to_string)))
}

fn harness_with_model(model: ScriptedModel) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());
    harness_with_template(dir, &template, model)
}

fn harness_with_template(dir: tempfile::TempDir, template: &Path, model: ScriptedModel) -> Harness {
    let config = PipelineConfig::builder()
        .template_path(template)
        .build()
        .unwrap();
    let model = Arc::new(model);
    let records = Arc::new(InMemoryRecordStore::new());
    let service = LeaseService::new(
        config,
        model.clone(),
        records.clone(),
        Arc::new(LocalBlobStore::new(dir.path().join("blobs"))),
    );
    Harness {
        service,
        records,
        model,
        _dir: dir,
    }
}

fn transcript(docx: &[u8]) -> String {
    TemplateDocument::from_bytes(docx).unwrap().transcript().unwrap()
}

async fn welcome_pack_text(h: &Harness, upload_id: uuid::Uuid) -> String {
    let download = h
        .service
        .download_welcome_pack(upload_id, "alice")
        .await
        .unwrap();
    transcript(&download.bytes)
}

#[tokio::test]
async fn fortnightly_rent_and_nil_conditions_end_to_end() {
    let h = harness(&[model_reply()]);

    let done = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap();

    assert_eq!(done.status, UploadStatus::Complete);
    assert_eq!(done.extracted_data.special_conditions, None);
    assert_eq!(done.extracted_data.lease_start_date, "1 April 2026");
    assert!(done.welcome_pack_url.starts_with("file://"));
    assert_eq!(h.model.call_count(), 1);

    let text = welcome_pack_text(&h, done.upload_id).await;
    assert!(text.contains("Dear Marcus Johnson & Lisa Johnson,"), "{text}");
    assert!(text.contains("Rent: $2,498.51 per month"), "{text}");
    assert!(text.contains("Property Manager | Julia Torres"), "{text}");
    assert!(!text.contains("Special Conditions"), "{text}");
    assert!(!text.contains("{{"), "{text}");
}

#[tokio::test]
async fn real_special_conditions_keep_the_section() {
    let conditions = "Tenant must have carpets professionally cleaned at end of lease.";
    let h = harness(&[model_reply_with("special_conditions", json!(conditions))]);

    let done = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap();
    assert_eq!(done.extracted_data.special_conditions.as_deref(), Some(conditions));

    let text = welcome_pack_text(&h, done.upload_id).await;
    let lines: Vec<&str> = text.lines().collect();
    let heading = lines
        .iter()
        .position(|l| *l == "Special Conditions")
        .expect("heading kept");
    assert_eq!(lines[heading + 1], conditions);
}

#[tokio::test]
async fn every_placeholder_is_filled() {
    let h = harness(&[model_reply_with("special_conditions", json!("No smoking indoors."))]);
    let done = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap();

    let text = welcome_pack_text(&h, done.upload_id).await;
    for field in FieldName::ALL {
        assert!(
            !text.contains(field.placeholder()),
            "{} left in {text}",
            field.placeholder()
        );
    }
    assert!(text.contains("Parking: Not included"));
}

#[tokio::test]
async fn generating_twice_never_leaves_the_section_behind() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());
    let generator = WelcomePackGenerator::new(&template, SectionLayout::default());
    let values = lease_welcome_pack::parse_model_output(&model_reply().to_string())
        .unwrap()
        .into_record()
        .unwrap()
        .to_values();

    for _ in 0..2 {
        let text = transcript(&generator.generate(&values).await.unwrap());
        assert!(!text.contains("Special Conditions"));
        assert!(!text.contains("{{special_conditions}}"));
    }
    assert!(transcript(&std::fs::read(&template).unwrap()).contains("{{special_conditions}}"));
}

#[tokio::test]
async fn missing_key_fails_without_a_correction_round() {
    let mut reply = model_reply();
    reply.as_object_mut().unwrap().remove("bond_amount");
    let h = harness(&[reply]);

    let err = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap_err();

    assert_eq!(h.model.call_count(), 1);
    let ProcessingError::Failed {
        upload_id, source, ..
    } = err
    else {
        panic!("expected a failed run");
    };
    assert!(matches!(source, WelcomePackError::MalformedModelOutput { .. }));

    let upload = h
        .records
        .fetch_upload(upload_id.unwrap(), "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upload.status, UploadStatus::Failed);
    assert!(upload.error_message.unwrap().contains("bond_amount"));
}

#[tokio::test]
async fn invalid_dates_trigger_one_correction_round() {
    let first = model_reply_with("lease_end_date", json!("March 2027"));
    let h = harness(&[first, model_reply()]);

    let done = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap();

    assert_eq!(h.model.call_count(), 2);
    assert_eq!(done.extracted_data.lease_end_date, "31 March 2027");
    assert!(h.model.prompts()[1].contains("lease_end_date 'March 2027'"));

    let extracted = h.records.fetch_extracted(done.upload_id).await.unwrap().unwrap();
    assert!(extracted.raw_model_exchange.correction_applied);
}

#[tokio::test]
async fn failed_correction_call_fails_the_run() {
    let first = model_reply_with("bond_amount", json!("5300"));
    let h = harness_with_model(ScriptedModel::new(vec![
        ScriptedReply::Text(first.to_string()),
        ScriptedReply::Fail("rate limited".into()),
    ]));

    let err = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap_err();
    assert_eq!(h.model.call_count(), 2);
    assert!(err.to_string().contains("rate limited"), "{err}");
}

#[tokio::test]
async fn placeholder_syntax_in_a_value_is_rejected() {
    let h = harness(&[model_reply_with("parking", json!("Bay {{parking_included}}"))]);

    let err = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap_err();
    let ProcessingError::Failed { source, .. } = err else {
        panic!("expected a failed run");
    };
    assert!(matches!(
        source,
        WelcomePackError::PlaceholderInValue { field: "parking" }
    ));
}

#[tokio::test]
async fn template_drift_surfaces_as_structure_error() {
    let dir = tempfile::tempdir().unwrap();
    // Drop the empty spacer so the section sits one paragraph earlier.
    let drifted = template_body().replacen("<w:p/>", "", 1);
    let template = write_template_body(dir.path(), &drifted);
    let h = harness_with_template(dir, &template, ScriptedModel::with_texts([model_reply().to_string()]));

    let err = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap_err();
    let ProcessingError::Failed { source, .. } = err else {
        panic!("expected a failed run");
    };
    assert!(
        matches!(source, WelcomePackError::TemplateStructure { .. }),
        "{source}"
    );
}

#[tokio::test]
async fn missing_template_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("nowhere.docx");
    let h = harness_with_template(dir, &template, ScriptedModel::with_texts([model_reply().to_string()]));

    let err = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().starts_with("Processing failed: "));
    assert!(err.to_string().contains("nowhere.docx"));
}

#[tokio::test]
async fn history_detail_and_download() {
    let h = harness(&[model_reply()]);
    let done = h
        .service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap();

    let history = h.service.lease_history("alice").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].tenant_name.as_deref(),
        Some("Marcus Johnson & Lisa Johnson")
    );
    assert!(history[0].has_welcome_pack);
    assert!(h.service.lease_history("bob").await.unwrap().is_empty());

    let detail = h.service.lease_detail(done.upload_id, "alice").await.unwrap();
    assert_eq!(detail.status, UploadStatus::Complete);
    assert!(detail.welcome_pack_url.is_some());

    let download = h
        .service
        .download_welcome_pack(done.upload_id, "alice")
        .await
        .unwrap();
    assert_eq!(download.file_name, "Welcome_Pack_Marcus_Johnson_&_Lisa_Johnson.docx");
    assert_eq!(
        download.content_disposition(),
        "attachment; filename=\"Welcome_Pack_Marcus_Johnson_&_Lisa_Johnson.docx\""
    );

    let err = h
        .service
        .download_welcome_pack(done.upload_id, "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, CollaboratorError::NotFound { .. }));
}

/// Local storage whose URL signing is down.
struct UnsignableBlobs(LocalBlobStore);

#[async_trait]
impl BlobStore for UnsignableBlobs {
    async fn put(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<String, CollaboratorError> {
        self.0.put(bucket, path, bytes, content_type).await
    }

    async fn get(&self, bucket: Bucket, path: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.0.get(bucket, path).await
    }

    async fn signed_url(&self, _: Bucket, _: &str, _: u64) -> Result<String, CollaboratorError> {
        Err(CollaboratorError::Storage("url service down".into()))
    }
}

#[tokio::test]
async fn signing_failure_leaves_the_upload_failed() {
    let dir = tempfile::tempdir().unwrap();
    let template = write_template(dir.path());
    let config = PipelineConfig::builder()
        .template_path(&template)
        .build()
        .unwrap();
    let records = Arc::new(InMemoryRecordStore::new());
    let service = LeaseService::new(
        config,
        Arc::new(ScriptedModel::with_texts([model_reply().to_string()])),
        records.clone(),
        Arc::new(UnsignableBlobs(LocalBlobStore::new(dir.path().join("blobs")))),
    );

    let err = service
        .process_lease("alice", "lease.docx", lease_docx(), "docx")
        .await
        .unwrap_err();
    let ProcessingError::Failed { upload_id, .. } = err else {
        panic!("expected a failed run");
    };

    let upload = records
        .fetch_upload(upload_id.unwrap(), "alice")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(upload.status, UploadStatus::Failed);
    assert!(upload.error_message.unwrap().contains("url service down"));
}
