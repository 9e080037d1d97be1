//! Integration tests for the ingestion pipeline
//!
//! Tests cover:
//! - Upload rejection (no file, wrong extension, oversized, unreadable,
//!   missing sheets, inconsistent learners) without disturbing staged data
//! - Per-region staging, replacement and preview
//! - Commit: upsert of learner profiles, atomic rollback, missing uploads

mod helpers;

use helpers::{test_app, valid_sheets, with_row, without_sheet, workbook_bytes};
use lrms_common::Region;
use lrms_web::db::{learners, staging};
use lrms_web::error::IngestError;
use lrms_web::ingest::IngestionPipeline;

// =============================================================================
// Upload
// =============================================================================

#[tokio::test]
async fn test_valid_upload_is_staged_for_its_region_only() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    let outcome = pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&valid_sheets("Luzon")), "admin")
        .await
        .expect("Valid workbook should be accepted");

    assert_eq!(outcome.notice(), "Luzon Excel uploaded and validated successfully");
    assert_eq!(outcome.sheets, 8);
    assert_eq!(outcome.learners, 2);
    assert_eq!(app.uploaded_files(), 1);

    let staged = staging::get(&app.state.db, Region::Luzon).await.unwrap().unwrap();
    assert!(staged.file_path.exists());
    assert_eq!(staged.original_filename.as_deref(), Some("luzon.xlsx"));
    assert_eq!(staged.uploaded_by.as_deref(), Some("admin"));

    assert!(staging::get(&app.state.db, Region::Visayas).await.unwrap().is_none());
    assert!(staging::get(&app.state.db, Region::Mindanao).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_sheet_is_rejected_and_file_removed() {
    let app = test_app().await;
    let sheets = without_sheet(valid_sheets("Luzon"), "hope_index");

    let err = app
        .state
        .pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&sheets), "admin")
        .await
        .unwrap_err();

    assert_eq!(err.notices(), vec!["Missing required sheets: hope_index"]);
    assert_eq!(app.uploaded_files(), 0);
    assert!(staging::get(&app.state.db, Region::Luzon).await.unwrap().is_none());
}

#[tokio::test]
async fn test_missing_sheets_are_listed_in_required_order() {
    let app = test_app().await;
    let sheets = without_sheet(
        without_sheet(valid_sheets("Luzon"), "post_competency_evaluation"),
        "attendance",
    );

    let err = app
        .state
        .pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&sheets), "admin")
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Missing required sheets: attendance, post_competency_evaluation"
    );
}

#[tokio::test]
async fn test_inconsistent_learner_is_rejected_with_details() {
    let app = test_app().await;
    let sheets = with_row(valid_sheets("Luzon"), "attendance", &["L001", "Jane Do", "2024-06-04", "present"]);

    let err = app
        .state
        .pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&sheets), "admin")
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Consistency(ref errors) if errors.len() == 1));
    assert_eq!(
        err.notices(),
        vec![
            "attendance: learner_number L001 with name 'Jane Do' does not match learner_profiles",
            "Upload failed due to learner inconsistency across sheets",
        ]
    );
    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn test_failed_upload_keeps_previously_staged_workbook() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    pipeline
        .upload(Region::Luzon, "first.xlsx", &workbook_bytes(&valid_sheets("Luzon")), "admin")
        .await
        .unwrap();
    let before = staging::get(&app.state.db, Region::Luzon).await.unwrap().unwrap();

    let bad = without_sheet(valid_sheets("Luzon"), "learner_profiles");
    assert!(pipeline
        .upload(Region::Luzon, "second.xlsx", &workbook_bytes(&bad), "admin")
        .await
        .is_err());

    let after = staging::get(&app.state.db, Region::Luzon).await.unwrap().unwrap();
    assert_eq!(after.file_path, before.file_path);
    assert!(after.file_path.exists());
    assert_eq!(app.uploaded_files(), 1);
}

#[tokio::test]
async fn test_upload_rejects_bad_filenames_and_payloads() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;
    let bytes = workbook_bytes(&valid_sheets("Luzon"));

    let err = pipeline.upload(Region::Luzon, "", &bytes, "admin").await.unwrap_err();
    assert_eq!(err.to_string(), "No file selected");

    let err = pipeline.upload(Region::Luzon, "learners.csv", &bytes, "admin").await.unwrap_err();
    assert_eq!(err.to_string(), "Only .xlsx files are allowed");

    let err = pipeline
        .upload(Region::Luzon, "broken.xlsx", b"not a workbook", "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::Parse(_)));
    assert!(err.to_string().starts_with("Upload failed: "));

    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected_before_writing() {
    let app = test_app().await;
    let pipeline = IngestionPipeline::new(app.state.db.clone(), app.upload_dir(), 1024);
    let bytes = workbook_bytes(&valid_sheets("Luzon"));
    assert!(bytes.len() > 1024);

    let err = pipeline.upload(Region::Luzon, "big.xlsx", &bytes, "admin").await.unwrap_err();
    assert!(matches!(err, IngestError::TooLarge { limit: 1024 }));
    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn test_reupload_replaces_instead_of_appending() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    pipeline
        .upload(Region::Mindanao, "first.xlsx", &workbook_bytes(&valid_sheets("Mindanao")), "admin")
        .await
        .unwrap();

    let second = with_row(valid_sheets("Mindanao"), "learner_profiles", &["L003", "Ana Reyes"]);
    pipeline
        .upload(Region::Mindanao, "second.xlsx", &workbook_bytes(&second), "admin")
        .await
        .unwrap();

    assert_eq!(app.uploaded_files(), 1);

    let preview = pipeline.preview(Region::Mindanao).await;
    assert!(preview.warning.is_none());
    let profiles = &preview.sheets[0];
    assert_eq!(profiles.name, "learner_profiles");
    assert_eq!(profiles.table.rows.len(), 3);
    assert_eq!(
        preview.staged.unwrap().original_filename.as_deref(),
        Some("second.xlsx")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_to_one_region_keep_the_last() {
    let app = test_app().await;
    let bytes = workbook_bytes(&valid_sheets("Luzon"));

    let uploads: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = app.state.pipeline.clone();
            let bytes = bytes.clone();
            tokio::spawn(async move {
                pipeline
                    .upload(Region::Luzon, &format!("luzon-{}.xlsx", i), &bytes, "admin")
                    .await
            })
        })
        .collect();

    for upload in uploads {
        let result = upload.await.expect("Upload task should not panic");
        assert!(result.is_ok(), "Concurrent upload failed: {:?}", result.err());
    }

    let staged = staging::list(&app.state.db).await.unwrap();
    assert_eq!(staged.len(), 1);
    assert!(staged[0].file_path.exists());
    assert_eq!(app.uploaded_files(), 1);
}

// =============================================================================
// Preview
// =============================================================================

#[tokio::test]
async fn test_preview_keeps_workbook_sheet_order() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    let mut sheets = valid_sheets("Visayas");
    sheets.reverse();
    pipeline
        .upload(Region::Visayas, "visayas.xlsx", &workbook_bytes(&sheets), "admin")
        .await
        .unwrap();

    let preview = pipeline.preview(Region::Visayas).await;
    let names: Vec<_> = preview.sheets.iter().map(|s| s.name.as_str()).collect();
    let expected: Vec<_> = sheets.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, expected);

    assert!(pipeline.preview(Region::Luzon).await.sheets.is_empty());
}

#[tokio::test]
async fn test_unreadable_staged_file_is_unstaged_with_warning() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&valid_sheets("Luzon")), "admin")
        .await
        .unwrap();
    let staged = staging::get(&app.state.db, Region::Luzon).await.unwrap().unwrap();
    std::fs::write(&staged.file_path, b"corrupted").unwrap();

    let preview = pipeline.preview(Region::Luzon).await;
    assert!(preview.sheets.is_empty());
    assert!(preview
        .warning
        .unwrap()
        .starts_with("Failed to load uploaded file for Luzon: "));
    assert!(staging::get(&app.state.db, Region::Luzon).await.unwrap().is_none());
}

#[tokio::test]
async fn test_profiles_preview_reads_only_learner_profiles() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&valid_sheets("Luzon")), "admin")
        .await
        .unwrap();

    let preview = pipeline.preview_profiles(Region::Luzon).await;
    assert_eq!(preview.table.rows.len(), 2);
    assert_eq!(preview.table.rows[0]["name"], "Jane Doe");
    assert_eq!(preview.table.rows[1]["co_learner"], "");
    assert!(preview.table.columns.contains(&"class".to_string()));
}

// =============================================================================
// Commit
// =============================================================================

#[tokio::test]
async fn test_commit_persists_profiles_and_clears_staging() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&valid_sheets("Luzon")), "admin")
        .await
        .unwrap();

    let outcome = pipeline.commit(Region::Luzon).await.unwrap();
    assert_eq!(outcome.notice(), "All Luzon data saved successfully");
    assert_eq!(outcome.learners, 2);

    let jane = learners::get_profile(&app.state.db, "L001").await.unwrap().unwrap();
    assert_eq!(jane.name, "Jane Doe");
    assert_eq!(jane.class_name.as_deref(), Some("A"));
    assert_eq!(jane.region.as_deref(), Some("Luzon"));

    let juan = learners::get_profile(&app.state.db, "L002").await.unwrap().unwrap();
    assert_eq!(juan.co_learner, None);

    let counts = learners::count_by_region(&app.state.db).await.unwrap();
    assert_eq!(counts[&Region::Luzon], 2);

    // Measurement sheets are validated but not persisted
    let measurements = learners::measurement_counts(&app.state.db, "L001").await.unwrap();
    assert!(measurements.values().all(|&n| n == 0));

    assert!(staging::get(&app.state.db, Region::Luzon).await.unwrap().is_none());
    assert_eq!(app.uploaded_files(), 0);
}

#[tokio::test]
async fn test_commit_upserts_existing_learners() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    pipeline
        .upload(Region::Luzon, "a.xlsx", &workbook_bytes(&valid_sheets("Luzon")), "admin")
        .await
        .unwrap();
    pipeline.commit(Region::Luzon).await.unwrap();

    // Same learners, now tagged Visayas
    pipeline
        .upload(Region::Visayas, "b.xlsx", &workbook_bytes(&valid_sheets("Visayas")), "admin")
        .await
        .unwrap();
    pipeline.commit(Region::Visayas).await.unwrap();

    let counts = learners::count_by_region(&app.state.db).await.unwrap();
    assert_eq!(counts[&Region::Luzon], 0);
    assert_eq!(counts[&Region::Visayas], 2);
}

#[tokio::test]
async fn test_commit_without_upload_is_a_noop() {
    let app = test_app().await;

    let err = app.state.pipeline.commit(Region::Visayas).await.unwrap_err();
    assert!(matches!(err, IngestError::NotFound { region: Region::Visayas }));
    assert_eq!(err.to_string(), "No uploaded file to save for Visayas");
}

#[tokio::test]
async fn test_commit_with_vanished_file_clears_staging() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&valid_sheets("Luzon")), "admin")
        .await
        .unwrap();
    let staged = staging::get(&app.state.db, Region::Luzon).await.unwrap().unwrap();
    std::fs::remove_file(&staged.file_path).unwrap();

    let err = pipeline.commit(Region::Luzon).await.unwrap_err();
    assert_eq!(err.to_string(), "No uploaded file to save for Luzon");
    assert!(staging::get(&app.state.db, Region::Luzon).await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_commit_rolls_back_and_keeps_staging() {
    let app = test_app().await;
    let pipeline = &app.state.pipeline;

    // A blank learner number passes validation but violates the store's constraint
    let sheets = with_row(valid_sheets("Luzon"), "learner_profiles", &["", "Nameless"]);
    pipeline
        .upload(Region::Luzon, "luzon.xlsx", &workbook_bytes(&sheets), "admin")
        .await
        .unwrap();

    let err = pipeline.commit(Region::Luzon).await.unwrap_err();
    assert!(matches!(err, IngestError::Persistence { region: Region::Luzon, .. }));
    assert!(err.to_string().starts_with("Database save failed for Luzon: "));

    // Nothing from the batch was written
    assert!(learners::get_profile(&app.state.db, "L001").await.unwrap().is_none());

    let staged = staging::get(&app.state.db, Region::Luzon).await.unwrap().unwrap();
    assert!(staged.file_path.exists());
}
