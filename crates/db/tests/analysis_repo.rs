//! Integration tests for `AnalysisRepo` against a real database:
//! - owner scoping on find / list / delete
//! - list ordering (newest upload first)
//! - terminal updates and the no-reopen guard
//! - schema constraints backing the terminal-state invariants

use assert_matches::assert_matches;
use retinoscan_core::analysis::{Gender, PatientInfo};
use retinoscan_core::prediction::{ModelPrediction, PredictionMetadata, PredictionOutcome};
use retinoscan_db::models::analysis::{CreateAnalysis, TerminalUpdate};
use retinoscan_db::models::status::AnalysisStatus;
use retinoscan_db::repositories::AnalysisRepo;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_analysis(owner: &str, name: &str) -> CreateAnalysis {
    CreateAnalysis {
        owner_id: owner.to_string(),
        patient_id: Some("P-001".to_string()),
        original_image_url: format!("https://res.cloudinary.com/demo/image/upload/retinal-scans/{name}.jpg"),
        patient: PatientInfo {
            name: name.to_string(),
            age: Some(54),
            gender: Some(Gender::Female),
            notes: None,
        },
        actual_stage: None,
        status: AnalysisStatus::Processing,
    }
}

fn sample_prediction() -> PredictionOutcome {
    PredictionOutcome {
        predictions: vec![ModelPrediction {
            condition: "Moderate Diabetic Retinopathy".to_string(),
            confidence: 0.81,
            probability: 0.81,
        }],
        primary_diagnosis: "Moderate Diabetic Retinopathy".to_string(),
        confidence_score: 0.81,
        processing_time: 1.2,
        severity_level: 2,
        severity_name: "Moderate Diabetic Retinopathy".to_string(),
        urgency_level: "moderate".to_string(),
        recommendations: vec!["Refer to an ophthalmologist".to_string()],
        metadata: PredictionMetadata {
            model_version: "1.0.0".to_string(),
            ..Default::default()
        },
    }
}

// ---------------------------------------------------------------------------
// Create / find
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn create_assigns_id_and_upload_date(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    assert!(created.id > 0);
    assert_eq!(created.owner_id, "owner-a");
    assert_eq!(created.status(), AnalysisStatus::Processing);
    assert_eq!(created.patient_info().gender, Some(Gender::Female));
    assert!(created.prediction.is_none());
    assert!(created.error_message.is_none());
    assert!(created.analysis_date.is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn find_is_scoped_to_owner(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    let own = AnalysisRepo::find_for_owner(&pool, created.id, "owner-a")
        .await
        .unwrap();
    assert!(own.is_some());

    let other = AnalysisRepo::find_for_owner(&pool, created.id, "owner-b")
        .await
        .unwrap();
    assert!(other.is_none());
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn list_returns_newest_first_and_only_own_rows(pool: PgPool) {
    let first = AnalysisRepo::create(&pool, &new_analysis("owner-a", "First"))
        .await
        .unwrap();
    let second = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Second"))
        .await
        .unwrap();
    AnalysisRepo::create(&pool, &new_analysis("owner-b", "Other"))
        .await
        .unwrap();

    let listed = AnalysisRepo::list_by_owner(&pool, "owner-a").await.unwrap();
    let ids: Vec<_> = listed.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let again = AnalysisRepo::list_by_owner(&pool, "owner-a").await.unwrap();
    let again_ids: Vec<_> = again.iter().map(|a| a.id).collect();
    assert_eq!(ids, again_ids);
}

// ---------------------------------------------------------------------------
// Terminal updates
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn finalize_completed_sets_prediction_and_date(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    let updated = AnalysisRepo::finalize(
        &pool,
        created.id,
        &TerminalUpdate::Completed {
            prediction: sample_prediction(),
            analyzed_image_url: None,
            analysis_date: chrono::Utc::now(),
        },
    )
    .await
    .unwrap()
    .expect("row should be updated");

    assert_eq!(updated.status(), AnalysisStatus::Completed);
    assert_eq!(updated.prediction.as_ref().unwrap().severity_level, 2);
    assert!(updated.error_message.is_none());
    assert!(updated.analysis_date.unwrap() >= updated.upload_date);
}

#[sqlx::test(migrations = "./migrations")]
async fn finalize_failed_sets_message(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    let updated = AnalysisRepo::finalize(
        &pool,
        created.id,
        &TerminalUpdate::Failed {
            error_message: "Model API is not available".to_string(),
            analysis_date: chrono::Utc::now(),
        },
    )
    .await
    .unwrap()
    .expect("row should be updated");

    assert_eq!(updated.status(), AnalysisStatus::Failed);
    assert!(updated.prediction.is_none());
    assert_eq!(updated.error_message.as_deref(), Some("Model API is not available"));
}

#[sqlx::test(migrations = "./migrations")]
async fn analysis_date_is_clamped_to_upload_date(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    let long_ago = created.upload_date - chrono::Duration::days(1);
    let updated = AnalysisRepo::finalize(
        &pool,
        created.id,
        &TerminalUpdate::Failed {
            error_message: "boom".to_string(),
            analysis_date: long_ago,
        },
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(updated.analysis_date, Some(updated.upload_date));
}

#[sqlx::test(migrations = "./migrations")]
async fn terminal_state_is_never_reopened(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    AnalysisRepo::finalize(
        &pool,
        created.id,
        &TerminalUpdate::Failed {
            error_message: "first".to_string(),
            analysis_date: chrono::Utc::now(),
        },
    )
    .await
    .unwrap()
    .unwrap();

    let second = AnalysisRepo::finalize(
        &pool,
        created.id,
        &TerminalUpdate::Completed {
            prediction: sample_prediction(),
            analyzed_image_url: None,
            analysis_date: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();
    assert!(second.is_none());

    let row = AnalysisRepo::find_for_owner(&pool, created.id, "owner-a")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), AnalysisStatus::Failed);
    assert_eq!(row.error_message.as_deref(), Some("first"));
}

#[sqlx::test(migrations = "./migrations")]
async fn finalize_missing_row_returns_none(pool: PgPool) {
    let result = AnalysisRepo::finalize(
        &pool,
        999_999,
        &TerminalUpdate::Failed {
            error_message: "boom".to_string(),
            analysis_date: chrono::Utc::now(),
        },
    )
    .await
    .unwrap();
    assert!(result.is_none());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn delete_is_scoped_to_owner(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    let foreign = AnalysisRepo::delete_for_owner(&pool, created.id, "owner-b")
        .await
        .unwrap();
    assert!(foreign.is_none());
    assert!(AnalysisRepo::find_for_owner(&pool, created.id, "owner-a")
        .await
        .unwrap()
        .is_some());

    let deleted = AnalysisRepo::delete_for_owner(&pool, created.id, "owner-a")
        .await
        .unwrap();
    assert_eq!(deleted.map(|a| a.id), Some(created.id));
    assert!(AnalysisRepo::find_for_owner(&pool, created.id, "owner-a")
        .await
        .unwrap()
        .is_none());
}

// ---------------------------------------------------------------------------
// Schema constraints
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn empty_image_url_is_rejected_by_schema(pool: PgPool) {
    let mut input = new_analysis("owner-a", "Jane");
    input.original_image_url = String::new();

    let result = AnalysisRepo::create(&pool, &input).await;
    assert_matches!(result, Err(sqlx::Error::Database(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn completed_without_prediction_is_rejected_by_schema(pool: PgPool) {
    let created = AnalysisRepo::create(&pool, &new_analysis("owner-a", "Jane"))
        .await
        .unwrap();

    let result = sqlx::query("UPDATE analyses SET status_id = 3, analysis_date = NOW() WHERE id = $1")
        .bind(created.id)
        .execute(&pool)
        .await;
    assert_matches!(result, Err(sqlx::Error::Database(_)));
}
