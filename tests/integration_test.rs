//! Integration tests against a live PostgreSQL instance.
//!
//! These exercise the admission path end to end: cap enforcement, counter
//! rollback, priority flagging and sequence assignment. Customer ids are
//! randomized per run so reruns do not collide, and the global daily cap is
//! derived from the counter's current value for the same reason.
//!
//! Run with: cargo test --test integration_test -- --ignored

use std::sync::Arc;

use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use image_summary_server::config::AppConfig;
use image_summary_server::db::{self, queries};
use image_summary_server::services::admission::{AdmissionController, AdmissionError};
use image_summary_server::services::queue::PriorityQueue;

const JPEG_STUB: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

async fn test_pool() -> sqlx::PgPool {
    let config = AppConfig::from_env().expect("Failed to load config");
    let pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

async fn daily_total(pool: &sqlx::PgPool) -> i64 {
    let id = format!("summary_total_{}", Utc::now().date_naive().format("%Y-%m-%d"));
    sqlx::query("SELECT value FROM counters WHERE id = $1")
        .bind(&id)
        .fetch_optional(pool)
        .await
        .expect("counter read failed")
        .map(|row| row.try_get("value").expect("value column"))
        .unwrap_or(0)
}

#[tokio::test]
#[ignore]
async fn admission_flow_caps_and_rollback() {
    let pool = test_pool().await;
    let queue = Arc::new(PriorityQueue::new());
    // Daily cap far above what this test consumes; participation cap 4.
    let admission = AdmissionController::new(pool.clone(), Arc::clone(&queue), i64::MAX / 2, 4);

    let customer = format!("it-{}", Uuid::new_v4());
    let today = Utc::now().date_naive();

    // Empty payload: rejected before any counter is touched.
    let total_before = daily_total(&pool).await;
    let err = admission
        .submit(&customer, "empty.jpg", Vec::new())
        .await
        .expect_err("empty payload must be rejected");
    assert!(matches!(err, AdmissionError::EmptyPayload));
    assert_eq!(daily_total(&pool).await, total_before);
    assert_eq!(queue.status().await.total_items, 0);

    // First submission of the day: accepted, priority lane, usage recorded.
    admission
        .submit(&customer, "one.jpg", JPEG_STUB.to_vec())
        .await
        .expect("first submission must be accepted");

    let status = queue.status().await;
    assert_eq!(status.priority_queue_size, 1);
    assert_eq!(status.normal_queue_size, 0);

    let usage = queries::get_daily_usage(&pool, &customer, today)
        .await
        .expect("usage read failed")
        .expect("usage record must exist");
    assert_eq!(usage.summary_count, 1);
    assert_eq!(usage.participation_count, 1);

    // Submissions 2-4: accepted into the normal lane.
    for n in 2..=4 {
        admission
            .submit(&customer, &format!("{n}.jpg"), JPEG_STUB.to_vec())
            .await
            .unwrap_or_else(|e| panic!("submission {n} must be accepted: {e}"));
    }
    let status = queue.status().await;
    assert_eq!(status.priority_queue_size, 1);
    assert_eq!(status.normal_queue_size, 3);

    // Fifth submission: participation cap hit, global counter rolled back.
    let total_before_fifth = daily_total(&pool).await;
    let err = admission
        .submit(&customer, "five.jpg", JPEG_STUB.to_vec())
        .await
        .expect_err("fifth submission must be rejected");
    assert!(matches!(err, AdmissionError::ParticipationCapReached(4)));
    assert_eq!(daily_total(&pool).await, total_before_fifth);
    assert_eq!(queue.status().await.total_items, 4);

    let usage = queries::get_daily_usage(&pool, &customer, today)
        .await
        .expect("usage read failed")
        .expect("usage record must exist");
    assert_eq!(usage.participation_count, 4);
}

#[tokio::test]
#[ignore]
async fn global_daily_cap_holds_under_concurrent_admissions() {
    let pool = test_pool().await;
    let queue = Arc::new(PriorityQueue::new());

    // Leave room for exactly 3 more admissions, then race 10 against them.
    let cap = daily_total(&pool).await + 3;
    let admission = Arc::new(AdmissionController::new(pool.clone(), queue, cap, 4));

    let mut handles = Vec::new();
    for i in 0..10 {
        let admission = Arc::clone(&admission);
        handles.push(tokio::spawn(async move {
            let customer = format!("race-{}-{}", i, Uuid::new_v4());
            admission.submit(&customer, "race.jpg", JPEG_STUB.to_vec()).await
        }));
    }

    let mut accepted = 0;
    let mut capped = 0;
    for handle in handles {
        match handle.await.expect("submission task panicked") {
            Ok(_) => accepted += 1,
            Err(AdmissionError::DailyCapReached(_)) => capped += 1,
            Err(e) => panic!("unexpected rejection: {e}"),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(capped, 7);
    assert!(daily_total(&pool).await <= cap);
}

#[tokio::test]
#[ignore]
async fn sequence_numbers_are_unique_under_concurrency() {
    let pool = test_pool().await;

    let fetches = (0..20).map(|_| queries::next_sequence_number(&pool));
    let results = futures::future::join_all(fetches).await;

    let mut seen = std::collections::HashSet::new();
    for result in results {
        let sequence = result.expect("sequence fetch failed");
        assert!(seen.insert(sequence), "duplicate sequence number {sequence}");
    }
    assert_eq!(seen.len(), 20);
}

#[tokio::test]
#[ignore]
async fn summary_records_round_trip_through_lookups() {
    use chrono::SubsecRound;
    use image_summary_server::models::summary::{BoundingBox, DetectedObject, ImageSummaryRecord};

    let pool = test_pool().await;
    let customer = format!("it-{}", Uuid::new_v4());

    let sequence = queries::next_sequence_number(&pool).await.expect("sequence fetch");
    let record = ImageSummaryRecord {
        sequence_number: sequence,
        customer_id: customer.clone(),
        original_file_name: "park.jpg".to_string(),
        caption: "a dog in a park".to_string(),
        detected_objects: vec![DetectedObject {
            label: "dog".to_string(),
            score: 0.92,
            bounding_box: BoundingBox {
                xmin: 4,
                ymin: 8,
                xmax: 120,
                ymax: 200,
            },
        }],
        text_summary: "A dog enjoys an afternoon in the park.".to_string(),
        created_at: Utc::now().trunc_subsecs(3),
    };

    queries::insert_summary(&pool, &record).await.expect("insert failed");

    // Inserting the same sequence again must hit the unique key.
    let duplicate = queries::insert_summary(&pool, &record).await;
    assert!(duplicate.is_err(), "duplicate sequence insert must fail");

    let listed = queries::summaries_by_customer(&pool, &customer, 10)
        .await
        .expect("list failed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].sequence_number, sequence);
    assert_eq!(listed[0].detected_objects, record.detected_objects);

    let by_file = queries::summary_by_customer_and_filename(&pool, &customer, "park.jpg")
        .await
        .expect("lookup failed")
        .expect("record must be found");
    assert_eq!(by_file.sequence_number, sequence);

    let missing = queries::summary_by_customer_and_filename(&pool, &customer, "other.jpg")
        .await
        .expect("lookup failed");
    assert!(missing.is_none());
}
