use chrono::NaiveDate;
use sqlx::{PgPool, Row};

use crate::models::summary::{DetectedObject, ImageSummaryRecord};
use crate::models::usage::DailyUsageRecord;

const SEQUENCE_COUNTER_ID: &str = "summary_sequence";

fn daily_total_counter_id(date: NaiveDate) -> String {
    format!("summary_total_{}", date.format("%Y-%m-%d"))
}

/// Atomically fetch-and-add a named counter, returning the post-increment
/// value. The upsert-returning form makes this a single round trip with no
/// read-then-write window.
async fn increment_counter(pool: &PgPool, id: &str) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO counters (id, value)
        VALUES ($1, 1)
        ON CONFLICT (id) DO UPDATE SET value = counters.value + 1
        RETURNING value
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;

    row.try_get("value")
}

/// Compensating decrement for a speculative increment, clamped at zero so
/// overlapping rollbacks cannot drive the counter negative.
async fn decrement_counter(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE counters SET value = GREATEST(counters.value - 1, 0)
        WHERE id = $1
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Next global result sequence number. Strictly increasing, never reused.
pub async fn next_sequence_number(pool: &PgPool) -> Result<i64, sqlx::Error> {
    increment_counter(pool, SEQUENCE_COUNTER_ID).await
}

/// Speculatively count one accepted submission against the global daily
/// total, returning the post-increment value for the cap check.
pub async fn increment_daily_total(pool: &PgPool, date: NaiveDate) -> Result<i64, sqlx::Error> {
    increment_counter(pool, &daily_total_counter_id(date)).await
}

/// Roll back a speculative daily-total increment after a rejection.
pub async fn rollback_daily_total(pool: &PgPool, date: NaiveDate) -> Result<(), sqlx::Error> {
    decrement_counter(pool, &daily_total_counter_id(date)).await
}

/// Read a customer's usage record for one day, if any.
pub async fn get_daily_usage(
    pool: &PgPool,
    customer_id: &str,
    date: NaiveDate,
) -> Result<Option<DailyUsageRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT customer_id, date, summary_count, participation_count
        FROM daily_usage
        WHERE customer_id = $1 AND date = $2
        "#,
    )
    .bind(customer_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some(r) => Some(DailyUsageRecord {
            customer_id: r.try_get("customer_id")?,
            date: r.try_get("date")?,
            summary_count: r.try_get("summary_count")?,
            participation_count: r.try_get("participation_count")?,
        }),
        None => None,
    })
}

/// Upsert a customer's usage for the day: always bump the submission count,
/// and bump the participation-slot count when this submission consumes one.
pub async fn record_usage(
    pool: &PgPool,
    customer_id: &str,
    date: NaiveDate,
    consumes_slot: bool,
) -> Result<(), sqlx::Error> {
    let slot_increment: i32 = if consumes_slot { 1 } else { 0 };

    sqlx::query(
        r#"
        INSERT INTO daily_usage (customer_id, date, summary_count, participation_count)
        VALUES ($1, $2, 1, $3)
        ON CONFLICT (customer_id, date) DO UPDATE
        SET summary_count = daily_usage.summary_count + 1,
            participation_count = daily_usage.participation_count + $3
        "#,
    )
    .bind(customer_id)
    .bind(date)
    .bind(slot_increment)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist a finished summary record. The sequence-number primary key rejects
/// a duplicate persist for the same sequence.
pub async fn insert_summary(pool: &PgPool, record: &ImageSummaryRecord) -> Result<(), sqlx::Error> {
    let objects = serde_json::to_value(&record.detected_objects)
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    sqlx::query(
        r#"
        INSERT INTO image_summaries
            (sequence_number, customer_id, original_file_name, caption,
             detected_objects, text_summary, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.sequence_number)
    .bind(&record.customer_id)
    .bind(&record.original_file_name)
    .bind(&record.caption)
    .bind(objects)
    .bind(&record.text_summary)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

fn row_to_summary(row: sqlx::postgres::PgRow) -> Result<ImageSummaryRecord, sqlx::Error> {
    let objects_json: serde_json::Value = row.try_get("detected_objects")?;
    let detected_objects: Vec<DetectedObject> =
        serde_json::from_value(objects_json).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(ImageSummaryRecord {
        sequence_number: row.try_get("sequence_number")?,
        customer_id: row.try_get("customer_id")?,
        original_file_name: row.try_get("original_file_name")?,
        caption: row.try_get("caption")?,
        detected_objects,
        text_summary: row.try_get("text_summary")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Latest summaries for one customer, newest first.
pub async fn summaries_by_customer(
    pool: &PgPool,
    customer_id: &str,
    limit: i64,
) -> Result<Vec<ImageSummaryRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT sequence_number, customer_id, original_file_name, caption,
               detected_objects, text_summary, created_at
        FROM image_summaries
        WHERE customer_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(customer_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_summary).collect()
}

/// Latest summary for a (customer, filename) pair. Re-uploads of the same
/// filename return the most recent record.
pub async fn summary_by_customer_and_filename(
    pool: &PgPool,
    customer_id: &str,
    file_name: &str,
) -> Result<Option<ImageSummaryRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT sequence_number, customer_id, original_file_name, caption,
               detected_objects, text_summary, created_at
        FROM image_summaries
        WHERE customer_id = $1 AND original_file_name = $2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(customer_id)
    .bind(file_name)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_summary).transpose()
}

/// Newest summaries across all customers (admin view).
pub async fn all_summaries(pool: &PgPool, limit: i64) -> Result<Vec<ImageSummaryRecord>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT sequence_number, customer_id, original_file_name, caption,
               detected_objects, text_summary, created_at
        FROM image_summaries
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(row_to_summary).collect()
}
