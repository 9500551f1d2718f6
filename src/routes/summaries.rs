use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::summary::ImageSummaryRecord;

#[derive(Deserialize)]
pub struct ListParams {
    limit: Option<i64>,
}

/// GET /api/summaries/{customer_id} — latest summaries for one customer.
pub async fn customer_summaries(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ImageSummaryRecord>>, StatusCode> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);

    queries::summaries_by_customer(&state.db, &customer_id, limit)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(customer_id = %customer_id, error = %e, "Failed to fetch summaries");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// GET /api/summary/{customer_id}/{filename} — latest summary for a filename.
pub async fn summary_by_filename(
    State(state): State<AppState>,
    Path((customer_id, filename)): Path<(String, String)>,
) -> Result<Json<ImageSummaryRecord>, StatusCode> {
    let record = queries::summary_by_customer_and_filename(&state.db, &customer_id, &filename)
        .await
        .map_err(|e| {
            tracing::error!(
                customer_id = %customer_id,
                file_name = %filename,
                error = %e,
                "Failed to fetch summary"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    record.map(Json).ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/admin/all_summaries — newest summaries across all customers.
pub async fn all_summaries(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ImageSummaryRecord>>, StatusCode> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);

    queries::all_summaries(&state.db, limit)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch all summaries");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}
