use axum::extract::State;
use axum::Json;

use crate::app_state::AppState;
use crate::models::queued::QueuedItemSummary;
use crate::services::queue::QueueStatus;

/// GET /api/admin/queue_status — lane depths.
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueStatus> {
    Json(state.queue.status().await)
}

/// GET /api/admin/all_queued_items — ordered snapshot of queued items.
pub async fn queued_items_snapshot(State(state): State<AppState>) -> Json<Vec<QueuedItemSummary>> {
    let items = state.queue.snapshot().await;
    tracing::info!(count = items.len(), "Queue snapshot taken");
    Json(items)
}
