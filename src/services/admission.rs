use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::queries;
use crate::models::queued::QueuedItem;
use crate::services::queue::PriorityQueue;

/// Why a submission was turned away at admission time. None of these are
/// retried by the server; the caller must resubmit.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Image data is empty.")]
    EmptyPayload,

    #[error("Total daily summary limit ({0}) reached for today.")]
    DailyCapReached(i64),

    #[error("Maximum participation limit ({0}), including shares, reached.")]
    ParticipationCapReached(i32),

    #[error("Database error during submission.")]
    StoreUnavailable(#[source] sqlx::Error),
}

impl AdmissionError {
    /// Cap rejections map to 429 upstream; the rest are client or server errors.
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            AdmissionError::DailyCapReached(_) | AdmissionError::ParticipationCapReached(_)
        )
    }
}

/// Gatekeeper for the submission path. Enforces the global daily cap and the
/// per-customer participation cap against the counter store, assigns the
/// priority flag, and hands accepted items to the queue.
pub struct AdmissionController {
    pool: PgPool,
    queue: Arc<PriorityQueue>,
    daily_cap: i64,
    participation_cap: i32,
}

impl AdmissionController {
    pub fn new(pool: PgPool, queue: Arc<PriorityQueue>, daily_cap: i64, participation_cap: i32) -> Self {
        Self {
            pool,
            queue,
            daily_cap,
            participation_cap,
        }
    }

    /// Admit or reject one submission.
    ///
    /// The global cap check is a speculative atomic increment followed by a
    /// compensating decrement on rejection. A read-then-write check would let
    /// two concurrent submissions both observe a pre-increment value below
    /// the cap and both pass; fetch-and-add closes that window.
    pub async fn submit(
        &self,
        customer_id: &str,
        file_name: &str,
        image_bytes: Vec<u8>,
    ) -> Result<Uuid, AdmissionError> {
        if image_bytes.is_empty() {
            return Err(AdmissionError::EmptyPayload);
        }

        let today = Utc::now().date_naive();

        let total = queries::increment_daily_total(&self.pool, today)
            .await
            .map_err(AdmissionError::StoreUnavailable)?;
        if total > self.daily_cap {
            self.rollback_daily_total(today).await;
            return Err(AdmissionError::DailyCapReached(self.daily_cap));
        }

        let usage = match queries::get_daily_usage(&self.pool, customer_id, today).await {
            Ok(usage) => usage,
            Err(e) => {
                self.rollback_daily_total(today).await;
                return Err(AdmissionError::StoreUnavailable(e));
            }
        };

        if let Some(ref usage) = usage {
            if usage.participation_count >= self.participation_cap {
                self.rollback_daily_total(today).await;
                return Err(AdmissionError::ParticipationCapReached(self.participation_cap));
            }
        }

        // First participation opportunity of the day goes to the priority lane.
        let is_priority = usage.as_ref().map_or(true, |u| u.participation_count == 0);

        let item = QueuedItem::new(
            customer_id.to_string(),
            file_name.to_string(),
            image_bytes,
            is_priority,
        );
        let request_id = item.request_id;

        self.queue.enqueue(item).await;

        tracing::info!(
            request_id = %request_id,
            customer_id = %customer_id,
            file_name = %file_name,
            is_priority,
            "Submission accepted and queued"
        );
        metrics::counter!("submissions_accepted_total").increment(1);

        // Every accepted submission consumes a participation slot under the
        // current policy. The item is already queued and cannot be withdrawn,
        // so a failed usage write leaves it in flight; surface the store
        // error to the caller anyway.
        if let Err(e) = queries::record_usage(&self.pool, customer_id, today, true).await {
            tracing::error!(
                request_id = %request_id,
                customer_id = %customer_id,
                error = %e,
                "Usage record update failed after enqueue; item remains queued"
            );
            return Err(AdmissionError::StoreUnavailable(e));
        }

        Ok(request_id)
    }

    /// Compensating decrement. Its own failure leaves the daily total
    /// over-counted, which only makes admission stricter; log and move on.
    async fn rollback_daily_total(&self, date: chrono::NaiveDate) {
        if let Err(e) = queries::rollback_daily_total(&self.pool, date).await {
            tracing::error!(
                %date,
                error = %e,
                "Failed to roll back daily total counter; total may over-count"
            );
        }
    }
}
