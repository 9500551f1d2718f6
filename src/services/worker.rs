use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::db::queries;
use crate::models::queued::QueuedItem;
use crate::services::orchestrator::Orchestrator;
use crate::services::queue::PriorityQueue;

const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Single long-lived consumer of the priority queue.
///
/// The loop only ends on cancellation. A per-item failure is logged and the
/// loop moves on after a short backoff; an in-flight item is finished before
/// a shutdown takes effect.
pub struct ProcessingWorker {
    queue: Arc<PriorityQueue>,
    orchestrator: Orchestrator,
    pool: PgPool,
    idle_poll: Duration,
}

impl ProcessingWorker {
    pub fn new(
        queue: Arc<PriorityQueue>,
        orchestrator: Orchestrator,
        pool: PgPool,
        idle_poll: Duration,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            pool,
            idle_poll,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Queue processing worker started");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.queue.dequeue().await {
                Some(item) => {
                    let status = self.queue.status().await;
                    metrics::gauge!("queue_depth").set(status.total_items as f64);

                    if self.process_item(item).await.is_err() {
                        // Pause after a failed item so a persistent store
                        // outage does not spin the loop.
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = sleep(ERROR_BACKOFF) => {}
                        }
                    }
                }
                None => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = sleep(self.idle_poll) => {}
                    }
                }
            }
        }

        tracing::info!("Queue processing worker stopped");
    }

    async fn process_item(&self, item: QueuedItem) -> Result<(), ()> {
        tracing::info!(
            request_id = %item.request_id,
            customer_id = %item.customer_id,
            "Processing queued item"
        );
        let start = std::time::Instant::now();

        let record = match self.orchestrator.process(&item).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(
                    request_id = %item.request_id,
                    error = %e,
                    "Sequence assignment failed, item dropped without a result"
                );
                metrics::counter!("summaries_lost_total").increment(1);
                return Err(());
            }
        };

        // The one place accepted work can be silently lost: the submitter got
        // an accept but no record will ever appear for this request id.
        if let Err(e) = queries::insert_summary(&self.pool, &record).await {
            tracing::error!(
                request_id = %item.request_id,
                sequence = record.sequence_number,
                error = %e,
                "Failed to persist summary record, item dropped without a result"
            );
            metrics::counter!("summaries_lost_total").increment(1);
            return Err(());
        }

        metrics::counter!("summaries_processed_total").increment(1);
        metrics::histogram!("summary_processing_seconds").record(start.elapsed().as_secs_f64());

        tracing::info!(
            request_id = %item.request_id,
            customer_id = %item.customer_id,
            sequence = record.sequence_number,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Summary persisted"
        );

        Ok(())
    }
}
