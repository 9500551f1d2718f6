use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::queued::{QueuedItem, QueuedItemSummary};

/// Counts reported by the admin status endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct QueueStatus {
    pub priority_queue_size: usize,
    pub normal_queue_size: usize,
    pub total_items: usize,
}

#[derive(Default)]
struct Lanes {
    priority: VecDeque<QueuedItem>,
    normal: VecDeque<QueuedItem>,
}

/// In-memory two-lane FIFO queue.
///
/// The priority lane is drained completely before the normal lane is touched;
/// within a lane, order is FIFO. A single async mutex serializes enqueue,
/// dequeue and status so no caller can observe a half-mutated lane. The
/// normal lane has no starvation protection; strict lane priority is the
/// intended policy.
pub struct PriorityQueue {
    lanes: Mutex<Lanes>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes::default()),
        }
    }

    /// Append an item to the lane selected by its priority flag.
    pub async fn enqueue(&self, item: QueuedItem) {
        let mut lanes = self.lanes.lock().await;
        if item.is_priority {
            tracing::info!(
                request_id = %item.request_id,
                customer_id = %item.customer_id,
                lane = "priority",
                depth = lanes.priority.len() + 1,
                "Item enqueued"
            );
            lanes.priority.push_back(item);
        } else {
            tracing::info!(
                request_id = %item.request_id,
                customer_id = %item.customer_id,
                lane = "normal",
                depth = lanes.normal.len() + 1,
                "Item enqueued"
            );
            lanes.normal.push_back(item);
        }
    }

    /// Take the next item, priority lane first. Ownership of the item moves
    /// to the caller; dequeued items are never put back.
    pub async fn dequeue(&self) -> Option<QueuedItem> {
        let mut lanes = self.lanes.lock().await;
        if let Some(item) = lanes.priority.pop_front() {
            tracing::debug!(
                request_id = %item.request_id,
                lane = "priority",
                remaining = lanes.priority.len(),
                "Item dequeued"
            );
            return Some(item);
        }
        if let Some(item) = lanes.normal.pop_front() {
            tracing::debug!(
                request_id = %item.request_id,
                lane = "normal",
                remaining = lanes.normal.len(),
                "Item dequeued"
            );
            return Some(item);
        }
        None
    }

    /// Current lane depths.
    pub async fn status(&self) -> QueueStatus {
        let lanes = self.lanes.lock().await;
        QueueStatus {
            priority_queue_size: lanes.priority.len(),
            normal_queue_size: lanes.normal.len(),
            total_items: lanes.priority.len() + lanes.normal.len(),
        }
    }

    /// Point-in-time copy of all queued items in dequeue order, priority lane
    /// first. Does not mutate the queue.
    pub async fn snapshot(&self) -> Vec<QueuedItemSummary> {
        let lanes = self.lanes.lock().await;
        lanes
            .priority
            .iter()
            .chain(lanes.normal.iter())
            .map(QueuedItemSummary::from)
            .collect()
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(customer: &str, priority: bool) -> QueuedItem {
        QueuedItem::new(
            customer.to_string(),
            format!("{customer}.jpg"),
            vec![0xFF, 0xD8],
            priority,
        )
    }

    #[tokio::test]
    async fn priority_lane_drains_before_normal() {
        let queue = PriorityQueue::new();

        let p1 = item("p1", true);
        let n1 = item("n1", false);
        let p2 = item("p2", true);
        let n2 = item("n2", false);
        let expected = [p1.request_id, p2.request_id, n1.request_id, n2.request_id];

        queue.enqueue(p1).await;
        queue.enqueue(n1).await;
        queue.enqueue(p2).await;
        queue.enqueue(n2).await;

        for id in expected {
            let got = queue.dequeue().await.expect("queue should not be empty");
            assert_eq!(got.request_id, id);
        }
        assert!(queue.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn status_reports_lane_depths() {
        let queue = PriorityQueue::new();
        queue.enqueue(item("a", true)).await;
        queue.enqueue(item("b", false)).await;
        queue.enqueue(item("c", false)).await;

        let status = queue.status().await;
        assert_eq!(status.priority_queue_size, 1);
        assert_eq!(status.normal_queue_size, 2);
        assert_eq!(status.total_items, 3);
    }

    #[tokio::test]
    async fn snapshot_does_not_mutate() {
        let queue = PriorityQueue::new();
        queue.enqueue(item("a", true)).await;
        queue.enqueue(item("b", false)).await;

        let snapshot = queue.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].is_priority);
        assert!(!snapshot[1].is_priority);

        // Snapshot carries sizes, not payload bytes.
        assert_eq!(snapshot[0].image_size_bytes, 2);

        assert_eq!(queue.status().await.total_items, 2);
    }

    #[tokio::test]
    async fn concurrent_enqueues_are_all_observed() {
        use std::sync::Arc;

        let queue = Arc::new(PriorityQueue::new());
        let mut handles = Vec::new();
        for i in 0..32 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                queue.enqueue(item(&format!("c{i}"), i % 2 == 0)).await;
            }));
        }
        for handle in handles {
            handle.await.expect("enqueue task panicked");
        }

        let status = queue.status().await;
        assert_eq!(status.total_items, 32);
        assert_eq!(status.priority_queue_size, 16);
        assert_eq!(status.normal_queue_size, 16);
    }
}
