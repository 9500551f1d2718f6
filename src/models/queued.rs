use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// An accepted submission waiting in the in-memory queue.
///
/// Owned exclusively by the queue while queued; ownership moves to the
/// worker on dequeue. Items are never re-enqueued.
#[derive(Debug, Clone)]
pub struct QueuedItem {
    pub request_id: Uuid,
    pub customer_id: String,
    pub file_name: String,
    pub image_bytes: Vec<u8>,
    pub received_at: DateTime<Utc>,
    /// True when this is the customer's first participation opportunity today.
    pub is_priority: bool,
}

impl QueuedItem {
    pub fn new(customer_id: String, file_name: String, image_bytes: Vec<u8>, is_priority: bool) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            customer_id,
            file_name,
            image_bytes,
            received_at: Utc::now(),
            is_priority,
        }
    }
}

/// Payload-free view of a queued item, used for the admin snapshot endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedItemSummary {
    pub request_id: Uuid,
    pub customer_id: String,
    pub file_name: String,
    pub image_size_bytes: usize,
    pub received_at: DateTime<Utc>,
    pub is_priority: bool,
}

impl From<&QueuedItem> for QueuedItemSummary {
    fn from(item: &QueuedItem) -> Self {
        Self {
            request_id: item.request_id,
            customer_id: item.customer_id.clone(),
            file_name: item.file_name.clone(),
            image_size_bytes: item.image_bytes.len(),
            received_at: item.received_at,
            is_priority: item.is_priority,
        }
    }
}
