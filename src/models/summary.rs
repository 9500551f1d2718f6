use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pixel-space bounding box as returned by the object detection server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

/// One detected object from the detection server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectedObject {
    pub label: String,
    pub score: f64,
    #[serde(rename = "box")]
    pub bounding_box: BoundingBox,
}

/// The durable output record, keyed by a globally unique sequence number.
/// Created once at persist time, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSummaryRecord {
    pub sequence_number: i64,
    pub customer_id: String,
    pub original_file_name: String,
    pub caption: String,
    pub detected_objects: Vec<DetectedObject>,
    pub text_summary: String,
    pub created_at: DateTime<Utc>,
}
