use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Image captioning model server endpoint
    #[serde(default = "default_captioning_url")]
    pub image_captioning_url: String,

    /// Object detection model server endpoint
    #[serde(default = "default_detection_url")]
    pub object_detection_url: String,

    /// Text summarization model server endpoint
    #[serde(default = "default_summarization_url")]
    pub text_summarization_url: String,

    /// Global cap on accepted submissions per calendar day
    #[serde(default = "default_max_summaries_per_day")]
    pub max_summaries_per_day: i64,

    /// Per-customer cap on daily participation slots
    #[serde(default = "default_max_participation_per_day")]
    pub max_participation_per_day: i32,

    /// Per-request timeout for model server calls, in seconds
    #[serde(default = "default_enrichment_timeout_secs")]
    pub enrichment_timeout_secs: u64,

    /// Worker sleep between polls of an empty queue, in milliseconds
    #[serde(default = "default_worker_poll_interval_ms")]
    pub worker_poll_interval_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_captioning_url() -> String {
    "http://localhost:8001/caption/".to_string()
}

fn default_detection_url() -> String {
    "http://localhost:8002/detect/".to_string()
}

fn default_summarization_url() -> String {
    "http://localhost:8003/generate/".to_string()
}

fn default_max_summaries_per_day() -> i64 {
    20
}

fn default_max_participation_per_day() -> i32 {
    4
}

fn default_enrichment_timeout_secs() -> u64 {
    30
}

fn default_worker_poll_interval_ms() -> u64 {
    1000
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }
}
