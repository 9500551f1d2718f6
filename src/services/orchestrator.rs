use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;

use crate::db::queries;
use crate::models::queued::QueuedItem;
use crate::models::summary::{DetectedObject, ImageSummaryRecord};
use crate::services::enrichment::EnrichmentClient;

/// Substituted for the caption when the captioning stage fails.
pub const CAPTION_FAILURE_SENTINEL: &str = "Captioning failed or not available.";
/// Substituted for the summary when the summarization stage fails outright.
pub const SUMMARY_FAILURE_SENTINEL: &str = "Summary generation failed.";

const MAX_PROMPT_OBJECTS: usize = 5;
const SUMMARY_MAX_LENGTH: u32 = 100;
const DEGENERATE_PREFIX_CHARS: usize = 50;
const DEGENERATE_MARGIN_CHARS: usize = 20;

/// Combined output of the three enrichment stages, before a sequence number
/// is assigned.
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub caption: String,
    pub detected_objects: Vec<DetectedObject>,
    pub text_summary: String,
}

/// Runs the staged enrichment pipeline for one dequeued item.
///
/// Stage failures never escape: a failed caption becomes a sentinel string, a
/// failed detection becomes an empty object list, and a failed or degenerate
/// summary is replaced with a caption-derived fallback. The only fallible
/// step is fetching the next sequence number from the store.
pub struct Orchestrator {
    enrichment: Arc<EnrichmentClient>,
    pool: PgPool,
}

impl Orchestrator {
    pub fn new(enrichment: Arc<EnrichmentClient>, pool: PgPool) -> Self {
        Self { enrichment, pool }
    }

    /// Run all three enrichment stages with their fallbacks.
    pub async fn enrich(&self, item: &QueuedItem) -> Enrichment {
        let caption = match self.enrichment.caption(&item.file_name, &item.image_bytes).await {
            Ok(caption) => caption,
            Err(e) => {
                tracing::warn!(
                    request_id = %item.request_id,
                    error = %e,
                    "Captioning stage failed, using sentinel"
                );
                CAPTION_FAILURE_SENTINEL.to_string()
            }
        };
        tracing::info!(request_id = %item.request_id, caption = %caption, "Caption stage complete");

        let detected_objects = match self.enrichment.detect(&item.file_name, &item.image_bytes).await {
            Ok(objects) => objects,
            Err(e) => {
                tracing::warn!(
                    request_id = %item.request_id,
                    error = %e,
                    "Detection stage failed, using empty object list"
                );
                Vec::new()
            }
        };
        tracing::info!(
            request_id = %item.request_id,
            object_count = detected_objects.len(),
            "Detection stage complete"
        );

        let prompt = build_prompt(&caption, &detected_objects);
        let text_summary = match self.enrichment.summarize(&prompt, SUMMARY_MAX_LENGTH).await {
            Ok(generated) if is_degenerate(&generated, &prompt) => {
                tracing::warn!(
                    request_id = %item.request_id,
                    "Generated summary echoes the prompt, using caption-derived fallback"
                );
                fallback_summary(&caption)
            }
            Ok(generated) => generated,
            Err(e) => {
                tracing::warn!(
                    request_id = %item.request_id,
                    error = %e,
                    "Summarization stage failed, using sentinel"
                );
                SUMMARY_FAILURE_SENTINEL.to_string()
            }
        };
        tracing::info!(request_id = %item.request_id, summary = %text_summary, "Summarization stage complete");

        Enrichment {
            caption,
            detected_objects,
            text_summary,
        }
    }

    /// Enrich the item and assemble the durable record under a freshly
    /// assigned sequence number.
    pub async fn process(&self, item: &QueuedItem) -> Result<ImageSummaryRecord, sqlx::Error> {
        let enrichment = self.enrich(item).await;
        let sequence_number = queries::next_sequence_number(&self.pool).await?;

        Ok(ImageSummaryRecord {
            sequence_number,
            customer_id: item.customer_id.clone(),
            original_file_name: item.file_name.clone(),
            caption: enrichment.caption,
            detected_objects: enrichment.detected_objects,
            text_summary: enrichment.text_summary,
            created_at: Utc::now(),
        })
    }
}

/// Fixed prompt template fed to the summarization server: the caption plus up
/// to the first five object labels, or "None." when nothing was detected.
pub fn build_prompt(caption: &str, objects: &[DetectedObject]) -> String {
    let mut prompt = format!("Summarize this image. Caption: '{caption}'. Objects detected: ");
    if objects.is_empty() {
        prompt.push_str("None.");
    } else {
        let labels: Vec<&str> = objects
            .iter()
            .take(MAX_PROMPT_OBJECTS)
            .map(|o| o.label.as_str())
            .collect();
        prompt.push_str(&labels.join(", "));
    }
    prompt
}

/// A summary that merely echoes the prompt without meaningfully extending it
/// carries no information; treat it as a stage failure.
fn is_degenerate(summary: &str, prompt: &str) -> bool {
    let prefix: String = prompt.chars().take(DEGENERATE_PREFIX_CHARS).collect();
    summary.starts_with(&prefix)
        && summary.chars().count() < prompt.chars().count() + DEGENERATE_MARGIN_CHARS
}

fn fallback_summary(caption: &str) -> String {
    format!("Summary based on: {caption}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::summary::BoundingBox;

    fn object(label: &str) -> DetectedObject {
        DetectedObject {
            label: label.to_string(),
            score: 0.9,
            bounding_box: BoundingBox {
                xmin: 0,
                ymin: 0,
                xmax: 10,
                ymax: 10,
            },
        }
    }

    #[test]
    fn prompt_includes_caption_and_labels() {
        let objects = vec![object("cat"), object("sofa")];
        let prompt = build_prompt("a cat on a sofa", &objects);
        assert_eq!(
            prompt,
            "Summarize this image. Caption: 'a cat on a sofa'. Objects detected: cat, sofa"
        );
    }

    #[test]
    fn prompt_caps_labels_at_five() {
        let objects: Vec<DetectedObject> =
            ["a", "b", "c", "d", "e", "f", "g"].iter().map(|l| object(l)).collect();
        let prompt = build_prompt("busy scene", &objects);
        assert!(prompt.ends_with("a, b, c, d, e"));
        assert!(!prompt.contains('f'));
    }

    #[test]
    fn prompt_uses_none_token_for_empty_detection() {
        let prompt = build_prompt("empty room", &[]);
        assert!(prompt.ends_with("Objects detected: None."));
    }

    #[test]
    fn prompt_embeds_sentinel_when_caption_failed() {
        let prompt = build_prompt(CAPTION_FAILURE_SENTINEL, &[object("cat")]);
        assert!(prompt.contains(CAPTION_FAILURE_SENTINEL));
        assert!(prompt.contains("cat"));
    }

    #[test]
    fn prompt_echo_is_degenerate() {
        let prompt = build_prompt("a cat", &[object("cat")]);
        // Echoing the prompt with a few extra words is still degenerate.
        let echoed = format!("{prompt} and");
        assert!(is_degenerate(&echoed, &prompt));
    }

    #[test]
    fn extended_generation_is_not_degenerate() {
        let prompt = build_prompt("a cat", &[object("cat")]);
        let generated = format!(
            "{prompt}. The photo shows a tabby cat lounging comfortably on a cushion in warm light."
        );
        assert!(!is_degenerate(&generated, &prompt));
    }

    #[test]
    fn unrelated_generation_is_not_degenerate() {
        let prompt = build_prompt("a cat", &[object("cat")]);
        assert!(!is_degenerate("A small cat rests on a sofa.", &prompt));
    }

    #[test]
    fn fallback_summary_derives_from_caption() {
        assert_eq!(fallback_summary("a cat"), "Summary based on: a cat");
    }
}
