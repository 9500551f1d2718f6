use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::summary::DetectedObject;

/// Client for the three enrichment model servers (captioning, object
/// detection, text summarization). Every request carries the client-level
/// timeout so a stuck model server can never block the worker indefinitely.
pub struct EnrichmentClient {
    http: Client,
    captioning_url: String,
    detection_url: String,
    summarization_url: String,
}

#[derive(Deserialize)]
struct CaptionResponse {
    #[allow(dead_code)]
    filename: String,
    caption: String,
}

#[derive(Deserialize)]
struct DetectionResponse {
    #[allow(dead_code)]
    filename: String,
    objects: Vec<DetectedObject>,
}

#[derive(Serialize)]
struct SummarizationRequest<'a> {
    prompt: &'a str,
    max_length: u32,
    num_return_sequences: u32,
}

impl EnrichmentClient {
    pub fn new(
        captioning_url: String,
        detection_url: String,
        summarization_url: String,
        timeout: Duration,
    ) -> Result<Self, EnrichmentError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(EnrichmentError::Http)?;

        Ok(Self {
            http,
            captioning_url,
            detection_url,
            summarization_url,
        })
    }

    fn image_form(file_name: &str, image_bytes: &[u8]) -> Result<Form, EnrichmentError> {
        let part = Part::bytes(image_bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str("image/jpeg")
            .map_err(EnrichmentError::Http)?;
        Ok(Form::new().part("file", part))
    }

    /// Ask the captioning server to describe the image.
    pub async fn caption(&self, file_name: &str, image_bytes: &[u8]) -> Result<String, EnrichmentError> {
        let form = Self::image_form(file_name, image_bytes)?;
        let response = self
            .http
            .post(&self.captioning_url)
            .multipart(form)
            .send()
            .await
            .map_err(EnrichmentError::Http)?
            .error_for_status()
            .map_err(EnrichmentError::Http)?;

        let body: CaptionResponse = response.json().await.map_err(EnrichmentError::Http)?;
        Ok(body.caption)
    }

    /// Ask the detection server for labeled objects in the image.
    pub async fn detect(
        &self,
        file_name: &str,
        image_bytes: &[u8],
    ) -> Result<Vec<DetectedObject>, EnrichmentError> {
        let form = Self::image_form(file_name, image_bytes)?;
        let response = self
            .http
            .post(&self.detection_url)
            .multipart(form)
            .send()
            .await
            .map_err(EnrichmentError::Http)?
            .error_for_status()
            .map_err(EnrichmentError::Http)?;

        let body: DetectionResponse = response.json().await.map_err(EnrichmentError::Http)?;
        Ok(body.objects)
    }

    /// Ask the summarization server for generated text. The server returns a
    /// list of sequences; only the first non-empty one is used.
    pub async fn summarize(&self, prompt: &str, max_length: u32) -> Result<String, EnrichmentError> {
        let request = SummarizationRequest {
            prompt,
            max_length,
            num_return_sequences: 1,
        };

        let response = self
            .http
            .post(&self.summarization_url)
            .json(&request)
            .send()
            .await
            .map_err(EnrichmentError::Http)?
            .error_for_status()
            .map_err(EnrichmentError::Http)?;

        let sequences: Vec<String> = response.json().await.map_err(EnrichmentError::Http)?;
        sequences
            .into_iter()
            .find(|s| !s.is_empty())
            .ok_or(EnrichmentError::EmptyResult)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("Model server request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Model server returned no usable sequences")]
    EmptyResult,
}
