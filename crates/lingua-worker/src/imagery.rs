//! REST text-to-image capability.
//!
//! Same construction as the speech client: JSON request, base64 payload in
//! the response, backoff on transient failures.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use async_trait::async_trait;

use crate::capabilities::ImageSynthesizer;
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryPolicy};

/// Text-to-image client for a REST synthesis service.
pub struct RestImageClient {
    endpoint: String,
    client: Client,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    /// Base64-encoded image payload
    image_content: String,
}

impl RestImageClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn request(&self, prompt: &str) -> WorkerResult<ImageResponse> {
        let request = ImageRequest { prompt };
        let response = self
            .client
            .post(format!("{}/v1/images", self.endpoint))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WorkerError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ImageSynthesizer for RestImageClient {
    async fn synthesize(&self, prompt: &str) -> WorkerResult<Vec<u8>> {
        let response = retry_async(&self.retry, "image_synthesize", || self.request(prompt)).await?;

        let bytes = BASE64.decode(&response.image_content).map_err(|e| {
            WorkerError::synthesis_failed(format!("image service sent invalid base64: {}", e))
        })?;
        if bytes.is_empty() {
            return Err(WorkerError::synthesis_failed(
                "image service returned empty image",
            ));
        }

        debug!(prompt_chars = prompt.len(), bytes = bytes.len(), "synthesized illustration");
        Ok(bytes)
    }

    fn name(&self) -> &'static str {
        "rest_image"
    }
}
