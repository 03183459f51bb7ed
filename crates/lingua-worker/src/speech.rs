//! REST text-to-speech capability.
//!
//! Speaks one segment's narration text against a JSON-over-HTTP synthesis
//! service that returns base64 audio and the measured playback duration.
//! Transient failures (transport errors, 5xx) retry with backoff; anything
//! else surfaces as a per-item synthesis failure.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use async_trait::async_trait;

use crate::capabilities::{SpeechSynthesizer, SynthesizedAudio};
use crate::error::{WorkerError, WorkerResult};
use crate::retry::{retry_async, RetryPolicy};

/// Text-to-speech client for a REST synthesis service.
pub struct RestSpeechClient {
    endpoint: String,
    client: Client,
    retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SpeechResponse {
    /// Base64-encoded audio payload
    audio_content: String,
    /// Playback duration measured by the service
    duration_secs: f64,
}

impl RestSpeechClient {
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

    async fn request(&self, text: &str, voice: Option<&str>) -> WorkerResult<SpeechResponse> {
        let request = SpeechRequest { text, voice };
        let response = self
            .client
            .post(format!("{}/v1/speech", self.endpoint))
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
impl SpeechSynthesizer for RestSpeechClient {
    async fn synthesize(&self, text: &str, voice: Option<&str>) -> WorkerResult<SynthesizedAudio> {
        let response = retry_async(&self.retry, "speech_synthesize", || {
            self.request(text, voice)
        })
        .await?;

        let bytes = BASE64.decode(&response.audio_content).map_err(|e| {
            WorkerError::synthesis_failed(format!("speech service sent invalid base64: {}", e))
        })?;
        if bytes.is_empty() {
            return Err(WorkerError::synthesis_failed(
                "speech service returned empty audio",
            ));
        }

        debug!(
            chars = text.len(),
            bytes = bytes.len(),
            duration_secs = response.duration_secs,
            "synthesized narration audio"
        );
        Ok(SynthesizedAudio {
            bytes,
            duration_secs: response.duration_secs,
        })
    }

    fn name(&self) -> &'static str {
        "rest_speech"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(2)
            .with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_synthesize_decodes_audio() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audio_content": BASE64.encode(b"mp3 bytes"),
                "duration_secs": 4.2
            })))
            .mount(&server)
            .await;

        let client = RestSpeechClient::new(server.uri()).with_retry(fast_retry());
        let audio = client.synthesize("Hola", None).await.unwrap();
        assert_eq!(audio.bytes, b"mp3 bytes");
        assert!((audio.duration_secs - 4.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_voice_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .and(body_json_string(
                json!({"text": "Hola", "voice": "es-female-1"}).to_string(),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audio_content": BASE64.encode(b"x"),
                "duration_secs": 1.0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestSpeechClient::new(server.uri()).with_retry(fast_retry());
        client.synthesize("Hola", Some("es-female-1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_5xx_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audio_content": BASE64.encode(b"ok"),
                "duration_secs": 2.0
            })))
            .mount(&server)
            .await;

        let client = RestSpeechClient::new(server.uri()).with_retry(fast_retry());
        let audio = client.synthesize("Hola", None).await.unwrap();
        assert_eq!(audio.bytes, b"ok");
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/speech"))
            .respond_with(ResponseTemplate::new(400).set_body_string("text too long"))
            .expect(1)
            .mount(&server)
            .await;

        let client = RestSpeechClient::new(server.uri()).with_retry(fast_retry());
        let err = client.synthesize("Hola", None).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(!err.is_retryable());
    }
}
