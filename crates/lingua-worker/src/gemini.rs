//! Gemini content-analysis capability.
//!
//! Derives a lesson script from a source video by prompting the Gemini API
//! with the caller's preferences and the catalog scene names as steering
//! hints. Responses are requested as JSON and validated at this boundary;
//! a malformed script never propagates into the pipeline.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use async_trait::async_trait;
use lingua_models::{LessonPreferences, LessonScript};

use crate::capabilities::ContentAnalyzer;
use crate::classifier;
use crate::error::{WorkerError, WorkerResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini-backed content analyzer.
pub struct GeminiAnalyzer {
    api_key: String,
    base_url: String,
    models: Vec<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

impl GeminiAnalyzer {
    /// Create an analyzer with the API key from the environment.
    pub fn new() -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::config_error("GEMINI_API_KEY not set"))?;
        Ok(Self::with_api_key(api_key))
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.5-flash-lite".to_string(),
                "gemini-2.5-pro".to_string(),
            ],
            client: Client::new(),
        }
    }

    /// Point the client at a different API host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the model fallback list.
    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    fn build_prompt(&self, source_url: &str, preferences: &LessonPreferences) -> String {
        let scene_hints = classifier::scene_names().join(", ");
        format!(
            r#"You are a language teacher creating a short video lesson from this source video: {source_url}

Write the lesson for a {audience} learner. Each narration segment should take about {duration:.0} seconds to read aloud.

Where it fits the material, frame the lesson around one of these situational contexts: {scene_hints}.

Return ONLY a single JSON object with this schema:
{{
  "title": "Lesson title",
  "description": "One-sentence description",
  "segments": [
    {{
      "id": 1,
      "text": "Narration text in the target language",
      "translation": "English translation",
      "topics": ["topic"]
    }}
  ],
  "topics": ["lesson-level topic"],
  "vocabulary": ["key word or phrase"]
}}

Additional instructions:
- Return ONLY a single JSON object and nothing else.
- Give every segment a unique numeric id starting at 1.
- Include 4 to 10 segments.
- Tag each segment with 1-3 lowercase topics."#,
            source_url = source_url,
            audience = preferences.audience.as_str(),
            duration = preferences.target_segment_duration_secs,
            scene_hints = scene_hints,
        )
    }

    async fn call_model(&self, model: &str, prompt: &str) -> WorkerResult<LessonScript> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::content_failed(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::content_failed(format!(
                "Gemini returned {}: {}",
                status, body
            )));
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::content_failed(format!("malformed Gemini response: {}", e)))?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| WorkerError::content_failed("no content in Gemini response"))?;

        parse_script(text)
    }
}

/// Parse the model's JSON payload, tolerating markdown code fences, and
/// reject scripts that fail shape validation.
fn parse_script(text: &str) -> WorkerResult<LessonScript> {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);

    let script: LessonScript = serde_json::from_str(text.trim())
        .map_err(|e| WorkerError::content_failed(format!("failed to parse lesson JSON: {}", e)))?;
    script.validate().map_err(WorkerError::ContentFailed)?;
    Ok(script)
}

#[async_trait]
impl ContentAnalyzer for GeminiAnalyzer {
    async fn analyze(
        &self,
        source_url: &str,
        preferences: &LessonPreferences,
    ) -> WorkerResult<LessonScript> {
        let prompt = self.build_prompt(source_url, preferences);

        let mut last_error = None;
        for model in &self.models {
            match self.call_model(model, &prompt).await {
                Ok(script) => {
                    info!(model = model.as_str(), segments = script.segments.len(), "generated lesson script");
                    return Ok(script);
                }
                Err(e) => {
                    warn!(model = model.as_str(), error = %e, "lesson generation attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| WorkerError::content_failed("no Gemini models configured")))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn lesson_json() -> serde_json::Value {
        json!({
            "title": "Ordering food",
            "description": "Restaurant phrases",
            "segments": [
                {"id": 1, "text": "La cuenta, por favor", "translation": "The check, please", "topics": ["restaurant"]},
                {"id": 2, "text": "Una mesa para dos", "topics": ["restaurant"]}
            ],
            "topics": ["dining"],
            "vocabulary": ["cuenta"]
        })
    }

    fn gemini_body(text: String) -> serde_json::Value {
        json!({
            "candidates": [
                {"content": {"parts": [{"text": text}]}}
            ]
        })
    }

    fn analyzer(server: &MockServer, models: &[&str]) -> GeminiAnalyzer {
        GeminiAnalyzer::with_api_key("test-key")
            .with_base_url(server.uri())
            .with_models(models.iter().map(|m| m.to_string()).collect())
    }

    #[tokio::test]
    async fn test_analyze_parses_script() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/m1:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(gemini_body(lesson_json().to_string())),
            )
            .mount(&server)
            .await;

        let script = analyzer(&server, &["m1"])
            .analyze("https://example.com/v", &LessonPreferences::default())
            .await
            .unwrap();
        assert_eq!(script.title, "Ordering food");
        assert_eq!(script.segments.len(), 2);
    }

    #[tokio::test]
    async fn test_analyze_falls_back_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/m1:generateContent"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/m2:generateContent"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(gemini_body(lesson_json().to_string())),
            )
            .mount(&server)
            .await;

        let script = analyzer(&server, &["m1", "m2"])
            .analyze("https://example.com/v", &LessonPreferences::default())
            .await
            .unwrap();
        assert_eq!(script.segments.len(), 2);
    }

    #[tokio::test]
    async fn test_all_models_failing_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = analyzer(&server, &["m1", "m2"])
            .analyze("https://example.com/v", &LessonPreferences::default())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_parse_script_strips_code_fences() {
        let wrapped = format!("```json\n{}\n```", lesson_json());
        let script = parse_script(&wrapped).unwrap();
        assert_eq!(script.segments.len(), 2);
    }

    #[test]
    fn test_parse_script_rejects_invalid_shape() {
        let empty = json!({"title": "x", "segments": []}).to_string();
        assert!(parse_script(&empty).is_err());
    }
}
