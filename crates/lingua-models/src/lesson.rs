//! Lesson script types produced by content analysis.
//!
//! The script is structurally typed but semantically opaque: the pipeline
//! never interprets the teaching content, only its shape. Malformed scripts
//! are rejected at this boundary rather than propagated downstream.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One narration unit of a lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LessonSegment {
    /// Stable identifier, shared by the audio and image artifacts for this unit
    pub id: u32,

    /// Narration text in the target language
    pub text: String,

    /// Optional translation shown alongside the narration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,

    /// Topics this segment touches, used for scene mining
    #[serde(default)]
    pub topics: Vec<String>,
}

/// A generated language lesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LessonScript {
    /// Lesson title
    pub title: String,

    /// Short lesson description
    #[serde(default)]
    pub description: String,

    /// Ordered narration segments
    pub segments: Vec<LessonSegment>,

    /// Lesson-level topics
    #[serde(default)]
    pub topics: Vec<String>,

    /// Vocabulary items the lesson teaches
    #[serde(default)]
    pub vocabulary: Vec<String>,
}

impl LessonScript {
    /// All lesson text in one string: title, description, segment narration
    /// and topics. This is the corpus scene classification scores against.
    pub fn combined_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.segments.len() + self.topics.len() + 2);
        parts.push(self.title.as_str());
        parts.push(self.description.as_str());
        for segment in &self.segments {
            parts.push(segment.text.as_str());
        }
        for topic in &self.topics {
            parts.push(topic.as_str());
        }
        parts.join(" ")
    }

    /// Validate the script shape.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("lesson title cannot be empty".to_string());
        }
        if self.segments.is_empty() {
            return Err("lesson must contain at least one segment".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for segment in &self.segments {
            if segment.text.trim().is_empty() {
                return Err(format!("segment {} has empty narration text", segment.id));
            }
            if !seen.insert(segment.id) {
                return Err(format!("duplicate segment id {}", segment.id));
            }
        }
        Ok(())
    }

    /// Total number of topic mentions across all segments.
    pub fn topic_mention_count(&self) -> usize {
        self.segments.iter().map(|s| s.topics.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_script() -> LessonScript {
        LessonScript {
            title: "Ordering food".to_string(),
            description: "Essential phrases for a restaurant visit".to_string(),
            segments: vec![
                LessonSegment {
                    id: 1,
                    text: "La cuenta, por favor".to_string(),
                    translation: Some("The check, please".to_string()),
                    topics: vec!["restaurant".to_string(), "payment".to_string()],
                },
                LessonSegment {
                    id: 2,
                    text: "Una mesa para dos".to_string(),
                    translation: Some("A table for two".to_string()),
                    topics: vec!["restaurant".to_string()],
                },
            ],
            topics: vec!["food".to_string(), "dining".to_string()],
            vocabulary: vec!["cuenta".to_string(), "mesa".to_string()],
        }
    }

    #[test]
    fn test_combined_text_includes_all_sources() {
        let text = sample_script().combined_text();
        assert!(text.contains("Ordering food"));
        assert!(text.contains("restaurant visit"));
        assert!(text.contains("La cuenta"));
        assert!(text.contains("dining"));
    }

    #[test]
    fn test_validate_rejects_empty_segments() {
        let mut script = sample_script();
        script.segments.clear();
        assert!(script.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut script = sample_script();
        script.segments[1].id = 1;
        let err = script.validate().unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_validate_rejects_blank_narration() {
        let mut script = sample_script();
        script.segments[0].text = "  ".to_string();
        assert!(script.validate().is_err());
    }

    #[test]
    fn test_topic_mention_count() {
        assert_eq!(sample_script().topic_mention_count(), 3);
    }

    #[test]
    fn test_script_deserializes_with_defaults() {
        let json = r#"{"title":"Greetings","segments":[{"id":1,"text":"Hola"}]}"#;
        let script: LessonScript = serde_json::from_str(json).unwrap();
        assert!(script.description.is_empty());
        assert!(script.topics.is_empty());
        assert!(script.segments[0].topics.is_empty());
        assert!(script.validate().is_ok());
    }
}
