//! Scene classification types.
//!
//! A scene is a situational-context hypothesis ("restaurant", "travel") used
//! to steer content generation and image prompts. Candidates are computed
//! fresh per classification call and never persisted; only their derivatives
//! (generated content, prompts) are.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A catalog entry the classifier scores lessons against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ScenePattern {
    /// Scene name
    pub name: String,

    /// Keywords whose presence in the lesson text indicates this scene
    pub keywords: Vec<String>,

    /// Cultural context attached to content generated for this scene
    pub cultural_context: String,

    /// Concrete situations the scene covers
    pub situations: Vec<String>,
}

/// A ranked hypothesis about the lesson's situational context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneCandidate {
    /// Scene name
    pub name: String,

    /// Match confidence in `[0, 1]`
    pub confidence: f64,

    /// Keywords that actually occurred in the lesson text
    pub matched_keywords: Vec<String>,

    /// Cultural context inherited from the pattern (empty for mined scenes)
    pub cultural_notes: String,

    /// Situations inherited from the pattern or synthesized from topics
    pub situations: Vec<String>,
}

/// Ranked classification output: the top candidates drive the main generated
/// content, the next few serve as fallback material.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneReport {
    /// Highest-confidence scenes (at most 2)
    pub primary: Vec<SceneCandidate>,

    /// Fallback scenes (at most 3)
    pub secondary: Vec<SceneCandidate>,
}

impl SceneReport {
    /// The single best candidate, if any scene matched at all.
    pub fn top_scene(&self) -> Option<&SceneCandidate> {
        self.primary.first()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }

    /// All candidates in rank order.
    pub fn iter(&self) -> impl Iterator<Item = &SceneCandidate> {
        self.primary.iter().chain(self.secondary.iter())
    }
}
