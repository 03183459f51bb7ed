//! Scene classification.
//!
//! Scores lesson content against a catalog of situational scene patterns and
//! additionally mines co-occurring topic pairs into ad-hoc candidates, so the
//! system can recognize contexts the static catalog never anticipated. The
//! ranked output steers content generation and image prompts.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use lingua_models::{LessonScript, SceneCandidate, ScenePattern, SceneReport};

/// Minimum raw pattern score for a catalog candidate to be retained.
const INCLUSION_THRESHOLD: f64 = 0.1;

/// Minimum normalized co-occurrence frequency for a mined topic pair.
const MINING_THRESHOLD: f64 = 0.15;

/// Candidates driving the main generated content.
const PRIMARY_COUNT: usize = 2;

/// Fallback candidates behind the primary scenes.
const SECONDARY_COUNT: usize = 3;

struct CatalogEntry {
    name: &'static str,
    keywords: &'static [&'static str],
    cultural_context: &'static str,
    situations: &'static [&'static str],
}

/// Built-in scene patterns. Kept as data, not code: keywords are lowercase
/// and matched against the lowercased lesson text.
const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "restaurant",
        keywords: &["restaurant", "menu", "waiter", "order", "dish", "bill", "reservation"],
        cultural_context: "Tipping customs and table manners vary widely; in many countries the bill is only brought when asked.",
        situations: &["ordering a meal", "asking for the bill", "making a reservation"],
    },
    CatalogEntry {
        name: "travel",
        keywords: &["airport", "flight", "ticket", "luggage", "passport", "boarding", "platform"],
        cultural_context: "Announcements are often made only in the local language; key transit vocabulary matters most.",
        situations: &["checking in for a flight", "buying a train ticket", "asking about delays"],
    },
    CatalogEntry {
        name: "shopping",
        keywords: &["shop", "store", "price", "discount", "cash", "receipt", "size"],
        cultural_context: "Haggling is expected in markets in some regions and considered rude in others.",
        situations: &["asking for a price", "trying on clothes", "requesting a refund"],
    },
    CatalogEntry {
        name: "directions",
        keywords: &["street", "map", "left", "right", "corner", "block", "crossing"],
        cultural_context: "Locals often give directions by landmarks rather than street names.",
        situations: &["asking the way", "understanding a route description"],
    },
    CatalogEntry {
        name: "hotel",
        keywords: &["hotel", "room", "check-in", "lobby", "reception", "booking", "key"],
        cultural_context: "Check-in commonly requires a passport; breakfast arrangements differ by country.",
        situations: &["checking in", "reporting a problem with the room", "asking for late checkout"],
    },
    CatalogEntry {
        name: "greetings",
        keywords: &["hello", "goodbye", "introduce", "name", "meet", "welcome"],
        cultural_context: "Formal and informal address forms differ; using the wrong register can offend.",
        situations: &["meeting someone new", "introducing yourself", "saying goodbye politely"],
    },
    CatalogEntry {
        name: "medical",
        keywords: &["doctor", "pharmacy", "hospital", "appointment", "pain", "prescription"],
        cultural_context: "Pharmacists handle many minor complaints directly in much of the world.",
        situations: &["describing symptoms", "buying medicine", "booking an appointment"],
    },
    CatalogEntry {
        name: "workplace",
        keywords: &["office", "meeting", "colleague", "email", "schedule", "deadline"],
        cultural_context: "Meeting punctuality norms and small talk expectations differ sharply between cultures.",
        situations: &["joining a meeting", "writing a short email", "scheduling with a colleague"],
    },
];

/// The built-in catalog as owned pattern values.
pub fn builtin_catalog() -> Vec<ScenePattern> {
    CATALOG
        .iter()
        .map(|entry| ScenePattern {
            name: entry.name.to_string(),
            keywords: entry.keywords.iter().map(|k| k.to_string()).collect(),
            cultural_context: entry.cultural_context.to_string(),
            situations: entry.situations.iter().map(|s| s.to_string()).collect(),
        })
        .collect()
}

/// Names of the built-in scenes, in catalog order.
pub fn scene_names() -> Vec<&'static str> {
    CATALOG.iter().map(|entry| entry.name).collect()
}

/// Scores lessons against scene patterns.
pub struct SceneClassifier {
    catalog: Vec<ScenePattern>,
}

impl Default for SceneClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneClassifier {
    /// Classifier over the built-in catalog.
    pub fn new() -> Self {
        Self {
            catalog: builtin_catalog(),
        }
    }

    /// Classifier over a custom catalog.
    pub fn with_catalog(catalog: Vec<ScenePattern>) -> Self {
        Self { catalog }
    }

    /// Rank scene candidates for a lesson.
    ///
    /// Static catalog candidates come first in catalog order, mined
    /// candidates after them in lexicographic pair order; the sort by
    /// confidence is stable, so ties resolve deterministically in exactly
    /// that order.
    pub fn classify(&self, script: &LessonScript) -> SceneReport {
        let text = script.combined_text().to_lowercase();

        let mut candidates: Vec<SceneCandidate> = self
            .catalog
            .iter()
            .filter_map(|pattern| score_pattern(pattern, &text, script))
            .collect();
        candidates.extend(mine_topic_pairs(script));

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut report = SceneReport::default();
        for (rank, candidate) in candidates.into_iter().enumerate() {
            if rank < PRIMARY_COUNT {
                report.primary.push(candidate);
            } else if rank < PRIMARY_COUNT + SECONDARY_COUNT {
                report.secondary.push(candidate);
            } else {
                break;
            }
        }

        debug!(
            primary = report.primary.len(),
            secondary = report.secondary.len(),
            top = report.top_scene().map(|c| c.name.as_str()).unwrap_or("-"),
            "classified lesson scenes"
        );
        report
    }
}

/// Score one catalog pattern against the lesson text.
///
/// ```text
/// score = keyword_hits / |keywords|
///       + 0.5 * topic_substring_hits
///       + 0.3 * vocabulary_substring_hits
/// confidence = min(score / |keywords|, 1.0)
/// ```
///
/// The inclusion threshold applies to the raw score, before normalization,
/// so a pattern whose keywords all hit is retained for any catalog size.
fn score_pattern(
    pattern: &ScenePattern,
    text_lower: &str,
    script: &LessonScript,
) -> Option<SceneCandidate> {
    if pattern.keywords.is_empty() {
        return None;
    }

    let matched_keywords: Vec<String> = pattern
        .keywords
        .iter()
        .filter(|keyword| text_lower.contains(keyword.to_lowercase().as_str()))
        .cloned()
        .collect();

    let keyword_count = pattern.keywords.len() as f64;
    let topic_hits = substring_hits(&script.topics, &pattern.keywords);
    let vocabulary_hits = substring_hits(&script.vocabulary, &pattern.keywords);

    let score = matched_keywords.len() as f64 / keyword_count
        + 0.5 * topic_hits as f64
        + 0.3 * vocabulary_hits as f64;

    if score <= INCLUSION_THRESHOLD {
        return None;
    }

    Some(SceneCandidate {
        name: pattern.name.clone(),
        confidence: (score / keyword_count).min(1.0),
        matched_keywords,
        cultural_notes: pattern.cultural_context.clone(),
        situations: pattern.situations.clone(),
    })
}

/// Count terms that substring-match any pattern keyword in either direction.
fn substring_hits(terms: &[String], keywords: &[String]) -> usize {
    terms
        .iter()
        .filter(|term| {
            let term = term.to_lowercase();
            !term.is_empty()
                && keywords.iter().any(|keyword| {
                    let keyword = keyword.to_lowercase();
                    keyword.contains(&term) || term.contains(&keyword)
                })
        })
        .count()
}

/// Mine co-occurring topic pairs into ad-hoc scene candidates.
///
/// A pair of topics appearing together in a segment counts one co-occurrence;
/// pairs whose count, normalized by the lesson's total topic mentions,
/// exceeds the mining threshold become candidates. `BTreeMap` keeps pair
/// order deterministic across runs.
fn mine_topic_pairs(script: &LessonScript) -> Vec<SceneCandidate> {
    let total_topics = script.topic_mention_count();
    if total_topics == 0 {
        return Vec::new();
    }

    let mut pairs: BTreeMap<(String, String), usize> = BTreeMap::new();
    for segment in &script.segments {
        let mut topics: Vec<String> = segment.topics.iter().map(|t| t.to_lowercase()).collect();
        topics.sort();
        topics.dedup();
        for i in 0..topics.len() {
            for j in (i + 1)..topics.len() {
                *pairs
                    .entry((topics[i].clone(), topics[j].clone()))
                    .or_insert(0) += 1;
            }
        }
    }

    pairs
        .into_iter()
        .filter_map(|((first, second), count)| {
            let frequency = count as f64 / total_topics as f64;
            if frequency <= MINING_THRESHOLD {
                return None;
            }
            Some(SceneCandidate {
                name: format!("{} & {}", first, second),
                confidence: frequency.min(1.0),
                matched_keywords: vec![first.clone(), second.clone()],
                cultural_notes: String::new(),
                situations: vec![format!("conversation involving {} and {}", first, second)],
            })
        })
        .collect()
}
