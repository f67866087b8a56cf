//! Indicator rules: the fixed threshold table consulted every frame.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::SimilarityMetric;

/// Category name of the rule compared against the embedding similarity
/// rather than a blend-shape score.
pub const SIMILARITY_CATEGORY: &str = "faceSimilarity";

/// A threshold on one named signal and the message shown when it trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRule {
    pub category_name: String,
    pub score: f32,
    pub message: String,
}

impl IndicatorRule {
    pub fn new(category_name: &str, score: f32, message: &str) -> Self {
        Self {
            category_name: category_name.to_string(),
            score,
            message: message.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("failed to read rule file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid rule file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate rule for category '{0}'")]
    DuplicateCategory(String),
    #[error("threshold {score} for '{category}' is out of range")]
    ScoreOutOfRange { category: String, score: f32 },
    #[error("rule for '{0}' has an empty message")]
    EmptyMessage(String),
}

/// On-disk layout of a rule file.
#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    metric: SimilarityMetric,
    #[serde(default, rename = "indicator")]
    indicators: Vec<IndicatorRule>,
}

/// Validated, immutable rule table.
///
/// Blend-shape rules keep their configured order; evaluation follows it.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    metric: SimilarityMetric,
    blend_shape: Vec<IndicatorRule>,
    similarity: Option<IndicatorRule>,
}

impl RuleSet {
    /// Build a rule set, splitting out the similarity rule.
    pub fn new(metric: SimilarityMetric, rules: Vec<IndicatorRule>) -> Result<Self, RuleError> {
        let mut seen = HashSet::new();
        let mut blend_shape = Vec::with_capacity(rules.len());
        let mut similarity = None;

        for rule in rules {
            if !seen.insert(rule.category_name.clone()) {
                return Err(RuleError::DuplicateCategory(rule.category_name));
            }
            if rule.message.trim().is_empty() {
                return Err(RuleError::EmptyMessage(rule.category_name));
            }

            let is_similarity = rule.category_name == SIMILARITY_CATEGORY;
            let in_range = if is_similarity && metric == SimilarityMetric::Euclidean {
                rule.score.is_finite() && rule.score >= 0.0
            } else {
                rule.score.is_finite() && (0.0..=1.0).contains(&rule.score)
            };
            if !in_range {
                return Err(RuleError::ScoreOutOfRange {
                    category: rule.category_name,
                    score: rule.score,
                });
            }

            if is_similarity {
                similarity = Some(rule);
            } else {
                blend_shape.push(rule);
            }
        }

        Ok(Self {
            metric,
            blend_shape,
            similarity,
        })
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, RuleError> {
        let file: RuleFile = toml::from_str(contents)?;
        Self::new(file.metric, file.indicators)
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let rules = Self::from_toml_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            blend_shape_rules = rules.blend_shape.len(),
            similarity_rule = rules.similarity.is_some(),
            metric = %rules.metric,
            "indicator rules loaded"
        );
        Ok(rules)
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn blend_shape_rules(&self) -> &[IndicatorRule] {
        &self.blend_shape
    }

    pub fn similarity_rule(&self) -> Option<&IndicatorRule> {
        self.similarity.as_ref()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        const LOOKING_AWAY: &str =
            "Looking away from the screen. Please keep your eyes on the quiz";
        Self {
            metric: SimilarityMetric::Cosine,
            blend_shape: vec![
                IndicatorRule::new("eyeLookOutLeft", 0.6, LOOKING_AWAY),
                IndicatorRule::new("eyeLookOutRight", 0.6, LOOKING_AWAY),
                IndicatorRule::new(
                    "eyeLookUpLeft",
                    0.6,
                    "Looking up. Please keep your eyes on the quiz",
                ),
                IndicatorRule::new(
                    "eyeLookDownLeft",
                    0.6,
                    "Looking down. Please keep your eyes on the quiz",
                ),
                IndicatorRule::new(
                    "jawOpen",
                    0.5,
                    "Talking detected. Please stay silent during the quiz",
                ),
            ],
            similarity: Some(IndicatorRule::new(
                SIMILARITY_CATEGORY,
                0.9,
                "Face does not match the uploaded image",
            )),
        }
    }
}
