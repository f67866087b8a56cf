//! Maps one frame's model output through the rule table to alert messages.

use serde::Serialize;

use crate::detection::BlendShapeCategory;
use crate::log::ActivityLog;
use crate::rules::RuleSet;

pub const NO_FACE_MESSAGE: &str = "No face detected. Please ensure your face is visible";
pub const MULTIPLE_FACES_MESSAGE: &str =
    "Multiple faces detected. Please ensure only one face is visible";
pub const VALIDATED_MESSAGE: &str = "validate image is completed";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    NoFace,
    MultipleFaces { count: usize },
    Indicator { category: String, score: f32 },
    IdentityMismatch { similarity: f32 },
    Validated { similarity: f32 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    #[serde(flatten)]
    pub kind: AlertKind,
    pub message: String,
}

/// What the evaluator needs to know about a frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameObservation<'a> {
    pub face_count: usize,
    /// Blend shapes of the (single) detected face.
    pub blend_shapes: &'a [BlendShapeCategory],
    /// Similarity against the reference embedding, when one is stored and
    /// the live frame could be embedded.
    pub similarity: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator {
    rules: RuleSet,
}

impl RuleEvaluator {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Every alert that qualifies for this frame, in emission order:
    /// presence checks, blend-shape rules in configured order, then the
    /// similarity check.
    pub fn evaluate(&self, observation: &FrameObservation<'_>) -> Vec<Alert> {
        let mut alerts = Vec::new();

        match observation.face_count {
            0 => alerts.push(Alert {
                kind: AlertKind::NoFace,
                message: NO_FACE_MESSAGE.to_string(),
            }),
            1 => {
                for rule in self.rules.blend_shape_rules() {
                    let Some(shape) = observation
                        .blend_shapes
                        .iter()
                        .find(|shape| shape.category_name == rule.category_name)
                    else {
                        continue;
                    };
                    if shape.score > rule.score {
                        alerts.push(Alert {
                            kind: AlertKind::Indicator {
                                category: rule.category_name.clone(),
                                score: shape.score,
                            },
                            message: rule.message.clone(),
                        });
                    }
                }
            }
            count => alerts.push(Alert {
                kind: AlertKind::MultipleFaces { count },
                message: MULTIPLE_FACES_MESSAGE.to_string(),
            }),
        }

        if let (Some(similarity), Some(rule)) =
            (observation.similarity, self.rules.similarity_rule())
        {
            if self.rules.metric().is_mismatch(similarity, rule.score) {
                alerts.push(Alert {
                    kind: AlertKind::IdentityMismatch { similarity },
                    message: rule.message.clone(),
                });
            } else {
                alerts.push(Alert {
                    kind: AlertKind::Validated { similarity },
                    message: VALIDATED_MESSAGE.to_string(),
                });
            }
        }

        alerts
    }

    /// Push each alert to the log in order. Returns how many were added.
    pub fn record(alerts: &[Alert], log: &mut ActivityLog) -> usize {
        alerts
            .iter()
            .filter(|alert| log.push(&alert.message))
            .count()
    }
}
