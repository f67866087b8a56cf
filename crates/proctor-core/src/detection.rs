use serde::{Deserialize, Serialize};

/// A normalized landmark point produced by the face landmarker.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// A named facial expression signal and its score in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlendShapeCategory {
    pub category_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub score: f32,
}

impl BlendShapeCategory {
    pub fn new(category_name: impl Into<String>, score: f32) -> Self {
        Self {
            category_name: category_name.into(),
            display_name: None,
            score,
        }
    }

    /// Label shown to the user: display name when the model provides one.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.category_name)
    }
}

/// One detected face.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedFace {
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    #[serde(default)]
    pub blend_shapes: Vec<BlendShapeCategory>,
}

impl DetectedFace {
    /// Score of the named blend-shape category, if the model reported it.
    pub fn blend_shape_score(&self, category_name: &str) -> Option<f32> {
        self.blend_shapes
            .iter()
            .find(|shape| shape.category_name == category_name)
            .map(|shape| shape.score)
    }
}

/// Landmarker output for one frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceLandmarkerResult {
    #[serde(default)]
    pub faces: Vec<DetectedFace>,
}

impl FaceLandmarkerResult {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Blend shapes of the first detected face, empty when there is none.
    pub fn primary_blend_shapes(&self) -> &[BlendShapeCategory] {
        self.faces
            .first()
            .map(|face| face.blend_shapes.as_slice())
            .unwrap_or(&[])
    }
}
