//! Drawing target for landmark overlays and the blend-shape view.

use serde::Serialize;

use crate::detection::FaceLandmarkerResult;

/// Display surface that renders the most recent detection result.
pub trait Overlay {
    fn draw(&mut self, result: &FaceLandmarkerResult);
}

/// Overlay that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOverlay;

impl Overlay for NullOverlay {
    fn draw(&mut self, _result: &FaceLandmarkerResult) {}
}

impl<O: Overlay + ?Sized> Overlay for &mut O {
    fn draw(&mut self, result: &FaceLandmarkerResult) {
        (**self).draw(result);
    }
}

/// One row of the blend-shape view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlendShapeRow {
    pub label: String,
    pub score: f32,
    /// Score rendered with four decimals.
    pub display: String,
}

/// Rows for the first detected face, in model output order.
pub fn blend_shape_rows(result: &FaceLandmarkerResult) -> Vec<BlendShapeRow> {
    result
        .primary_blend_shapes()
        .iter()
        .map(|shape| BlendShapeRow {
            label: shape.label().to_string(),
            score: shape.score,
            display: format!("{:.4}", shape.score),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BlendShapeCategory, DetectedFace};

    #[test]
    fn test_rows_use_first_face_only() {
        let result = FaceLandmarkerResult {
            faces: vec![
                DetectedFace {
                    landmarks: vec![],
                    blend_shapes: vec![BlendShapeCategory::new("jawOpen", 0.123456)],
                },
                DetectedFace {
                    landmarks: vec![],
                    blend_shapes: vec![BlendShapeCategory::new("eyeBlinkLeft", 0.9)],
                },
            ],
        };
        let rows = blend_shape_rows(&result);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "jawOpen");
        assert_eq!(rows[0].display, "0.1235");
    }

    #[test]
    fn test_rows_empty_without_faces() {
        assert!(blend_shape_rows(&FaceLandmarkerResult::default()).is_empty());
    }
}
