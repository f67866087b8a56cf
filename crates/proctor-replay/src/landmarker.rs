use proctor_core::{FaceLandmarker, FaceLandmarkerResult, ModelError, RunningMode};

use crate::trace::TraceFrame;

/// Landmarker that returns the faces recorded in the trace.
///
/// Starts in image mode like a freshly created model and rejects video
/// detection until switched.
#[derive(Debug)]
pub struct ReplayLandmarker {
    mode: RunningMode,
}

impl ReplayLandmarker {
    pub fn new() -> Self {
        Self {
            mode: RunningMode::Image,
        }
    }
}

impl Default for ReplayLandmarker {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceLandmarker<TraceFrame> for ReplayLandmarker {
    fn running_mode(&self) -> RunningMode {
        self.mode
    }

    fn set_running_mode(&mut self, mode: RunningMode) -> Result<(), ModelError> {
        self.mode = mode;
        Ok(())
    }

    fn detect_for_video(
        &mut self,
        frame: &TraceFrame,
        _timestamp_ms: f64,
    ) -> Result<FaceLandmarkerResult, ModelError> {
        if self.mode != RunningMode::Video {
            return Err(ModelError::WrongMode {
                expected: RunningMode::Video,
                actual: self.mode,
            });
        }
        Ok(FaceLandmarkerResult {
            faces: frame.faces.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::DetectedFace;

    fn frame(faces: usize) -> TraceFrame {
        TraceFrame {
            timestamp_ms: 0.0,
            faces: vec![DetectedFace::default(); faces],
            embedding: None,
            image: None,
        }
    }

    #[test]
    fn test_rejects_video_detection_in_image_mode() {
        let mut landmarker = ReplayLandmarker::new();
        let err = landmarker.detect_for_video(&frame(1), 0.0).unwrap_err();
        assert!(matches!(err, ModelError::WrongMode { .. }));
    }

    #[test]
    fn test_returns_recorded_faces() {
        let mut landmarker = ReplayLandmarker::new();
        landmarker.set_running_mode(RunningMode::Video).unwrap();
        let result = landmarker.detect_for_video(&frame(2), 0.0).unwrap();
        assert_eq!(result.face_count(), 2);
    }
}
