//! Collaborator traits for the capture device and the external model runtime.

use image::RgbImage;
use thiserror::Error;

use crate::detection::FaceLandmarkerResult;
use crate::embedding::Embedding;

/// Input mode of a model. Models accept either single images or a
/// timestamped video stream, never both at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningMode {
    Image,
    Video,
}

impl std::fmt::Display for RunningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunningMode::Image => f.write_str("IMAGE"),
            RunningMode::Video => f.write_str("VIDEO"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model not loaded yet")]
    NotReady,
    #[error("model is in {actual} mode, call requires {expected} mode")]
    WrongMode {
        expected: RunningMode,
        actual: RunningMode,
    },
    #[error("inference failed: {0}")]
    Inference(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera capture is not supported: {0}")]
    Unsupported(String),
    #[error("capture device error: {0}")]
    Device(String),
}

/// A captured video frame.
pub trait VideoFrame {
    /// Presentation time of the frame in milliseconds.
    fn timestamp_ms(&self) -> f64;
}

/// Live video capture device.
pub trait FrameSource {
    type Frame: VideoFrame;

    fn start(&mut self) -> Result<(), CaptureError>;

    fn stop(&mut self);

    /// Newest available frame, or `None` when the stream has nothing to offer.
    ///
    /// Calling this twice without the device producing a new frame may return
    /// a frame with the same timestamp; the sampler handles that.
    fn current_frame(&mut self) -> Result<Option<Self::Frame>, CaptureError>;
}

/// Face landmark detector with blend-shape output.
pub trait FaceLandmarker<F> {
    /// Whether model initialization has completed.
    fn is_ready(&self) -> bool {
        true
    }

    fn running_mode(&self) -> RunningMode;

    fn set_running_mode(&mut self, mode: RunningMode) -> Result<(), ModelError>;

    /// Detect faces in a video frame. Requires [`RunningMode::Video`].
    fn detect_for_video(
        &mut self,
        frame: &F,
        timestamp_ms: f64,
    ) -> Result<FaceLandmarkerResult, ModelError>;
}

/// Image embedding model.
pub trait ImageEmbedder<F> {
    fn is_ready(&self) -> bool {
        true
    }

    fn running_mode(&self) -> RunningMode;

    fn set_running_mode(&mut self, mode: RunningMode) -> Result<(), ModelError>;

    /// Embed a single still image. Requires [`RunningMode::Image`].
    fn embed(&mut self, image: &RgbImage) -> Result<Embedding, ModelError>;

    /// Embed a video frame. Requires [`RunningMode::Video`]. Returns `None`
    /// when the frame carries nothing the model can embed.
    fn embed_for_video(
        &mut self,
        frame: &F,
        timestamp_ms: f64,
    ) -> Result<Option<Embedding>, ModelError>;
}

/// Switch a landmarker into `mode` unless it is already there.
pub(crate) fn ensure_landmarker_mode<F, L: FaceLandmarker<F> + ?Sized>(
    landmarker: &mut L,
    mode: RunningMode,
) -> Result<(), ModelError> {
    if landmarker.running_mode() != mode {
        tracing::debug!(%mode, "switching landmarker running mode");
        landmarker.set_running_mode(mode)?;
    }
    Ok(())
}

/// Switch an embedder into `mode` unless it is already there.
pub(crate) fn ensure_embedder_mode<F, E: ImageEmbedder<F> + ?Sized>(
    embedder: &mut E,
    mode: RunningMode,
) -> Result<(), ModelError> {
    if embedder.running_mode() != mode {
        tracing::debug!(%mode, "switching embedder running mode");
        embedder.set_running_mode(mode)?;
    }
    Ok(())
}
