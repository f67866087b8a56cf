//! proctor-core — engagement and identity heuristics over face landmark output.
//!
//! The face landmarker, image embedder and capture device are external
//! collaborators expressed as traits in [`backend`]. This crate owns what
//! happens to their output: rule evaluation, the activity log, the session
//! state and the per-frame sampler that ties them together.

pub mod backend;
pub mod detection;
pub mod embedding;
pub mod evaluator;
pub mod log;
pub mod overlay;
pub mod rules;
pub mod sampler;
pub mod session;

pub use backend::{
    CaptureError, FaceLandmarker, FrameSource, ImageEmbedder, ModelError, RunningMode, VideoFrame,
};
pub use detection::{BlendShapeCategory, DetectedFace, FaceLandmarkerResult, Landmark};
pub use embedding::{
    cosine_similarity, euclidean_distance, Embedding, EmbeddingError, SimilarityMetric,
};
pub use evaluator::{
    Alert, AlertKind, FrameObservation, RuleEvaluator, MULTIPLE_FACES_MESSAGE, NO_FACE_MESSAGE,
    VALIDATED_MESSAGE,
};
pub use log::{ActivityLog, LogEntry};
pub use overlay::{blend_shape_rows, BlendShapeRow, NullOverlay, Overlay};
pub use rules::{IndicatorRule, RuleError, RuleSet, SIMILARITY_CATEGORY};
pub use sampler::{
    decode_reference, FrameReport, ReferenceError, Sample, Sampler, SamplerError, Samples,
};
pub use session::Session;
