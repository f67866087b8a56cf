//! proctor-replay — collaborators backed by recorded data.
//!
//! A trace is a JSON-lines recording of landmarker output, one frame per
//! line. [`ReplaySource`] plays it back as a capture device,
//! [`ReplayLandmarker`] returns the recorded faces, and [`ThumbnailEmbedder`]
//! embeds still images and frame images without an external model runtime.

pub mod embedder;
pub mod landmarker;
pub mod source;
pub mod trace;

pub use embedder::ThumbnailEmbedder;
pub use landmarker::ReplayLandmarker;
pub use source::ReplaySource;
pub use trace::{Trace, TraceError, TraceFrame};
