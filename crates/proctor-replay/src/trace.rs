use std::path::{Path, PathBuf};

use proctor_core::{DetectedFace, VideoFrame};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to read trace {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("trace line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("trace line {line}: timestamp must be finite")]
    InvalidTimestamp { line: usize },
}

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFrame {
    pub timestamp_ms: f64,
    #[serde(default)]
    pub faces: Vec<DetectedFace>,
    /// Precomputed frame embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Still image standing in for the frame's pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<PathBuf>,
}

impl VideoFrame for TraceFrame {
    fn timestamp_ms(&self) -> f64 {
        self.timestamp_ms
    }
}

/// A parsed recording.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    frames: Vec<TraceFrame>,
}

impl Trace {
    pub fn from_frames(frames: Vec<TraceFrame>) -> Self {
        Self { frames }
    }

    /// Parse JSON lines. Blank lines and `#` comments are skipped; relative
    /// image paths are resolved against `base_dir`.
    pub fn parse(contents: &str, base_dir: &Path) -> Result<Self, TraceError> {
        let mut frames = Vec::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line = idx + 1;
            let raw = raw.trim();
            if raw.is_empty() || raw.starts_with('#') {
                continue;
            }

            let mut frame: TraceFrame =
                serde_json::from_str(raw).map_err(|source| TraceError::Parse { line, source })?;
            if !frame.timestamp_ms.is_finite() {
                return Err(TraceError::InvalidTimestamp { line });
            }
            if let Some(image) = frame.image.take() {
                frame.image = Some(if image.is_relative() {
                    base_dir.join(image)
                } else {
                    image
                });
            }
            frames.push(frame);
        }

        Ok(Self { frames })
    }

    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let contents = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().unwrap_or(Path::new("."));
        let trace = Self::parse(&contents, base_dir)?;
        tracing::info!(path = %path.display(), frames = trace.len(), "trace loaded");
        Ok(trace)
    }

    pub fn frames(&self) -> &[TraceFrame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time added to every timestamp per replay lap so that looping keeps
    /// timestamps increasing: the recorded span plus one average frame gap.
    pub fn lap_duration_ms(&self) -> f64 {
        let (Some(first), Some(last)) = (self.frames.first(), self.frames.last()) else {
            return 0.0;
        };
        let span = (last.timestamp_ms - first.timestamp_ms).max(0.0);
        let gap = if self.frames.len() > 1 && span > 0.0 {
            span / (self.frames.len() - 1) as f64
        } else {
            1.0
        };
        span + gap
    }
}
