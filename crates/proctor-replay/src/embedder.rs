use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use proctor_core::{Embedding, ImageEmbedder, ModelError, RunningMode};

use crate::trace::TraceFrame;

const DEFAULT_SIDE: u32 = 16;

/// Embeds an image as a downscaled grayscale thumbnail.
///
/// The thumbnail is mean-centred and L2-normalised, so cosine similarity
/// between two embeddings reflects structure rather than overall brightness.
/// Live frames use their recorded embedding when present, otherwise their
/// image.
#[derive(Debug)]
pub struct ThumbnailEmbedder {
    mode: RunningMode,
    side: u32,
    // Frames commonly repeat the same still image
    cached: Option<(PathBuf, Embedding)>,
}

impl ThumbnailEmbedder {
    pub fn new() -> Self {
        Self::with_side(DEFAULT_SIDE)
    }

    pub fn with_side(side: u32) -> Self {
        Self {
            mode: RunningMode::Image,
            side: side.max(1),
            cached: None,
        }
    }

    pub fn model_version(&self) -> String {
        format!("thumbnail-{}", self.side)
    }

    fn thumbnail(&self, image: &RgbImage) -> Result<Embedding, ModelError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ModelError::Inference("image is empty".to_string()));
        }

        let gray = imageops::grayscale(image);
        let small = imageops::resize(&gray, self.side, self.side, FilterType::Triangle);

        // Decided on quantized pixels: centring a flat image in floating
        // point leaves rounding residue that would normalise to unit length.
        if is_flat(&gray) || is_flat(&small) {
            return Err(ModelError::Inference("image has no contrast".to_string()));
        }

        let mut values: Vec<f64> = small.pixels().map(|p| p.0[0] as f64 / 255.0).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        for v in &mut values {
            *v -= mean;
        }
        let norm = values.iter().map(|v| v * v).sum::<f64>().sqrt();

        Ok(Embedding {
            values: values.iter().map(|v| (v / norm) as f32).collect(),
            model_version: Some(self.model_version()),
        })
    }

    fn embed_file(&mut self, path: &Path) -> Result<Embedding, ModelError> {
        if let Some((cached_path, embedding)) = &self.cached {
            if cached_path == path {
                return Ok(embedding.clone());
            }
        }

        let image = image::open(path)
            .map_err(|e| ModelError::Inference(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let embedding = self.thumbnail(&image)?;
        self.cached = Some((path.to_path_buf(), embedding.clone()));
        Ok(embedding)
    }

    fn require_mode(&self, expected: RunningMode) -> Result<(), ModelError> {
        if self.mode != expected {
            return Err(ModelError::WrongMode {
                expected,
                actual: self.mode,
            });
        }
        Ok(())
    }
}

fn is_flat(image: &GrayImage) -> bool {
    let mut pixels = image.pixels().map(|p| p.0[0]);
    match pixels.next() {
        Some(first) => pixels.all(|v| v == first),
        None => true,
    }
}

impl Default for ThumbnailEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageEmbedder<TraceFrame> for ThumbnailEmbedder {
    fn running_mode(&self) -> RunningMode {
        self.mode
    }

    fn set_running_mode(&mut self, mode: RunningMode) -> Result<(), ModelError> {
        self.mode = mode;
        Ok(())
    }

    fn embed(&mut self, image: &RgbImage) -> Result<Embedding, ModelError> {
        self.require_mode(RunningMode::Image)?;
        self.thumbnail(image)
    }

    fn embed_for_video(
        &mut self,
        frame: &TraceFrame,
        _timestamp_ms: f64,
    ) -> Result<Option<Embedding>, ModelError> {
        self.require_mode(RunningMode::Video)?;

        if let Some(values) = &frame.embedding {
            return Ok(Some(Embedding {
                values: values.clone(),
                model_version: Some("trace".to_string()),
            }));
        }
        match &frame.image {
            Some(path) => self.embed_file(path).map(Some),
            None => Ok(None),
        }
    }
}
