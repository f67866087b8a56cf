//! Per-frame sampling: pull a frame, run the models, evaluate, log.
//!
//! The sampler does not schedule itself. A caller pulls samples, either one
//! at a time with [`Sampler::step`] or as an iterator with
//! [`Sampler::samples`], at whatever rate its display refresh dictates. The
//! sequence ends as soon as the session's running flag is cleared.

use std::path::Path;

use image::RgbImage;
use thiserror::Error;

use crate::backend::{
    ensure_embedder_mode, ensure_landmarker_mode, CaptureError, FaceLandmarker, FrameSource,
    ImageEmbedder, ModelError, RunningMode, VideoFrame,
};
use crate::evaluator::{Alert, FrameObservation};
use crate::overlay::{NullOverlay, Overlay};
use crate::session::Session;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("face landmarker error: {0}")]
    Detection(#[source] ModelError),
}

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("failed to read reference image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode reference image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image embedder error: {0}")]
    Model(#[from] ModelError),
}

/// Outcome of one pull.
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// The landmarker has not finished loading; nothing was done.
    NotReady,
    /// The capture device had no frame to offer.
    NoFrame,
    /// The frame timestamp has not advanced since the previous sample.
    Stale { timestamp_ms: f64 },
    Processed(FrameReport),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub timestamp_ms: f64,
    pub face_count: usize,
    pub similarity: Option<f32>,
    pub alerts: Vec<Alert>,
    /// Number of alerts that made it into the log.
    pub appended: usize,
}

/// Decode an uploaded reference image.
pub fn decode_reference(bytes: &[u8]) -> Result<RgbImage, ReferenceError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

pub struct Sampler<S, L, E, O = NullOverlay> {
    source: S,
    landmarker: L,
    embedder: E,
    overlay: O,
}

impl<S, L, E, O> Sampler<S, L, E, O>
where
    S: FrameSource,
    L: FaceLandmarker<S::Frame>,
    E: ImageEmbedder<S::Frame>,
    O: Overlay,
{
    pub fn new(source: S, landmarker: L, embedder: E, overlay: O) -> Self {
        Self {
            source,
            landmarker,
            embedder,
            overlay,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn landmarker(&self) -> &L {
        &self.landmarker
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn overlay(&self) -> &O {
        &self.overlay
    }

    /// Take one sample if the session is running, `None` otherwise.
    pub fn step(&mut self, session: &mut Session) -> Option<Result<Sample, SamplerError>> {
        if !session.is_running() {
            return None;
        }
        Some(self.sample(session))
    }

    /// Lazy sequence of samples, ending when the session stops running.
    pub fn samples<'a>(&'a mut self, session: &'a mut Session) -> Samples<'a, S, L, E, O> {
        Samples {
            sampler: self,
            session,
        }
    }

    fn sample(&mut self, session: &mut Session) -> Result<Sample, SamplerError> {
        if !self.landmarker.is_ready() {
            tracing::debug!("face landmarker not loaded yet, skipping sample");
            return Ok(Sample::NotReady);
        }
        ensure_landmarker_mode::<S::Frame, _>(&mut self.landmarker, RunningMode::Video)
            .map_err(SamplerError::Detection)?;

        let Some(frame) = self.source.current_frame()? else {
            return Ok(Sample::NoFrame);
        };
        let timestamp_ms = frame.timestamp_ms();

        if !session.advance_clock(timestamp_ms) {
            if let Some(last) = session.last_result() {
                self.overlay.draw(last);
            }
            return Ok(Sample::Stale { timestamp_ms });
        }

        let result = self
            .landmarker
            .detect_for_video(&frame, timestamp_ms)
            .map_err(SamplerError::Detection)?;
        self.overlay.draw(&result);

        let similarity = self.measure_similarity(session, &frame, timestamp_ms);

        let alerts = session.evaluator().evaluate(&FrameObservation {
            face_count: result.face_count(),
            blend_shapes: result.primary_blend_shapes(),
            similarity,
        });
        let appended = session.record(&alerts);

        tracing::trace!(
            timestamp_ms,
            faces = result.face_count(),
            similarity = ?similarity,
            alerts = alerts.len(),
            appended,
            "frame sampled"
        );

        let face_count = result.face_count();
        session.set_last_result(result);

        Ok(Sample::Processed(FrameReport {
            timestamp_ms,
            face_count,
            similarity,
            alerts,
            appended,
        }))
    }

    /// Compare the live frame against the stored reference. Any failure
    /// skips the check for this frame.
    fn measure_similarity(
        &mut self,
        session: &Session,
        frame: &S::Frame,
        timestamp_ms: f64,
    ) -> Option<f32> {
        let reference = session.reference()?;

        if !self.embedder.is_ready() {
            tracing::debug!("image embedder not loaded yet, skipping similarity");
            return None;
        }
        if let Err(e) =
            ensure_embedder_mode::<S::Frame, _>(&mut self.embedder, RunningMode::Video)
        {
            tracing::warn!(error = %e, "failed to switch embedder to video mode");
            return None;
        }

        let live = match self.embedder.embed_for_video(frame, timestamp_ms) {
            Ok(Some(live)) => live,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "live frame embedding failed");
                return None;
            }
        };

        let metric = session.evaluator().rules().metric();
        match metric.measure(reference, &live) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, %metric, "similarity could not be computed");
                None
            }
        }
    }

    /// Embed `image` once in image mode and make it the session's baseline.
    /// On failure any previous baseline is kept.
    pub fn capture_reference(
        &mut self,
        session: &mut Session,
        image: &RgbImage,
    ) -> Result<(), ReferenceError> {
        if !self.embedder.is_ready() {
            return Err(ModelError::NotReady.into());
        }
        ensure_embedder_mode::<S::Frame, _>(&mut self.embedder, RunningMode::Image)?;
        let embedding = self.embedder.embed(image)?;
        session.set_reference(embedding);
        Ok(())
    }

    /// Read and decode an image file, then [`capture_reference`](Self::capture_reference).
    pub fn capture_reference_from_path(
        &mut self,
        session: &mut Session,
        path: &Path,
    ) -> Result<(), ReferenceError> {
        let bytes = std::fs::read(path).map_err(|source| ReferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let image = decode_reference(&bytes)?;
        tracing::info!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "reference image decoded"
        );
        self.capture_reference(session, &image)
    }
}

/// Iterator returned by [`Sampler::samples`].
pub struct Samples<'a, S, L, E, O> {
    sampler: &'a mut Sampler<S, L, E, O>,
    session: &'a mut Session,
}

impl<S, L, E, O> Iterator for Samples<'_, S, L, E, O>
where
    S: FrameSource,
    L: FaceLandmarker<S::Frame>,
    E: ImageEmbedder<S::Frame>,
    O: Overlay,
{
    type Item = Result<Sample, SamplerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.sampler.step(self.session)
    }
}
