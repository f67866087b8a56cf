use std::path::PathBuf;
use std::time::{Duration, Instant};

use proctor_core::{
    blend_shape_rows, ActivityLog, BlendShapeRow, CaptureError, FaceLandmarker,
    FaceLandmarkerResult, FrameSource, ImageEmbedder, Overlay, ReferenceError, RuleSet, Sample,
    Sampler, SamplerError, Session,
};
use proctor_replay::{ReplayLandmarker, ReplaySource, ThumbnailEmbedder, Trace};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::oneshot;

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera capture is not available")]
    CaptureUnavailable,
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("reference upload failed: {0}")]
    Reference(#[from] ReferenceError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Snapshot of engine state for the status call.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub capture_available: bool,
    pub landmarker_ready: bool,
    pub landmarker_mode: String,
    pub embedder_mode: String,
    pub reference_loaded: bool,
    pub metric: String,
    pub log_entries: usize,
    pub last_frame_ms: Option<f64>,
    pub last_face_count: Option<usize>,
}

/// Overlay state rendered by the daemon: the blend-shape view of the most
/// recent frame.
#[derive(Debug, Default)]
pub struct ViewOverlay {
    rows: Vec<BlendShapeRow>,
}

impl Overlay for ViewOverlay {
    fn draw(&mut self, result: &FaceLandmarkerResult) {
        self.rows = blend_shape_rows(result);
    }
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Toggle {
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    SetRunning {
        running: bool,
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    UploadReference {
        path: PathBuf,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Log {
        reply: oneshot::Sender<ActivityLog>,
    },
    BlendShapes {
        reply: oneshot::Sender<Vec<BlendShapeRow>>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Flip capture on or off. Returns the new running state.
    pub async fn toggle(&self) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::Toggle { reply }).await?
    }

    pub async fn set_running(&self, running: bool) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::SetRunning { running, reply }).await?
    }

    /// Embed the image at `path` and make it the comparison baseline.
    pub async fn upload_reference(&self, path: PathBuf) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::UploadReference { path, reply }).await?
    }

    pub async fn log(&self) -> Result<ActivityLog, EngineError> {
        self.request(|reply| EngineRequest::Log { reply }).await
    }

    pub async fn blend_shapes(&self) -> Result<Vec<BlendShapeRow>, EngineError> {
        self.request(|reply| EngineRequest::BlendShapes { reply }).await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }
}

/// Spawn the engine on a dedicated OS thread, playing back the configured
/// trace as the camera.
///
/// A trace that cannot be opened leaves the engine up with capture marked
/// unavailable: start requests are refused, reference uploads still work.
pub fn spawn_engine(config: &Config, rules: RuleSet) -> Result<EngineHandle, EngineError> {
    let opened = ReplaySource::open(&config.trace_path, config.loop_playback);
    let (source, capture_available) = match opened {
        Ok(source) => {
            tracing::info!(
                path = %config.trace_path.display(),
                frames = source.frame_count(),
                looping = config.loop_playback,
                "capture trace opened"
            );
            (source, true)
        }
        Err(e) => {
            tracing::warn!(error = %e, "camera capture is not supported on this host");
            (ReplaySource::new(Trace::default(), false), false)
        }
    };

    let sampler = Sampler::new(
        source,
        ReplayLandmarker::new(),
        ThumbnailEmbedder::new(),
        ViewOverlay::default(),
    );
    spawn_engine_with(
        sampler,
        Session::new(rules),
        capture_available,
        config.frame_interval(),
    )
}

/// Spawn the engine around an already assembled sampler.
pub fn spawn_engine_with<S, L, E>(
    sampler: Sampler<S, L, E, ViewOverlay>,
    session: Session,
    capture_available: bool,
    frame_interval: Duration,
) -> Result<EngineHandle, EngineError>
where
    S: FrameSource + Send + 'static,
    L: FaceLandmarker<S::Frame> + Send + 'static,
    E: ImageEmbedder<S::Frame> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<EngineRequest>(8);

    let engine = Engine {
        sampler,
        session,
        capture_available,
        frame_interval,
    };

    std::thread::Builder::new()
        .name("proctor-engine".into())
        .spawn(move || engine.run(rx))
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle { tx })
}

struct Engine<S, L, E> {
    sampler: Sampler<S, L, E, ViewOverlay>,
    session: Session,
    capture_available: bool,
    frame_interval: Duration,
}

impl<S, L, E> Engine<S, L, E>
where
    S: FrameSource,
    L: FaceLandmarker<S::Frame>,
    E: ImageEmbedder<S::Frame>,
{
    fn run(mut self, mut rx: mpsc::Receiver<EngineRequest>) {
        tracing::info!("engine thread started");
        loop {
            if self.session.is_running() {
                let tick = Instant::now();

                // Requests are handled between samples, never during one
                loop {
                    match rx.try_recv() {
                        Ok(req) => self.handle(req),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => {
                            tracing::info!("engine thread exiting");
                            return;
                        }
                    }
                }

                if let Some(sample) = self.sampler.step(&mut self.session) {
                    self.on_sample(sample);
                }

                if let Some(rest) = self.frame_interval.checked_sub(tick.elapsed()) {
                    std::thread::sleep(rest);
                }
            } else {
                match rx.blocking_recv() {
                    Some(req) => self.handle(req),
                    None => {
                        tracing::info!("engine thread exiting");
                        return;
                    }
                }
            }
        }
    }

    fn on_sample(&mut self, sample: Result<Sample, SamplerError>) {
        match sample {
            Ok(Sample::Processed(report)) => {
                for entry in self.session.log().iter().take(report.appended) {
                    tracing::info!(
                        timestamp_ms = report.timestamp_ms,
                        faces = report.face_count,
                        message = %entry.message,
                        "alert logged"
                    );
                }
            }
            Ok(Sample::NoFrame) => tracing::trace!("no frame available"),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "frame sample failed"),
        }
    }

    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Toggle { reply } => {
                let target = !self.session.is_running();
                let _ = reply.send(self.set_running(target));
            }
            EngineRequest::SetRunning { running, reply } => {
                let _ = reply.send(self.set_running(running));
            }
            EngineRequest::UploadReference { path, reply } => {
                let result = self
                    .sampler
                    .capture_reference_from_path(&mut self.session, &path)
                    .map_err(EngineError::from);
                if let Err(e) = &result {
                    tracing::error!(path = %path.display(), error = %e, "reference upload failed");
                }
                let _ = reply.send(result);
            }
            EngineRequest::Log { reply } => {
                let _ = reply.send(self.session.log().clone());
            }
            EngineRequest::BlendShapes { reply } => {
                let _ = reply.send(self.sampler.overlay().rows.clone());
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    fn set_running(&mut self, running: bool) -> Result<bool, EngineError> {
        if running == self.session.is_running() {
            return Ok(running);
        }

        if !running {
            self.session.stop();
            self.sampler.source_mut().stop();
            return Ok(false);
        }

        if !self.capture_available {
            tracing::warn!("start requested but camera capture is not available");
            return Err(EngineError::CaptureUnavailable);
        }
        if !self.sampler.landmarker().is_ready() {
            tracing::info!("start ignored: face landmarker not loaded yet");
            return Ok(false);
        }

        self.sampler.source_mut().start()?;
        self.session.start();
        Ok(true)
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            running: self.session.is_running(),
            capture_available: self.capture_available,
            landmarker_ready: self.sampler.landmarker().is_ready(),
            landmarker_mode: self.sampler.landmarker().running_mode().to_string(),
            embedder_mode: self.sampler.embedder().running_mode().to_string(),
            reference_loaded: self.session.reference().is_some(),
            metric: self.session.evaluator().rules().metric().to_string(),
            log_entries: self.session.log().len(),
            last_frame_ms: self.session.last_frame_ms(),
            last_face_count: self.session.last_result().map(|r| r.face_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::{
        BlendShapeCategory, DetectedFace, ModelError, RunningMode, NO_FACE_MESSAGE,
        VALIDATED_MESSAGE,
    };
    use proctor_replay::TraceFrame;

    fn trace(faces: &[usize]) -> Trace {
        Trace::from_frames(
            faces
                .iter()
                .enumerate()
                .map(|(i, &n)| TraceFrame {
                    timestamp_ms: i as f64 * 10.0,
                    faces: vec![DetectedFace::default(); n],
                    embedding: None,
                    image: None,
                })
                .collect(),
        )
    }

    fn engine(trace: Trace, capture_available: bool) -> EngineHandle {
        let sampler = Sampler::new(
            ReplaySource::new(trace, false),
            ReplayLandmarker::new(),
            ThumbnailEmbedder::new(),
            ViewOverlay::default(),
        );
        spawn_engine_with(
            sampler,
            Session::new(RuleSet::default()),
            capture_available,
            Duration::from_millis(1),
        )
        .unwrap()
    }

    async fn wait_for_log(handle: &EngineHandle, entries: usize) -> ActivityLog {
        for _ in 0..500 {
            let log = handle.log().await.unwrap();
            if log.len() >= entries {
                return log;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("engine never logged {entries} entries");
    }

    #[tokio::test]
    async fn test_toggle_runs_and_logs() {
        let handle = engine(trace(&[0, 0, 2]), true);

        assert!(handle.toggle().await.unwrap());
        let log = wait_for_log(&handle, 2).await;
        assert_eq!(log.messages()[1], NO_FACE_MESSAGE);

        let status = handle.status().await.unwrap();
        assert!(status.running);
        assert_eq!(status.landmarker_mode, "VIDEO");
        assert_eq!(status.last_face_count, Some(2));

        assert!(!handle.toggle().await.unwrap());
        assert!(!handle.status().await.unwrap().running);
    }

    #[tokio::test]
    async fn test_start_refused_without_capture() {
        let handle = engine(Trace::default(), false);
        assert!(matches!(
            handle.toggle().await,
            Err(EngineError::CaptureUnavailable)
        ));
        assert!(!handle.status().await.unwrap().running);
    }

    #[tokio::test]
    async fn test_set_running_is_idempotent() {
        let handle = engine(trace(&[1]), true);
        assert!(!handle.set_running(false).await.unwrap());
        assert!(handle.set_running(true).await.unwrap());
        assert!(handle.set_running(true).await.unwrap());
        assert!(!handle.set_running(false).await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_no_reference() {
        let handle = engine(trace(&[1]), true);
        let err = handle
            .upload_reference(PathBuf::from("/nonexistent/proctor/reference.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Reference(ReferenceError::Io { .. })));
        assert!(!handle.status().await.unwrap().reference_loaded);
    }

    #[tokio::test]
    async fn test_failed_upload_keeps_previous_reference() {
        let dir = std::env::temp_dir().join(format!(
            "proctor-engine-upload-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let reference = dir.join("reference.png");
        image::RgbImage::from_fn(32, 32, |x, _| {
            if (x / 4) % 2 == 0 {
                image::Rgb([220, 180, 160])
            } else {
                image::Rgb([40, 30, 30])
            }
        })
        .save(&reference)
        .unwrap();

        let mut frames = trace(&[1, 1]).frames().to_vec();
        for frame in &mut frames {
            frame.image = Some(reference.clone());
        }
        let handle = engine(Trace::from_frames(frames), true);

        handle.upload_reference(reference.clone()).await.unwrap();
        assert!(handle
            .upload_reference(dir.join("missing.png"))
            .await
            .is_err());
        assert!(handle.status().await.unwrap().reference_loaded);

        assert!(handle.toggle().await.unwrap());
        let log = wait_for_log(&handle, 1).await;
        assert_eq!(log.messages(), [VALIDATED_MESSAGE]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_view_overlay_redraws_from_latest_result() {
        let face = |name: &str, score: f32| DetectedFace {
            landmarks: vec![],
            blend_shapes: vec![BlendShapeCategory::new(name, score)],
        };
        let mut overlay = ViewOverlay::default();

        overlay.draw(&FaceLandmarkerResult {
            faces: vec![face("jawOpen", 0.5), face("eyeBlinkLeft", 0.75)],
        });
        assert_eq!(overlay.rows.len(), 1);
        assert_eq!(overlay.rows[0].label, "jawOpen");

        overlay.draw(&FaceLandmarkerResult::default());
        assert!(overlay.rows.is_empty());
    }

    #[tokio::test]
    async fn test_blend_shapes_follow_latest_frame() {
        let mut frames = trace(&[1]).frames().to_vec();
        frames[0].faces[0].blend_shapes = vec![BlendShapeCategory::new("jawOpen", 0.25)];
        let handle = engine(Trace::from_frames(frames), true);

        assert!(handle.blend_shapes().await.unwrap().is_empty());
        handle.toggle().await.unwrap();
        for _ in 0..500 {
            let rows = handle.blend_shapes().await.unwrap();
            if !rows.is_empty() {
                assert_eq!(rows[0].label, "jawOpen");
                assert_eq!(rows[0].display, "0.2500");
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("blend shapes never drawn");
    }

    struct Loading;

    impl FaceLandmarker<TraceFrame> for Loading {
        fn is_ready(&self) -> bool {
            false
        }

        fn running_mode(&self) -> RunningMode {
            RunningMode::Image
        }

        fn set_running_mode(&mut self, _mode: RunningMode) -> Result<(), ModelError> {
            Ok(())
        }

        fn detect_for_video(
            &mut self,
            _frame: &TraceFrame,
            _timestamp_ms: f64,
        ) -> Result<FaceLandmarkerResult, ModelError> {
            Err(ModelError::NotReady)
        }
    }

    #[tokio::test]
    async fn test_start_ignored_while_landmarker_loading() {
        let sampler = Sampler::new(
            ReplaySource::new(trace(&[1]), false),
            Loading,
            ThumbnailEmbedder::new(),
            ViewOverlay::default(),
        );
        let handle = spawn_engine_with(
            sampler,
            Session::new(RuleSet::default()),
            true,
            Duration::from_millis(1),
        )
        .unwrap();

        assert!(!handle.toggle().await.unwrap());
        let status = handle.status().await.unwrap();
        assert!(!status.running);
        assert!(!status.landmarker_ready);
    }
}
