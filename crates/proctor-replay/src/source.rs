use std::path::Path;

use proctor_core::{CaptureError, FrameSource};

use crate::trace::{Trace, TraceError, TraceFrame};

/// Plays a [`Trace`] back as a live capture device.
///
/// Each call to `current_frame` yields the next recorded frame. With looping
/// enabled the trace restarts when exhausted and every lap's timestamps are
/// shifted by [`Trace::lap_duration_ms`], so the stream keeps advancing.
pub struct ReplaySource {
    trace: Trace,
    cursor: usize,
    lap: u32,
    looping: bool,
    active: bool,
}

impl ReplaySource {
    pub fn new(trace: Trace, looping: bool) -> Self {
        Self {
            trace,
            cursor: 0,
            lap: 0,
            looping,
            active: false,
        }
    }

    /// Open a trace file as a capture device. A trace that cannot be read
    /// means capture is unsupported on this host.
    pub fn open(path: &Path, looping: bool) -> Result<Self, CaptureError> {
        let trace = Trace::load(path).map_err(|e| match e {
            TraceError::Io { .. } => CaptureError::Unsupported(e.to_string()),
            other => CaptureError::Device(other.to_string()),
        })?;
        Ok(Self::new(trace, looping))
    }

    /// Whether playback reached the end with looping disabled.
    pub fn is_exhausted(&self) -> bool {
        !self.looping && self.cursor >= self.trace.len()
    }

    pub fn frame_count(&self) -> usize {
        self.trace.len()
    }
}

impl FrameSource for ReplaySource {
    type Frame = TraceFrame;

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.trace.is_empty() {
            return Err(CaptureError::Device("trace has no frames".to_string()));
        }
        if !self.active {
            tracing::info!(frames = self.trace.len(), looping = self.looping, "replay started");
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        if self.active {
            tracing::info!(position = self.cursor, lap = self.lap, "replay stopped");
        }
        self.active = false;
    }

    fn current_frame(&mut self) -> Result<Option<TraceFrame>, CaptureError> {
        if !self.active || self.trace.is_empty() {
            return Ok(None);
        }

        if self.cursor >= self.trace.len() {
            if !self.looping {
                return Ok(None);
            }
            self.cursor = 0;
            self.lap += 1;
            tracing::debug!(lap = self.lap, "replay looped");
        }

        let mut frame = self.trace.frames()[self.cursor].clone();
        frame.timestamp_ms += self.lap as f64 * self.trace.lap_duration_ms();
        self.cursor += 1;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trace(timestamps: &[f64]) -> Trace {
        Trace::from_frames(
            timestamps
                .iter()
                .map(|&ts| TraceFrame {
                    timestamp_ms: ts,
                    faces: vec![],
                    embedding: None,
                    image: None,
                })
                .collect(),
        )
    }

    fn timestamps(source: &mut ReplaySource, n: usize) -> Vec<Option<f64>> {
        (0..n)
            .map(|_| source.current_frame().unwrap().map(|f| f.timestamp_ms))
            .collect()
    }

    #[test]
    fn test_no_frames_before_start() {
        let mut source = ReplaySource::new(trace(&[0.0, 10.0]), false);
        assert_eq!(source.current_frame().unwrap(), None);
        source.start().unwrap();
        assert!(source.current_frame().unwrap().is_some());
    }

    #[test]
    fn test_plays_in_order_then_ends() {
        let mut source = ReplaySource::new(trace(&[0.0, 10.0]), false);
        source.start().unwrap();
        assert_eq!(timestamps(&mut source, 3), [Some(0.0), Some(10.0), None]);
        assert!(source.is_exhausted());
    }

    #[test]
    fn test_looping_keeps_timestamps_increasing() {
        let mut source = ReplaySource::new(trace(&[0.0, 10.0]), true);
        source.start().unwrap();
        assert_eq!(
            timestamps(&mut source, 5),
            [Some(0.0), Some(10.0), Some(20.0), Some(30.0), Some(40.0)]
        );
        assert!(!source.is_exhausted());
    }

    #[test]
    fn test_stop_pauses_and_start_resumes() {
        let mut source = ReplaySource::new(trace(&[0.0, 10.0, 20.0]), false);
        source.start().unwrap();
        source.current_frame().unwrap();
        source.stop();
        assert_eq!(source.current_frame().unwrap(), None);
        source.start().unwrap();
        assert_eq!(timestamps(&mut source, 1), [Some(10.0)]);
    }

    #[test]
    fn test_empty_trace_cannot_start() {
        let mut source = ReplaySource::new(Trace::default(), true);
        assert!(matches!(source.start(), Err(CaptureError::Device(_))));
    }

    #[test]
    fn test_open_missing_trace_is_unsupported() {
        let path = std::env::temp_dir().join(format!(
            "proctor-replay-missing-{}.jsonl",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        assert!(matches!(
            ReplaySource::open(&path, false),
            Err(CaptureError::Unsupported(_))
        ));
    }
}
