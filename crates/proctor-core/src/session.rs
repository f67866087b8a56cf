use crate::detection::FaceLandmarkerResult;
use crate::embedding::Embedding;
use crate::evaluator::{Alert, RuleEvaluator};
use crate::log::ActivityLog;
use crate::rules::RuleSet;

/// State shared between the frame sampler, the reference upload and the
/// start/stop control.
#[derive(Debug, Default)]
pub struct Session {
    running: bool,
    evaluator: RuleEvaluator,
    reference: Option<Embedding>,
    last_frame_ms: Option<f64>,
    last_result: Option<FaceLandmarkerResult>,
    log: ActivityLog,
}

impl Session {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            evaluator: RuleEvaluator::new(rules),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Mark capture as active. The frame clock is reset so the first frame
    /// after a restart is always sampled.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.last_frame_ms = None;
            tracing::info!("session started");
        }
    }

    /// Clear the running flag. A sample already in flight completes; no
    /// further samples are taken.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            tracing::info!("session stopped");
        }
    }

    /// Flip the running flag and return the new state.
    pub fn toggle(&mut self) -> bool {
        if self.running {
            self.stop();
        } else {
            self.start();
        }
        self.running
    }

    pub fn evaluator(&self) -> &RuleEvaluator {
        &self.evaluator
    }

    pub fn reference(&self) -> Option<&Embedding> {
        self.reference.as_ref()
    }

    /// Replace the comparison baseline.
    pub fn set_reference(&mut self, embedding: Embedding) {
        tracing::info!(
            dim = embedding.len(),
            replaced = self.reference.is_some(),
            "reference embedding stored"
        );
        self.reference = Some(embedding);
    }

    /// Record `timestamp_ms` as sampled if it is newer than the previous
    /// sample. Returns false for a frame that has not advanced.
    pub fn advance_clock(&mut self, timestamp_ms: f64) -> bool {
        match self.last_frame_ms {
            Some(last) if timestamp_ms <= last => false,
            _ => {
                self.last_frame_ms = Some(timestamp_ms);
                true
            }
        }
    }

    pub fn last_frame_ms(&self) -> Option<f64> {
        self.last_frame_ms
    }

    pub fn last_result(&self) -> Option<&FaceLandmarkerResult> {
        self.last_result.as_ref()
    }

    pub(crate) fn set_last_result(&mut self, result: FaceLandmarkerResult) {
        self.last_result = Some(result);
    }

    /// Append alerts to the log. Returns how many entries were added.
    pub fn record(&mut self, alerts: &[Alert]) -> usize {
        RuleEvaluator::record(alerts, &mut self.log)
    }

    pub fn log(&self) -> &ActivityLog {
        &self.log
    }
}
