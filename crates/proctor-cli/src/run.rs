//! `proctor run` — evaluate a recorded trace without the daemon.

use std::path::PathBuf;

use anyhow::{Context, Result};
use proctor_core::{
    FaceLandmarker, FrameSource, ImageEmbedder, NullOverlay, Overlay, RuleSet, Sample, Sampler,
    Session,
};
use proctor_replay::{ReplayLandmarker, ReplaySource, ThumbnailEmbedder};

pub struct RunArgs {
    pub trace: PathBuf,
    pub reference: Option<PathBuf>,
    pub rules: Option<PathBuf>,
    pub laps: u32,
    pub json: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    processed: usize,
    stale: usize,
    failed: usize,
    appended: usize,
}

pub fn run(args: RunArgs) -> Result<()> {
    let rules = match &args.rules {
        Some(path) => RuleSet::load(path)
            .with_context(|| format!("failed to load rules from {}", path.display()))?,
        None => RuleSet::default(),
    };

    let laps = args.laps.max(1);
    let source = ReplaySource::open(&args.trace, laps > 1)
        .with_context(|| format!("failed to open trace {}", args.trace.display()))?;
    let total_frames = frame_budget(source.frame_count(), laps);

    let mut sampler = Sampler::new(
        source,
        ReplayLandmarker::new(),
        ThumbnailEmbedder::new(),
        NullOverlay,
    );
    let mut session = Session::new(rules);

    if let Some(reference) = &args.reference {
        sampler
            .capture_reference_from_path(&mut session, reference)
            .with_context(|| format!("failed to embed reference {}", reference.display()))?;
    }

    sampler.source_mut().start()?;
    session.start();
    let tally = drain(&mut sampler, &mut session, total_frames);
    session.stop();
    let exhausted = sampler.source().is_exhausted();
    sampler.source_mut().stop();

    tracing::info!(
        exhausted,
        processed = tally.processed,
        stale = tally.stale,
        failed = tally.failed,
        appended = tally.appended,
        "trace evaluated"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(session.log())?);
    } else {
        for entry in session.log().iter() {
            println!("{}  {}", entry.logged_at.format("%H:%M:%S%.3f"), entry.message);
        }
        println!(
            "-- {} frames sampled, {} stale, {} log entries",
            tally.processed,
            tally.stale,
            session.log().len()
        );
    }

    Ok(())
}

/// Frames to pull for `laps` passes over a trace of `frame_count` frames.
fn frame_budget(frame_count: usize, laps: u32) -> usize {
    frame_count.saturating_mul(laps.max(1) as usize)
}

/// Pull samples until `max_frames` frames have been consumed or the source
/// runs dry.
fn drain<S, L, E, O>(
    sampler: &mut Sampler<S, L, E, O>,
    session: &mut Session,
    max_frames: usize,
) -> Tally
where
    S: FrameSource,
    L: FaceLandmarker<S::Frame>,
    E: ImageEmbedder<S::Frame>,
    O: Overlay,
{
    let mut tally = Tally::default();

    for sample in sampler.samples(session).take(max_frames) {
        match sample {
            Ok(Sample::Processed(report)) => {
                tally.processed += 1;
                tally.appended += report.appended;
            }
            Ok(Sample::Stale { .. }) => tally.stale += 1,
            Ok(Sample::NoFrame) => break,
            // Replay models load synchronously
            Ok(Sample::NotReady) => break,
            Err(e) => {
                tracing::warn!(error = %e, "frame sample failed");
                tally.failed += 1;
            }
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::DetectedFace;
    use proctor_replay::{Trace, TraceFrame};

    fn frames(faces: &[usize]) -> Trace {
        Trace::from_frames(
            faces
                .iter()
                .enumerate()
                .map(|(i, &n)| TraceFrame {
                    timestamp_ms: i as f64,
                    faces: vec![DetectedFace::default(); n],
                    embedding: None,
                    image: None,
                })
                .collect(),
        )
    }

    #[test]
    fn test_frame_budget() {
        assert_eq!(frame_budget(3, 2), 6);
        assert_eq!(frame_budget(3, 0), 3);
        assert_eq!(frame_budget(usize::MAX, 2), usize::MAX);
    }

    #[test]
    fn test_drain_stops_after_lap_budget() {
        let trace = frames(&[0, 1, 2]);
        let mut sampler = Sampler::new(
            ReplaySource::new(trace, true),
            ReplayLandmarker::new(),
            ThumbnailEmbedder::new(),
            NullOverlay,
        );
        let mut session = Session::new(RuleSet::default());
        sampler.source_mut().start().unwrap();
        session.start();

        let tally = drain(&mut sampler, &mut session, 6);
        assert_eq!(tally.processed, 6);
        // no face, multiple, no face, multiple
        assert_eq!(session.log().len(), 4);
    }

    #[test]
    fn test_drain_stops_when_trace_ends() {
        let mut sampler = Sampler::new(
            ReplaySource::new(frames(&[1, 1]), false),
            ReplayLandmarker::new(),
            ThumbnailEmbedder::new(),
            NullOverlay,
        );
        let mut session = Session::new(RuleSet::default());
        sampler.source_mut().start().unwrap();
        session.start();

        let tally = drain(&mut sampler, &mut session, usize::MAX);
        assert_eq!(
            tally,
            Tally {
                processed: 2,
                ..Tally::default()
            }
        );
        assert!(session.log().is_empty());
    }
}
