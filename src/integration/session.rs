//! Tick loop driving the engine from its collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::error::{BoxError, SessionError};
use crate::tracker::{FrameReport, InspectionEngine, SessionSummary};

use super::{DetectionSource, FrameSource, SessionSink, StickerSource};

/// Shared flag used to end a running session from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why the tick loop stopped.
#[derive(Debug)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
    /// A collaborator failed; the session was finalised anyway.
    Failed(SessionError),
}

#[derive(Debug)]
pub struct SessionOutcome {
    pub summary: SessionSummary,
    pub reason: StopReason,
}

/// Frame source, detectors and engine bundled into one session.
pub struct InspectionSession<F, D, S> {
    frames: F,
    detector: D,
    stickers: S,
    engine: InspectionEngine,
    cancel: CancelHandle,
}

impl<F, D, S> InspectionSession<F, D, S>
where
    F: FrameSource,
    F::Error: Into<BoxError>,
    D: DetectionSource,
    D::Error: Into<BoxError>,
    S: StickerSource,
    S::Error: Into<BoxError>,
{
    pub fn new(frames: F, detector: D, stickers: S, engine: InspectionEngine) -> Self {
        Self {
            frames,
            detector,
            stickers,
            engine,
            cancel: CancelHandle::default(),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn engine(&self) -> &InspectionEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut InspectionEngine {
        &mut self.engine
    }

    /// Acquire, detect and process one frame. `Ok(None)` at end of stream.
    pub fn step(&mut self) -> Result<Option<FrameReport>, SessionError> {
        let Some(frame) = self
            .frames
            .next_frame()
            .map_err(|e| SessionError::Acquisition(e.into()))?
        else {
            return Ok(None);
        };

        let started = Instant::now();
        let detections = self
            .detector
            .detect(&frame)
            .map_err(|e| SessionError::Detection(e.into()))?;
        let stickers = self
            .stickers
            .detect_stickers(&frame)
            .map_err(|e| SessionError::StickerDetection(e.into()))?;
        let report = self.engine.process_frame(&frame, &detections, &stickers);
        self.engine
            .record_processing_time(started.elapsed().as_secs_f64());
        Ok(Some(report))
    }

    /// Run ticks until the stream ends, the session is cancelled, or a
    /// collaborator fails, then finalise.
    pub fn run(&mut self, mut on_report: impl FnMut(&FrameReport)) -> SessionOutcome {
        let reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            match self.step() {
                Ok(Some(report)) => on_report(&report),
                Ok(None) => break StopReason::EndOfStream,
                Err(err) => {
                    warn!(error = %err, "collaborator failed, ending session");
                    break StopReason::Failed(err);
                }
            }
        };
        info!(?reason, "session loop stopped");
        SessionOutcome {
            summary: self.engine.finish(),
            reason,
        }
    }

    /// [`run`](Self::run), then hand the summary to `sink`.
    pub fn run_into<K>(
        &mut self,
        sink: &mut K,
        on_report: impl FnMut(&FrameReport),
    ) -> Result<SessionOutcome, SessionError>
    where
        K: SessionSink,
        K::Error: Into<BoxError>,
    {
        let outcome = self.run(on_report);
        sink.record(&outcome.summary)
            .map_err(|e| SessionError::Sink(e.into()))?;
        Ok(outcome)
    }

    pub fn into_parts(self) -> (F, D, S, InspectionEngine) {
        (self.frames, self.detector, self.stickers, self.engine)
    }
}
