use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::info;

use super::state::LiveState;
use super::{lock, LiveHandle, LiveSettings};
use crate::acquisition::FrameSource;
use crate::logging::ProducerSpan;
use crate::processing::{CalibrationConverter, PeakPipeline};
use crate::{Error, Result};

/// Owns the frame source and drives the per-frame pipeline.
pub struct Producer {
    source: Box<dyn FrameSource>,
    pipeline: PeakPipeline,
    state: Arc<Mutex<LiveState>>,
    frame_timeout: Duration,
    frames: u64,
}

impl Producer {
    /// Build a producer and the handle consumers use to observe it.
    pub fn new(
        source: Box<dyn FrameSource>,
        pipeline: PeakPipeline,
        converter: CalibrationConverter,
        settings: &LiveSettings,
    ) -> (Self, LiveHandle) {
        let state = Arc::new(Mutex::new(LiveState::new(
            converter,
            settings.history_capacity,
            settings.overflow,
            settings.subscriber_capacity,
            settings.fps_window,
            Instant::now(),
        )));
        let handle = LiveHandle::new(Arc::clone(&state), settings);
        let producer = Self {
            source,
            pipeline,
            state,
            frame_timeout: settings.frame_timeout,
            frames: 0,
        };
        (producer, handle)
    }

    /// Acquire and process one frame.
    ///
    /// Projection and fitting run without the state lock; calibration, history
    /// and publishing happen under it, so a concurrent zero reset is either
    /// fully before or fully after this frame.
    pub fn step(&mut self) -> Result<()> {
        let frame = self.source.next_frame(self.frame_timeout)?;
        let analysis = self.pipeline.analyze(&frame)?;
        let now = Instant::now();
        lock(&self.state).ingest(frame, analysis, now);
        self.frames += 1;
        Ok(())
    }

    /// Process frames until `stop` fires or is dropped, or a step fails.
    ///
    /// Returns the number of frames processed. Every subscription is closed on
    /// the way out.
    pub fn run(&mut self, stop: &Receiver<()>) -> Result<u64> {
        let span = ProducerSpan::new(self.source.name(), self.pipeline.fitter_name());
        let _enter = span.enter();
        lock(&self.state).set_running();
        info!(timeout_ms = self.frame_timeout.as_millis() as u64, "producer started");

        let result = loop {
            match stop.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break Ok(self.frames),
                Err(TryRecvError::Empty) => {}
            }
            if let Err(err) = self.step() {
                break Err(err);
            }
        };

        let error = result.as_ref().err();
        lock(&self.state).shut_down(error);
        span.record_exit(self.frames, error.map(|e| e as &dyn std::error::Error));
        result
    }

    /// Run on a dedicated thread.
    pub fn spawn(mut self) -> Result<ProducerHandle> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let join = thread::Builder::new()
            .name("producer".to_string())
            .spawn(move || self.run(&stop_rx))?;
        Ok(ProducerHandle { stop_tx, join })
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

pub struct ProducerHandle {
    stop_tx: Sender<()>,
    join: JoinHandle<Result<u64>>,
}

impl ProducerHandle {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Ask the producer to stop after the current frame and wait for it.
    pub fn stop(self) -> Result<u64> {
        let _ = self.stop_tx.try_send(());
        self.join()
    }

    /// Wait for the producer to exit on its own.
    pub fn join(self) -> Result<u64> {
        self.join
            .join()
            .map_err(|_| Error::Acquisition("producer thread panicked".to_string()))?
    }
}
