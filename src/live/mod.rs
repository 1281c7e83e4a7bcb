//! Live processing: one producer thread, any number of cloneable handles.
//!
//! The producer owns the frame source. Everything consumers may look at lives
//! in one mutex-guarded state the producer updates once
//! per frame; actions such as zero reset run under that same lock.

pub mod producer;
pub mod state;

pub use producer::{Producer, ProducerHandle};
pub use state::{DisplaySnapshot, FrameRateMeter};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::config::Config;
use crate::frame::{Axis, AxisPair};
use crate::measurement::{
    Cancellation, HistoryEntry, MeasurementRequest, OverflowPolicy, PeakSample, SampleFeed,
    StraightnessOutcome, StraightnessSampler,
};
use crate::{Error, Result};
use state::LiveState;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runtime knobs of the live pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveSettings {
    pub frame_timeout: Duration,
    pub history_capacity: usize,
    pub overflow: OverflowPolicy,
    pub subscriber_capacity: usize,
    pub fps_window: Duration,
    pub stall_timeout: Duration,
    /// Window used by [`LiveHandle::start_averaging`].
    pub averaging_duration: Duration,
    /// History points per axis in each [`DisplaySnapshot`].
    pub display_history_points: usize,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            frame_timeout: crate::acquisition::DEFAULT_FRAME_TIMEOUT,
            history_capacity: 36_000,
            overflow: OverflowPolicy::DropOldest,
            subscriber_capacity: 1024,
            fps_window: Duration::from_secs(3),
            stall_timeout: Duration::from_secs(5),
            averaging_duration: Duration::from_secs(3),
            display_history_points: 2000,
        }
    }
}

impl LiveSettings {
    /// Fails on second counts that are not representable as durations.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            frame_timeout: config.acquisition.frame_timeout(),
            history_capacity: config.history.capacity,
            overflow: config.history.overflow,
            subscriber_capacity: config.straightness.subscriber_capacity,
            fps_window: config.display.fps_window()?,
            stall_timeout: config.straightness.stall_timeout(),
            averaging_duration: config.averaging.default_duration()?,
            display_history_points: config.display.history_points,
        })
    }
}

/// Consumer side of the live pipeline.
#[derive(Clone)]
pub struct LiveHandle {
    state: Arc<Mutex<LiveState>>,
    sampler: Arc<Mutex<StraightnessSampler>>,
    averaging_duration: Duration,
    display_history_points: usize,
}

impl LiveHandle {
    pub(crate) fn new(state: Arc<Mutex<LiveState>>, settings: &LiveSettings) -> Self {
        Self {
            state,
            sampler: Arc::new(Mutex::new(StraightnessSampler::new(settings.stall_timeout))),
            averaging_duration: settings.averaging_duration,
            display_history_points: settings.display_history_points,
        }
    }

    /// Copy of the state for rendering. History is limited to the newest
    /// `display_history_points` per axis so the producer is not held up.
    pub fn snapshot(&self) -> DisplaySnapshot {
        lock(&self.state).snapshot(Instant::now(), self.display_history_points)
    }

    /// Every buffered valid history point of `axis`, oldest first.
    pub fn history(&self, axis: Axis) -> Vec<(f64, f64)> {
        lock(&self.state).history_series(axis)
    }

    /// Make the latest valid peak on `axis` the new zero. Returns the new
    /// baseline in pixels.
    pub fn reset_zero(&self, axis: Axis) -> Result<f64> {
        lock(&self.state).reset_zero(axis, Instant::now())
    }

    /// Start averaging both axes of the live stream for the configured window.
    pub fn start_averaging(&self) -> Result<()> {
        self.start_averaging_for(self.averaging_duration)
    }

    pub fn start_averaging_for(&self, duration: Duration) -> Result<()> {
        lock(&self.state).start_averaging(duration, Instant::now())
    }

    pub fn averaging_duration(&self) -> Duration {
        self.averaging_duration
    }

    /// Results of the last finished live averaging window.
    pub fn averaged(&self) -> AxisPair<Option<f64>> {
        lock(&self.state).averaged(Instant::now())
    }

    /// Hand the buffered history of `axis` to the caller and empty it.
    pub fn drain_history(&self, axis: Axis) -> Vec<HistoryEntry> {
        lock(&self.state).drain_history(axis)
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).is_running()
    }

    /// Average the live stream at one stage position and store the result.
    ///
    /// Blocks the calling thread for the request's timeframe. A second call
    /// while one is in flight fails with [`Error::WindowBusy`].
    pub fn take_measurement(
        &self,
        request: &MeasurementRequest,
        cancel: &Cancellation,
    ) -> Result<StraightnessOutcome> {
        let mut sampler = self.try_sampler()?;
        let outcome = sampler.take_measurement(self, request, cancel)?;
        lock(&self.state).set_straightness(Some(outcome.clone()));
        Ok(outcome)
    }

    pub fn clear_straightness(&self) -> Result<()> {
        self.try_sampler()?.clear();
        lock(&self.state).set_straightness(None);
        Ok(())
    }

    /// Run `f` against the straightness sampler, e.g. to read a record.
    pub fn with_sampler<R>(&self, f: impl FnOnce(&StraightnessSampler) -> R) -> Result<R> {
        let sampler = self.try_sampler()?;
        Ok(f(&sampler))
    }

    fn try_sampler(&self) -> Result<MutexGuard<'_, StraightnessSampler>> {
        match self.sampler.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(Error::WindowBusy),
        }
    }
}

impl SampleFeed for LiveHandle {
    fn subscribe(&self) -> Receiver<PeakSample> {
        lock(&self.state).subscribe()
    }
}
