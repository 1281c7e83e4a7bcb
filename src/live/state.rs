use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, info};

use crate::frame::{Axis, AxisPair, Frame};
use crate::measurement::{
    AveragingWindow, HistoryEntry, OverflowPolicy, PeakHistoryLog, PeakSample,
    StraightnessOutcome, ZeroReferenceTracker,
};
use crate::processing::{CalibrationConverter, FrameAnalysis, IntensityProfile, PeakFitResult};
use crate::{Error, Result};

/// Frames per second over a sliding time window.
#[derive(Debug, Clone)]
pub struct FrameRateMeter {
    window: Duration,
    arrivals: VecDeque<Instant>,
}

impl FrameRateMeter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            arrivals: VecDeque::new(),
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.arrivals.push_back(now);
        while let Some(&oldest) = self.arrivals.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.arrivals.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn fps(&self) -> f64 {
        match (self.arrivals.front(), self.arrivals.back()) {
            (Some(first), Some(last)) if self.arrivals.len() > 1 => {
                let span = last.saturating_duration_since(*first).as_secs_f64();
                if span > 0.0 {
                    (self.arrivals.len() - 1) as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

/// Everything the producer writes and consumers read, behind one mutex.
pub(crate) struct LiveState {
    tracker: ZeroReferenceTracker,
    history: PeakHistoryLog,
    converter: CalibrationConverter,
    profiles: Option<AxisPair<IntensityProfile>>,
    peaks: AxisPair<Option<PeakFitResult>>,
    latest: AxisPair<f64>,
    frame: Option<Arc<Frame>>,
    averaging: AxisPair<AveragingWindow>,
    fps: FrameRateMeter,
    frames: u64,
    subscribers: Vec<Sender<PeakSample>>,
    subscriber_capacity: usize,
    lost_samples: u64,
    straightness: Option<StraightnessOutcome>,
    running: bool,
    closed: bool,
    last_error: Option<String>,
}

impl LiveState {
    pub(crate) fn new(
        converter: CalibrationConverter,
        history_capacity: usize,
        overflow: OverflowPolicy,
        subscriber_capacity: usize,
        fps_window: Duration,
        now: Instant,
    ) -> Self {
        Self {
            tracker: ZeroReferenceTracker::new(now),
            history: PeakHistoryLog::new(history_capacity.max(1), overflow),
            converter,
            profiles: None,
            peaks: AxisPair::default(),
            latest: AxisPair::new(f64::NAN, f64::NAN),
            frame: None,
            averaging: AxisPair::default(),
            fps: FrameRateMeter::new(fps_window),
            frames: 0,
            subscribers: Vec::new(),
            subscriber_capacity: subscriber_capacity.max(1),
            lost_samples: 0,
            straightness: None,
            running: false,
            closed: false,
            last_error: None,
        }
    }

    /// Calibrate, zero-reference, record and publish one analysed frame.
    pub(crate) fn ingest(&mut self, frame: Frame, analysis: FrameAnalysis, now: Instant) {
        let FrameAnalysis { profiles, fits } = analysis;
        let mut values = AxisPair::new(f64::NAN, f64::NAN);

        for axis in Axis::BOTH {
            let raw = match &fits[axis] {
                Ok(fit) => {
                    self.peaks[axis] = Some(*fit);
                    Some(fit.center)
                }
                Err(err) => {
                    debug!(%axis, error = %err, "peak fit failed");
                    None
                }
            };
            self.tracker.observe(axis, raw);

            let value = raw
                .map(|px| self.converter.pixels_to_arcsec(self.tracker.relative(axis, px)))
                .unwrap_or(f64::NAN);
            let elapsed_s = self.tracker.elapsed(axis, now).as_secs_f64();
            self.history.append(axis, elapsed_s, value);
            self.averaging[axis].offer(value, now);
            values[axis] = value;
        }

        self.latest = values;
        self.profiles = Some(profiles);
        self.frame = Some(Arc::new(frame));
        self.fps.tick(now);
        self.frames += 1;
        self.publish(PeakSample { at: now, values });
    }

    fn publish(&mut self, sample: PeakSample) {
        let mut lost = 0;
        self.subscribers.retain(|tx| match tx.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                lost += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        self.lost_samples += lost;
    }

    pub(crate) fn subscribe(&mut self) -> Receiver<PeakSample> {
        let (tx, rx) = crossbeam_channel::bounded(self.subscriber_capacity);
        // After shutdown the sender is dropped at once, so the receiver reads as closed.
        if !self.closed {
            self.subscribers.push(tx);
        }
        rx
    }

    /// Zero `axis` on its latest valid peak and restart its history.
    pub(crate) fn reset_zero(&mut self, axis: Axis, now: Instant) -> Result<f64> {
        let zero = self.tracker.reset(axis, now)?;
        self.history.clear(axis);
        info!(%axis, zero_px = zero, "zero reference reset");
        Ok(zero)
    }

    pub(crate) fn start_averaging(&mut self, duration: Duration, now: Instant) -> Result<()> {
        if Axis::BOTH.iter().any(|&axis| self.averaging[axis].is_collecting()) {
            return Err(Error::WindowBusy);
        }
        for axis in Axis::BOTH {
            self.averaging[axis].start(duration, now)?;
        }
        info!(duration_s = duration.as_secs_f64(), "live averaging started");
        Ok(())
    }

    /// Finished window means, finalizing any window whose time is up.
    pub(crate) fn averaged(&mut self, now: Instant) -> AxisPair<Option<f64>> {
        AxisPair::from_fn(|axis| {
            self.averaging[axis].poll(now);
            self.averaging[axis].result()
        })
    }

    pub(crate) fn averaging_remaining(&self, now: Instant) -> Option<Duration> {
        self.averaging.x.remaining(now)
    }

    pub(crate) fn history_series(&self, axis: Axis) -> Vec<(f64, f64)> {
        self.history.series(axis)
    }

    pub(crate) fn drain_history(&mut self, axis: Axis) -> Vec<HistoryEntry> {
        self.history.drain(axis)
    }

    pub(crate) fn set_straightness(&mut self, outcome: Option<StraightnessOutcome>) {
        self.straightness = outcome;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }

    pub(crate) fn set_running(&mut self) {
        self.running = true;
        self.last_error = None;
    }

    /// Mark the producer as gone and close every subscription.
    pub(crate) fn shut_down(&mut self, error: Option<&Error>) {
        self.running = false;
        self.closed = true;
        self.last_error = error.map(|e| e.to_string());
        self.subscribers.clear();
    }

    pub(crate) fn snapshot(&mut self, now: Instant, history_points: usize) -> DisplaySnapshot {
        let averaged = self.averaged(now);
        DisplaySnapshot {
            frame: self.frame.clone(),
            profiles: self.profiles.clone(),
            peaks: self.peaks,
            latest: self.latest,
            zero_px: AxisPair::from_fn(|axis| self.tracker.zero(axis)),
            history: AxisPair::from_fn(|axis| self.history.series_tail(axis, history_points)),
            dropped: AxisPair::from_fn(|axis| self.history.dropped(axis)),
            fps: self.fps.fps(),
            frames: self.frames,
            averaged,
            averaging_remaining: self.averaging_remaining(now),
            lost_samples: self.lost_samples,
            straightness: self.straightness.clone(),
            running: self.running,
            last_error: self.last_error.clone(),
        }
    }
}

/// Copy of the live state for rendering.
#[derive(Debug, Clone)]
pub struct DisplaySnapshot {
    pub frame: Option<Arc<Frame>>,
    pub profiles: Option<AxisPair<IntensityProfile>>,
    /// Latest converged fit per axis; kept when a later fit fails.
    pub peaks: AxisPair<Option<PeakFitResult>>,
    /// Latest calibrated value per axis in arcseconds, NaN after a failed fit.
    pub latest: AxisPair<f64>,
    pub zero_px: AxisPair<f64>,
    /// Newest `(elapsed_s, arcsec)` points with failed fits left out.
    pub history: AxisPair<Vec<(f64, f64)>>,
    pub dropped: AxisPair<u64>,
    pub fps: f64,
    pub frames: u64,
    pub averaged: AxisPair<Option<f64>>,
    pub averaging_remaining: Option<Duration>,
    /// Samples not delivered to subscribers that were full.
    pub lost_samples: u64,
    pub straightness: Option<StraightnessOutcome>,
    pub running: bool,
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_meter() {
        let start = Instant::now();
        let mut meter = FrameRateMeter::new(Duration::from_secs(1));
        assert_eq!(meter.fps(), 0.0);
        for i in 0..=10 {
            meter.tick(start + Duration::from_millis(i * 50));
        }
        assert!((meter.fps() - 20.0).abs() < 1e-9);

        // old arrivals fall out of the window
        meter.tick(start + Duration::from_millis(2000));
        assert_eq!(meter.fps(), 0.0);
    }
}
