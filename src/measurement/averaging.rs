use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowState {
    Idle,
    Collecting,
    Finalized,
}

/// Time-boxed mean of valid samples.
///
/// `Idle → Collecting → Finalized`, and `start` re-arms a finalized window.
/// Time is passed in by the caller so the producer can use frame arrival times.
#[derive(Debug, Clone)]
pub struct AveragingWindow {
    state: WindowState,
    started: Option<Instant>,
    duration: Duration,
    sum: f64,
    count: usize,
    result: Option<f64>,
}

impl Default for AveragingWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl AveragingWindow {
    pub fn new() -> Self {
        Self {
            state: WindowState::Idle,
            started: None,
            duration: Duration::ZERO,
            sum: 0.0,
            count: 0,
            result: None,
        }
    }

    pub fn state(&self) -> WindowState {
        self.state
    }

    pub fn is_collecting(&self) -> bool {
        self.state == WindowState::Collecting
    }

    /// Begin a new window, discarding any previous result.
    pub fn start(&mut self, duration: Duration, now: Instant) -> Result<()> {
        if self.is_collecting() {
            return Err(Error::WindowBusy);
        }
        self.state = WindowState::Collecting;
        self.started = Some(now);
        self.duration = duration;
        self.sum = 0.0;
        self.count = 0;
        self.result = None;
        Ok(())
    }

    /// Offer a sample taken at `now`. Non-finite values are ignored; samples
    /// outside a collecting window are no-ops.
    pub fn offer(&mut self, value: f64, now: Instant) {
        if !self.poll(now) {
            return;
        }
        if value.is_finite() {
            self.sum += value;
            self.count += 1;
        }
    }

    /// Finalize if the window has run its course. Returns whether the window is
    /// still collecting afterwards.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(started) = self.started.filter(|_| self.is_collecting()) else {
            return false;
        };
        if now.saturating_duration_since(started) >= self.duration {
            self.finalize();
            return false;
        }
        true
    }

    /// Time left before the window closes, if collecting.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let started = self.started.filter(|_| self.is_collecting())?;
        Some(self.duration.saturating_sub(now.saturating_duration_since(started)))
    }

    /// Mean of the collected samples, or 0 when none were valid. `None` until
    /// the window is finalized.
    pub fn result(&self) -> Option<f64> {
        self.result
    }

    pub fn sample_count(&self) -> usize {
        self.count
    }

    fn finalize(&mut self) {
        let mean = if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        };
        self.result = Some(mean);
        self.state = WindowState::Finalized;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D: Duration = Duration::from_secs(3);

    #[test]
    fn test_mean_skips_nan() {
        let t0 = Instant::now();
        let mut window = AveragingWindow::new();
        window.start(D, t0).unwrap();
        for (i, v) in [2.0, f64::NAN, 4.0, f64::NAN, 6.0].into_iter().enumerate() {
            window.offer(v, t0 + Duration::from_millis(100 * i as u64));
        }
        assert_eq!(window.result(), None);
        assert!(!window.poll(t0 + D));
        assert_eq!(window.state(), WindowState::Finalized);
        assert_eq!(window.result(), Some(4.0));
        assert_eq!(window.sample_count(), 3);
    }

    #[test]
    fn test_only_nan_yields_zero() {
        let t0 = Instant::now();
        let mut window = AveragingWindow::new();
        window.start(D, t0).unwrap();
        window.offer(f64::NAN, t0);
        window.offer(f64::INFINITY, t0 + Duration::from_millis(5));
        window.poll(t0 + D + Duration::from_millis(1));
        assert_eq!(window.result(), Some(0.0));
    }

    #[test]
    fn test_late_samples_are_ignored() {
        let t0 = Instant::now();
        let mut window = AveragingWindow::new();
        window.start(D, t0).unwrap();
        window.offer(1.0, t0);
        // The first late offer finalizes without being counted.
        window.offer(100.0, t0 + D);
        window.offer(100.0, t0 + D * 2);
        assert_eq!(window.result(), Some(1.0));
    }

    #[test]
    fn test_idle_offer_is_noop_and_restart() {
        let t0 = Instant::now();
        let mut window = AveragingWindow::new();
        window.offer(5.0, t0);
        assert_eq!(window.state(), WindowState::Idle);
        assert_eq!(window.result(), None);

        window.start(D, t0).unwrap();
        assert!(matches!(window.start(D, t0), Err(Error::WindowBusy)));
        window.offer(5.0, t0);
        window.poll(t0 + D);
        assert_eq!(window.result(), Some(5.0));

        let t1 = t0 + D * 2;
        window.start(D, t1).unwrap();
        assert_eq!(window.result(), None);
        assert_eq!(window.remaining(t1 + Duration::from_secs(1)), Some(Duration::from_secs(2)));
        window.offer(7.0, t1);
        window.poll(t1 + D);
        assert_eq!(window.result(), Some(7.0));
    }
}
