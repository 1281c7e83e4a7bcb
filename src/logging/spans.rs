//! Structured spans for measurement sessions
//!
//! Each straightness measurement and each producer run gets its own span with a
//! correlation ID, so every event logged while it is active can be traced back
//! to the action that caused it.

use std::fmt::Display;
use std::time::{Duration, Instant};

use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Span covering one averaged straightness measurement
pub struct MeasurementSpan {
    span: Span,
    start_time: Instant,
    correlation_id: Uuid,
}

impl MeasurementSpan {
    pub fn new(position: usize, unit: impl Display, timeframe: Duration) -> Self {
        let correlation_id = super::current_or_new_correlation_id();
        let span = span!(
            Level::INFO,
            "straightness_measurement",
            correlation_id = %correlation_id,
            position = position,
            unit = %unit,
            timeframe_s = timeframe.as_secs_f64(),
            samples_x = field::Empty,
            samples_y = field::Empty,
            value_x = field::Empty,
            value_y = field::Empty,
            success = field::Empty,
        );
        tracing::info!(parent: &span, "Measurement started");

        Self {
            span,
            start_time: Instant::now(),
            correlation_id,
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Record how many valid samples each axis window accepted
    pub fn record_samples(&self, samples_x: usize, samples_y: usize) {
        self.span.record("samples_x", samples_x);
        self.span.record("samples_y", samples_y);
        if samples_x == 0 || samples_y == 0 {
            tracing::warn!(
                parent: &self.span,
                samples_x,
                samples_y,
                "Averaging window closed without valid samples on at least one axis"
            );
        }
    }

    /// Record the stored values and the resulting min-max spread
    pub fn record_result(&self, value_x: f64, value_y: f64, min_max_x: f64, min_max_y: f64) {
        self.span.record("value_x", value_x);
        self.span.record("value_y", value_y);
        self.span.record("success", true);
        tracing::info!(
            parent: &self.span,
            value_x = format!("{:.4}", value_x),
            value_y = format!("{:.4}", value_y),
            min_max_x = format!("{:.4}", min_max_x),
            min_max_y = format!("{:.4}", min_max_y),
            duration_ms = self.start_time.elapsed().as_millis(),
            "Measurement stored"
        );
    }

    pub fn record_failure(&self, error: &dyn std::error::Error) {
        self.span.record("success", false);
        tracing::warn!(
            parent: &self.span,
            error = %error,
            duration_ms = self.start_time.elapsed().as_millis(),
            "Measurement aborted"
        );
    }

    /// Get the underlying span
    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// Span for one producer run, from first frame request to exit
pub struct ProducerSpan {
    span: Span,
    start_time: Instant,
    session_id: Uuid,
}

impl ProducerSpan {
    pub fn new(source: &str, fitter: &str) -> Self {
        let session_id = Uuid::new_v4();
        let span = span!(
            Level::INFO,
            "producer",
            session_id = %session_id,
            source = source,
            fitter = fitter,
            frames = field::Empty,
        );

        Self {
            span,
            start_time: Instant::now(),
            session_id,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_exit(&self, frames: u64, error: Option<&dyn std::error::Error>) {
        self.span.record("frames", frames);
        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        match error {
            Some(error) => tracing::error!(
                parent: &self.span,
                frames,
                elapsed_s,
                error = %error,
                "Producer stopped on error"
            ),
            None => tracing::info!(parent: &self.span, frames, elapsed_s, "Producer stopped"),
        }
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}
