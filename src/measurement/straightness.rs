//! Position-indexed straightness measurements.
//!
//! Each measurement averages the live calibrated stream for a fixed time,
//! converts the mean to the requested unit and stores it under a 1-based stage
//! position. After every store the whole record is detrended by a
//! least-squares line and summarised by its min-max spread.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::averaging::AveragingWindow;
use super::{PeakSample, SampleFeed};
use crate::frame::{Axis, AxisPair};
use crate::logging::MeasurementSpan;
use crate::processing::arcsec_to_microns;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StraightnessUnit {
    Microns,
    Arcseconds,
}

impl StraightnessUnit {
    pub fn convert(self, arcsec: f64, increment_m: f64) -> f64 {
        match self {
            StraightnessUnit::Microns => arcsec_to_microns(arcsec, increment_m),
            StraightnessUnit::Arcseconds => arcsec,
        }
    }
}

impl fmt::Display for StraightnessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StraightnessUnit::Microns => f.write_str("microns"),
            StraightnessUnit::Arcseconds => f.write_str("arcseconds"),
        }
    }
}

impl FromStr for StraightnessUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "microns" | "micron" | "um" | "µm" => Ok(StraightnessUnit::Microns),
            "arcseconds" | "arcsecond" | "arcsec" => Ok(StraightnessUnit::Arcseconds),
            _ => Err(Error::UnknownUnit(s.to_string())),
        }
    }
}

/// Validated inputs of one straightness measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRequest {
    /// Stage travel between positions, metres.
    pub increment_m: f64,
    pub timeframe: Duration,
    /// 1-based stage position.
    pub position: usize,
    pub unit: StraightnessUnit,
}

impl MeasurementRequest {
    pub fn new(
        increment_m: f64,
        timeframe_s: f64,
        position: usize,
        unit: StraightnessUnit,
    ) -> Result<Self> {
        if !increment_m.is_finite() || increment_m <= 0.0 {
            return Err(Error::InvalidInput {
                field: "increment",
                value: increment_m.to_string(),
            });
        }
        let timeframe = Duration::try_from_secs_f64(timeframe_s)
            .ok()
            .filter(|d| !d.is_zero())
            .ok_or_else(|| Error::InvalidInput {
                field: "timeframe",
                value: timeframe_s.to_string(),
            })?;
        if position == 0 {
            return Err(Error::InvalidInput {
                field: "position",
                value: position.to_string(),
            });
        }
        Ok(Self {
            increment_m,
            timeframe,
            position,
            unit,
        })
    }

    /// Parse free-text inputs as typed by an operator.
    pub fn parse(increment: &str, timeframe: &str, position: &str, unit: &str) -> Result<Self> {
        let increment_m = parse_field::<f64>("increment", increment)?;
        let timeframe_s = parse_field::<f64>("timeframe", timeframe)?;
        let position = parse_field::<usize>("position", position)?;
        let unit = unit.parse()?;
        Self::new(increment_m, timeframe_s, position, unit)
    }
}

fn parse_field<T: FromStr>(field: &'static str, text: &str) -> Result<T> {
    text.trim().parse().map_err(|_| Error::InvalidInput {
        field,
        value: text.to_string(),
    })
}

/// Dense per-axis values indexed by 1-based position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StraightnessRecord {
    values: Vec<f64>,
}

impl StraightnessRecord {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, position: usize) -> Option<f64> {
        position.checked_sub(1).and_then(|i| self.values.get(i).copied())
    }

    pub fn positions(&self) -> Vec<f64> {
        (1..=self.values.len()).map(|p| p as f64).collect()
    }

    /// Fails without storing if `position` would leave a gap.
    pub fn check_position(&self, position: usize) -> Result<()> {
        if position == 0 || position > self.values.len() + 1 {
            return Err(Error::PositionGap {
                position,
                len: self.values.len(),
            });
        }
        Ok(())
    }

    /// Overwrite an existing position or append the next one.
    pub fn store(&mut self, position: usize, value: f64) -> Result<()> {
        self.check_position(position)?;
        match self.values.get_mut(position - 1) {
            Some(slot) => *slot = value,
            None => self.values.push(value),
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn detrended(&self) -> DetrendedProfile {
        DetrendedProfile::from_values(&self.positions(), &self.values)
    }
}

/// Record values with their least-squares line removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetrendedProfile {
    pub positions: Vec<f64>,
    pub values: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
}

impl DetrendedProfile {
    pub fn from_values(positions: &[f64], values: &[f64]) -> Self {
        let (slope, intercept) = linear_fit(positions, values);
        let detrended = positions
            .iter()
            .zip(values)
            .map(|(&x, &y)| y - (slope * x + intercept))
            .collect();
        Self {
            positions: positions.to_vec(),
            values: detrended,
            slope,
            intercept,
        }
    }

    /// Spread between the highest and lowest detrended value; 0 when empty.
    pub fn min_max(&self) -> f64 {
        let max = self.values.iter().copied().reduce(f64::max);
        let min = self.values.iter().copied().reduce(f64::min);
        match (max, min) {
            (Some(max), Some(min)) => max - min,
            _ => 0.0,
        }
    }

    /// Stage travel in metres for each point.
    pub fn distances(&self, increment_m: f64) -> Vec<f64> {
        self.positions.iter().map(|p| p * increment_m).collect()
    }
}

/// Ordinary least-squares line `y = slope · x + intercept`.
///
/// With fewer than two distinct abscissae the slope is 0 and the intercept the
/// mean.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut sxx, mut sxy) = (0.0, 0.0);
    for (&x, &y) in xs[..n].iter().zip(&ys[..n]) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }
    if sxx == 0.0 {
        return (0.0, mean_y);
    }
    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}

/// Result of one stored measurement, with the recomputed profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StraightnessOutcome {
    pub position: usize,
    pub unit: StraightnessUnit,
    pub increment_m: f64,
    /// Window means before unit conversion.
    pub mean_arcsec: AxisPair<f64>,
    pub values: AxisPair<f64>,
    pub sample_counts: AxisPair<usize>,
    pub profiles: AxisPair<DetrendedProfile>,
    pub min_max: AxisPair<f64>,
    pub next_position: usize,
}

/// Cancels an in-flight measurement from another thread. A cancel issued
/// while no measurement is running is discarded when the next one starts.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Sender<()>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.try_send(());
    }
}

#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: Receiver<()>,
}

impl Cancellation {
    /// A token nobody can trigger.
    pub fn never() -> Self {
        Self {
            rx: crossbeam_channel::never(),
        }
    }

    fn discard_pending(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

fn offer_sample(windows: &mut AxisPair<AveragingWindow>, sample: &PeakSample) {
    for axis in Axis::BOTH {
        windows[axis].offer(sample.values[axis], sample.at);
    }
}

/// Samples already queued when the deadline fires; the windows ignore any
/// taken after it.
fn drain_queued(samples: &Receiver<PeakSample>, windows: &mut AxisPair<AveragingWindow>) {
    for sample in samples.try_iter() {
        offer_sample(windows, &sample);
    }
}

pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = crossbeam_channel::bounded(1);
    (CancelHandle { tx }, Cancellation { rx })
}

/// Collects per-position averages for both axes.
#[derive(Debug)]
pub struct StraightnessSampler {
    records: AxisPair<StraightnessRecord>,
    unit: Option<StraightnessUnit>,
    next_position: usize,
    stall_timeout: Duration,
    last_outcome: Option<StraightnessOutcome>,
}

impl StraightnessSampler {
    /// `stall_timeout` bounds the gap between two samples during a measurement.
    pub fn new(stall_timeout: Duration) -> Self {
        Self {
            records: AxisPair::default(),
            unit: None,
            next_position: 1,
            stall_timeout,
            last_outcome: None,
        }
    }

    pub fn next_position(&self) -> usize {
        self.next_position
    }

    pub fn record(&self, axis: Axis) -> &StraightnessRecord {
        &self.records[axis]
    }

    /// Unit of the stored values, once anything is stored.
    pub fn unit(&self) -> Option<StraightnessUnit> {
        self.unit
    }

    pub fn profile(&self, axis: Axis) -> DetrendedProfile {
        self.records[axis].detrended()
    }

    pub fn last_outcome(&self) -> Option<&StraightnessOutcome> {
        self.last_outcome.as_ref()
    }

    /// Average the live stream for `request.timeframe` and store the result.
    ///
    /// Blocks the caller, never the producer. Cancellation, a stalled or closed
    /// stream, or a rejected position leave the record untouched.
    pub fn take_measurement<F>(
        &mut self,
        feed: &F,
        request: &MeasurementRequest,
        cancel: &Cancellation,
    ) -> Result<StraightnessOutcome>
    where
        F: SampleFeed + ?Sized,
    {
        self.check_request(request)?;
        cancel.discard_pending();

        let span = MeasurementSpan::new(request.position, request.unit, request.timeframe);
        let _entered = span.span().enter();
        let samples = feed.subscribe();
        let started = Instant::now();
        let deadline = started + request.timeframe;

        let mut windows = AxisPair::from_fn(|_| AveragingWindow::new());
        for axis in Axis::BOTH {
            windows[axis].start(request.timeframe, started)?;
        }

        let result = self.collect(&samples, &mut windows, deadline, cancel);
        drop(samples);
        if let Err(err) = result {
            span.record_failure(&err);
            return Err(err);
        }

        let end = deadline.max(Instant::now());
        let means = AxisPair::from_fn(|axis| {
            windows[axis].poll(end);
            windows[axis].result().unwrap_or(0.0)
        });
        let counts = AxisPair::from_fn(|axis| windows[axis].sample_count());
        span.record_samples(counts.x, counts.y);

        let outcome = self.record_average(request, means, counts)?;
        span.record_result(outcome.values.x, outcome.values.y, outcome.min_max.x, outcome.min_max.y);
        Ok(outcome)
    }

    fn collect(
        &self,
        samples: &Receiver<PeakSample>,
        windows: &mut AxisPair<AveragingWindow>,
        deadline: Instant,
        cancel: &Cancellation,
    ) -> Result<()> {
        let finished = crossbeam_channel::at(deadline);
        let mut cancellable = true;
        let mut last_sample = Instant::now();

        loop {
            let stalled = crossbeam_channel::at(last_sample + self.stall_timeout);
            let cancel_rx = if cancellable {
                cancel.rx.clone()
            } else {
                crossbeam_channel::never()
            };
            select! {
                recv(samples) -> msg => {
                    let sample = msg.map_err(|_| Error::StreamClosed)?;
                    last_sample = Instant::now();
                    offer_sample(windows, &sample);
                }
                recv(cancel_rx) -> msg => {
                    if msg.is_ok() {
                        return Err(Error::MeasurementCancelled);
                    }
                    // Every handle dropped: nothing can cancel any more.
                    cancellable = false;
                }
                recv(finished) -> _ => {
                    drain_queued(samples, windows);
                    return Ok(());
                }
                recv(stalled) -> _ => {
                    if Instant::now() >= deadline {
                        drain_queued(samples, windows);
                        return Ok(());
                    }
                    return Err(Error::StreamStalled(self.stall_timeout));
                }
            }
        }
    }

    fn check_request(&self, request: &MeasurementRequest) -> Result<()> {
        for axis in Axis::BOTH {
            self.records[axis].check_position(request.position)?;
        }
        match self.unit {
            Some(unit) if unit != request.unit && !self.records.x.is_empty() => {
                Err(Error::InvalidInput {
                    field: "unit",
                    value: format!("{} (record holds {})", request.unit, unit),
                })
            }
            _ => Ok(()),
        }
    }

    /// Store already-averaged arcsecond means for `request.position`.
    pub fn record_average(
        &mut self,
        request: &MeasurementRequest,
        mean_arcsec: AxisPair<f64>,
        sample_counts: AxisPair<usize>,
    ) -> Result<StraightnessOutcome> {
        self.check_request(request)?;

        let values = mean_arcsec.map(|mean| request.unit.convert(mean, request.increment_m));
        for axis in Axis::BOTH {
            self.records[axis].store(request.position, values[axis])?;
        }
        self.unit = Some(request.unit);
        self.next_position = request.position + 1;

        let profiles = AxisPair::from_fn(|axis| self.records[axis].detrended());
        let min_max = AxisPair::from_fn(|axis| profiles[axis].min_max());
        debug!(
            position = request.position,
            stored = self.records.x.len(),
            "straightness record updated"
        );

        let outcome = StraightnessOutcome {
            position: request.position,
            unit: request.unit,
            increment_m: request.increment_m,
            mean_arcsec,
            values,
            sample_counts,
            profiles,
            min_max,
            next_position: self.next_position,
        };
        self.last_outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Forget every stored position. Safe to call repeatedly.
    pub fn clear(&mut self) {
        for axis in Axis::BOTH {
            self.records[axis].clear();
        }
        self.unit = None;
        self.next_position = 1;
        self.last_outcome = None;
        info!("straightness record cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(position: usize, unit: StraightnessUnit) -> MeasurementRequest {
        MeasurementRequest::new(0.1, 1.0, position, unit).unwrap()
    }

    #[test]
    fn test_linear_fit_exact_line() {
        let (slope, intercept) = linear_fit(&[1.0, 2.0, 3.0, 4.0], &[3.0, 5.0, 7.0, 9.0]);
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert_eq!(linear_fit(&[2.0], &[4.0]), (0.0, 4.0));
    }

    #[test]
    fn test_detrend_removes_tilt() {
        let profile = DetrendedProfile::from_values(&[1.0, 2.0, 3.0], &[0.0, 1.0, 2.0]);
        assert!(profile.values.iter().all(|v| v.abs() < 1e-12));
        assert!(profile.min_max().abs() < 1e-12);

        let bowed = DetrendedProfile::from_values(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.0]);
        assert!((bowed.min_max() - 1.0).abs() < 1e-12);
        assert_eq!(bowed.distances(0.1), vec![0.1, 0.2, 0.30000000000000004]);
    }

    #[test]
    fn test_record_overwrite_append_and_gap() {
        let mut record = StraightnessRecord::default();
        record.store(1, 1.0).unwrap();
        record.store(2, 2.0).unwrap();
        record.store(1, 5.0).unwrap();
        assert_eq!(record.values(), &[5.0, 2.0]);
        assert!(matches!(
            record.store(4, 1.0),
            Err(Error::PositionGap { position: 4, len: 2 })
        ));
        assert!(record.store(0, 1.0).is_err());
        assert_eq!(record.len(), 2);
        assert_eq!(record.get(2), Some(2.0));
        assert_eq!(record.get(0), None);
    }

    #[test]
    fn test_linear_height_differences_detrend_to_zero() {
        let mut sampler = StraightnessSampler::new(Duration::from_secs(1));
        for (position, microns) in [(1, 0.0), (2, 1.0), (3, 2.0)] {
            let arcsec = crate::processing::microns_to_arcsec(microns, 0.1);
            let outcome = sampler
                .record_average(
                    &request(position, StraightnessUnit::Microns),
                    AxisPair::new(arcsec, arcsec),
                    AxisPair::new(1, 1),
                )
                .unwrap();
            assert_eq!(outcome.next_position, position + 1);
        }
        let outcome = sampler.last_outcome().unwrap();
        assert!(outcome.profiles.x.values.iter().all(|v| v.abs() < 1e-9));
        assert!(outcome.min_max.x.abs() < 1e-9);
        assert!(outcome.min_max.y.abs() < 1e-9);
        assert!((outcome.values.x - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_repeat_position_replaces_value() {
        let mut sampler = StraightnessSampler::new(Duration::from_secs(1));
        let req = |p| request(p, StraightnessUnit::Arcseconds);
        sampler.record_average(&req(1), AxisPair::new(1.0, 1.0), AxisPair::default()).unwrap();
        sampler.record_average(&req(2), AxisPair::new(2.0, 2.0), AxisPair::default()).unwrap();
        sampler.record_average(&req(2), AxisPair::new(7.0, -7.0), AxisPair::default()).unwrap();
        assert_eq!(sampler.record(Axis::X).values(), &[1.0, 7.0]);
        assert_eq!(sampler.record(Axis::Y).values(), &[1.0, -7.0]);
        assert_eq!(sampler.next_position(), 3);
    }

    #[test]
    fn test_mixed_units_rejected() {
        let mut sampler = StraightnessSampler::new(Duration::from_secs(1));
        sampler
            .record_average(&request(1, StraightnessUnit::Microns), AxisPair::new(1.0, 1.0), AxisPair::default())
            .unwrap();
        let err = sampler
            .record_average(&request(2, StraightnessUnit::Arcseconds), AxisPair::new(1.0, 1.0), AxisPair::default())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { field: "unit", .. }));
        assert_eq!(sampler.record(Axis::X).len(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut sampler = StraightnessSampler::new(Duration::from_secs(1));
        sampler
            .record_average(&request(1, StraightnessUnit::Arcseconds), AxisPair::new(1.0, 1.0), AxisPair::default())
            .unwrap();
        sampler.clear();
        sampler.clear();
        assert!(sampler.record(Axis::X).is_empty());
        assert!(sampler.record(Axis::Y).is_empty());
        assert_eq!(sampler.next_position(), 1);
        assert!(sampler.unit().is_none());
        assert!(sampler.last_outcome().is_none());
    }

    #[test]
    fn test_request_parsing() {
        let parsed = MeasurementRequest::parse("0.1", "3", "2", "microns").unwrap();
        assert_eq!(parsed.position, 2);
        assert_eq!(parsed.timeframe, Duration::from_secs(3));

        assert!(matches!(
            MeasurementRequest::parse("abc", "3", "1", "microns"),
            Err(Error::InvalidInput { field: "increment", .. })
        ));
        assert!(matches!(
            MeasurementRequest::parse("0.1", "", "1", "microns"),
            Err(Error::InvalidInput { field: "timeframe", .. })
        ));
        assert!(matches!(
            MeasurementRequest::parse("0.1", "3", "1.5", "microns"),
            Err(Error::InvalidInput { field: "position", .. })
        ));
        assert!(matches!(
            MeasurementRequest::parse("0.1", "3", "1", "furlongs"),
            Err(Error::UnknownUnit(_))
        ));
        assert!(MeasurementRequest::parse("0.1", "-1", "1", "arcsec").is_err());
        assert!(MeasurementRequest::parse("0.1", "3", "0", "arcsec").is_err());
    }

    /// Feed handing out clones of one pre-filled queue.
    struct QueueFeed(Receiver<PeakSample>);

    impl SampleFeed for QueueFeed {
        fn subscribe(&self) -> Receiver<PeakSample> {
            self.0.clone()
        }
    }

    fn sample_at(at: Instant, x: f64, y: f64) -> PeakSample {
        PeakSample {
            at,
            values: AxisPair::new(x, y),
        }
    }

    #[test]
    fn test_deadline_keeps_samples_already_queued() {
        let start = Instant::now();
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(sample_at(start + Duration::from_millis(10), 2.0, 1.0)).unwrap();
        tx.send(sample_at(start + Duration::from_millis(20), 4.0, 1.0)).unwrap();
        tx.send(sample_at(start + Duration::from_secs(2), 100.0, 1.0)).unwrap();

        let mut windows = AxisPair::from_fn(|_| AveragingWindow::new());
        for axis in Axis::BOTH {
            windows[axis].start(Duration::from_secs(1), start).unwrap();
        }
        drain_queued(&rx, &mut windows);
        windows.x.poll(start + Duration::from_secs(1));

        assert_eq!(windows.x.sample_count(), 2);
        assert_eq!(windows.x.result(), Some(3.0));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_cancel_before_start_is_discarded() {
        let (tx, rx) = crossbeam_channel::unbounded();
        for _ in 0..5 {
            tx.send(sample_at(Instant::now(), 1.0, -1.0)).unwrap();
        }
        let (handle, cancel) = cancellation();
        handle.cancel();

        let mut sampler = StraightnessSampler::new(Duration::from_secs(1));
        let request = MeasurementRequest::new(0.1, 0.05, 1, StraightnessUnit::Arcseconds).unwrap();
        let outcome = sampler
            .take_measurement(&QueueFeed(rx), &request, &cancel)
            .unwrap();
        assert_eq!(outcome.sample_counts.x, 5);
        assert!((outcome.values.y + 1.0).abs() < 1e-12);
        drop(tx);
    }

    mod span_scope {
        use super::*;
        use std::sync::{Arc, Mutex};
        use tracing::{Event, Subscriber};
        use tracing_subscriber::layer::{Context, Layer};
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::registry::LookupSpan;

        /// Notes, per event, whether it was emitted inside a measurement span.
        #[derive(Clone, Default)]
        struct ScopeRecorder {
            events: Arc<Mutex<Vec<bool>>>,
        }

        impl<S> Layer<S> for ScopeRecorder
        where
            S: Subscriber + for<'a> LookupSpan<'a>,
        {
            fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
                let inside = ctx
                    .event_scope(event)
                    .map(|scope| scope.from_root().any(|span| span.name() == "straightness_measurement"))
                    .unwrap_or(false);
                self.events.lock().unwrap().push(inside);
            }
        }

        #[test]
        fn test_measurement_events_carry_the_span() {
            let recorder = ScopeRecorder::default();
            let subscriber = tracing_subscriber::registry().with(recorder.clone());

            tracing::subscriber::with_default(subscriber, || {
                let (tx, rx) = crossbeam_channel::unbounded();
                tx.send(sample_at(Instant::now(), 1.0, 1.0)).unwrap();
                let mut sampler = StraightnessSampler::new(Duration::from_secs(1));
                let request =
                    MeasurementRequest::new(0.1, 0.02, 1, StraightnessUnit::Arcseconds).unwrap();
                sampler
                    .take_measurement(&QueueFeed(rx), &request, &Cancellation::never())
                    .unwrap();
                drop(tx);
            });

            let events = recorder.events.lock().unwrap();
            // started, record updated, stored
            assert!(events.len() >= 3, "only {} events", events.len());
            assert!(events.iter().all(|&inside| inside));
        }
    }
}
