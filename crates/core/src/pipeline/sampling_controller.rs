use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::capture::domain::frame_source::FrameSource;
use crate::detection::domain::gaze_detector::GazeDetector;
use crate::pipeline::analyze_frame_use_case::{AnalyzeFrameUseCase, CycleError, CycleOutcome};
use crate::pipeline::infrastructure::repeating_task::RepeatingTask;
use crate::pipeline::tracking_listener::{TrackingEvent, TrackingListener};
use crate::shared::constants::{DEFAULT_EYE_CONFIDENCE_THRESHOLD, DEFAULT_INTERVAL_MS};
use crate::tracking::domain::sample_store::SampleStore;
use crate::tracking::domain::tracking_sample::TrackingSample;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("tracking interval must be greater than zero")]
    ZeroInterval,
    #[error("confidence threshold must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(f64),
}

/// Tunables for a sampling controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub interval: Duration,
    /// Minimum eye-direction confidence (percent) for eye angles to count.
    pub confidence_threshold: f64,
    /// Whether judged samples are appended to the sample store.
    pub record_samples: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            confidence_threshold: DEFAULT_EYE_CONFIDENCE_THRESHOLD,
            record_samples: true,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_interval(self.interval)?;
        validate_threshold(self.confidence_threshold)
    }
}

fn validate_interval(interval: Duration) -> Result<(), ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::ZeroInterval);
    }
    Ok(())
}

fn validate_threshold(pct: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&pct) {
        return Err(ConfigError::ThresholdOutOfRange(pct));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    Idle,
    Running,
}

/// State shared between the controller and its in-flight cycles.
struct CycleContext {
    use_case: AnalyzeFrameUseCase,
    store: Mutex<SampleStore>,
    threshold_bits: AtomicU64,
    recording: AtomicBool,
    /// Advanced on every stop; cycles from an earlier run are stale.
    generation: AtomicU64,
    listener: Arc<dyn TrackingListener>,
}

impl CycleContext {
    fn threshold(&self) -> f64 {
        f64::from_bits(self.threshold_bits.load(Ordering::SeqCst))
    }

    fn store(&self) -> MutexGuard<'_, SampleStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: TrackingEvent) {
        self.listener.on_event(&event);
    }

    /// Runs one cycle. `generation` is `Some` for timer-driven cycles, whose
    /// results are dropped if tracking was stopped while they ran.
    fn run_cycle(&self, generation: Option<u64>) -> Result<CycleOutcome, CycleError> {
        let result = self.use_case.execute(self.threshold());

        if let Some(started_in) = generation {
            if self.generation.load(Ordering::SeqCst) != started_in {
                self.emit(TrackingEvent::StaleDiscarded);
                return result;
            }
        }

        match &result {
            Ok(CycleOutcome::Judged(report)) => {
                self.emit(TrackingEvent::Judged(report.clone()));
                if self.recording.load(Ordering::SeqCst) {
                    let total = {
                        let mut store = self.store();
                        store.append(report.to_sample());
                        store.len()
                    };
                    self.emit(TrackingEvent::SampleRecorded { total });
                }
            }
            Ok(CycleOutcome::NoFace) => self.emit(TrackingEvent::NoFace),
            Ok(CycleOutcome::CaptureUnavailable) => self.emit(TrackingEvent::CaptureUnavailable),
            Err(e) => self.emit(TrackingEvent::CycleFailed(e.to_string())),
        }
        result
    }
}

/// Fires a timer-driven cycle on its own thread. Cycles may overlap when a
/// detector round trip outlasts the interval; samples land in completion
/// order.
fn spawn_cycle(ctx: Arc<CycleContext>, generation: u64) {
    std::thread::spawn(move || {
        let _ = ctx.run_cycle(Some(generation));
    });
}

/// Drives capture → detect → interpret → record cycles on a timer.
///
/// Idle on creation. `start` runs one cycle immediately and then one per
/// interval; `stop` cancels the schedule. A detector call already in flight
/// when `stop` is called still completes, but its result is discarded.
pub struct SamplingController {
    ctx: Arc<CycleContext>,
    interval: Duration,
    timer: Option<RepeatingTask>,
}

impl SamplingController {
    pub fn new(
        frame_source: Box<dyn FrameSource>,
        detector: Box<dyn GazeDetector>,
        listener: Arc<dyn TrackingListener>,
        config: ControllerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let ctx = CycleContext {
            use_case: AnalyzeFrameUseCase::new(frame_source, detector),
            store: Mutex::new(SampleStore::new()),
            threshold_bits: AtomicU64::new(config.confidence_threshold.to_bits()),
            recording: AtomicBool::new(config.record_samples),
            generation: AtomicU64::new(0),
            listener,
        };
        Ok(Self {
            ctx: Arc::new(ctx),
            interval: config.interval,
            timer: None,
        })
    }

    pub fn mode(&self) -> ControllerMode {
        if self.timer.is_some() {
            ControllerMode::Running
        } else {
            ControllerMode::Idle
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.ctx.threshold()
    }

    pub fn is_recording(&self) -> bool {
        self.ctx.recording.load(Ordering::SeqCst)
    }

    pub fn start(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let generation = self.ctx.generation.load(Ordering::SeqCst);
        self.ctx.emit(TrackingEvent::Started {
            interval: self.interval,
        });
        spawn_cycle(self.ctx.clone(), generation);
        self.timer = Some(self.schedule());
    }

    pub fn stop(&mut self) {
        let Some(mut timer) = self.timer.take() else {
            return;
        };
        timer.cancel();
        self.ctx.generation.fetch_add(1, Ordering::SeqCst);
        self.ctx.emit(TrackingEvent::Stopped);
    }

    /// Changes the cadence. When running, the timer is rescheduled; cycles
    /// already in flight are unaffected.
    pub fn set_interval(&mut self, interval: Duration) -> Result<(), ConfigError> {
        validate_interval(interval)?;
        self.interval = interval;
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
            self.timer = Some(self.schedule());
            self.ctx.emit(TrackingEvent::IntervalChanged(interval));
        }
        Ok(())
    }

    /// Applies to cycles started from now on.
    pub fn set_confidence_threshold(&mut self, pct: f64) -> Result<(), ConfigError> {
        validate_threshold(pct)?;
        self.ctx.threshold_bits.store(pct.to_bits(), Ordering::SeqCst);
        self.ctx.emit(TrackingEvent::ThresholdChanged(pct));
        Ok(())
    }

    pub fn set_recording(&mut self, enabled: bool) {
        self.ctx.recording.store(enabled, Ordering::SeqCst);
        self.ctx.emit(TrackingEvent::RecordingChanged(enabled));
    }

    /// One-shot mode: runs a single cycle on the calling thread, in either
    /// mode, and returns its outcome.
    pub fn capture_once(&self) -> Result<CycleOutcome, CycleError> {
        self.ctx.run_cycle(None)
    }

    /// Snapshot of recorded samples, oldest first.
    pub fn export_samples(&self) -> Vec<TrackingSample> {
        self.ctx.store().export_all()
    }

    /// Recorded samples as the session-data JSON array.
    pub fn samples_json(&self) -> Result<String, serde_json::Error> {
        self.ctx.store().to_json()
    }

    pub fn sample_count(&self) -> usize {
        self.ctx.store().len()
    }

    pub fn clear_samples(&self) {
        self.ctx.store().clear();
    }

    /// Stops sampling and releases the controller.
    pub fn dispose(mut self) {
        self.stop();
    }

    fn schedule(&self) -> RepeatingTask {
        let ctx = self.ctx.clone();
        let generation = ctx.generation.load(Ordering::SeqCst);
        RepeatingTask::spawn(self.interval, move || spawn_cycle(ctx.clone(), generation))
    }
}

impl Drop for SamplingController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    use crossbeam_channel::Receiver;

    use super::*;
    use crate::detection::domain::gaze_detector::DetectError;
    use crate::gaze::domain::face_measurement::RawFaceMeasurement;
    use crate::gaze::domain::gaze_judgment::ConfidenceLevel;
    use crate::pipeline::analyze_frame_use_case::test_support::*;
    use crate::pipeline::tracking_listener::ChannelTrackingListener;

    const WAIT: Duration = Duration::from_secs(5);
    const HOUR: Duration = Duration::from_secs(3600);

    struct Harness {
        controller: SamplingController,
        events: Receiver<TrackingEvent>,
        detector_calls: Arc<AtomicUsize>,
    }

    fn harness(source: StubFrameSource, detector: ScriptedDetector, interval: Duration) -> Harness {
        let (tx, events) = crossbeam_channel::unbounded();
        let detector_calls = detector.calls.clone();
        let config = ControllerConfig {
            interval,
            ..ControllerConfig::default()
        };
        let controller = SamplingController::new(
            Box::new(source),
            Box::new(detector),
            Arc::new(ChannelTrackingListener::new(tx)),
            config,
        )
        .unwrap();
        Harness {
            controller,
            events,
            detector_calls,
        }
    }

    fn attentive(interval: Duration) -> Harness {
        harness(
            StubFrameSource::ready(),
            ScriptedDetector::returning(vec![attentive_face()]),
            interval,
        )
    }

    /// Waits for the first event matching `pred`, failing after `WAIT`.
    fn wait_for(events: &Receiver<TrackingEvent>, pred: impl Fn(&TrackingEvent) -> bool) {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match events.recv_timeout(remaining) {
                Ok(event) if pred(&event) => return,
                Ok(_) => continue,
                Err(_) => panic!("timed out waiting for event"),
            }
        }
    }

    fn is_judged(event: &TrackingEvent) -> bool {
        matches!(event, TrackingEvent::Judged(_))
    }

    fn is_recorded(event: &TrackingEvent) -> bool {
        matches!(event, TrackingEvent::SampleRecorded { .. })
    }

    // ── Configuration ────────────────────────────────────────────────

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.interval, Duration::from_millis(3000));
        assert_eq!(config.confidence_threshold, 70.0);
        assert!(config.record_samples);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let config = ControllerConfig {
            confidence_threshold: 101.0,
            ..ControllerConfig::default()
        };

        let result = SamplingController::new(
            Box::new(StubFrameSource::ready()),
            Box::new(ScriptedDetector::returning(vec![])),
            Arc::new(ChannelTrackingListener::new(tx)),
            config,
        );

        assert_eq!(result.err(), Some(ConfigError::ThresholdOutOfRange(101.0)));
    }

    #[test]
    fn test_new_controller_is_idle() {
        let h = attentive(HOUR);
        assert_eq!(h.controller.mode(), ControllerMode::Idle);
        assert_eq!(h.controller.sample_count(), 0);
    }

    // ── One-shot cycles ──────────────────────────────────────────────

    #[test]
    fn test_capture_once_records_judged_sample() {
        let h = attentive(HOUR);

        let outcome = h.controller.capture_once().unwrap();

        let CycleOutcome::Judged(report) = outcome else {
            panic!("expected a judgment");
        };
        assert!(report.judgment.is_looking_at_screen());
        assert_eq!(report.judgment.confidence_level(), ConfidenceLevel::High);
        assert!(report.judgment.reasons().is_empty());
        assert_eq!(h.controller.sample_count(), 1);
        assert_eq!(h.controller.mode(), ControllerMode::Idle);
    }

    #[test]
    fn test_capture_once_emits_judgment_then_recording() {
        let h = attentive(HOUR);

        h.controller.capture_once().unwrap();

        assert!(is_judged(&h.events.try_recv().unwrap()));
        assert_eq!(
            h.events.try_recv().unwrap(),
            TrackingEvent::SampleRecorded { total: 1 }
        );
    }

    #[test]
    fn test_no_face_records_nothing() {
        let h = harness(
            StubFrameSource::ready(),
            ScriptedDetector::returning(vec![]),
            HOUR,
        );

        let outcome = h.controller.capture_once().unwrap();

        assert_eq!(outcome, CycleOutcome::NoFace);
        assert_eq!(h.controller.sample_count(), 0);
        assert_eq!(h.events.try_recv().unwrap(), TrackingEvent::NoFace);
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn test_capture_unavailable_skips_cycle() {
        let h = harness(
            StubFrameSource::not_ready(),
            ScriptedDetector::returning(vec![attentive_face()]),
            HOUR,
        );

        let outcome = h.controller.capture_once().unwrap();

        assert_eq!(outcome, CycleOutcome::CaptureUnavailable);
        assert_eq!(h.detector_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.events.try_recv().unwrap(), TrackingEvent::CaptureUnavailable);
    }

    #[test]
    fn test_detector_failure_is_reported_and_not_recorded() {
        let h = harness(StubFrameSource::ready(), ScriptedDetector::failing(), HOUR);

        let err = h.controller.capture_once().unwrap_err();

        assert!(matches!(
            err,
            CycleError::Detection(DetectError::Provider { .. })
        ));
        assert_eq!(h.controller.sample_count(), 0);
        assert!(matches!(
            h.events.try_recv().unwrap(),
            TrackingEvent::CycleFailed(msg) if msg.contains("Failed to analyze image")
        ));
    }

    #[test]
    fn test_recording_disabled_keeps_store_empty() {
        let mut h = attentive(HOUR);
        h.controller.set_recording(false);

        h.controller.capture_once().unwrap();

        assert!(!h.controller.is_recording());
        assert_eq!(h.controller.sample_count(), 0);
    }

    #[test]
    fn test_threshold_applies_to_next_cycle() {
        let face = RawFaceMeasurement::new(95.0).with_eye_direction(20.0, 0.0, 60.0);
        let mut h = harness(
            StubFrameSource::ready(),
            ScriptedDetector::returning(vec![face]),
            HOUR,
        );

        let CycleOutcome::Judged(before) = h.controller.capture_once().unwrap() else {
            panic!("expected a judgment");
        };
        h.controller.set_confidence_threshold(50.0).unwrap();
        let CycleOutcome::Judged(after) = h.controller.capture_once().unwrap() else {
            panic!("expected a judgment");
        };

        assert!(before.judgment.is_looking_at_screen());
        assert_eq!(before.judgment.confidence_level(), ConfidenceLevel::Medium);
        assert!(!after.judgment.is_looking_at_screen());
        assert_eq!(h.controller.confidence_threshold(), 50.0);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let mut h = attentive(HOUR);

        assert_eq!(
            h.controller.set_confidence_threshold(-1.0),
            Err(ConfigError::ThresholdOutOfRange(-1.0))
        );
        assert_eq!(h.controller.confidence_threshold(), 70.0);
    }

    #[test]
    fn test_export_and_clear() {
        let h = attentive(HOUR);
        h.controller.capture_once().unwrap();
        h.controller.capture_once().unwrap();

        let exported = h.controller.export_samples();
        assert_eq!(exported.len(), 2);
        assert!(exported[0].timestamp <= exported[1].timestamp);
        assert_eq!(h.controller.sample_count(), 2);

        let json: serde_json::Value =
            serde_json::from_str(&h.controller.samples_json().unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);

        h.controller.clear_samples();
        assert_eq!(h.controller.sample_count(), 0);
    }

    // ── Continuous tracking ──────────────────────────────────────────

    #[test]
    fn test_start_runs_first_cycle_immediately() {
        let mut h = attentive(HOUR);

        h.controller.start();

        assert_eq!(h.controller.mode(), ControllerMode::Running);
        wait_for(&h.events, is_judged);
        h.controller.stop();
    }

    #[test]
    fn test_start_twice_is_noop() {
        let mut h = attentive(HOUR);

        h.controller.start();
        h.controller.start();
        let mut started = 0;
        loop {
            let event = h.events.recv_timeout(WAIT).unwrap();
            if matches!(event, TrackingEvent::Started { .. }) {
                started += 1;
            }
            if is_judged(&event) {
                break;
            }
        }
        thread::sleep(Duration::from_millis(100));

        assert_eq!(started, 1);
        assert_eq!(h.detector_calls.load(Ordering::SeqCst), 1);
        h.controller.stop();
    }

    #[test]
    fn test_repeats_at_interval() {
        let mut h = attentive(Duration::from_millis(20));

        h.controller.start();
        for _ in 0..4 {
            wait_for(&h.events, is_recorded);
        }
        h.controller.stop();

        assert!(h.controller.sample_count() >= 4);
    }

    #[test]
    fn test_stop_prevents_further_cycles() {
        let mut h = attentive(Duration::from_millis(10));
        h.controller.start();
        wait_for(&h.events, is_judged);
        wait_for(&h.events, is_judged);

        h.controller.stop();
        thread::sleep(Duration::from_millis(50));
        let calls_after_stop = h.detector_calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));

        assert_eq!(h.controller.mode(), ControllerMode::Idle);
        assert_eq!(h.detector_calls.load(Ordering::SeqCst), calls_after_stop);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let mut h = attentive(HOUR);

        h.controller.stop();

        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn test_stop_then_start_again() {
        let mut h = attentive(HOUR);
        h.controller.start();
        wait_for(&h.events, is_recorded);
        h.controller.stop();

        h.controller.start();
        wait_for(&h.events, is_recorded);

        assert_eq!(h.controller.mode(), ControllerMode::Running);
        assert_eq!(h.controller.sample_count(), 2);
        h.controller.stop();
    }

    #[test]
    fn test_result_completing_after_stop_is_discarded() {
        let (release, gate) = crossbeam_channel::unbounded();
        let mut h = harness(
            StubFrameSource::ready(),
            ScriptedDetector::returning(vec![attentive_face()]).gated(gate),
            HOUR,
        );

        h.controller.start();
        let deadline = Instant::now() + WAIT;
        while h.detector_calls.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline, "cycle never reached the detector");
            thread::sleep(Duration::from_millis(5));
        }
        h.controller.stop();
        release.send(()).unwrap();

        wait_for(&h.events, |e| *e == TrackingEvent::StaleDiscarded);
        assert_eq!(h.controller.sample_count(), 0);
    }

    #[test]
    fn test_slow_cycle_does_not_block_timer() {
        let (release, gate) = crossbeam_channel::unbounded::<()>();
        let mut h = harness(
            StubFrameSource::ready(),
            ScriptedDetector::returning(vec![attentive_face()]).gated(gate),
            Duration::from_millis(20),
        );

        h.controller.start();
        let deadline = Instant::now() + WAIT;
        while h.detector_calls.load(Ordering::SeqCst) < 3 {
            assert!(Instant::now() < deadline, "timer stalled behind a blocked cycle");
            thread::sleep(Duration::from_millis(5));
        }

        // Every call so far is still blocked.
        assert_eq!(h.controller.sample_count(), 0);
        assert!(h.events.try_iter().all(|e| !is_judged(&e)));
        h.controller.stop();
        drop(release);
    }

    #[test]
    fn test_in_flight_cycle_keeps_its_threshold() {
        // Eye yaw counts only when its confidence clears the threshold.
        let face = RawFaceMeasurement::new(95.0).with_eye_direction(30.0, 0.0, 60.0);
        let (release, gate) = crossbeam_channel::unbounded();
        let mut h = harness(
            StubFrameSource::ready(),
            ScriptedDetector::returning(vec![face]).gated(gate),
            HOUR,
        );

        h.controller.start();
        let deadline = Instant::now() + WAIT;
        while h.detector_calls.load(Ordering::SeqCst) == 0 {
            assert!(Instant::now() < deadline, "cycle never reached the detector");
            thread::sleep(Duration::from_millis(5));
        }
        h.controller.set_confidence_threshold(50.0).unwrap();
        release.send(()).unwrap();

        let report = loop {
            match h.events.recv_timeout(WAIT).unwrap() {
                TrackingEvent::Judged(report) => break report,
                _ => continue,
            }
        };
        assert!(report.judgment.is_looking_at_screen());

        release.send(()).unwrap();
        let CycleOutcome::Judged(next) = h.controller.capture_once().unwrap() else {
            panic!("expected a judgment");
        };
        assert!(!next.judgment.is_looking_at_screen());
        h.controller.stop();
    }

    #[test]
    fn test_one_shot_is_not_discarded_while_idle() {
        let mut h = attentive(HOUR);
        h.controller.start();
        wait_for(&h.events, is_recorded);
        h.controller.stop();

        h.controller.capture_once().unwrap();

        assert_eq!(h.controller.sample_count(), 2);
    }

    #[test]
    fn test_set_interval_reschedules_running_timer() {
        let mut h = attentive(HOUR);
        h.controller.start();
        wait_for(&h.events, is_judged);

        h.controller.set_interval(Duration::from_millis(20)).unwrap();

        wait_for(&h.events, |e| {
            *e == TrackingEvent::IntervalChanged(Duration::from_millis(20))
        });
        wait_for(&h.events, is_judged);
        wait_for(&h.events, is_judged);
        assert_eq!(h.controller.interval(), Duration::from_millis(20));
        assert_eq!(h.controller.mode(), ControllerMode::Running);
        h.controller.stop();
    }

    #[test]
    fn test_set_interval_while_idle_does_not_start() {
        let mut h = attentive(HOUR);

        h.controller.set_interval(Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(50));

        assert_eq!(h.controller.mode(), ControllerMode::Idle);
        assert_eq!(h.detector_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejects_zero_interval() {
        let mut h = attentive(HOUR);

        assert_eq!(
            h.controller.set_interval(Duration::ZERO),
            Err(ConfigError::ZeroInterval)
        );
        assert_eq!(h.controller.interval(), HOUR);
    }

    #[test]
    fn test_failures_do_not_stop_tracking() {
        let mut h = harness(
            StubFrameSource::ready(),
            ScriptedDetector::failing(),
            Duration::from_millis(20),
        );

        h.controller.start();
        for _ in 0..3 {
            wait_for(&h.events, |e| matches!(e, TrackingEvent::CycleFailed(_)));
        }

        assert_eq!(h.controller.mode(), ControllerMode::Running);
        h.controller.stop();
    }

    #[test]
    fn test_dispose_stops_timer() {
        let mut h = attentive(Duration::from_millis(10));
        h.controller.start();
        wait_for(&h.events, is_judged);

        let calls = h.detector_calls.clone();
        h.controller.dispose();
        thread::sleep(Duration::from_millis(50));
        let after_dispose = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(100));

        assert_eq!(calls.load(Ordering::SeqCst), after_dispose);
    }
}
