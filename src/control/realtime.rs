//! Realtime control loop
//!
//! Runs capture → features → inference → execute at a fixed rate on the
//! calling thread. Cancellation is cooperative: a [`StopSignal`] is checked at
//! every cycle boundary. Whatever ends the loop (stop signal, duration limit,
//! cycle limit, or a panic in a collaborator), held inputs are released before
//! `run` returns or unwinds.

use crate::capture::CapturedFrame;
use crate::catalog::ActionId;
use crate::control::executor::{ActionExecutor, ExecuteOutcome, PredictedAction, ReleaseOnExit};
use crate::injection::InputInjector;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CycleError {
    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error("Feature extraction failed: {0}")]
    Features(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Supplies the current screen.
pub trait ScreenSource {
    fn grab(&mut self) -> Result<CapturedFrame, CycleError>;
}

/// Maps a frame to a fixed-length feature vector.
pub trait FeatureExtractor {
    fn extract(&mut self, frame: &CapturedFrame) -> Result<Vec<f32>, CycleError>;
}

/// Blocking model call.
pub trait InferenceService {
    fn infer(&mut self, features: &[f32]) -> Result<PredictedAction, CycleError>;
}

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Cooperative cancellation flag, cheap to clone across threads.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` unless stopped first. Returns `true` when the
    /// whole duration passed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let started = Instant::now();
        loop {
            if self.is_stopped() {
                return false;
            }
            let elapsed = started.elapsed();
            if elapsed >= duration {
                return true;
            }
            std::thread::sleep((duration - elapsed).min(STOP_POLL_INTERVAL));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopSettings {
    pub period: Duration,
    pub duration_limit: Option<Duration>,
    pub max_cycles: Option<u64>,
    /// Log achieved rate every N cycles; 0 disables.
    pub stats_every: u64,
}

impl LoopSettings {
    pub fn at_rate(hz: f64) -> Self {
        Self {
            period: Duration::from_secs_f64(1.0 / hz),
            duration_limit: None,
            max_cycles: None,
            stats_every: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopStats {
    pub cycles: u64,
    pub switches: u64,
    pub below_threshold: u64,
    pub unchanged: u64,
    pub unknown_actions: u64,
    pub capture_failures: u64,
    pub feature_failures: u64,
    pub inference_failures: u64,
    /// Cycles whose work took longer than the period.
    pub overruns: u64,
    /// Predictions per action id, whatever the executor did with them.
    pub predictions: BTreeMap<ActionId, u64>,
}

impl LoopStats {
    pub fn failures(&self) -> u64 {
        self.capture_failures + self.feature_failures + self.inference_failures
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Cancelled,
    DurationElapsed,
    CycleLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoopReport {
    pub session_id: Uuid,
    pub stop_reason: StopReason,
    pub elapsed: Duration,
    pub achieved_hz: f64,
    pub stats: LoopStats,
}

pub struct RealtimeLoop<S, F, M> {
    screen: S,
    features: F,
    inference: M,
    settings: LoopSettings,
    stop: StopSignal,
    stats: Arc<Mutex<LoopStats>>,
}

impl<S, F, M> RealtimeLoop<S, F, M>
where
    S: ScreenSource,
    F: FeatureExtractor,
    M: InferenceService,
{
    pub fn new(screen: S, features: F, inference: M, settings: LoopSettings) -> Self {
        Self {
            screen,
            features,
            inference,
            settings,
            stop: StopSignal::new(),
            stats: Arc::new(Mutex::new(LoopStats::default())),
        }
    }

    /// Uses an externally owned stop signal instead of a private one.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Live view of the running loop's counters.
    pub fn stats_handle(&self) -> Arc<Mutex<LoopStats>> {
        Arc::clone(&self.stats)
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn run<I: InputInjector>(&mut self, executor: &mut ActionExecutor<I>) -> LoopReport {
        let session_id = Uuid::new_v4();
        let span = tracing::info_span!("control_session", %session_id);
        let _entered = span.enter();

        tracing::info!(
            "Control loop starting: period {:?}, limit {:?}",
            self.settings.period,
            self.settings.duration_limit
        );

        *self.stats.lock() = LoopStats::default();
        let mut executor = ReleaseOnExit::new(executor);
        let started = Instant::now();
        let mut cycles = 0u64;

        let stop_reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Cancelled;
            }
            if let Some(limit) = self.settings.duration_limit {
                if started.elapsed() >= limit {
                    break StopReason::DurationElapsed;
                }
            }
            if let Some(max) = self.settings.max_cycles {
                if cycles >= max {
                    break StopReason::CycleLimit;
                }
            }

            let cycle_start = Instant::now();
            let result = self.run_cycle(&mut executor);
            cycles += 1;

            let elapsed = cycle_start.elapsed();
            let overrun = elapsed >= self.settings.period;
            self.record(result, overrun);

            if self.settings.stats_every > 0 && cycles % self.settings.stats_every == 0 {
                let stats = self.stats.lock();
                tracing::info!(
                    "{} cycles, {:.1} Hz achieved, {} switches, {} failures",
                    cycles,
                    cycles as f64 / started.elapsed().as_secs_f64(),
                    stats.switches,
                    stats.failures()
                );
            }

            if overrun {
                tracing::debug!("Cycle {} overran its period ({:?})", cycles, elapsed);
            } else {
                std::thread::sleep(self.settings.period - elapsed);
            }
        };

        drop(executor);

        let elapsed = started.elapsed();
        let stats = self.stats.lock().clone();
        let achieved_hz = if elapsed.is_zero() {
            0.0
        } else {
            stats.cycles as f64 / elapsed.as_secs_f64()
        };

        tracing::info!(
            "Control loop stopped ({:?}) after {} cycles in {:.1}s ({:.1} Hz)",
            stop_reason,
            stats.cycles,
            elapsed.as_secs_f64(),
            achieved_hz
        );

        LoopReport {
            session_id,
            stop_reason,
            elapsed,
            achieved_hz,
            stats,
        }
    }

    fn run_cycle<I: InputInjector>(
        &mut self,
        executor: &mut ActionExecutor<I>,
    ) -> Result<(PredictedAction, ExecuteOutcome), CycleError> {
        let frame = self.screen.grab()?;
        let features = self.features.extract(&frame)?;
        let predicted = self.inference.infer(&features)?;
        Ok((predicted, executor.execute(predicted)))
    }

    fn record(&self, result: Result<(PredictedAction, ExecuteOutcome), CycleError>, overrun: bool) {
        let mut stats = self.stats.lock();
        stats.cycles += 1;
        if overrun {
            stats.overruns += 1;
        }

        match result {
            Ok((predicted, outcome)) => {
                *stats.predictions.entry(predicted.action_id).or_insert(0) += 1;
                match outcome {
                    ExecuteOutcome::Switched { .. } => stats.switches += 1,
                    ExecuteOutcome::Unchanged => stats.unchanged += 1,
                    ExecuteOutcome::BelowThreshold => stats.below_threshold += 1,
                    ExecuteOutcome::UnknownAction(_) => stats.unknown_actions += 1,
                }
            }
            Err(e) => {
                tracing::warn!("Cycle {} skipped: {}", stats.cycles, e);
                match e {
                    CycleError::Capture(_) => stats.capture_failures += 1,
                    CycleError::Features(_) => stats.feature_failures += 1,
                    CycleError::Inference(_) => stats.inference_failures += 1,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::scenario_catalog;
    use crate::catalog::PhysicalInput;
    use crate::injection::tests::{Call, RecordingInjector};
    use std::collections::VecDeque;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    struct BlankScreen;

    impl ScreenSource for BlankScreen {
        fn grab(&mut self) -> Result<CapturedFrame, CycleError> {
            Ok(CapturedFrame::empty(0.0))
        }
    }

    struct FlakyScreen {
        calls: u32,
    }

    impl ScreenSource for FlakyScreen {
        fn grab(&mut self) -> Result<CapturedFrame, CycleError> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                Err(CycleError::Capture("display asleep".to_string()))
            } else {
                Ok(CapturedFrame::empty(0.0))
            }
        }
    }

    struct NoFeatures;

    impl FeatureExtractor for NoFeatures {
        fn extract(&mut self, _frame: &CapturedFrame) -> Result<Vec<f32>, CycleError> {
            Ok(vec![0.0; 4])
        }
    }

    /// Replays a fixed script; once exhausted it either stops the loop or panics.
    struct Script {
        predictions: VecDeque<PredictedAction>,
        stop: Option<StopSignal>,
        panic_when_done: bool,
        delay: Duration,
    }

    impl Script {
        fn new(predictions: &[(ActionId, f32)]) -> Self {
            Self {
                predictions: predictions.iter().map(|&(id, c)| PredictedAction::new(id, c)).collect(),
                stop: None,
                panic_when_done: false,
                delay: Duration::ZERO,
            }
        }
    }

    impl InferenceService for Script {
        fn infer(&mut self, _features: &[f32]) -> Result<PredictedAction, CycleError> {
            std::thread::sleep(self.delay);
            match self.predictions.pop_front() {
                Some(predicted) => {
                    if self.predictions.is_empty() {
                        if let Some(stop) = &self.stop {
                            stop.stop();
                        }
                    }
                    Ok(predicted)
                }
                None if self.panic_when_done => panic!("model crashed"),
                None => Err(CycleError::Inference("script exhausted".to_string())),
            }
        }
    }

    fn fast_settings() -> LoopSettings {
        LoopSettings {
            period: Duration::from_millis(1),
            duration_limit: Some(Duration::from_secs(5)),
            max_cycles: None,
            stats_every: 2,
        }
    }

    fn executor(recorder: &RecordingInjector) -> ActionExecutor<RecordingInjector> {
        ActionExecutor::new(Arc::new(scenario_catalog()), recorder.clone(), 0.5)
    }

    #[test]
    fn test_stop_signal_releases_held_inputs() {
        let recorder = RecordingInjector::default();
        let mut executor = executor(&recorder);

        let mut script = Script::new(&[(1, 0.9), (1, 0.8), (2, 0.3)]);
        let stop = StopSignal::new();
        script.stop = Some(stop.clone());

        let mut control = RealtimeLoop::new(BlankScreen, NoFeatures, script, fast_settings()).with_stop_signal(stop);
        let report = control.run(&mut executor);

        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert_eq!(report.stats.cycles, 3);
        assert_eq!(report.stats.switches, 1);
        assert_eq!(report.stats.unchanged, 1);
        assert_eq!(report.stats.below_threshold, 1);
        assert_eq!(report.stats.predictions.get(&1), Some(&2));
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Press(PhysicalInput::key("space")),
                Call::Release(PhysicalInput::key("space")),
            ]
        );
        assert!(executor.held_inputs().is_empty());
    }

    #[test]
    fn test_cycle_failures_do_not_stop_the_loop() {
        let recorder = RecordingInjector::default();
        let mut executor = executor(&recorder);
        let mut settings = fast_settings();
        settings.max_cycles = Some(6);

        let script = Script::new(&[(0, 0.9), (2, 0.9), (1, 0.9)]);
        let mut control = RealtimeLoop::new(FlakyScreen { calls: 0 }, NoFeatures, script, settings);
        let stats = control.stats_handle();
        let report = control.run(&mut executor);

        assert_eq!(report.stop_reason, StopReason::CycleLimit);
        assert_eq!(report.stats.cycles, 6);
        assert_eq!(report.stats.capture_failures, 3);
        assert_eq!(report.stats.switches, 3);
        assert_eq!(stats.lock().cycles, 6);
        assert!(executor.held_inputs().is_empty());
    }

    #[test]
    fn test_panic_in_inference_still_releases() {
        let recorder = RecordingInjector::default();
        let mut executor = executor(&recorder);

        let mut script = Script::new(&[(2, 0.9)]);
        script.panic_when_done = true;
        let mut control = RealtimeLoop::new(BlankScreen, NoFeatures, script, fast_settings());

        let result = catch_unwind(AssertUnwindSafe(|| control.run(&mut executor)));
        assert!(result.is_err());
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Press(PhysicalInput::mouse("left")),
                Call::Release(PhysicalInput::mouse("left")),
            ]
        );
        assert!(executor.held_inputs().is_empty());
    }

    #[test]
    fn test_duration_limit_and_overruns() {
        let recorder = RecordingInjector::default();
        let mut executor = executor(&recorder);

        let mut script = Script::new(&[(0, 0.9); 100]);
        script.delay = Duration::from_millis(5);
        let settings = LoopSettings {
            period: Duration::from_millis(1),
            duration_limit: Some(Duration::from_millis(30)),
            max_cycles: None,
            stats_every: 0,
        };
        let mut control = RealtimeLoop::new(BlankScreen, NoFeatures, script, settings);
        let report = control.run(&mut executor);

        assert_eq!(report.stop_reason, StopReason::DurationElapsed);
        assert!(report.stats.cycles >= 1);
        assert_eq!(report.stats.overruns, report.stats.cycles);
        assert!(executor.held_inputs().is_empty());
    }

    #[test]
    fn test_already_stopped_runs_no_cycles() {
        let recorder = RecordingInjector::default();
        let mut executor = executor(&recorder);
        let mut control = RealtimeLoop::new(BlankScreen, NoFeatures, Script::new(&[]), fast_settings());
        control.stop_signal().stop();

        let report = control.run(&mut executor);
        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert_eq!(report.stats.cycles, 0);
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_loop_settings_from_rate() {
        let settings = LoopSettings::at_rate(10.0);
        assert_eq!(settings.period, Duration::from_millis(100));
        assert_eq!(settings.stats_every, 100);
    }

    #[test]
    fn test_stop_signal_cuts_sleep_short() {
        let stop = StopSignal::new();
        assert!(stop.sleep(Duration::from_millis(5)));

        let remote = stop.clone();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.stop();
        });
        let started = Instant::now();
        assert!(!stop.sleep(Duration::from_secs(30)), "stop should interrupt the sleep");
        assert!(started.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();
    }
}
