//! Label replay
//!
//! Feeds a recording's frame labels through the realtime loop as if a model
//! had predicted them, one label per cycle at the video's frame rate. Useful
//! for checking a catalog's bindings end to end without a trained model.

use crate::capture::CapturedFrame;
use crate::control::executor::PredictedAction;
use crate::control::realtime::{CycleError, FeatureExtractor, InferenceService, ScreenSource};
use crate::processing::{FrameActionLabel, NO_ACTION};
use std::collections::VecDeque;
use std::time::Instant;

/// Stamps empty frames with the time since creation.
#[derive(Debug)]
pub struct ClockScreen {
    started: Instant,
}

impl Default for ClockScreen {
    fn default() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl ScreenSource for ClockScreen {
    fn grab(&mut self) -> Result<CapturedFrame, CycleError> {
        Ok(CapturedFrame::empty(self.started.elapsed().as_secs_f64() * 1000.0))
    }
}

/// Produces an empty feature vector; scripted inference ignores it.
#[derive(Debug, Default)]
pub struct NoFeatures;

impl FeatureExtractor for NoFeatures {
    fn extract(&mut self, _frame: &CapturedFrame) -> Result<Vec<f32>, CycleError> {
        Ok(Vec::new())
    }
}

/// Answers each inference call with the next label.
///
/// Frames with an action predict it with full confidence. An idle frame
/// repeats the last action, so the executor keeps holding it. Idle frames
/// before the first action predict [`NO_ACTION`] with zero confidence and rely
/// on a threshold above zero.
#[derive(Debug, Default)]
pub struct LabelScript {
    predictions: VecDeque<PredictedAction>,
}

impl LabelScript {
    pub fn from_labels(labels: &[FrameActionLabel]) -> Self {
        let mut held = None;
        let predictions = labels
            .iter()
            .map(|label| {
                if !label.is_idle() {
                    held = Some(label.primary_action_id);
                }
                match held {
                    Some(action_id) => PredictedAction::new(action_id, 1.0),
                    None => PredictedAction::new(NO_ACTION, 0.0),
                }
            })
            .collect();
        Self { predictions }
    }

    pub fn remaining(&self) -> usize {
        self.predictions.len()
    }
}

impl InferenceService for LabelScript {
    fn infer(&mut self, _features: &[f32]) -> Result<PredictedAction, CycleError> {
        self.predictions
            .pop_front()
            .ok_or_else(|| CycleError::Inference("no labels left to replay".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::scenario_catalog;
    use crate::catalog::PhysicalInput;
    use crate::control::executor::ActionExecutor;
    use crate::control::realtime::{LoopSettings, LoopStats, RealtimeLoop, StopReason};
    use crate::injection::tests::{Call, RecordingInjector};
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use std::time::Duration;

    fn label(frame_index: u64, ids: &[u32]) -> FrameActionLabel {
        let all_action_ids: BTreeSet<u32> = ids.iter().copied().collect();
        FrameActionLabel {
            frame_index,
            timestamp_ms: frame_index as i64 * 10,
            primary_action_id: all_action_ids.first().copied().unwrap_or(0),
            all_action_ids,
            looking: false,
        }
    }

    #[test]
    fn test_idle_labels_repeat_held_action() {
        let mut script = LabelScript::from_labels(&[label(0, &[]), label(1, &[2, 1]), label(2, &[])]);
        assert_eq!(script.remaining(), 3);
        assert_eq!(script.infer(&[]).unwrap(), PredictedAction::new(NO_ACTION, 0.0));
        assert_eq!(script.infer(&[]).unwrap(), PredictedAction::new(1, 1.0));
        assert_eq!(script.infer(&[]).unwrap(), PredictedAction::new(1, 1.0));
        assert!(script.infer(&[]).is_err());
    }

    fn replay(labels: &[FrameActionLabel], threshold: f32) -> (LoopStats, Vec<Call>) {
        let recorder = RecordingInjector::default();
        let mut executor = ActionExecutor::new(Arc::new(scenario_catalog()), recorder.clone(), threshold);
        let settings = LoopSettings {
            period: Duration::from_millis(1),
            duration_limit: None,
            max_cycles: Some(labels.len() as u64),
            stats_every: 0,
        };
        let mut control = RealtimeLoop::new(
            ClockScreen::default(),
            NoFeatures,
            LabelScript::from_labels(labels),
            settings,
        );
        let report = control.run(&mut executor);
        assert_eq!(report.stop_reason, StopReason::CycleLimit);
        (report.stats, recorder.calls())
    }

    #[test]
    fn test_idle_frames_never_press_with_zero_threshold() {
        let labels = vec![label(0, &[1]), label(1, &[]), label(2, &[])];
        let (stats, calls) = replay(&labels, 0.0);

        assert_eq!(stats.switches, 1);
        assert_eq!(stats.unchanged, 2);
        assert_eq!(
            calls,
            vec![
                Call::Press(PhysicalInput::key("space")),
                Call::Release(PhysicalInput::key("space")),
            ]
        );
    }

    #[test]
    fn test_replay_through_loop() {
        let labels = vec![label(0, &[]), label(1, &[1]), label(2, &[]), label(3, &[2])];
        let (stats, calls) = replay(&labels, 0.5);

        assert_eq!(stats.switches, 2);
        assert_eq!(stats.below_threshold, 1, "leading idle frame is gated");
        assert_eq!(stats.unchanged, 1);
        assert_eq!(
            calls,
            vec![
                Call::Press(PhysicalInput::key("space")),
                Call::Release(PhysicalInput::key("space")),
                Call::Press(PhysicalInput::mouse("left")),
                Call::Release(PhysicalInput::mouse("left")),
            ]
        );
    }
}
