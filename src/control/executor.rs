//! Action executor
//!
//! Turns predicted action ids into press/release calls. At most one action is
//! held at a time; switching releases the old action's bindings before the new
//! ones are pressed.

use crate::catalog::{ActionCatalog, ActionId, PhysicalInput};
use crate::control::key_state::KeyStateTracker;
use crate::control::realtime::StopSignal;
use crate::injection::InputInjector;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One inference result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedAction {
    pub action_id: ActionId,
    pub confidence: f32,
}

impl PredictedAction {
    pub fn new(action_id: ActionId, confidence: f32) -> Self {
        Self {
            action_id,
            confidence,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControlState {
    Idle,
    Holding(ActionId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExecuteOutcome {
    /// Confidence under the threshold; nothing changed.
    BelowThreshold,
    /// Already holding this action.
    Unchanged,
    /// Id not in the catalog; nothing changed.
    UnknownAction(ActionId),
    Switched {
        from: Option<ActionId>,
        to: ActionId,
        /// Press or release calls the injector rejected during the switch.
        failed_inputs: usize,
    },
}

/// Snapshot of the executor's state.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionState {
    pub last_action_id: Option<ActionId>,
    pub last_change_time: Option<Instant>,
    pub held_inputs: Vec<PhysicalInput>,
}

pub struct ActionExecutor<I: InputInjector> {
    catalog: Arc<ActionCatalog>,
    injector: I,
    tracker: KeyStateTracker,
    last_action: Option<ActionId>,
    last_change: Option<Instant>,
    threshold: f32,
    injection_failures: usize,
}

impl<I: InputInjector> ActionExecutor<I> {
    pub fn new(catalog: Arc<ActionCatalog>, injector: I, threshold: f32) -> Self {
        tracing::debug!(
            "Action executor ready: {} actions, threshold {:.2}, injector {}",
            catalog.count(),
            threshold,
            injector.name()
        );
        Self {
            catalog,
            injector,
            tracker: KeyStateTracker::new(),
            last_action: None,
            last_change: None,
            threshold,
            injection_failures: 0,
        }
    }

    /// Applies one prediction.
    ///
    /// Low-confidence predictions and repeats of the held action are no-ops.
    /// Otherwise the held bindings are released (press order) and the new
    /// action's bindings pressed (binding order).
    pub fn execute(&mut self, predicted: PredictedAction) -> ExecuteOutcome {
        // NaN confidence counts as below threshold.
        if !(predicted.confidence >= self.threshold) {
            return ExecuteOutcome::BelowThreshold;
        }
        if self.last_action == Some(predicted.action_id) {
            return ExecuteOutcome::Unchanged;
        }
        if self.catalog.lookup_by_id(predicted.action_id).is_none() {
            tracing::warn!(
                "Ignoring prediction for unknown action id {} (catalog has {})",
                predicted.action_id,
                self.catalog.count()
            );
            return ExecuteOutcome::UnknownAction(predicted.action_id);
        }

        self.switch_to(predicted.action_id)
    }

    /// Presses `action_id`, blocks for `hold`, then releases everything.
    ///
    /// Ignores the confidence threshold; meant for scripted sequences.
    pub fn execute_timed(&mut self, action_id: ActionId, hold: Duration) -> ExecuteOutcome {
        self.hold_for(action_id, hold, &StopSignal::new())
    }

    /// Holds each action in turn with `gap` between them, and ends with
    /// everything released. Raising `stop` cuts the current hold short and
    /// skips the remaining actions, so fewer outcomes than ids may come back.
    pub fn execute_sequence(
        &mut self,
        action_ids: &[ActionId],
        hold: Duration,
        gap: Duration,
        stop: &StopSignal,
    ) -> Vec<ExecuteOutcome> {
        let mut outcomes = Vec::with_capacity(action_ids.len());
        for (index, &action_id) in action_ids.iter().enumerate() {
            if stop.is_stopped() {
                tracing::info!("Sequence stopped after {} of {} action(s)", index, action_ids.len());
                break;
            }
            outcomes.push(self.hold_for(action_id, hold, stop));
            if index + 1 < action_ids.len() {
                stop.sleep(gap);
            }
        }
        self.stop_all();
        outcomes
    }

    fn hold_for(&mut self, action_id: ActionId, hold: Duration, stop: &StopSignal) -> ExecuteOutcome {
        if self.catalog.lookup_by_id(action_id).is_none() {
            tracing::warn!("Cannot hold unknown action id {}", action_id);
            return ExecuteOutcome::UnknownAction(action_id);
        }

        let outcome = self.switch_to(action_id);
        if !stop.sleep(hold) {
            tracing::debug!("Hold of action {} cut short", action_id);
        }
        self.stop_all();
        outcome
    }

    /// Releases every held input and returns to idle. Safe to call at any time
    /// and any number of times.
    pub fn stop_all(&mut self) {
        let failed = self.release_held();
        if failed > 0 {
            tracing::warn!("{} input(s) failed to release during stop", failed);
        }
        if self.last_action.take().is_some() {
            self.last_change = Some(Instant::now());
            tracing::debug!("Executor idle");
        }
    }

    fn switch_to(&mut self, action_id: ActionId) -> ExecuteOutcome {
        let from = self.last_action;
        let mut failed_inputs = self.release_held();

        let catalog = Arc::clone(&self.catalog);
        let bindings = catalog.bindings_of(action_id).unwrap_or(&[]);
        for input in bindings {
            if self.tracker.is_held(input) {
                continue;
            }
            match self.injector.press(input) {
                Ok(()) => {
                    self.tracker.mark_pressed(input);
                }
                Err(e) => {
                    failed_inputs += 1;
                    self.injection_failures += 1;
                    tracing::error!("Press failed for action {}: {}", action_id, e);
                }
            }
        }

        self.last_action = Some(action_id);
        self.last_change = Some(Instant::now());

        tracing::debug!(
            "Action {:?} -> {} ({})",
            from,
            action_id,
            catalog.lookup_by_id(action_id).map(|a| a.name.as_str()).unwrap_or("?")
        );

        ExecuteOutcome::Switched {
            from,
            to: action_id,
            failed_inputs,
        }
    }

    /// Releases held inputs in press order. A failed release still drops the
    /// input from the tracker. Returns the number of failures.
    fn release_held(&mut self) -> usize {
        let mut failed = 0;
        for input in self.tracker.take_all() {
            if let Err(e) = self.injector.release(&input) {
                failed += 1;
                self.injection_failures += 1;
                tracing::error!("Release failed, input may be stuck: {}", e);
            }
        }
        failed
    }

    pub fn state(&self) -> ExecutionState {
        ExecutionState {
            last_action_id: self.last_action,
            last_change_time: self.last_change,
            held_inputs: self.tracker.held().to_vec(),
        }
    }

    pub fn control_state(&self) -> ControlState {
        match self.last_action {
            Some(id) => ControlState::Holding(id),
            None => ControlState::Idle,
        }
    }

    pub fn held_inputs(&self) -> &[PhysicalInput] {
        self.tracker.held()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn injection_failures(&self) -> usize {
        self.injection_failures
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }
}

/// Borrows an executor and calls `stop_all` when dropped, including during
/// unwinding.
pub struct ReleaseOnExit<'a, I: InputInjector>(&'a mut ActionExecutor<I>);

impl<'a, I: InputInjector> ReleaseOnExit<'a, I> {
    pub fn new(executor: &'a mut ActionExecutor<I>) -> Self {
        Self(executor)
    }
}

impl<I: InputInjector> Deref for ReleaseOnExit<'_, I> {
    type Target = ActionExecutor<I>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl<I: InputInjector> DerefMut for ReleaseOnExit<'_, I> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl<I: InputInjector> Drop for ReleaseOnExit<'_, I> {
    fn drop(&mut self) {
        self.0.stop_all();
    }
}
