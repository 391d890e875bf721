//! Live control
//!
//! The online half: a fixed-rate loop asks an inference service for an action
//! each cycle and the executor turns changes into synthetic input. Executor
//! state is owned by the loop's thread; other threads only flip the
//! [`StopSignal`].

pub mod executor;
pub mod key_state;
pub mod realtime;
pub mod replay;

pub use executor::{ActionExecutor, ControlState, ExecuteOutcome, ExecutionState, PredictedAction, ReleaseOnExit};
pub use key_state::KeyStateTracker;
pub use realtime::{
    CycleError, FeatureExtractor, InferenceService, LoopReport, LoopSettings, LoopStats, RealtimeLoop, ScreenSource,
    StopReason, StopSignal,
};
pub use replay::{ClockScreen, LabelScript, NoFeatures};
