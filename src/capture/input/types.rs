use crate::catalog::PhysicalInput;
use serde::{Deserialize, Serialize};

/// What happened at an [`InputEvent`]'s timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    Press { input: PhysicalInput },
    Release { input: PhysicalInput },
    MouseMove { x: f64, y: f64 },
}

/// One recorded input event. Read-only once parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputEvent {
    /// Milliseconds since the recording started.
    pub timestamp_ms: i64,
    pub kind: EventKind,
    /// Frame counter the recorder saw when it logged the event. Advisory;
    /// the timestamp decides which frame an event belongs to.
    pub frame_hint: Option<u64>,
}

impl InputEvent {
    pub fn press(timestamp_ms: i64, input: PhysicalInput) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Press { input },
            frame_hint: None,
        }
    }

    pub fn release(timestamp_ms: i64, input: PhysicalInput) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::Release { input },
            frame_hint: None,
        }
    }

    pub fn mouse_move(timestamp_ms: i64, x: f64, y: f64) -> Self {
        Self {
            timestamp_ms,
            kind: EventKind::MouseMove { x, y },
            frame_hint: None,
        }
    }

    pub fn with_frame_hint(mut self, frame: u64) -> Self {
        self.frame_hint = Some(frame);
        self
    }

    /// The key or button this event presses or releases.
    pub fn input(&self) -> Option<&PhysicalInput> {
        match &self.kind {
            EventKind::Press { input } | EventKind::Release { input } => Some(input),
            EventKind::MouseMove { .. } => None,
        }
    }
}

/// One line of the recorder's `inputs_*.jsonl` file, before validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawInputLine {
    pub timestamp: f64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub button: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub frame: Option<i64>,
}
