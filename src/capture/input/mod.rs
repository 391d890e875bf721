//! Recorded input events
//!
//! The capture side writes one JSON object per keyboard/mouse event while a
//! session is recorded. This module turns those lines into typed
//! [`InputEvent`]s for the offline labeling pipeline.

pub mod log;
pub mod types;

pub use log::{parse_event_log, parse_line, read_event_log, EventLog, EventLogError};
pub use types::{EventKind, InputEvent};
