//! Capture-side data
//!
//! Screen and input capture run outside this crate; what lands here is the
//! data they hand over: recorded input events and captured frames.

pub mod frame;
pub mod input;

pub use frame::CapturedFrame;
pub use input::{EventKind, InputEvent};
