//! Offline labeling pipeline
//!
//! Recorded input events are aligned to video frames, each frame's held inputs
//! are resolved to action ids, and the labels are written next to the
//! recording. Everything here is single-threaded and deterministic.

pub mod aligner;
pub mod resolver;
pub mod session;

pub use aligner::{ActiveInputSet, AlignError, Alignment, AlignmentStats, EventWindowAligner, FrameClock, FrameWindow};
pub use resolver::{ActionResolver, FrameActionLabel, NO_ACTION};
pub use session::{
    annotate_directory, annotate_recording, label_events, load_recording, BatchReport, RecordingFiles, RecordingMetadata,
    RecordingSummary, SessionError, SessionResult,
};
