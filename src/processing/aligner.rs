//! Event-to-frame alignment
//!
//! Input events arrive at arbitrary times; video frames tick at a fixed rate.
//! This module walks both streams once and reports, for every frame, which
//! physical inputs are held during that frame's window
//! `[frame.timestamp, next_frame.timestamp)`.

use crate::capture::input::{EventKind, InputEvent};
use crate::catalog::PhysicalInput;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;
use thiserror::Error;

/// Inputs logically held at a point in time.
pub type ActiveInputSet = BTreeSet<PhysicalInput>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignError {
    #[error("Frame rate must be positive and finite, got {0}")]
    InvalidFrameRate(f64),
}

/// Maps frame indices to timestamps at a fixed rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    pub fn new(fps: f64) -> Result<Self, AlignError> {
        if fps.is_finite() && fps > 0.0 {
            Ok(Self { fps })
        } else {
            Err(AlignError::InvalidFrameRate(fps))
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn frame_duration_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    /// Start of frame `index`, in whole milliseconds.
    pub fn timestamp_ms(&self, index: u64) -> i64 {
        (index as f64 * 1000.0 / self.fps).floor() as i64
    }

    pub fn frame(&self, index: u64) -> Frame {
        Frame {
            index,
            timestamp_ms: self.timestamp_ms(index),
        }
    }

    /// Frame whose window contains `timestamp_ms`, clamped to `0..total_frames`.
    pub fn frame_at(&self, timestamp_ms: i64, total_frames: u64) -> u64 {
        if total_frames == 0 || timestamp_ms <= 0 {
            return 0;
        }
        let mut index = (timestamp_ms as f64 * self.fps / 1000.0).floor() as u64;
        // Float rounding can land one frame early or late around boundaries.
        while index > 0 && self.timestamp_ms(index) > timestamp_ms {
            index -= 1;
        }
        while self.timestamp_ms(index + 1) <= timestamp_ms {
            index += 1;
        }
        index.min(total_frames - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Frame {
    pub index: u64,
    pub timestamp_ms: i64,
}

/// Held inputs for one frame after every event in its window was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameWindow {
    pub frame: Frame,
    pub active: ActiveInputSet,
    /// The mouse moved inside this window.
    pub looking: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentStats {
    pub events_applied: usize,
    pub mouse_moves: usize,
    /// Events stamped before frame 0, folded into frame 0.
    pub clamped_before: usize,
    /// Events stamped after the last frame's window, folded into the last frame.
    pub clamped_after: usize,
    /// Events whose recorded frame differs from the timestamp-derived frame.
    pub hint_conflicts: usize,
    /// Releases of inputs that were not held.
    pub redundant_releases: usize,
    /// Events left over because the recording has no frames.
    pub unassigned: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub windows: Vec<FrameWindow>,
    pub stats: AlignmentStats,
}

impl Alignment {
    /// Number of frames in which `input` is held.
    pub fn frames_containing(&self, input: &PhysicalInput) -> usize {
        self.windows.iter().filter(|w| w.active.contains(input)).count()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventWindowAligner {
    clock: FrameClock,
    total_frames: u64,
}

impl EventWindowAligner {
    pub fn new(fps: f64, total_frames: u64) -> Result<Self, AlignError> {
        Ok(Self {
            clock: FrameClock::new(fps)?,
            total_frames,
        })
    }

    pub fn clock(&self) -> FrameClock {
        self.clock
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Assigns `events` to frames and snapshots the held set per frame.
    ///
    /// A press stays in the set until its release, so a key held across many
    /// frames shows up in each of them even when those windows contain no
    /// events. Events are expected in timestamp order; an unsorted slice is
    /// stable-sorted into a copy first.
    pub fn align(&self, events: &[InputEvent]) -> Alignment {
        let events = sorted_by_timestamp(events);
        let mut stats = AlignmentStats::default();
        let mut windows = Vec::new();
        let mut active = ActiveInputSet::new();
        let mut cursor = 0;

        for index in 0..self.total_frames {
            let frame = self.clock.frame(index);
            let is_last = index + 1 == self.total_frames;
            let window_end = self.clock.timestamp_ms(index + 1);
            let mut looking = false;

            while let Some(event) = events.get(cursor) {
                if !is_last && event.timestamp_ms >= window_end {
                    break;
                }

                if event.timestamp_ms < 0 {
                    stats.clamped_before += 1;
                } else if event.timestamp_ms >= window_end {
                    stats.clamped_after += 1;
                }

                if let Some(hint) = event.frame_hint {
                    if hint != index {
                        stats.hint_conflicts += 1;
                        tracing::trace!(
                            "Frame hint {} disagrees with timestamp {}ms (frame {})",
                            hint,
                            event.timestamp_ms,
                            index
                        );
                    }
                }

                match &event.kind {
                    EventKind::Press { input } => {
                        active.insert(input.clone());
                        stats.events_applied += 1;
                    }
                    EventKind::Release { input } => {
                        if !active.remove(input) {
                            stats.redundant_releases += 1;
                        }
                        stats.events_applied += 1;
                    }
                    EventKind::MouseMove { .. } => {
                        looking = true;
                        stats.mouse_moves += 1;
                    }
                }

                cursor += 1;
            }

            windows.push(FrameWindow {
                frame,
                active: active.clone(),
                looking,
            });
        }

        stats.unassigned = events.len() - cursor;

        if stats.hint_conflicts > 0 {
            tracing::debug!(
                "{} event(s) carried a frame hint that disagreed with their timestamp",
                stats.hint_conflicts
            );
        }

        Alignment { windows, stats }
    }
}

fn sorted_by_timestamp(events: &[InputEvent]) -> Cow<'_, [InputEvent]> {
    let in_order = events
        .windows(2)
        .all(|pair| pair[0].timestamp_ms <= pair[1].timestamp_ms);
    if in_order {
        Cow::Borrowed(events)
    } else {
        let mut owned = events.to_vec();
        owned.sort_by_key(|event| event.timestamp_ms);
        Cow::Owned(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> PhysicalInput {
        PhysicalInput::key(name)
    }

    fn set(names: &[&str]) -> ActiveInputSet {
        names.iter().map(|n| key(n)).collect()
    }

    #[test]
    fn test_invalid_frame_rate() {
        assert_eq!(
            EventWindowAligner::new(0.0, 10).unwrap_err(),
            AlignError::InvalidFrameRate(0.0)
        );
        assert!(EventWindowAligner::new(f64::NAN, 10).is_err());
    }

    #[test]
    fn test_frame_clock_boundaries() {
        let clock = FrameClock::new(30.0).unwrap();
        assert_eq!(clock.timestamp_ms(0), 0);
        assert_eq!(clock.timestamp_ms(1), 33);
        assert_eq!(clock.timestamp_ms(3), 100);

        assert_eq!(clock.frame_at(-5, 10), 0);
        assert_eq!(clock.frame_at(32, 10), 0);
        assert_eq!(clock.frame_at(33, 10), 1);
        assert_eq!(clock.frame_at(100, 10), 3);
        assert_eq!(clock.frame_at(1_000_000, 10), 9);
    }

    #[test]
    fn test_press_release_across_windows() {
        let aligner = EventWindowAligner::new(10.0, 2).unwrap();
        let events = vec![
            InputEvent::press(0, key("w")),
            InputEvent::press(50, key("space")),
            InputEvent::release(120, key("w")),
        ];

        let alignment = aligner.align(&events);
        assert_eq!(alignment.windows.len(), 2);
        assert_eq!(alignment.windows[0].active, set(&["w", "space"]));
        assert_eq!(alignment.windows[1].active, set(&["space"]));
        assert_eq!(alignment.windows[1].frame.timestamp_ms, 100);
    }

    #[test]
    fn test_held_key_carries_forward_through_empty_windows() {
        let aligner = EventWindowAligner::new(10.0, 60).unwrap();
        // Pressed in frame 2, released in frame 52.
        let events = vec![
            InputEvent::press(250, key("w")),
            InputEvent::release(5_210, key("w")),
        ];

        let alignment = aligner.align(&events);
        assert_eq!(alignment.frames_containing(&key("w")), 50);
        assert!(!alignment.windows[1].active.contains(&key("w")));
        assert!(alignment.windows[2].active.contains(&key("w")));
        assert!(alignment.windows[51].active.contains(&key("w")));
        assert!(!alignment.windows[52].active.contains(&key("w")));
    }

    #[test]
    fn test_unreleased_key_held_until_end() {
        let aligner = EventWindowAligner::new(10.0, 5).unwrap();
        let alignment = aligner.align(&[InputEvent::press(110, key("a"))]);
        assert_eq!(alignment.frames_containing(&key("a")), 4);
    }

    #[test]
    fn test_release_without_press_is_noop() {
        let aligner = EventWindowAligner::new(10.0, 3).unwrap();
        let alignment = aligner.align(&[
            InputEvent::release(10, key("q")),
            InputEvent::press(20, key("w")),
            InputEvent::release(150, key("q")),
        ]);

        assert_eq!(alignment.stats.redundant_releases, 2);
        assert_eq!(alignment.frames_containing(&key("w")), 3);
        assert_eq!(alignment.frames_containing(&key("q")), 0);
    }

    #[test]
    fn test_out_of_range_events_clamp() {
        let aligner = EventWindowAligner::new(10.0, 3).unwrap();
        let alignment = aligner.align(&[
            InputEvent::press(-40, key("a")),
            InputEvent::press(900, key("b")),
        ]);

        assert!(alignment.windows[0].active.contains(&key("a")));
        assert!(!alignment.windows[1].active.contains(&key("b")));
        assert!(alignment.windows[2].active.contains(&key("b")));
        assert_eq!(alignment.stats.clamped_before, 1);
        assert_eq!(alignment.stats.clamped_after, 1);
    }

    #[test]
    fn test_mouse_move_marks_looking_but_not_held() {
        let aligner = EventWindowAligner::new(10.0, 3).unwrap();
        let alignment = aligner.align(&[InputEvent::mouse_move(150, 1.0, 2.0)]);

        let looking: Vec<bool> = alignment.windows.iter().map(|w| w.looking).collect();
        assert_eq!(looking, vec![false, true, false]);
        assert!(alignment.windows.iter().all(|w| w.active.is_empty()));
        assert_eq!(alignment.stats.mouse_moves, 1);
    }

    #[test]
    fn test_frame_hint_is_advisory() {
        let aligner = EventWindowAligner::new(10.0, 3).unwrap();
        let alignment = aligner.align(&[InputEvent::press(250, key("a")).with_frame_hint(0)]);

        assert!(!alignment.windows[0].active.contains(&key("a")));
        assert!(alignment.windows[2].active.contains(&key("a")));
        assert_eq!(alignment.stats.hint_conflicts, 1);
    }

    #[test]
    fn test_unsorted_input_is_sorted_before_alignment() {
        let aligner = EventWindowAligner::new(10.0, 3).unwrap();
        let alignment = aligner.align(&[
            InputEvent::release(150, key("a")),
            InputEvent::press(10, key("a")),
        ]);

        assert_eq!(alignment.frames_containing(&key("a")), 1);
        assert_eq!(alignment.stats.redundant_releases, 0);
    }

    #[test]
    fn test_no_frames_leaves_events_unassigned() {
        let aligner = EventWindowAligner::new(30.0, 0).unwrap();
        let alignment = aligner.align(&[InputEvent::press(0, key("a"))]);
        assert!(alignment.windows.is_empty());
        assert_eq!(alignment.stats.unassigned, 1);
    }
}
