use crate::capture::input::types::{EventKind, InputEvent, RawInputLine};
use crate::catalog::PhysicalInput;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventLogError {
    #[error("Failed to read input log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed input event: {reason}\n  line: {line}")]
    Malformed { line: String, reason: String },
}

pub type EventLogResult<T> = Result<T, EventLogError>;

/// Events of one recording, sorted by timestamp.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<InputEvent>,
    /// Lines that failed to parse and were dropped.
    pub skipped_lines: usize,
    /// Whether the file was out of timestamp order on disk.
    pub resorted: bool,
}

/// Parses one JSON Lines record.
pub fn parse_line(line: &str) -> EventLogResult<InputEvent> {
    let malformed = |reason: String| EventLogError::Malformed {
        line: line.to_string(),
        reason,
    };

    let raw: RawInputLine = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;

    if !raw.timestamp.is_finite() {
        return Err(malformed(format!("non-finite timestamp {}", raw.timestamp)));
    }
    let timestamp_ms = raw.timestamp.floor() as i64;

    let require = |field: Option<&String>, name: &str| {
        field
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .ok_or_else(|| malformed(format!("'{}' event without '{}'", raw.event_type, name)))
    };

    let kind = match raw.event_type.as_str() {
        "key_press" => EventKind::Press {
            input: PhysicalInput::key(&require(raw.key.as_ref(), "key")?),
        },
        "key_release" => EventKind::Release {
            input: PhysicalInput::key(&require(raw.key.as_ref(), "key")?),
        },
        "mouse_press" => EventKind::Press {
            input: PhysicalInput::mouse(&require(raw.button.as_ref(), "button")?),
        },
        "mouse_release" => EventKind::Release {
            input: PhysicalInput::mouse(&require(raw.button.as_ref(), "button")?),
        },
        "mouse_move" => EventKind::MouseMove {
            x: raw.x.unwrap_or_default(),
            y: raw.y.unwrap_or_default(),
        },
        other => return Err(malformed(format!("unknown event type '{}'", other))),
    };

    Ok(InputEvent {
        timestamp_ms,
        kind,
        frame_hint: raw.frame.and_then(|frame| u64::try_from(frame).ok()),
    })
}

/// Reads every event from `reader`, skipping malformed lines with a warning.
///
/// The result is stable-sorted by timestamp, so events sharing a timestamp
/// keep their arrival order.
pub fn parse_event_log(reader: impl BufRead, origin: &Path) -> EventLogResult<EventLog> {
    let mut log = EventLog::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| EventLogError::Io {
            path: origin.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_line(trimmed) {
            Ok(event) => log.events.push(event),
            Err(e) => {
                log.skipped_lines += 1;
                tracing::warn!("Skipping {}:{}: {}", origin.display(), index + 1, e);
            }
        }
    }

    let in_order = log
        .events
        .windows(2)
        .all(|pair| pair[0].timestamp_ms <= pair[1].timestamp_ms);
    if !in_order {
        tracing::info!("Input log {} is out of timestamp order, resorting", origin.display());
        log.events.sort_by_key(|event| event.timestamp_ms);
        log.resorted = true;
    }

    Ok(log)
}

pub fn read_event_log(path: &Path) -> EventLogResult<EventLog> {
    let file = std::fs::File::open(path).map_err(|source| EventLogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let log = parse_event_log(std::io::BufReader::new(file), path)?;

    tracing::info!(
        "Loaded {} input events from {} ({} skipped)",
        log.events.len(),
        path.display(),
        log.skipped_lines
    );
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> EventLog {
        parse_event_log(text.as_bytes(), Path::new("inline.jsonl")).unwrap()
    }

    #[test]
    fn test_parse_each_event_type() {
        let log = parse(concat!(
            r#"{"timestamp": 0, "type": "key_press", "key": "w", "frame": 0}"#,
            "\n",
            r#"{"timestamp": 10, "type": "key_release", "key": "W", "frame": 0}"#,
            "\n",
            r#"{"timestamp": 20, "type": "mouse_press", "button": "left", "x": 5, "y": 6, "frame": 1}"#,
            "\n",
            r#"{"timestamp": 30, "type": "mouse_release", "button": "left", "frame": 1}"#,
            "\n",
            r#"{"timestamp": 40, "type": "mouse_move", "x": 100.5, "y": 200, "frame": 1}"#,
        ));

        assert_eq!(log.skipped_lines, 0);
        assert_eq!(
            log.events,
            vec![
                InputEvent::press(0, PhysicalInput::key("w")).with_frame_hint(0),
                InputEvent::release(10, PhysicalInput::key("w")).with_frame_hint(0),
                InputEvent::press(20, PhysicalInput::mouse("left")).with_frame_hint(1),
                InputEvent::release(30, PhysicalInput::mouse("left")).with_frame_hint(1),
                InputEvent::mouse_move(40, 100.5, 200.0).with_frame_hint(1),
            ]
        );
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let log = parse(concat!(
            r#"{"timestamp": 0, "type": "key_press", "key": "w"}"#,
            "\n",
            "not json at all\n",
            r#"{"timestamp": 5, "type": "key_press"}"#,
            "\n",
            r#"{"timestamp": 6, "type": "scroll", "key": "w"}"#,
            "\n\n",
            r#"{"timestamp": 7, "type": "key_release", "key": "w"}"#,
        ));

        assert_eq!(log.events.len(), 2);
        assert_eq!(log.skipped_lines, 3);
    }

    #[test]
    fn test_out_of_order_log_is_stably_resorted() {
        let log = parse(concat!(
            r#"{"timestamp": 50, "type": "key_press", "key": "a"}"#,
            "\n",
            r#"{"timestamp": 10, "type": "key_press", "key": "b"}"#,
            "\n",
            r#"{"timestamp": 10, "type": "key_release", "key": "b"}"#,
        ));

        assert!(log.resorted);
        let order: Vec<_> = log.events.iter().map(|e| (e.timestamp_ms, e.kind.clone())).collect();
        assert_eq!(
            order,
            vec![
                (10, EventKind::Press { input: PhysicalInput::key("b") }),
                (10, EventKind::Release { input: PhysicalInput::key("b") }),
                (50, EventKind::Press { input: PhysicalInput::key("a") }),
            ]
        );
    }

    #[test]
    fn test_negative_frame_hint_is_dropped() {
        let event = parse_line(r#"{"timestamp": 3.7, "type": "key_press", "key": "shift_l", "frame": -1}"#).unwrap();
        assert_eq!(event.timestamp_ms, 3);
        assert_eq!(event.frame_hint, None);
        assert_eq!(event.input(), Some(&PhysicalInput::Modifier("shift".to_string())));
    }
}
