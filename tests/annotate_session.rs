use gameplay_agent::catalog::ActionCatalog;
use gameplay_agent::processing::{annotate_directory, SessionError};
use std::path::{Path, PathBuf};

fn sample_catalog() -> ActionCatalog {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/game_actions.json");
    ActionCatalog::load(&path).expect("shipped catalog should be valid")
}

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

fn event(timestamp: u64, kind: &str, field: &str, value: &str) -> String {
    format!(
        r#"{{"timestamp": {}, "type": "{}", "{}": "{}", "frame": {}}}"#,
        timestamp,
        kind,
        field,
        value,
        timestamp / 100
    )
}

#[test]
fn test_sample_catalog_bindings() {
    let catalog = sample_catalog();

    assert_eq!(catalog.lookup_by_name("JUMP").map(|a| a.id), Some(9));
    let shift = gameplay_agent::catalog::PhysicalInput::key("shift");
    assert_eq!(catalog.actions_for_input(&shift), &[11, 12]);
    assert!(catalog.lookup_by_id(catalog.count() as u32).is_none());
}

#[test]
fn test_batch_annotation_end_to_end() {
    let catalog = sample_catalog();
    let root = tempfile::tempdir().unwrap();

    // Session A: walk forward, jump while walking, stop.
    let session_a = root.path().join("escort/run_a");
    std::fs::create_dir_all(&session_a).unwrap();
    let inputs_a = [
        event(0, "key_press", "key", "w"),
        event(250, "key_press", "key", "space"),
        event(320, "key_release", "key", "space"),
        r#"{"timestamp": 410, "type": "mouse_move", "x": 10, "y": 20, "frame": 4}"#.to_string(),
        "{broken json".to_string(),
        event(590, "key_release", "key", "w"),
        event(700, "mouse_press", "button", "left"),
        event(830, "mouse_release", "button", "left"),
    ]
    .join("\n");
    write(&session_a.join("inputs_20250101_100000.jsonl"), &inputs_a);
    write(
        &session_a.join("metadata_20250101_100000.json"),
        r#"{"total_frames": 9, "video_fps": 10, "input_statistics": {"key_presses": 2}}"#,
    );

    // Session B: no metadata, must be skipped without failing the batch.
    let session_b = root.path().join("escort/run_b");
    std::fs::create_dir_all(&session_b).unwrap();
    write(&session_b.join("inputs.jsonl"), &event(0, "key_press", "key", "a"));

    let report = annotate_directory(&catalog, root.path(), true).unwrap();
    assert_eq!(report.annotated.len(), 1, "one session annotated");
    assert_eq!(report.failed.len(), 1, "one session skipped");
    assert_eq!(report.failed[0].inputs, session_b.join("inputs.jsonl"));

    let summary = &report.annotated[0];
    assert_eq!(summary.skipped_lines, 1);
    assert_eq!(summary.events, 7);
    assert_eq!(summary.looking_frames, 1);
    assert_eq!(summary.active_frames, 6);

    let csv = std::fs::read_to_string(session_a.join("annotations_20250101_100000.csv")).unwrap();
    let rows: Vec<&str> = csv.lines().collect();
    assert_eq!(
        rows,
        vec![
            "frame,timestamp_ms,action_id,all_actions",
            "0,0,0,0",
            "1,100,0,0",
            "2,200,0,\"0,9\"",
            "3,300,0,0",
            "4,400,0,0",
            "5,500,0,0",
            "6,600,0,0",
            "7,700,4,4",
            "8,800,0,0",
        ]
    );
}

#[test]
fn test_empty_directory_reports_no_recordings() {
    let catalog = sample_catalog();
    let root = tempfile::tempdir().unwrap();
    assert!(matches!(
        annotate_directory(&catalog, root.path(), true),
        Err(SessionError::NoRecordings(_))
    ));
}
