//! `replay` and `sequence` subcommands

use crate::catalog::{ActionCatalog, ActionId};
use crate::commands::output::{percent, print_json, print_table};
use crate::config::ControllerConfig;
use crate::control::{
    ActionExecutor, ClockScreen, LabelScript, LoopReport, NoFeatures, RealtimeLoop, ReleaseOnExit, StopSignal,
};
use crate::injection::{platform_injector, DryRunInjector, InputInjector};
use crate::processing::{label_events, load_recording};
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn injector(live: bool) -> Box<dyn InputInjector + Send> {
    if live {
        platform_injector()
    } else {
        Box::new(DryRunInjector::default())
    }
}

/// Raises the returned signal on Ctrl-C. Must be called inside the runtime.
fn stop_on_ctrl_c() -> StopSignal {
    let stop = StopSignal::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, releasing held inputs");
            ctrl_c_stop.stop();
        }
    });
    stop
}

/// One video frame's duration.
fn frame_period(video_fps: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(1.0 / video_fps)
        .with_context(|| format!("video_fps {} gives no usable frame period", video_fps))
}

/// Labels a recording and plays the labels back through the control loop at
/// the video's frame rate. Ctrl-C stops the loop and releases held inputs.
pub async fn replay(
    catalog_path: &Path,
    inputs: &Path,
    config: ControllerConfig,
    live: bool,
    json: bool,
) -> anyhow::Result<()> {
    config.validate_for_replay()?;
    let catalog = Arc::new(
        ActionCatalog::load(catalog_path).with_context(|| format!("loading {}", catalog_path.display()))?,
    );
    let (_, metadata, log) = load_recording(inputs).with_context(|| format!("loading {}", inputs.display()))?;
    let (labels, _) = label_events(&catalog, &log.events, &metadata)?;

    let mut settings = config.loop_settings();
    settings.period = frame_period(metadata.video_fps)?;
    settings.max_cycles = Some(labels.len() as u64);

    tracing::info!(
        "Replaying {} frames from {} at {} fps ({})",
        labels.len(),
        inputs.display(),
        metadata.video_fps,
        if live { "live input" } else { "dry run" }
    );

    let stop = stop_on_ctrl_c();

    let loop_catalog = Arc::clone(&catalog);
    let threshold = config.confidence_threshold;
    let report = tokio::task::spawn_blocking(move || {
        let mut executor = ActionExecutor::new(loop_catalog, injector(live), threshold);
        let mut control = RealtimeLoop::new(
            ClockScreen::default(),
            NoFeatures,
            LabelScript::from_labels(&labels),
            settings,
        )
        .with_stop_signal(stop);
        control.run(&mut executor)
    })
    .await
    .context("control loop thread panicked")?;

    if json {
        return print_json(&report);
    }
    print_report(&catalog, &report);
    Ok(())
}

fn print_report(catalog: &ActionCatalog, report: &LoopReport) {
    let stats = &report.stats;
    println!(
        "session {}: {:?} after {} cycles in {:.1}s ({:.1} Hz)",
        report.session_id,
        report.stop_reason,
        stats.cycles,
        report.elapsed.as_secs_f64(),
        report.achieved_hz
    );
    println!(
        "switches {}, unchanged {}, low confidence {}, unknown {}, failed cycles {}, overruns {}",
        stats.switches,
        stats.unchanged,
        stats.below_threshold,
        stats.unknown_actions,
        stats.failures(),
        stats.overruns
    );

    let rows: Vec<Vec<String>> = stats
        .predictions
        .iter()
        .map(|(&id, &count)| {
            vec![
                id.to_string(),
                catalog
                    .lookup_by_id(id)
                    .map(|action| action.name.clone())
                    .unwrap_or_else(|| "?".to_string()),
                count.to_string(),
                format!("{:.1}%", percent(count, stats.cycles)),
            ]
        })
        .collect();
    println!();
    print_table(&["ID", "ACTION", "CYCLES", "SHARE"], &rows);
}

/// Accepts action names or numeric ids.
fn resolve_actions(catalog: &ActionCatalog, actions: &[String]) -> anyhow::Result<Vec<ActionId>> {
    actions
        .iter()
        .map(|action| {
            if let Ok(id) = action.parse::<ActionId>() {
                return Ok(id);
            }
            catalog
                .lookup_by_name(action)
                .map(|definition| definition.id)
                .with_context(|| format!("unknown action '{}'", action))
        })
        .collect()
}

/// Holds each action for the configured time, in order, then releases
/// everything. Ctrl-C ends the current hold and skips the rest.
pub async fn sequence(
    catalog_path: &Path,
    actions: &[String],
    config: ControllerConfig,
    live: bool,
) -> anyhow::Result<()> {
    let catalog = Arc::new(
        ActionCatalog::load(catalog_path).with_context(|| format!("loading {}", catalog_path.display()))?,
    );
    let ids = resolve_actions(&catalog, actions)?;
    let stop = stop_on_ctrl_c();

    let sequence_catalog = Arc::clone(&catalog);
    let sequence_ids = ids.clone();
    let (outcomes, failures) = tokio::task::spawn_blocking(move || {
        let mut executor = ActionExecutor::new(sequence_catalog, injector(live), config.confidence_threshold);
        let outcomes = {
            let mut guarded = ReleaseOnExit::new(&mut executor);
            guarded.execute_sequence(&sequence_ids, config.hold(), config.sequence_gap(), &stop)
        };
        (outcomes, executor.injection_failures())
    })
    .await
    .context("sequence thread panicked")?;

    for (id, outcome) in ids.iter().zip(&outcomes) {
        let name = catalog.lookup_by_id(*id).map(|a| a.name.as_str()).unwrap_or("?");
        println!("{:>4} {:<24} {:?}", id, name, outcome);
    }
    if outcomes.len() < ids.len() {
        println!("stopped, {} action(s) skipped", ids.len() - outcomes.len());
    }
    if failures > 0 {
        anyhow::bail!("{} input(s) failed to inject", failures);
    }
    Ok(())
}
