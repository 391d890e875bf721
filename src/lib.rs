//! Gameplay agent - frame-aligned action labels from recorded gameplay, and
//! live replay of predicted actions as synthetic input.
//!
//! The offline half ([`processing`]) aligns recorded input events to video
//! frames and labels each frame with an action from the [`catalog`]. The
//! online half ([`control`]) runs a fixed-rate loop that turns predicted
//! actions into press/release calls through an [`injection`] backend.

pub mod capture;
pub mod catalog;
pub mod commands;
pub mod config;
pub mod control;
pub mod injection;
pub mod processing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gameplay_agent=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting gameplay-agent v{}", env!("CARGO_PKG_VERSION"));
}
