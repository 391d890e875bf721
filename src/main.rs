use clap::{Parser, Subcommand};
use gameplay_agent::commands;
use gameplay_agent::config::{resolve_catalog_path, ControllerConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gameplay-agent",
    about = "Label recorded gameplay with actions and replay actions as synthetic input",
    version,
    propagate_version = true
)]
struct Cli {
    /// Action catalog (default: $GAME_ACTIONS_CONFIG, then config/game_actions.json)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Controller config JSON (default: built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the action catalog and report every problem
    Validate,

    /// List actions and their key bindings
    Bindings {
        /// Language for display names
        #[arg(long, default_value = "en")]
        lang: String,
    },

    /// Write frame-level action labels for recorded sessions
    Annotate {
        /// An inputs_*.jsonl file or a directory of recordings
        target: PathBuf,

        /// Descend into subdirectories
        #[arg(long, short)]
        recursive: bool,
    },

    /// Play a recording's labels back through the control loop
    Replay {
        /// The recording's inputs_*.jsonl file
        inputs: PathBuf,

        /// Send real input to the OS instead of logging it
        #[arg(long)]
        live: bool,

        /// Override the confidence threshold
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Hold each action in turn, then release everything
    Sequence {
        /// Action names or ids
        #[arg(required = true, num_args = 1..)]
        actions: Vec<String>,

        /// Send real input to the OS instead of logging it
        #[arg(long)]
        live: bool,

        /// Override the hold time per action
        #[arg(long)]
        hold_ms: Option<u64>,
    },
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<ControllerConfig> {
    match path {
        Some(path) => Ok(ControllerConfig::load(path)?),
        None => Ok(ControllerConfig::default()),
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let catalog = resolve_catalog_path(cli.catalog.as_deref());

    match cli.command {
        Commands::Validate => commands::catalog::validate(&catalog, cli.json),
        Commands::Bindings { lang } => commands::catalog::bindings(&catalog, &lang, cli.json),
        Commands::Annotate { target, recursive } => {
            commands::annotate::run(&catalog, &target, recursive, cli.json)
        }
        Commands::Replay {
            inputs,
            live,
            threshold,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(threshold) = threshold {
                config.confidence_threshold = threshold;
            }
            config.validate()?;
            commands::control::replay(&catalog, &inputs, config, live, cli.json).await
        }
        Commands::Sequence {
            actions,
            live,
            hold_ms,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(hold_ms) = hold_ms {
                config.hold_ms = hold_ms;
            }
            config.validate()?;
            commands::control::sequence(&catalog, &actions, config, live).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    gameplay_agent::init_tracing();

    if let Err(e) = dispatch(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
