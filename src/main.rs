use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use qstrack::config::QsConfig;
use qstrack::models::{OperatorId, PartState, TrackingId};
use qstrack::view::ViewScope;

mod cmd;

const DEFAULT_DECODER: &str = "zbarcam --raw --nodisplay";
const ENV_DECODER: &str = "QSTRACK_DECODER";

#[derive(Parser)]
#[command(name = "qstrack")]
#[command(version, about = "Operator terminal for part tracking and QR reception")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Skip confirmation prompts
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Part directory base URL. Overrides qstrack.toml and QSTRACK_BASE_URL.
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Bearer token. Overrides QSTRACK_TOKEN.
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Operator user id. Resolved from the server when omitted.
    #[arg(long, global = true)]
    pub operator: Option<OperatorId>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show parts grouped by production state
    Board {
        /// Show the parts of one state instead of the column summary
        #[arg(short, long)]
        state: Option<PartState>,
        /// Keep refreshing until Ctrl-C
        #[arg(short, long)]
        watch: bool,
    },
    /// Start working on a part
    Take { part_id: Uuid },
    /// Complete the active task
    Complete {
        /// Tracking id of the task
        #[arg(required_unless_present = "part", conflicts_with = "part")]
        tracking_id: Option<TrackingId>,
        /// Identify the task by its part instead
        #[arg(long)]
        part: Option<Uuid>,
    },
    /// List current and completed tasks
    Tasks {
        #[arg(long = "for")]
        operator: Option<OperatorId>,
    },
    /// Show operator performance figures
    Metrics {
        #[arg(long = "for")]
        operator: Option<OperatorId>,
    },
    /// Receive parts from decoded QR payloads
    Scan {
        /// Decoded QR texts, e.g. "Part ID: <uuid>"
        payloads: Vec<String>,
        /// Read one payload per line from stdin
        #[arg(long, conflicts_with = "payloads")]
        stdin: bool,
        /// Run an external decoder and read payloads from its output.
        /// Falls back to QSTRACK_DECODER when no other source is given.
        #[arg(long, conflicts_with_all = ["payloads", "stdin"])]
        decoder: Option<String>,
        /// List cameras and exit
        #[arg(long)]
        list_cameras: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default qstrack.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    qstrack::logging::init(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = QsConfig::new(project_dir)?.with_cli_args(
        cli.base_url.clone(),
        cli.token.clone(),
        cli.operator,
        cli.verbose,
        cli.yes,
    );

    let scope = ViewScope::new();
    let token = scope.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    match cli.command {
        Commands::Config { command } => cmd::cmd_config(&config, command)?,
        Commands::Scan {
            decoder,
            list_cameras: true,
            ..
        } => {
            let decoder = decoder
                .or_else(env_decoder)
                .unwrap_or_else(|| DEFAULT_DECODER.to_string());
            cmd::cmd_list_cameras(&decoder).await?;
        }
        Commands::Scan {
            payloads,
            stdin,
            decoder,
            ..
        } => {
            let source = match (decoder, stdin) {
                (Some(command), _) => cmd::ScanSource::Decoder(command),
                (None, true) => cmd::ScanSource::Stdin,
                (None, false) if !payloads.is_empty() => cmd::ScanSource::Args(payloads),
                (None, false) => match env_decoder() {
                    Some(command) => cmd::ScanSource::Decoder(command),
                    None => bail!("Nothing to scan: pass payloads, --stdin or --decoder"),
                },
            };
            let ctx = cmd::Context::connect(config).await?;
            cmd::cmd_scan(&ctx, &scope, source).await?;
        }
        Commands::Board { state, watch } => {
            let ctx = cmd::Context::connect(config).await?;
            cmd::cmd_board(&ctx, &scope, state, watch).await?;
        }
        Commands::Take { part_id } => {
            let ctx = cmd::Context::connect(config).await?;
            interruptible(&scope, cmd::cmd_take(&ctx, part_id)).await?;
        }
        Commands::Complete { tracking_id, part } => {
            let target = match (tracking_id, part) {
                (Some(id), _) => cmd::CompleteTarget::Task(id),
                (None, Some(part_id)) => cmd::CompleteTarget::Part(part_id),
                (None, None) => bail!("Pass a tracking id or --part"),
            };
            let ctx = cmd::Context::connect(config).await?;
            interruptible(&scope, cmd::cmd_complete(&ctx, target)).await?;
        }
        Commands::Tasks { operator } => {
            let ctx = cmd::Context::connect(config).await?;
            interruptible(&scope, cmd::cmd_tasks(&ctx, operator)).await?;
        }
        Commands::Metrics { operator } => {
            let ctx = cmd::Context::connect(config).await?;
            interruptible(&scope, cmd::cmd_metrics(&ctx, operator)).await?;
        }
    }

    Ok(())
}

/// Decoder command from the environment, used only when no source was passed.
fn env_decoder() -> Option<String> {
    std::env::var(ENV_DECODER)
        .ok()
        .filter(|command| !command.trim().is_empty())
}

/// Run a one-shot command, abandoning it on Ctrl-C.
async fn interruptible<F>(scope: &ViewScope, fut: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    match scope.run(fut).await {
        Some(result) => result,
        None => bail!("Interrupted"),
    }
}
