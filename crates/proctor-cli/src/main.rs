//! `proctor` — evaluate recorded traces offline or drive a running proctord.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod client;
mod run;

#[derive(Parser, Debug)]
#[command(name = "proctor")]
#[command(author, version, about = "Webcam engagement and identity monitor", long_about = None)]
struct Cli {
    /// Talk to proctord on the session bus instead of the system bus
    #[arg(long, global = true)]
    session: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a recorded trace locally and print the activity log
    Run {
        /// JSON-lines trace of per-frame detections
        #[arg(long)]
        trace: PathBuf,

        /// Reference image of the expected person
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Indicator rules (TOML); built-in defaults when omitted
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Number of passes over the trace
        #[arg(long, default_value = "1")]
        laps: u32,

        /// Print the log as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start capture if stopped, stop it if running
    Toggle,
    /// Start capture
    Start,
    /// Stop capture
    Stop,
    /// Use an image as the identity reference
    Upload {
        path: PathBuf,
    },
    /// Show the activity log, newest first
    Log {
        #[arg(long)]
        json: bool,
    },
    /// Show blend-shape scores of the latest frame
    BlendShapes,
    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let session_bus = cli.session;

    match cli.command {
        Command::Run {
            trace,
            reference,
            rules,
            laps,
            json,
        } => run::run(run::RunArgs {
            trace,
            reference,
            rules,
            laps,
            json,
        }),
        Command::Toggle => client::toggle(&client::connect(session_bus).await?).await,
        Command::Start => client::start(&client::connect(session_bus).await?).await,
        Command::Stop => client::stop(&client::connect(session_bus).await?).await,
        Command::Upload { path } => {
            client::upload(&client::connect(session_bus).await?, &path).await
        }
        Command::Log { json } => client::log(&client::connect(session_bus).await?, json).await,
        Command::BlendShapes => {
            client::blend_shapes(&client::connect(session_bus).await?).await
        }
        Command::Status => client::status(&client::connect(session_bus).await?).await,
    }
}
