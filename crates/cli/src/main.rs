// Boxwatch CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Logs go to stderr so stdout carries only data.

mod commands;
mod output;

use std::path::{Path, PathBuf};

use anyhow::Context;
use boxwatch_client::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "boxwatch")]
#[command(about = "Boxwatch - Stream Box admin events and look up files")]
#[command(version)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(long, short, env = "BOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "text", value_parser = ["text", "json", "yaml"])]
    pub output: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stream admin-log events until the log is exhausted or Ctrl-C
    Events {
        /// Events per page (defaults to events.event_limit)
        #[arg(long, short)]
        limit: Option<u32>,

        /// ISO-8601 time to stream from (defaults to events.start_time)
        #[arg(long, short)]
        start_time: Option<String>,

        /// Stop after this many events
        #[arg(long)]
        max_events: Option<usize>,
    },

    /// Print the SHA-1 of a file
    FileHash {
        /// File ID
        file_id: String,
    },

    /// Run the JWT exchange and print the access token
    Token,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boxwatch=info,boxwatch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    Ok(config.apply_env())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let output_format = output::OutputFormat::from_str(&cli.output);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Events {
            limit,
            start_time,
            max_events,
        } => commands::events::run(&config, output_format, limit, start_time, max_events).await,
        Commands::FileHash { file_id } => {
            commands::files::run(&config, output_format, &file_id).await
        }
        Commands::Token => commands::token::run(&config, output_format).await,
    }
}
