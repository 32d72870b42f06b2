//! # store-client entry point
//!
//! Parses command-line arguments, builds a [`StoreClient`] from the
//! environment plus flag overrides, and dispatches to subcommand handlers.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fstore_cli::files::{run_list, run_remove, run_upload, RemoveArgs, UploadArgs};
use fstore_cli::stats::{run_freq_words, run_word_count};
use fstore_client::{ClientConfig, StoreClient};

/// Client for the file store server.
///
/// Uploads offer content digests first, so files the server already holds
/// are copied server-side instead of being sent again.
#[derive(Parser, Debug)]
#[command(name = "store-client", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Server base URL. Overrides FSTORE_SERVER_URL.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Request timeout in seconds. Overrides FSTORE_TIMEOUT_SECS.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Retries on transport failure. Overrides FSTORE_MAX_RETRIES.
    #[arg(long, global = true)]
    retries: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store files on the server.
    Add(UploadArgs),

    /// Replace files on the server.
    Update(UploadArgs),

    /// List stored files.
    Ls,

    /// Delete stored files by name.
    Rm(RemoveArgs),

    /// Count words across all stored files.
    Wc,

    /// Show the most frequent words across stored files.
    #[command(name = "freq-words")]
    FreqWords,
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::from_env().context("reading client configuration")?;
        if let Some(server) = &self.server {
            config.server_url = server
                .parse()
                .with_context(|| format!("invalid --server URL {server}"))?;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<u8> {
    let client = StoreClient::new(cli.client_config()?)?;
    tracing::debug!(url = %client.files_url(), "store client ready");

    let mut out = io::stdout();
    let mut err = io::stderr();
    match &cli.command {
        Commands::Add(args) | Commands::Update(args) => {
            run_upload(&client, args, &mut out, &mut err).await
        }
        Commands::Ls => run_list(&client, &mut out).await,
        Commands::Rm(args) => run_remove(&client, args, &mut out, &mut err).await,
        Commands::Wc => run_word_count(&client, &mut out).await,
        Commands::FreqWords => run_freq_words(&client, &mut out).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
