//! dialdesk command-line client.
//!
//! Thin wrapper over the library: every subcommand goes through the same
//! resilient request stack (retry, circuit breaker, cache, timeouts) the
//! operator console uses.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use dialdesk::api::{CallsApi, LeadsApi, PromptsApi};
use dialdesk::config::load_or_default;
use dialdesk::export::write_call_history;
use dialdesk::http::{ApiClient, ApiError, RequestOptions};
use dialdesk::jobs::{JobPoller, JobStatusResponse};
use dialdesk::lifecycle::{self, signals::listen_for_ctrl_c, Shutdown};
use dialdesk::observability::init_logging;

#[derive(Parser)]
#[command(name = "dialdesk")]
#[command(about = "Command-line client for the DialDesk voice sales API", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Bearer token (defaults to the configured environment variable)
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List leads
    Leads {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        page_size: u32,
    },
    /// List call history
    Calls {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 50)]
        page_size: u32,
    },
    /// Export the full call history as CSV
    ExportCalls {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 100)]
        page_size: u32,
    },
    /// Show a background job's status, optionally waiting for it to finish
    JobStatus {
        #[arg(long)]
        path: String,
        #[arg(long)]
        wait: bool,
    },
    /// Diff two versions of an agent prompt
    PromptDiff {
        #[arg(long)]
        agent: String,
        #[arg(long)]
        from: u32,
        #[arg(long)]
        to: u32,
    },
    /// Show circuit breaker state
    Circuit,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(base_url) = cli.base_url.clone() {
        config.api.base_url = base_url;
    }
    if let Err(e) = init_logging(&config.observability) {
        eprintln!("Warning: logging already initialised: {e}");
    }

    let shutdown = Shutdown::new();
    let _signals = listen_for_ctrl_c(shutdown.clone());

    let client = match lifecycle::start(&config, cli.token.clone(), &shutdown) {
        Ok(client) => client,
        Err(e) => return report(&e),
    };

    match run(cli.command, &client).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Api(e)) => report(&e),
        Err(CliError::Io(e)) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug)]
enum CliError {
    Api(ApiError),
    Io(std::io::Error),
}

impl From<ApiError> for CliError {
    fn from(err: ApiError) -> Self {
        CliError::Api(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Api(err.into())
    }
}

async fn run(command: Commands, client: &ApiClient) -> Result<(), CliError> {
    match command {
        Commands::Leads { page, page_size } => {
            let leads = LeadsApi::new(client.clone()).list(page, page_size).await?;
            print_json(&leads)?;
        }
        Commands::Calls { page, page_size } => {
            let calls = CallsApi::new(client.clone()).history(page, page_size).await?;
            print_json(&calls)?;
        }
        Commands::ExportCalls { output, page_size } => {
            let calls = CallsApi::new(client.clone()).all_history(page_size).await?;
            let file = std::fs::File::create(&output)?;
            write_call_history(&calls, std::io::BufWriter::new(file))?;
            eprintln!("Exported {} calls to {}", calls.len(), output.display());
        }
        Commands::JobStatus { path, wait } => {
            let status: JobStatusResponse = if wait {
                JobPoller::new(client.clone())
                    .poll(&path, |progress| {
                        eprintln!("{:>3}% {}", progress.percent, progress.status.as_str());
                    })
                    .await?
            } else {
                client.get(&path, &RequestOptions::new()).await?
            };
            print_json(&status)?;
        }
        Commands::PromptDiff { agent, from, to } => {
            let diff = PromptsApi::new(client.clone()).diff(&agent, from, to).await?;
            if diff.is_empty() {
                eprintln!("Versions {from} and {to} are identical");
            } else {
                print!("{}", diff.to_unified());
            }
        }
        Commands::Circuit => {
            print_json(&client.circuit_snapshot())?;
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(err: &ApiError) -> ExitCode {
    if err.is_silent() {
        return ExitCode::from(130);
    }
    tracing::debug!(error = %err, "Command failed");
    eprintln!("Error: {}", err.user_message());
    if err.requires_reauth() {
        eprintln!("Hint: pass a fresh token with --token or the configured environment variable");
    }
    ExitCode::FAILURE
}
