//! confinsights - terminal client for the ConfInsights backend

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use ci_client::{BackendClient, CancellationToken};
use ci_console::commands::{self, parse_param, resolve_variant, MapArgs};
use ci_console::{console, logging, AppConfig};
use ci_protocol::{BackendCredentials, ResourceMetric};

#[derive(Parser)]
#[command(name = "confinsights")]
#[command(version, about = "Terminal client for the ConfInsights conformance-checking backend", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backend base URL (overrides CONFINSIGHTS_BACKEND and the config file)
    #[arg(short, long, value_name = "URL")]
    backend: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive console (default)
    Console,

    /// Save the process-mining connection credentials
    Credentials {
        #[arg(long)]
        url: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        pool: String,
        #[arg(long)]
        model: String,
        /// Data table name (defaults to ACTIVITIES)
        #[arg(long)]
        table: Option<String>,
    },

    /// Upload a .csv or .xes event log and list its columns
    Upload {
        file: PathBuf,
        #[arg(long)]
        table: Option<String>,
    },

    /// Bind log columns to roles and commit the mapping
    Map {
        #[arg(long)]
        case: Option<String>,
        #[arg(long)]
        activity: Option<String>,
        #[arg(long)]
        timestamp: Option<String>,
        #[arg(long)]
        resource1: Option<String>,
        #[arg(long)]
        resource2: Option<String>,
        /// The uploaded log is XES (reserved roles are pre-bound)
        #[arg(long)]
        xes: bool,
    },

    /// Start an analysis, wait for it and print the result
    Run {
        /// Family tag, e.g. log_skeleton
        family: String,
        /// Variant tag, e.g. always_before
        variant: String,
        /// Temporal-profile zeta (> 0)
        #[arg(long)]
        zeta: Option<f64>,
    },

    /// Print the general insights of the committed log
    Insights,

    /// Query a scalar resource-profile metric
    Metric {
        metric: String,
        /// Query parameter as key=value; repeatable
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },

    /// Show the state of a backend job
    JobStatus { job_id: String },

    /// List analysis families, variants and metrics
    Variants,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?.with_backend_override(
        cli.backend.as_deref(),
        AppConfig::env_backend().as_deref(),
    );
    let root = CancellationToken::new();

    match cli.command {
        Some(Commands::Console) | None => {
            let log_path = AppConfig::log_path();
            logging::init_file(&config.logging.level, &log_path)
                .with_context(|| format!("cannot open log file {}", log_path.display()))?;
            let client = BackendClient::new(config.client_config())?;
            console::run_console(client, &config, root).await
        }
        Some(command) => {
            logging::init_stderr(&config.logging.level);
            let client = BackendClient::new(config.client_config())?;

            let cancel = root.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            let output = run_command(command, &client, &config, &root).await?;
            println!("{}", output.trim_end());
            Ok(())
        }
    }
}

async fn run_command(
    command: Commands,
    client: &BackendClient,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<String> {
    match command {
        Commands::Console => Ok(String::new()),
        Commands::Credentials {
            url,
            token,
            pool,
            model,
            table,
        } => {
            let credentials = BackendCredentials::new(url, token, pool, model, table.as_deref());
            commands::credentials(client, credentials).await
        }
        Commands::Upload { file, table } => commands::upload(client, &file, table.as_deref()).await,
        Commands::Map {
            case,
            activity,
            timestamp,
            resource1,
            resource2,
            xes,
        } => {
            let args = MapArgs {
                case_id: case,
                activity,
                timestamp,
                resource1,
                resource2,
                xes,
            };
            commands::map(client, &args).await
        }
        Commands::Run {
            family,
            variant,
            zeta,
        } => {
            let variant = resolve_variant(&family, &variant)?;
            commands::run(client, variant, zeta, config.graph.directed, cancel).await
        }
        Commands::Insights => commands::insights(client, cancel).await,
        Commands::Metric { metric, params } => {
            let metric: ResourceMetric = metric.parse()?;
            commands::metric(client, metric, &params).await
        }
        Commands::JobStatus { job_id } => commands::job_status(client, &job_id).await,
        Commands::Variants => Ok(commands::variants()),
    }
}
