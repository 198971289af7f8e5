//! sqld CLI - run schema-checked structured and raw queries against PostgreSQL.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use sqld::{
    Config, Connection, ConnectionImpl, ParamMap, PlannedQuery, QueryEngine, QueryRequest,
    QueryResponse, SqldError,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "sqld")]
#[command(about = "Schema-checked structured and raw queries for PostgreSQL")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "sqld.yaml")]
    config: PathBuf,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a structured request against a registered record type
    Query {
        /// Record type to query
        #[arg(long)]
        record: String,

        /// JSON request file (reads stdin when omitted)
        #[arg(long)]
        request: Option<PathBuf>,

        /// Print the planned statement without connecting
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a raw statement with {{name}} placeholders
    Raw {
        /// Record type describing the parameters
        #[arg(long)]
        params: String,

        /// Record type describing the result rows
        #[arg(long)]
        result: String,

        /// File containing the statement text
        #[arg(long)]
        sql: PathBuf,

        /// JSON file with parameter values
        #[arg(long)]
        values: Option<PathBuf>,

        /// Print the planned statement without connecting
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and record declarations
    Check,

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SqldError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let catalog = config.build_catalog()?;
    catalog.seal();
    let engine = QueryEngine::new(Arc::new(catalog))?
        .with_timeout(config.connection.statement_timeout());

    let cancel_token = setup_signal_handler()?;

    match cli.command {
        Commands::Query {
            record,
            request,
            dry_run,
        } => {
            let body = read_input(request.as_deref())?;
            let request: QueryRequest = serde_json::from_str(&body)?;

            if dry_run {
                print_plan(&engine.plan_query(&record, &request)?)?;
                return Ok(());
            }

            let conn = ConnectionImpl::from_config(&config.connection).await?;
            let response = engine.query(&cancel_token, &conn, &record, &request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Raw {
            params,
            result,
            sql,
            values,
            dry_run,
        } => {
            let text = std::fs::read_to_string(&sql)?;
            let values: ParamMap = match values {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => ParamMap::new(),
            };

            if dry_run {
                print_plan(&engine.plan_raw(&text, &params, &result, &values)?)?;
                return Ok(());
            }

            let conn = ConnectionImpl::from_config(&config.connection).await?;
            let rows = engine
                .raw(&cancel_token, &conn, &text, &params, &result, &values)
                .await?;
            println!("{}", serde_json::to_string_pretty(&QueryResponse::ok(rows))?);
        }

        Commands::Check => {
            let catalog = engine.catalog();
            println!("Configuration OK");
            println!("  Driver: {}", config.connection.driver);
            println!("  Converters: {}", catalog.converter_ids().join(", "));
            println!("  Records:");
            for name in catalog.record_types() {
                let schema = catalog.lookup(&name)?;
                println!(
                    "    {} ({} attributes{})",
                    name,
                    schema.attribute_count(),
                    schema
                        .location()
                        .map(|table| format!(", table {}", table))
                        .unwrap_or_default()
                );
            }
        }

        Commands::HealthCheck => {
            let start = Instant::now();
            let conn = ConnectionImpl::from_config(&config.connection).await?;
            conn.ping().await?;
            println!("Health Check Results:");
            println!(
                "  PostgreSQL ({}): OK ({}ms)",
                conn.kind(),
                start.elapsed().as_millis()
            );
        }
    }

    Ok(())
}

/// Read a file, or stdin when no path is given.
fn read_input(path: Option<&Path>) -> Result<String, SqldError> {
    match path {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            Ok(body)
        }
    }
}

fn print_plan(planned: &PlannedQuery) -> Result<(), SqldError> {
    println!("{}", serde_json::to_string_pretty(&planned.statement)?);
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), SqldError> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    let installed = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    installed.map_err(|e| SqldError::Config(format!("failed to install logger: {}", e)))
}

/// Setup signal handlers that cancel the in-flight statement.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
#[cfg(unix)]
fn setup_signal_handler() -> Result<CancellationToken, SqldError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!("\nReceived {}. Cancelling query...", name);
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
fn setup_signal_handler() -> Result<CancellationToken, SqldError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Cancelling query...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
