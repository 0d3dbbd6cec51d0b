//! rivven-sqlbeat - SQL polling agent
//!
//! Runs the configured queries against MySQL on a fixed period and writes one
//! JSON event per line to stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Poll until Ctrl-C
//! rivven-sqlbeat -c sqlbeat.yaml
//!
//! # Check the configuration and print the query plan
//! rivven-sqlbeat -c sqlbeat.yaml validate
//!
//! # Run a single cycle
//! rivven-sqlbeat -c sqlbeat.yaml once
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rivven_sqlbeat::beat::Beat;
use rivven_sqlbeat::config::Config;
use rivven_sqlbeat::mysql::MySqlRowSource;
use rivven_sqlbeat::publisher::StdoutPublisher;

#[derive(Parser)]
#[command(name = "rivven-sqlbeat")]
#[command(version, about = "Polls SQL queries and emits the results as telemetry events")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "sqlbeat.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll until interrupted (default)
    Run,
    /// Validate configuration file
    Validate,
    /// Run a single cycle and exit
    Once,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Validate => validate_config(&config),
        Commands::Once => run_once(config).await,
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(config: Config) -> Result<()> {
    info!("Starting rivven-sqlbeat");

    let mut beat = Beat::from_config(&config.sqlbeat).context("Invalid sqlbeat settings")?;
    beat.log_plan();

    let source = MySqlRowSource::new(&config.sqlbeat);
    if let Err(e) = source.ping().await {
        warn!(endpoint = %source.endpoint(), error = %e, "database not reachable yet, polling anyway");
    }
    let publisher = StdoutPublisher::new(config.output.format);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    beat.run(&source, &publisher, &shutdown).await;

    if let Err(e) = source.disconnect().await {
        warn!(error = %e, "failed to close database connections");
    }
    info!("rivven-sqlbeat stopped");
    Ok(())
}

async fn run_once(config: Config) -> Result<()> {
    let mut beat = Beat::from_config(&config.sqlbeat).context("Invalid sqlbeat settings")?;
    let source = MySqlRowSource::new(&config.sqlbeat);
    let publisher = StdoutPublisher::new(config.output.format);

    let report = beat
        .run_once(&source, &publisher, &CancellationToken::new())
        .await;

    if let Err(e) = source.disconnect().await {
        warn!(error = %e, "failed to close database connections");
    }

    if report.failed_queries() > 0 || report.publish_failures() > 0 {
        anyhow::bail!(
            "{} of {} queries failed, {} events not published",
            report.failed_queries(),
            report.outcomes.len(),
            report.publish_failures()
        );
    }
    Ok(())
}

fn validate_config(config: &Config) -> Result<()> {
    let beat = &config.sqlbeat;
    let descriptors = beat.descriptors()?;

    println!("✓ Configuration valid!\n");

    println!("Connection:");
    println!("  Endpoint: {}:{}", beat.hostname, beat.port);
    println!("  User: {}", beat.username);
    if let Some(db) = beat.database.as_deref().filter(|db| !db.is_empty()) {
        println!("  Database: {}", db);
    }
    println!();

    println!("Polling:");
    println!("  Period: {:?}", beat.period);
    println!("  Delta marker: {}", beat.delta_wildcard);
    println!("  Scalar column: {}", beat.scalar_column);
    println!(
        "  Delta keys: {}",
        if beat.delta_namespace_by_query {
            "per query"
        } else {
            "shared"
        }
    );
    println!();

    println!("Queries ({}):", descriptors.len());
    for (index, query) in descriptors.iter().enumerate() {
        println!("  [{}] {} - {}", index, query.mode, query.text);
    }

    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
    shutdown.cancel();
}
