//! FIAS Loader - address registry loader

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fias_common::logging::{init_logging, LogConfig, LogLevel};
use fias_loader::classifier::Classifier;
use fias_loader::config::IngestConfig;
use fias_loader::database::PgDatabase;
use fias_loader::download::HttpArchiveFetcher;
use fias_loader::orchestrator::{CycleOutcome, Orchestrator};
use fias_loader::schema::{SchemaKey, SchemaRegistry};
use fias_loader::version::SoapVersionService;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fias-loader")]
#[command(author, version, about = "Periodic FIAS address registry loader")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (defaults to ./fias-loader.toml when present)
    #[arg(short, long, global = true, env = "FIAS_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run cycles until interrupted (default)
    Run,

    /// Run a single cycle and exit
    Once,

    /// Show the remote version and the local marker
    Check,

    /// Load every classified file of an unpacked release
    LoadDir {
        /// Directory holding the XML extracts
        dir: PathBuf,
    },

    /// Load a single extract
    LoadFile {
        /// Path to the XML extract
        file: PathBuf,

        /// Schema key (e.g. AS_HOUSE or HOUSE) instead of the file name
        #[arg(short, long)]
        key: Option<SchemaKey>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Verbose flag sets the baseline; LOG_* variables take precedence
    let log_config = LogConfig {
        level: if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        },
        log_file_prefix: "fias-loader".to_string(),
        ..LogConfig::default()
    }
    .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = IngestConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let orchestrator = build_orchestrator(config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("FIAS loader started");
            orchestrator
                .run_until(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "Failed to listen for Ctrl-C");
                        std::future::pending::<()>().await;
                    }
                })
                .await?;
        }
        Command::Once => match orchestrator.run_cycle().await? {
            CycleOutcome::Unchanged { version } => {
                info!(version = %version, "Already up to date");
            }
            CycleOutcome::Applied { version, report } => {
                info!(
                    version = %version,
                    tables = report.loaded.len(),
                    rows = report.rows(),
                    "Release applied"
                );
            }
            CycleOutcome::Incomplete { version, report } => {
                anyhow::bail!(
                    "release {} incomplete: {} file(s) failed",
                    version,
                    report.failed.len()
                );
            }
        }
        Command::Check => {
            let (remote, marker) = orchestrator.check().await?;
            println!("Remote version: {} ({})", remote.marker(), remote.text_version);
            println!("Archive:        {}", remote.complete_xml_url);
            if let Some(delta) = &remote.delta_xml_url {
                println!("Delta archive:  {delta}");
            }
            println!("Local marker:   {}", marker.as_deref().unwrap_or("<none>"));
        }
        Command::LoadDir { dir } => {
            let report = orchestrator.load_directory(&dir).await?;
            info!(
                tables = report.loaded.len(),
                rows = report.rows(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                "Directory loaded"
            );
            if !report.is_complete() {
                anyhow::bail!("{} file(s) failed to load", report.failed.len());
            }
        }
        Command::LoadFile { file, key } => {
            let report = orchestrator.load_path(&file, key).await?;
            info!(table = %report.table, rows = report.rows, "File loaded");
        }
    }

    Ok(())
}

fn build_orchestrator(config: IngestConfig) -> Result<Orchestrator> {
    let versions =
        SoapVersionService::new(config.service.endpoint.clone(), config.service.timeout())?;
    let fetcher =
        HttpArchiveFetcher::new(config.service.download_timeout(), config.load.show_progress)?;
    let database = PgDatabase::new(
        config.database.connect_options()?,
        config.database.connect_timeout(),
    );
    let classifier = Classifier::fias().context("Invalid classification rules")?;

    Ok(Orchestrator::new(
        config,
        SchemaRegistry::fias(),
        classifier,
        Arc::new(versions),
        Arc::new(fetcher),
        Arc::new(database),
    ))
}
