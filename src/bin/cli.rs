//! job-scout CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use job_scout::{
    delivery::{ConsoleSink, DeliverySink, DiscordWebhook},
    error::Result,
    models::{Config, RawCandidate, SourceId},
    pipeline::{Classifier, FingerprintSet, Orchestrator},
    storage::{FingerprintStore, LocalStorage},
};
use tokio_util::sync::CancellationToken;

/// job-scout - IT job posting aggregator
#[derive(Parser, Debug)]
#[command(
    name = "job-scout",
    version,
    about = "Collects IT job postings and posts new ones to a Discord webhook"
)]
struct Cli {
    /// Path to storage directory containing config and state files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, filter and deliver new postings once
    Run {
        /// Log messages instead of posting them; nothing is persisted
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate configuration file
    Validate,

    /// Show the verdict the classifier gives a title
    Classify {
        title: String,

        #[arg(long, default_value = "https://example.com/vaga")]
        url: String,
    },

    /// Show stored fingerprints and the last run summary
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let mut config = Config::load_or_default(&config_path);
    config.apply_env();
    log::debug!("Loaded configuration from {}", config_path.display());

    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Run { dry_run } => {
            config.validate()?;

            let sink: Arc<dyn DeliverySink> = if dry_run {
                Arc::new(ConsoleSink::new(config.delivery.hard_limit))
            } else {
                Arc::new(DiscordWebhook::from_config(&config.delivery)?)
            };

            let fingerprints = Arc::new(FingerprintSet::from_fingerprints(
                storage.load_fingerprints().await?,
                config.dedup.case_insensitive,
            ));
            let mut orchestrator =
                Orchestrator::from_config(&config, sink)?.with_fingerprints(Arc::clone(&fingerprints));

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::warn!("Interrupted, cancelling in-flight fetches");
                    on_signal.cancel();
                }
            });

            let summary = orchestrator.run(&cancel).await?;

            if dry_run {
                log::info!("Dry run: fingerprints and summary not saved");
            } else {
                let snapshot = storage.save_fingerprints(&fingerprints.snapshot()).await?;
                storage.save_summary(&summary).await?;
                log::info!(
                    "Saved {} fingerprints to {}",
                    snapshot.count,
                    storage.root().display()
                );
            }

            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            if config.delivery.webhook_url.is_none() {
                log::warn!("No webhook configured; only `run --dry-run` will work");
            }
            log::info!(
                "✓ Config OK ({} sources, hard limit {} chars)",
                config.sources.len(),
                config.delivery.hard_limit
            );
        }

        Command::Classify { title, url } => {
            let query = config.query();
            let classifier =
                Classifier::from_config(&config.classifier)?.with_home_locality(query.home_locality());
            let candidate = RawCandidate::new(title, url, SourceId::from("cli"));
            let verdict = classifier.classify(&candidate);

            match verdict.reason {
                None => println!("accepted"),
                Some(reason) => println!("rejected: {}", reason),
            }
            log::debug!("Locality: {:?}", classifier.locality(&candidate));
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            let fingerprints = storage.load_fingerprints().await?;
            log::info!("Known postings: {}", fingerprints.len());

            match storage.load_summary().await? {
                Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                None => log::info!("No run recorded yet."),
            }
        }
    }

    Ok(())
}
