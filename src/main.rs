use std::io;
use std::path::PathBuf;

use accidents2pg::{LoadTarget, OutputFormat, Overrides};
use accidents2pg_config::{RuntimeConfig, Stage};
use accidents2pg_handlers::{init_tracing, LoadSummary};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

/// Download traffic-accident CSVs and load them into Postgres
#[derive(Parser)]
#[command(name = "accidents2pg")]
#[command(version)]
#[command(about = "Download traffic-accident CSVs and load them into Postgres", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Storage directory (filesystem backend only)
    #[arg(short, long, value_name = "DIR", global = true)]
    output: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a CSV and store it under its file name
    Fetch {
        /// Source URL; the last path segment becomes the object key
        csv_url: String,
    },
    /// Load a stored CSV into the accidents table
    Load {
        /// Object key in the configured store
        #[arg(required_unless_present = "event", conflicts_with = "event")]
        key: Option<String>,

        /// S3 notification JSON to process instead of a single key
        #[arg(long, value_name = "FILE")]
        event: Option<PathBuf>,

        /// Reshape and count records without writing to the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Reshape a local CSV and print the records
    Reshape {
        /// Semicolon-delimited accident CSV
        file: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Jsonl)]
        format: OutputFormat,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = Overrides {
        output: cli.output.clone(),
        log_level: cli.log_level.clone(),
    };

    match cli.command {
        Commands::Reshape { file, format } => {
            init_tracing(&accidents2pg::log_config(&overrides));
            let output = accidents2pg::reshape_file(&file)?;
            tracing::info!(
                rows_read = output.stats.rows_read,
                rows_dropped = output.stats.rows_dropped,
                records = output.stats.records_emitted,
                "Reshaped {}",
                file.display()
            );
            accidents2pg::write_records(&output.records, format, io::stdout().lock())
        }
        Commands::Fetch { csv_url } => {
            let config = load(&cli.config, Stage::Fetch, &overrides)?;
            block_on(async move {
                let outcome = accidents2pg::run_fetch(&config, &csv_url).await?;
                println!("Stored {} ({} bytes)", outcome.key, outcome.bytes);
                Ok(())
            })
        }
        Commands::Load {
            key,
            event,
            dry_run,
        } => {
            let target = match (key, event) {
                (_, Some(path)) => LoadTarget::Event(accidents2pg::read_event(&path)?),
                (Some(key), None) => LoadTarget::Key(key),
                (None, None) => anyhow::bail!("either a key or --event is required"),
            };

            // A dry run never opens a connection, so the database section may be empty.
            let stage = if dry_run { Stage::Fetch } else { Stage::Load };
            let config = load(&cli.config, stage, &overrides)?;

            block_on(async move {
                let summary = if dry_run {
                    accidents2pg::run_load_dry(&config, &target).await?.0
                } else {
                    accidents2pg::run_load(&config, &target).await?
                };
                print_summary(&summary, dry_run);
                Ok(())
            })
        }
    }
}

fn load(path: &Option<PathBuf>, stage: Stage, overrides: &Overrides) -> Result<RuntimeConfig> {
    let config = accidents2pg::load_config(path.as_deref(), stage, overrides)?;
    init_tracing(&config.log);
    Ok(config)
}

fn block_on<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(future)
}

fn print_summary(summary: &LoadSummary, dry_run: bool) {
    for object in &summary.objects {
        println!(
            "{}: {} rows read, {} dropped, {} records",
            object.key,
            object.stats.rows_read,
            object.stats.rows_dropped,
            object.stats.records_emitted
        );
    }
    if summary.skipped > 0 {
        println!("{} notification record(s) not processed", summary.skipped);
    }
    if dry_run {
        println!(
            "Dry run: {} records would be saved to the database.",
            summary.records_saved()
        );
    } else {
        println!(
            "Successfully processed and saved {} records to the database.",
            summary.records_saved()
        );
    }
}
