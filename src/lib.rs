// accidents2pg - local runner for the accident CSV pipeline
//
// The Lambda binaries live in accidents2pg-lambda. This crate drives the same
// stage processors from a terminal: fetch a CSV into storage, load a stored
// CSV (or a saved S3 notification) into Postgres, or reshape a local file
// without touching any backend.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use accidents2pg_config::{LogConfig, RuntimeConfig, Stage, StorageBackend};
use accidents2pg_core::{reshape_bytes, NormalizedRecord, ReshapeOutput};
use accidents2pg_handlers::{
    build_fetch_context, build_load_context, build_load_context_with_sink, process_fetch_request,
    process_object, process_s3_event, FetchOutcome, LoadContext, LoadSummary, S3Event,
};
use accidents2pg_persist::{MemorySink, RecordSink};
use anyhow::{bail, Context, Result};
use tracing::info;

/// Command-line values that take priority over file and environment config.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Root directory for the filesystem backend
    pub output: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// What the load command should read.
#[derive(Debug, Clone)]
pub enum LoadTarget {
    /// One object key in the configured store
    Key(String),
    /// A saved S3 notification, processed the same way the Lambda does
    Event(S3Event),
}

/// Output encoding for reshaped records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Jsonl,
    /// Semicolon-delimited CSV with a header row
    Csv,
}

/// Load configuration for `stage`, apply `overrides`, and re-validate.
pub fn load_config(
    path: Option<&Path>,
    stage: Stage,
    overrides: &Overrides,
) -> Result<RuntimeConfig> {
    let mut config = match path {
        Some(path) => RuntimeConfig::load_from_path(path, stage)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RuntimeConfig::load(stage).context("Failed to load configuration")?,
    };

    apply_overrides(&mut config, overrides)?;
    config.validate(stage)?;
    Ok(config)
}

/// Apply command-line overrides on top of a loaded configuration.
pub fn apply_overrides(config: &mut RuntimeConfig, overrides: &Overrides) -> Result<()> {
    if let Some(output) = &overrides.output {
        if config.storage.backend != StorageBackend::Fs {
            bail!(
                "--output only works with the filesystem backend, but backend is '{}'.\n\
                Either remove --output or set ACCIDENTS2PG_STORAGE_BACKEND=fs.",
                config.storage.backend
            );
        }
        let fs = config.storage.fs.get_or_insert_with(Default::default);
        fs.path = output.to_string_lossy().to_string();
    }

    if let Some(level) = &overrides.log_level {
        config.log.level = level.clone();
    }

    Ok(())
}

/// Logging for commands that run without a loaded configuration.
pub fn log_config(overrides: &Overrides) -> LogConfig {
    let mut log = LogConfig::default();
    if let Some(level) = &overrides.log_level {
        log.level = level.clone();
    }
    log
}

/// Download `csv_url` into the configured store.
pub async fn run_fetch(config: &RuntimeConfig, csv_url: &str) -> Result<FetchOutcome> {
    let ctx = build_fetch_context(config)?;
    let outcome = process_fetch_request(csv_url, &ctx).await?;
    info!(
        key = %outcome.key,
        bytes = outcome.bytes,
        location = %config.storage.location(),
        "Stored CSV"
    );
    Ok(outcome)
}

/// Load a stored CSV into Postgres.
pub async fn run_load(config: &RuntimeConfig, target: &LoadTarget) -> Result<LoadSummary> {
    let ctx = build_load_context(config)?;
    load_with_context(&ctx, target).await
}

/// Run the load stage against an in-memory sink. No database is contacted;
/// the returned sink holds what would have been appended.
pub async fn run_load_dry(
    config: &RuntimeConfig,
    target: &LoadTarget,
) -> Result<(LoadSummary, Arc<MemorySink>)> {
    let sink = Arc::new(MemorySink::new());
    let ctx = build_load_context_with_sink(config, sink.clone() as Arc<dyn RecordSink>)?;
    let summary = load_with_context(&ctx, target).await?;
    Ok((summary, sink))
}

async fn load_with_context(ctx: &LoadContext, target: &LoadTarget) -> Result<LoadSummary> {
    let summary = match target {
        LoadTarget::Key(key) => LoadSummary {
            objects: vec![process_object(key, ctx).await?],
            skipped: 0,
        },
        LoadTarget::Event(event) => process_s3_event(event, ctx).await?,
    };
    Ok(summary)
}

/// Read a saved S3 notification from disk.
pub fn read_event(path: &Path) -> Result<S3Event> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read event file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse S3 event: {}", path.display()))
}

/// Reshape a local CSV file.
pub fn reshape_file(path: &Path) -> Result<ReshapeOutput> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(reshape_bytes(&bytes)?)
}

/// Write records to `writer` in `format`.
pub fn write_records<W: Write>(
    records: &[NormalizedRecord],
    format: OutputFormat,
    mut writer: W,
) -> Result<()> {
    match format {
        OutputFormat::Jsonl => {
            for record in records {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        OutputFormat::Csv => {
            let mut csv = csv::WriterBuilder::new()
                .delimiter(accidents2pg_core::reshape::DELIMITER)
                .from_writer(writer);
            for record in records {
                csv.serialize(record)?;
            }
            csv.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use accidents2pg_config::Platform;
    use accidents2pg_core::Vehicle;

    fn record(vehicle: Vehicle) -> NormalizedRecord {
        NormalizedRecord {
            created_at: "01/01/2023 14:30".to_string(),
            road_name: "BR-116".to_string(),
            vehicle,
            number_deaths: 2,
        }
    }

    #[test]
    fn test_jsonl_writes_one_object_per_line() {
        let mut out = Vec::new();
        write_records(
            &[record(Vehicle::Automovel), record(Vehicle::Moto)],
            OutputFormat::Jsonl,
            &mut out,
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["road_name"], "BR-116");
        assert_eq!(first["number_deaths"], 2);
    }

    #[test]
    fn test_csv_output_uses_semicolons_and_header() {
        let mut out = Vec::new();
        write_records(&[record(Vehicle::Onibus)], OutputFormat::Csv, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("created_at;road_name;vehicle;number_deaths")
        );
        assert!(lines.next().unwrap().starts_with("01/01/2023 14:30;BR-116;"));
    }

    #[test]
    fn test_output_override_requires_fs_backend() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Lambda);
        let overrides = Overrides {
            output: Some(PathBuf::from("/tmp/out")),
            log_level: None,
        };

        let err = apply_overrides(&mut config, &overrides).unwrap_err();
        assert!(err.to_string().contains("--output"));
    }

    #[test]
    fn test_overrides_set_fs_path_and_level() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        config.storage.backend = StorageBackend::Fs;
        let overrides = Overrides {
            output: Some(PathBuf::from("/tmp/out")),
            log_level: Some("debug".to_string()),
        };

        apply_overrides(&mut config, &overrides).unwrap();

        assert_eq!(config.storage.fs.unwrap().path, "/tmp/out");
        assert_eq!(config.log.level, "debug");
    }
}
