// Process start-up shared by the Lambda binaries and the CLI
//
// Logging/tracing setup and construction of the long-lived clients

use std::sync::Arc;

use accidents2pg_config::{LogConfig, LogFormat, RuntimeConfig};
use accidents2pg_fetch::Fetcher;
use accidents2pg_persist::{PgSink, RecordSink};
use accidents2pg_storage::ObjectStore;
use anyhow::{Context, Result};
use tracing::info;

use crate::processor::{FetchContext, LoadContext};

/// Install the global subscriber. Later calls are no-ops.
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    // stderr keeps stdout free for CLI output
    let _ = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
}

/// Build the fetch stage's HTTP client and object store.
pub fn build_fetch_context(config: &RuntimeConfig) -> Result<FetchContext> {
    let fetcher = Fetcher::new(&config.fetch).context("Failed to initialize HTTP client")?;
    let store = ObjectStore::from_config(&config.storage).context("Failed to initialize storage")?;

    info!(
        bucket = %store.bucket(),
        timeout_secs = config.fetch.timeout_secs,
        max_bytes = config.fetch.max_bytes,
        "Fetch stage ready"
    );
    Ok(FetchContext { fetcher, store })
}

/// Build the load stage's object store and Postgres sink. The database is
/// not contacted until the first append.
pub fn build_load_context(config: &RuntimeConfig) -> Result<LoadContext> {
    let sink = PgSink::connect_lazy(&config.database).context("Failed to initialize database")?;
    build_load_context_with_sink(config, Arc::new(sink))
}

/// Build the load stage around a caller-supplied sink.
pub fn build_load_context_with_sink(
    config: &RuntimeConfig,
    sink: Arc<dyn RecordSink>,
) -> Result<LoadContext> {
    let store = ObjectStore::from_config(&config.storage).context("Failed to initialize storage")?;

    info!(
        bucket = %store.bucket(),
        table = %config.database.qualified_table(),
        batch_mode = ?config.loader.batch_mode,
        "Load stage ready"
    );
    Ok(LoadContext {
        store,
        sink,
        table: config.database.table.clone(),
        batch_mode: config.loader.batch_mode,
    })
}
