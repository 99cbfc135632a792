//! Postgres sink over a lazily connected `sqlx` pool.

use accidents2pg_config::{DatabaseConfig, SslMode};
use accidents2pg_core::NormalizedRecord;
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::{quote_ident, validate_ident, RecordSink, Result};

/// Column list shared by the DDL and the INSERT, in persisted order.
const COLUMNS: &str = "created_at, road_name, vehicle, number_deaths";

/// Table placement and write behavior for [`PgSink`].
#[derive(Debug, Clone)]
pub struct SinkOptions {
    pub schema: String,
    /// Run `CREATE TABLE IF NOT EXISTS` inside every append.
    pub create_table: bool,
    pub insert_chunk_rows: usize,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self::from(&DatabaseConfig::default())
    }
}

impl From<&DatabaseConfig> for SinkOptions {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            schema: config.schema.clone(),
            create_table: config.create_table,
            insert_chunk_rows: config.insert_chunk_rows,
        }
    }
}

/// Appends records with multi-row INSERTs inside one transaction per call.
#[derive(Debug, Clone)]
pub struct PgSink {
    pool: PgPool,
    options: SinkOptions,
}

impl PgSink {
    /// Build a sink from configuration. No connection is opened until the
    /// first append.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self> {
        validate_ident(&config.schema)?;

        let mut connect = PgConnectOptions::new()
            .host(&config.host)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(pg_ssl_mode(config.ssl_mode));
        if let Some(port) = config.port {
            connect = connect.port(port);
        }

        info!(
            host = %config.host,
            port = ?config.port,
            database = %config.name,
            schema = %config.schema,
            ssl_mode = ?config.ssl_mode,
            "Configuring Postgres sink"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout())
            .connect_lazy_with(connect);

        Ok(Self {
            pool,
            options: SinkOptions::from(config),
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool, options: SinkOptions) -> Result<Self> {
        validate_ident(&options.schema)?;
        Ok(Self { pool, options })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn options(&self) -> &SinkOptions {
        &self.options
    }
}

#[async_trait]
impl RecordSink for PgSink {
    async fn append(&self, table: &str, records: &[NormalizedRecord]) -> Result<u64> {
        validate_ident(table)?;

        let target = qualified_table(&self.options.schema, table);
        let chunk_rows = self.options.insert_chunk_rows.max(1);
        let mut tx = self.pool.begin().await?;

        if self.options.create_table {
            sqlx::query(&create_table_sql(&self.options.schema, table))
                .execute(&mut *tx)
                .await?;
        }

        let total_chunks = records.len().div_ceil(chunk_rows);
        let mut inserted = 0u64;
        for (chunk_idx, chunk) in records.chunks(chunk_rows).enumerate() {
            debug!(
                table = %target,
                chunk = chunk_idx + 1,
                total_chunks,
                rows = chunk.len(),
                "Inserting chunk"
            );

            let mut query = insert_query(&target, chunk);
            inserted += query.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        info!(table = %target, rows = inserted, "Appended records");
        Ok(inserted)
    }
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

pub(crate) fn create_table_sql(schema: &str, table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\
            created_at TEXT, \
            road_name TEXT, \
            vehicle TEXT, \
            number_deaths BIGINT\
        )",
        qualified_table(schema, table)
    )
}

fn insert_query<'a>(target: &str, records: &'a [NormalizedRecord]) -> QueryBuilder<'a, Postgres> {
    let mut query: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} ({}) ", target, COLUMNS));

    query.push_values(records, |mut b, record| {
        b.push_bind(record.created_at.as_str())
            .push_bind(record.road_name.as_str())
            .push_bind(record.vehicle.as_str())
            .push_bind(record.number_deaths);
    });

    query
}

#[cfg(test)]
mod tests {
    use super::*;
    use accidents2pg_core::Vehicle;

    fn record(vehicle: Vehicle) -> NormalizedRecord {
        NormalizedRecord {
            created_at: "01/01/2023 14:30".to_string(),
            road_name: "BR-116".to_string(),
            vehicle,
            number_deaths: 1,
        }
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql("public", "traffic_accidents"),
            "CREATE TABLE IF NOT EXISTS \"public\".\"traffic_accidents\" (\
             created_at TEXT, road_name TEXT, vehicle TEXT, number_deaths BIGINT)"
        );
    }

    #[test]
    fn test_insert_query_binds_four_params_per_row() {
        let records = vec![record(Vehicle::Automovel), record(Vehicle::Moto)];
        let target = qualified_table("public", "traffic_accidents");
        let query = insert_query(&target, &records);

        assert_eq!(
            query.sql(),
            "INSERT INTO \"public\".\"traffic_accidents\" \
             (created_at, road_name, vehicle, number_deaths) \
             VALUES ($1, $2, $3, $4), ($5, $6, $7, $8)"
        );
    }

    #[test]
    fn test_ssl_mode_mapping() {
        assert!(matches!(pg_ssl_mode(SslMode::Require), PgSslMode::Require));
        assert!(matches!(pg_ssl_mode(SslMode::Disable), PgSslMode::Disable));
        assert!(matches!(
            pg_ssl_mode(SslMode::VerifyFull),
            PgSslMode::VerifyFull
        ));
    }

    #[tokio::test]
    async fn test_sink_options_follow_config() {
        let config = DatabaseConfig {
            host: "localhost".to_string(),
            port: Some(5432),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "traffic".to_string(),
            schema: "staging".to_string(),
            create_table: false,
            insert_chunk_rows: 10,
            ..DatabaseConfig::default()
        };

        let sink = PgSink::connect_lazy(&config).unwrap();
        assert_eq!(sink.options().schema, "staging");
        assert!(!sink.options().create_table);
        assert_eq!(sink.options().insert_chunk_rows, 10);
    }

    #[tokio::test]
    async fn test_invalid_schema_is_rejected() {
        let config = DatabaseConfig {
            schema: "bad schema".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(PgSink::connect_lazy(&config).is_err());
    }
}
