// Environment variable overrides
//
// Deployment variables (BUCKET_NAME, DB_*, AWS_REGION) are read unprefixed so
// existing function configurations keep working; tuning knobs use the
// ACCIDENTS2PG_ prefix.

use crate::*;
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "ACCIDENTS2PG_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the ACCIDENTS2PG_ prefix
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    apply_storage_overrides(config, env)?;
    apply_database_overrides(config, env)?;

    // Fetch
    if let Some(val) = get_env_u64(env, "FETCH_TIMEOUT_SECS")? {
        config.fetch.timeout_secs = val;
    }
    if let Some(val) = get_env_u64(env, "FETCH_MAX_BYTES")? {
        config.fetch.max_bytes = val;
    }

    // Loader
    if let Some(mode) = env.get("LOADER_BATCH_MODE") {
        config.loader.batch_mode = mode
            .parse::<BatchMode>()
            .context("Invalid ACCIDENTS2PG_LOADER_BATCH_MODE value")?;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn apply_storage_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    if let Some(backend) = env.get("STORAGE_BACKEND") {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid ACCIDENTS2PG_STORAGE_BACKEND value")?;
    }

    if let Some(path) = env.get("STORAGE_PATH") {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    if let Some(bucket) = env.get_raw("BUCKET_NAME") {
        ensure_s3(config).bucket = bucket;
    }
    if let Some(region) = env.get_raw("AWS_REGION") {
        ensure_s3(config).region = region;
    }
    // Explicit S3 region wins over the ambient AWS_REGION.
    if let Some(region) = env.get("S3_REGION") {
        ensure_s3(config).region = region;
    }
    if let Some(endpoint) = env.get("S3_ENDPOINT") {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(prefix) = env.get("S3_PREFIX") {
        config.storage.prefix = normalize_prefix(prefix);
    }

    Ok(())
}

fn apply_database_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    let db = &mut config.database;

    if let Some(host) = env.get_raw("DB_HOST") {
        db.host = host;
    }
    if let Some(user) = env.get_raw("DB_USER") {
        db.user = user;
    }
    if let Some(password) = env.get_raw("DB_PASSWORD") {
        db.password = password;
    }
    if let Some(name) = env.get_raw("DB_NAME") {
        db.name = name;
    }
    if let Some(port) = env.get_raw("DB_PORT") {
        let port = port.trim();
        db.port = if port.is_empty() {
            None
        } else {
            Some(
                port.parse::<u16>()
                    .map_err(|e| anyhow!("Failed to parse DB_PORT: {}", e))?,
            )
        };
    }

    if let Some(schema) = env.get("DB_SCHEMA") {
        db.schema = schema;
    }
    if let Some(table) = env.get("DB_TABLE") {
        db.table = table;
    }
    if let Some(mode) = env.get("DB_SSLMODE") {
        db.ssl_mode = mode
            .parse::<SslMode>()
            .context("Invalid ACCIDENTS2PG_DB_SSLMODE value")?;
    }
    if let Some(val) = get_env_u32(env, "DB_MAX_CONNECTIONS")? {
        db.max_connections = val;
    }
    if let Some(val) = get_env_u64(env, "DB_CONNECT_TIMEOUT_SECS")? {
        db.connect_timeout_secs = val;
    }
    if let Some(val) = get_env_bool(env, "DB_CREATE_TABLE")? {
        db.create_table = val;
    }
    if let Some(val) = get_env_usize(env, "DB_INSERT_CHUNK_ROWS")? {
        db.insert_chunk_rows = val;
    }

    Ok(())
}

fn ensure_s3(config: &mut RuntimeConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u32<E: EnvSource>(env: &E, key: &str) -> Result<Option<u32>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<u32>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match env.get(key) {
        Some(val) => {
            let parsed = val.parse::<bool>().map_err(|e| {
                anyhow!(
                    "Failed to parse {}{} (expected bool): {}",
                    ENV_PREFIX,
                    key,
                    e
                )
            })?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn normalize_prefix(prefix: String) -> Option<String> {
    let prefix = prefix.trim_start_matches('/');
    if prefix.is_empty() {
        None
    } else if prefix.ends_with('/') {
        Some(prefix.to_string())
    } else {
        Some(format!("{}/", prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MapEnvSource {
        vars: HashMap<String, String>,
    }

    impl MapEnvSource {
        fn with(mut self, key: &str, value: &str) -> Self {
            self.vars.insert(key.to_string(), value.to_string());
            self
        }
    }

    impl EnvSource for MapEnvSource {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }
    }

    #[test]
    fn test_deployment_variables_are_unprefixed() {
        let env = MapEnvSource::default()
            .with("BUCKET_NAME", "accidents-raw")
            .with("AWS_REGION", "sa-east-1")
            .with("DB_HOST", "db.internal")
            .with("DB_USER", "loader")
            .with("DB_PASSWORD", "secret")
            .with("DB_PORT", "5433")
            .with("DB_NAME", "traffic");

        let mut config = RuntimeConfig::from_platform_defaults(Platform::Lambda);
        apply_env_overrides(&mut config, &env).unwrap();

        let s3 = config.storage.s3.as_ref().unwrap();
        assert_eq!(s3.bucket, "accidents-raw");
        assert_eq!(s3.region, "sa-east-1");
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.user, "loader");
        assert_eq!(config.database.password, "secret");
        assert_eq!(config.database.port, Some(5433));
        assert_eq!(config.database.name, "traffic");
    }

    #[test]
    fn test_prefixed_tuning_variables() {
        let env = MapEnvSource::default()
            .with("ACCIDENTS2PG_STORAGE_BACKEND", "fs")
            .with("ACCIDENTS2PG_STORAGE_PATH", "/tmp/acc")
            .with("ACCIDENTS2PG_S3_PREFIX", "raw")
            .with("ACCIDENTS2PG_DB_SSLMODE", "disable")
            .with("ACCIDENTS2PG_DB_CREATE_TABLE", "false")
            .with("ACCIDENTS2PG_DB_INSERT_CHUNK_ROWS", "100")
            .with("ACCIDENTS2PG_FETCH_TIMEOUT_SECS", "5")
            .with("ACCIDENTS2PG_LOADER_BATCH_MODE", "all")
            .with("ACCIDENTS2PG_LOG_FORMAT", "JSON");

        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.fs.as_ref().unwrap().path, "/tmp/acc");
        assert_eq!(config.storage.prefix.as_deref(), Some("raw/"));
        assert_eq!(config.database.ssl_mode, SslMode::Disable);
        assert!(!config.database.create_table);
        assert_eq!(config.database.insert_chunk_rows, 100);
        assert_eq!(config.fetch.timeout_secs, 5);
        assert_eq!(config.loader.batch_mode, BatchMode::All);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_s3_region_beats_aws_region() {
        let env = MapEnvSource::default()
            .with("AWS_REGION", "us-east-1")
            .with("ACCIDENTS2PG_S3_REGION", "sa-east-1");

        let mut config = RuntimeConfig::from_platform_defaults(Platform::Lambda);
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.storage.s3.unwrap().region, "sa-east-1");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);

        let env = MapEnvSource::default().with("DB_PORT", "postgres");
        assert!(apply_env_overrides(&mut config, &env).is_err());

        let env = MapEnvSource::default().with("ACCIDENTS2PG_DB_CREATE_TABLE", "yes");
        assert!(apply_env_overrides(&mut config, &env).is_err());

        let env = MapEnvSource::default().with("ACCIDENTS2PG_FETCH_MAX_BYTES", "-1");
        assert!(apply_env_overrides(&mut config, &env).is_err());
    }

    #[test]
    fn test_empty_port_means_driver_default() {
        let env = MapEnvSource::default().with("DB_PORT", "");
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        config.database.port = Some(6543);
        apply_env_overrides(&mut config, &env).unwrap();
        assert_eq!(config.database.port, None);
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("".to_string()), None);
        assert_eq!(normalize_prefix("/".to_string()), None);
        assert_eq!(normalize_prefix("raw".to_string()).as_deref(), Some("raw/"));
        assert_eq!(
            normalize_prefix("/raw/2023/".to_string()).as_deref(),
            Some("raw/2023/")
        );
    }
}
