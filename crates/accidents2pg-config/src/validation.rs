// Configuration validation
//
// Validates that the sections a stage needs are present and sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

/// Postgres truncates identifiers longer than this.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Largest chunk whose four bind parameters per row fit in one statement.
pub const MAX_INSERT_CHUNK_ROWS: usize = u16::MAX as usize / 4;

pub fn validate_config(config: &RuntimeConfig, stage: Stage) -> Result<()> {
    validate_storage_config(&config.storage)?;

    match stage {
        Stage::Fetch => validate_fetch_config(&config.fetch)?,
        Stage::Load => validate_database_config(&config.database)?,
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!(
                    "Filesystem path is required\n\n\
                    How to fix:\n\
                      • Environment: export {}STORAGE_PATH=./data\n\
                      • TOML: [storage.fs]\n              path = \"./data\"",
                    ENV_PREFIX
                );
            }
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("s3 storage backend requires 's3' configuration"))?;

            if s3.bucket.is_empty() {
                bail!(
                    "S3 bucket name is required\n\n\
                    How to fix:\n\
                      • Environment: export BUCKET_NAME=my-bucket\n\
                      • TOML: [storage.s3]\n              bucket = \"my-bucket\""
                );
            }

            if s3.region.is_empty() {
                bail!(
                    "S3 region is required\n\n\
                    How to fix:\n\
                      • Environment: export AWS_REGION=sa-east-1\n\
                      • TOML: [storage.s3]\n              region = \"sa-east-1\""
                );
            }
        }
        StorageBackend::Memory => {
            warn!("memory storage backend selected; objects are lost when the process exits");
        }
    }

    Ok(())
}

fn validate_fetch_config(config: &FetchConfig) -> Result<()> {
    if config.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be greater than 0");
    }

    if config.max_bytes == 0 {
        bail!("fetch.max_bytes must be greater than 0");
    }

    Ok(())
}

fn validate_database_config(config: &DatabaseConfig) -> Result<()> {
    let required = [
        ("DB_HOST", "database.host", config.host.is_empty()),
        ("DB_USER", "database.user", config.user.is_empty()),
        ("DB_PASSWORD", "database.password", config.password.is_empty()),
        ("DB_PORT", "database.port", config.port.is_none()),
        ("DB_NAME", "database.name", config.name.is_empty()),
    ];
    for (env_name, toml_name, missing) in required {
        if missing {
            bail!(
                "Database setting {} is required\n\n\
                How to fix:\n\
                  • Environment: export {}=...\n\
                  • TOML: {} = ...",
                env_name,
                env_name,
                toml_name
            );
        }
    }

    validate_identifier("database.schema", &config.schema)?;
    validate_identifier("database.table", &config.table)?;

    if config.max_connections == 0 {
        bail!("database.max_connections must be greater than 0");
    }

    if config.insert_chunk_rows == 0 {
        bail!("database.insert_chunk_rows must be greater than 0");
    }

    // Postgres allows 65535 bind parameters per statement.
    if config.insert_chunk_rows > MAX_INSERT_CHUNK_ROWS {
        bail!(
            "database.insert_chunk_rows must be at most {} (got {})",
            MAX_INSERT_CHUNK_ROWS,
            config.insert_chunk_rows
        );
    }

    Ok(())
}

/// Plain unquoted SQL identifier: letter or underscore, then letters, digits
/// or underscores.
pub fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if !is_plain_identifier(value) {
        bail!("{} must be a plain SQL identifier, got {:?}", field, value);
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        bail!(
            "{} must be at most {} characters, got {}",
            field,
            MAX_IDENTIFIER_LEN,
            value.len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> DatabaseConfig {
        DatabaseConfig {
            host: "localhost".to_string(),
            port: Some(5432),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            name: "traffic".to_string(),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_validate_storage_config() {
        let s3_config = StorageConfig {
            backend: StorageBackend::S3,
            prefix: None,
            fs: None,
            s3: Some(S3Config {
                bucket: "accidents".to_string(),
                region: "sa-east-1".to_string(),
                endpoint: None,
            }),
        };
        assert!(validate_storage_config(&s3_config).is_ok());

        let missing_bucket = StorageConfig {
            s3: Some(S3Config {
                bucket: String::new(),
                region: "sa-east-1".to_string(),
                endpoint: None,
            }),
            ..s3_config.clone()
        };
        let err = validate_storage_config(&missing_bucket).unwrap_err();
        assert!(err.to_string().contains("BUCKET_NAME"));

        let no_section = StorageConfig {
            s3: None,
            ..s3_config
        };
        assert!(validate_storage_config(&no_section).is_err());
    }

    #[test]
    fn test_each_database_field_is_required() {
        assert!(validate_database_config(&database()).is_ok());

        let cases: [(&str, fn(&mut DatabaseConfig)); 5] = [
            ("DB_HOST", |db| db.host.clear()),
            ("DB_USER", |db| db.user.clear()),
            ("DB_PASSWORD", |db| db.password.clear()),
            ("DB_PORT", |db| db.port = None),
            ("DB_NAME", |db| db.name.clear()),
        ];
        for (name, clear) in cases {
            let mut db = database();
            clear(&mut db);
            let err = validate_database_config(&db).unwrap_err();
            assert!(err.to_string().contains(name), "expected {} in {}", name, err);
        }
    }

    #[test]
    fn test_identifiers() {
        assert!(validate_identifier("t", "traffic_accidents").is_ok());
        assert!(validate_identifier("t", "_staging2").is_ok());
        assert!(validate_identifier("t", "").is_err());
        assert!(validate_identifier("t", "2023_accidents").is_err());
        assert!(validate_identifier("t", "accidents; drop table x").is_err());
        assert!(validate_identifier("t", "public.accidents").is_err());
        assert!(validate_identifier("t", &"a".repeat(64)).is_err());
    }

    #[test]
    fn test_insert_chunk_rows_bounds() {
        let mut db = database();
        db.insert_chunk_rows = 0;
        assert!(validate_database_config(&db).is_err());

        db.insert_chunk_rows = 20_000;
        assert!(validate_database_config(&db).is_err());

        db.insert_chunk_rows = 16_383;
        assert!(validate_database_config(&db).is_ok());
    }

    #[test]
    fn test_huge_insert_chunk_rows_is_rejected_without_overflow() {
        let mut db = database();
        db.insert_chunk_rows = usize::MAX;

        let err = validate_database_config(&db).unwrap_err();
        assert!(err.to_string().contains("at most 16383"));
    }

    #[test]
    fn test_fetch_stage_does_not_need_database() {
        let config = RuntimeConfig::from_platform_defaults(Platform::Local);
        assert!(validate_config(&config, Stage::Fetch).is_ok());
        assert!(validate_config(&config, Stage::Load).is_err());
    }
}
