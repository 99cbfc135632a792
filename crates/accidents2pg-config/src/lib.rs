// accidents2pg-config - Unified configuration for both pipeline stages
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from ACCIDENTS2PG_CONFIG env var
// 3. Config file contents from ACCIDENTS2PG_CONFIG_CONTENT env var
// 4. Default config file location (./accidents2pg.toml)
// 5. Platform-specific defaults (lowest priority)
//
// Built once at process start and passed by reference; nothing reads the
// environment mid-invocation.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod platform;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use platform::Platform;
pub use validation::{is_plain_identifier, MAX_IDENTIFIER_LEN, MAX_INSERT_CHUNK_ROWS};

/// Which deployable unit is loading the configuration. Decides which
/// sections are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Download a CSV and store it (needs storage).
    Fetch,
    /// Reshape a stored CSV and append it to Postgres (needs storage + database).
    Load,
}

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub storage: StorageConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Object storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Prepended to every object key, always ends with '/'.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

impl StorageConfig {
    /// Bucket or directory the objects live in, for log lines.
    pub fn location(&self) -> String {
        match self.backend {
            StorageBackend::Fs => self
                .fs
                .as_ref()
                .map(|fs| fs.path.clone())
                .unwrap_or_default(),
            StorageBackend::S3 => self
                .s3
                .as_ref()
                .map(|s3| format!("s3://{}", s3.bucket))
                .unwrap_or_default(),
            StorageBackend::Memory => "memory".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
    /// In-process store; dry runs and tests only.
    Memory,
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            _ => anyhow::bail!(
                "Unsupported storage backend: {}. Supported: fs, s3, memory",
                s
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Postgres connection and target table.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub ssl_mode: SslMode,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Issue `CREATE TABLE IF NOT EXISTS` before the first append.
    #[serde(default = "default_true")]
    pub create_table: bool,
    /// Rows per INSERT statement; keeps bind parameters under Postgres' limit.
    #[serde(default = "default_insert_chunk_rows")]
    pub insert_chunk_rows: usize,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_table() -> String {
    "traffic_accidents".to_string()
}

fn default_max_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

/// Rows per multi-row `INSERT` unless configured otherwise.
pub const DEFAULT_INSERT_CHUNK_ROWS: usize = 5_000;

fn default_insert_chunk_rows() -> usize {
    DEFAULT_INSERT_CHUNK_ROWS
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: None,
            user: String::new(),
            password: String::new(),
            name: String::new(),
            schema: default_schema(),
            table: default_table(),
            ssl_mode: SslMode::default(),
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            create_table: true,
            insert_chunk_rows: default_insert_chunk_rows(),
        }
    }
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// `schema.table`, both already validated as plain identifiers.
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("table", &self.table)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("create_table", &self.create_table)
            .field("insert_chunk_rows", &self.insert_chunk_rows)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    Prefer,
    #[default]
    Require,
    VerifyCa,
    VerifyFull,
}

impl std::str::FromStr for SslMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" => Ok(SslMode::Require),
            "verify-ca" => Ok(SslMode::VerifyCa),
            "verify-full" => Ok(SslMode::VerifyFull),
            _ => anyhow::bail!(
                "Unsupported ssl mode: {}. Supported: disable, prefer, require, verify-ca, verify-full",
                s
            ),
        }
    }
}

/// HTTP download settings for the fetch stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_bytes: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Storage-event handling for the load stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub batch_mode: BatchMode,
}

/// How many storage records of one event the loader processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Stop after the first storage record (remaining records are ignored).
    #[default]
    First,
    /// Process every storage record in order, stopping at the first failure.
    All,
}

impl std::str::FromStr for BatchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "first" => Ok(BatchMode::First),
            "all" => Ok(BatchMode::All),
            _ => anyhow::bail!("Unsupported loader batch mode: {}. Supported: first, all", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load(stage: Stage) -> Result<Self> {
        sources::load_config(Platform::detect(), stage)
    }

    /// Load configuration for a specific platform (useful for testing)
    pub fn load_for_platform(platform: Platform, stage: Stage) -> Result<Self> {
        sources::load_config(platform, stage)
    }

    /// Load from an explicit TOML file, then apply environment overrides.
    pub fn load_from_path(path: impl AsRef<Path>, stage: Stage) -> Result<Self> {
        sources::load_from_file_path(path, stage)
    }

    /// Build a configuration from platform defaults, optional inline TOML and
    /// a custom environment source.
    pub fn load_with_env<E: EnvSource>(
        platform: Platform,
        inline_config: Option<&str>,
        env: &E,
        stage: Stage,
    ) -> Result<Self> {
        sources::load_with_env(platform, inline_config, env, stage)
    }

    pub fn from_platform_defaults(platform: Platform) -> Self {
        platform::platform_defaults(platform)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.storage = other.storage;
        self.database = other.database;
        self.fetch = other.fetch;
        self.loader = other.loader;
        self.log = other.log;
    }

    /// Validate the sections `stage` needs
    pub fn validate(&self, stage: Stage) -> Result<()> {
        validation::validate_config(self, stage)
    }
}
