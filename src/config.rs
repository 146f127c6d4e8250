//! Configuration system for milvus-smoke.
//!
//! Provides layered configuration from multiple sources:
//!
//! 1. **Compiled defaults** - Reproduce the classic smoke test exactly
//! 2. **User config file** - `~/.config/milvus-smoke/config.toml` (or `--config`)
//! 3. **Environment variables** - `MILVUS_SMOKE_*` prefix
//! 4. **CLI arguments** - Highest priority, always wins
//!
//! # Example Configuration File
//!
//! ```toml
//! [connection]
//! host = "milvus.internal"
//! port = 19530
//! token = "root:Milvus"
//!
//! [collection]
//! name = "smoke_collection"
//! dimension = 128
//!
//! [index]
//! metric = "L2"
//! index_type = "IVF_FLAT"
//! nlist = 128
//!
//! [verify]
//! strict = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::client::ConnectOptions;
use crate::error::{Result, SmokeError};
use crate::model::{IndexType, MetricType};
use crate::runner::RunPlan;

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub collection: CollectionConfig,
    pub data: DataConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
    pub load: LoadConfig,
    pub verify: VerifyConfig,
    pub output: OutputConfig,
}

/// Where the service lives and how to authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Connection alias.
    pub alias: String,
    /// Environment variable: `MILVUS_SMOKE_HOST`
    pub host: String,
    /// Environment variable: `MILVUS_SMOKE_PORT`
    pub port: u16,
    /// Use HTTPS.
    pub secure: bool,
    /// Environment variable: `MILVUS_SMOKE_TOKEN`
    pub token: Option<String>,
    /// Environment variable: `MILVUS_SMOKE_DB`
    pub database: Option<String>,
    /// Per-request timeout in seconds, 0 disables it.
    /// Environment variable: `MILVUS_SMOKE_TIMEOUT_SECS`
    pub request_timeout_secs: u64,
    /// HTTP path that returns the server version. Unset reads it over gRPC.
    /// Environment variable: `MILVUS_SMOKE_VERSION_PATH`
    pub version_path: Option<String>,
}

/// The collection the run creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Environment variable: `MILVUS_SMOKE_COLLECTION`
    pub name: String,
    pub dimension: usize,
    pub description: String,
}

/// Sample data generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub count: usize,
    /// Environment variable: `MILVUS_SMOKE_SEED`
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub metric: MetricType,
    pub index_type: IndexType,
    pub nlist: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub limit: usize,
    pub nprobe: u32,
    /// Id of the sample whose vector is used as the query.
    pub query_id: i64,
    /// Allowed deviation of the top hit from the exact-match distance.
    pub distance_tolerance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Fail the run on insert-count and search-result mismatches.
    pub strict: bool,
    /// Drop the collection after a successful search.
    pub drop_after: bool,
}

/// Output formatting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format: text, json, json-pretty.
    /// Environment variable: `MILVUS_SMOKE_FORMAT`
    pub format: String,
    /// Enable colored output.
    pub colors: bool,
    /// Suppress progress output.
    /// Environment variable: `MILVUS_SMOKE_QUIET`
    pub quiet: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        let defaults = ConnectOptions::default();
        Self {
            alias: defaults.alias,
            host: defaults.host,
            port: defaults.port,
            secure: defaults.secure,
            token: None,
            database: None,
            request_timeout_secs: 0,
            version_path: None,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        let plan = RunPlan::default();
        Self {
            name: plan.collection,
            dimension: plan.dimension,
            description: plan.description,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            count: RunPlan::default().count,
            seed: None,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        let plan = RunPlan::default();
        Self {
            metric: plan.metric,
            index_type: plan.index_type,
            nlist: plan.nlist,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        let plan = RunPlan::default();
        Self {
            limit: plan.limit,
            nprobe: plan.nprobe,
            query_id: plan.query_id,
            distance_tolerance: plan.distance_tolerance,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            poll_interval_ms: 500,
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            strict: true,
            drop_after: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            colors: true,
            quiet: false,
        }
    }
}

/// Keys accepted by `config --get`.
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "connection.alias",
    "connection.host",
    "connection.port",
    "connection.secure",
    "connection.token",
    "connection.database",
    "connection.request_timeout_secs",
    "connection.version_path",
    "collection.name",
    "collection.dimension",
    "collection.description",
    "data.count",
    "data.seed",
    "index.metric",
    "index.index_type",
    "index.nlist",
    "search.limit",
    "search.nprobe",
    "search.query_id",
    "search.distance_tolerance",
    "load.timeout_secs",
    "load.poll_interval_ms",
    "verify.strict",
    "verify.drop_after",
    "output.format",
    "output.colors",
    "output.quiet",
];

impl Config {
    /// Load configuration from the config file and environment.
    ///
    /// `path` overrides the user config location. A missing file at the
    /// default location is not an error; a missing explicit file is.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an
    /// environment variable holds an invalid value.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::user_config_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides(|var| std::env::var(var).ok())?;

        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::ConfigError`] if the file cannot be read or is
    /// not valid TOML for this schema.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SmokeError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config = toml::from_str(&content).map_err(|e| SmokeError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Get the path to the user configuration file.
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("milvus-smoke").join("config.toml"))
    }

    /// Apply environment variable overrides, reading variables via `lookup`.
    fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MILVUS_SMOKE_HOST") {
            self.connection.host = host;
        }
        if let Some(port) = lookup("MILVUS_SMOKE_PORT") {
            self.connection.port = parse_env("MILVUS_SMOKE_PORT", &port)?;
        }
        if let Some(token) = lookup("MILVUS_SMOKE_TOKEN") {
            self.connection.token = Some(token);
        }
        if let Some(db) = lookup("MILVUS_SMOKE_DB") {
            self.connection.database = Some(db);
        }
        if let Some(timeout) = lookup("MILVUS_SMOKE_TIMEOUT_SECS") {
            self.connection.request_timeout_secs = parse_env("MILVUS_SMOKE_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(path) = lookup("MILVUS_SMOKE_VERSION_PATH") {
            self.connection.version_path = Some(path);
        }
        if let Some(name) = lookup("MILVUS_SMOKE_COLLECTION") {
            self.collection.name = name;
        }
        if let Some(seed) = lookup("MILVUS_SMOKE_SEED") {
            self.data.seed = Some(parse_env("MILVUS_SMOKE_SEED", &seed)?);
        }
        if let Some(format) = lookup("MILVUS_SMOKE_FORMAT") {
            self.output.format = format;
        }
        if lookup("MILVUS_SMOKE_NO_COLOR").is_some() || lookup("NO_COLOR").is_some() {
            self.output.colors = false;
        }
        if lookup("MILVUS_SMOKE_QUIET").is_some() {
            self.output.quiet = true;
        }
        Ok(())
    }

    /// Build the run plan this configuration describes.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::InvalidSetting`] if the plan fails validation.
    pub fn to_plan(&self) -> Result<RunPlan> {
        let connection = &self.connection;
        let plan = RunPlan {
            connect: ConnectOptions {
                alias: connection.alias.clone(),
                host: connection.host.clone(),
                port: connection.port,
                secure: connection.secure,
                token: connection.token.clone(),
                database: connection.database.clone(),
                request_timeout: (connection.request_timeout_secs > 0)
                    .then(|| Duration::from_secs(connection.request_timeout_secs)),
                version_path: connection.version_path.clone(),
            },
            collection: self.collection.name.clone(),
            description: self.collection.description.clone(),
            dimension: self.collection.dimension,
            count: self.data.count,
            seed: self.data.seed,
            metric: self.index.metric,
            index_type: self.index.index_type,
            nlist: self.index.nlist,
            nprobe: self.search.nprobe,
            limit: self.search.limit,
            query_id: self.search.query_id,
            distance_tolerance: self.search.distance_tolerance,
            load_timeout: Duration::from_secs(self.load.timeout_secs),
            load_poll_interval: Duration::from_millis(self.load.poll_interval_ms),
            strict: self.verify.strict,
            drop_after: self.verify.drop_after,
        };
        plan.validate()?;
        Ok(plan)
    }

    /// Look up one setting by dotted key, rendered as TOML.
    ///
    /// Returns `None` for unknown keys. Unset optional values render as an
    /// empty string.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        if !VALID_CONFIG_KEYS.contains(&key) {
            return None;
        }
        let (section, field) = key.split_once('.')?;
        let table = toml::Value::try_from(self).ok()?;
        let value = table.get(section).and_then(|s| s.get(field));
        Some(match value {
            Some(toml::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        })
    }

    /// Write this configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| SmokeError::ConfigError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, content)?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Generate a default configuration file content.
    #[must_use]
    pub fn default_config_content() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| SmokeError::EnvVarError {
        var: var.to_string(),
        reason: format!("'{value}': {e}"),
    })
}
