//! Loader configuration
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. a TOML file (`fias-loader.toml` in the working directory, or the path
//!    given with `--config`)
//! 3. environment variables prefixed `FIAS__`, nested with `__`, e.g.
//!    `FIAS__DATABASE__HOST` or `FIAS__SCHEDULE__RELOAD_INTERVAL_SECS`
//!
//! `DATABASE_URL` is honoured when no database URL is configured otherwise.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;

use crate::error::{IngestError, Result};
use crate::loader::DEFAULT_SHADOW_THRESHOLD;
use crate::version::DEFAULT_ENDPOINT;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "fias-loader.toml";

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "FIAS";

/// Directory under `base_dir` that receives unpacked members.
pub const EXTRACT_DIR: &str = "FIAS";

/// Sleep after a cycle that found no new version (150 hours).
pub const DEFAULT_IDLE_INTERVAL_SECS: u64 = 150 * 60 * 60;

/// Sleep after a cycle that processed a release, fully or partially, or
/// failed before loading (24 hours).
pub const DEFAULT_RELOAD_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub database: DatabaseConfig,
    /// Working directory for the archive and its unpacked members
    pub base_dir: PathBuf,
    pub service: ServiceConfig,
    pub schedule: ScheduleConfig,
    pub load: LoadConfig,
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    /// Full connection URL; overrides the individual parts when set
    pub url: Option<String>,
    pub application_name: String,
    pub connect_timeout_secs: u64,
}

/// Remote service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// SOAP endpoint publishing the latest release
    pub endpoint: String,
    /// Timeout for the version check
    pub timeout_secs: u64,
    /// Timeout for the whole archive download
    pub download_timeout_secs: u64,
}

/// Sleep intervals between cycles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// After finding the published version already applied
    pub idle_interval_secs: u64,
    /// After processing a release or a failed cycle; never longer than idle
    pub reload_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Files larger than this load through a shadow table
    pub shadow_threshold_bytes: u64,
    /// Draw progress bars on the terminal
    pub show_progress: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            base_dir: PathBuf::from("."),
            service: ServiceConfig::default(),
            schedule: ScheduleConfig::default(),
            load: LoadConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            name: "fias".to_string(),
            url: None,
            application_name: "fias-loader".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 60,
            download_timeout_secs: 6 * 60 * 60,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            idle_interval_secs: DEFAULT_IDLE_INTERVAL_SECS,
            reload_interval_secs: DEFAULT_RELOAD_INTERVAL_SECS,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            shadow_threshold_bytes: DEFAULT_SHADOW_THRESHOLD,
            show_progress: true,
        }
    }
}

impl IngestConfig {
    /// Load from the optional file and the environment, then validate.
    ///
    /// An explicit `path` must exist; the default file may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE)
                .format(config::FileFormat::Toml)
                .required(false),
        };

        let mut loaded: Self = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if loaded.database.url.is_none() {
            loaded.database.url = std::env::var("DATABASE_URL").ok();
        }

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_none() {
            if self.database.host.trim().is_empty() {
                return Err(IngestError::Config("database.host is empty".to_string()));
            }
            if self.database.name.trim().is_empty() {
                return Err(IngestError::Config("database.name is empty".to_string()));
            }
            if self.database.port == 0 {
                return Err(IngestError::Config("database.port is 0".to_string()));
            }
        }
        if self.service.endpoint.trim().is_empty() {
            return Err(IngestError::Config("service.endpoint is empty".to_string()));
        }
        if self.schedule.idle_interval_secs == 0 || self.schedule.reload_interval_secs == 0 {
            return Err(IngestError::Config(
                "schedule intervals must be positive".to_string(),
            ));
        }
        if self.schedule.reload_interval_secs > self.schedule.idle_interval_secs {
            return Err(IngestError::Config(
                "schedule.reload_interval_secs exceeds schedule.idle_interval_secs".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory receiving unpacked archive members
    pub fn extract_dir(&self) -> PathBuf {
        self.base_dir.join(EXTRACT_DIR)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.idle_interval_secs)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.reload_interval_secs)
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        let options = match &self.url {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .map_err(|e| IngestError::Config(format!("invalid database url: {e}")))?,
            None => PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .username(&self.user)
                .password(&self.password)
                .database(&self.name),
        };

        Ok(options.application_name(&self.application_name))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
