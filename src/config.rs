//! Tool configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::Level;

/// Default values, matching the configuration file earlier releases generated.
pub mod defaults {
    pub const LOG_LEVEL: &str = "Info";
    pub const DB_HOST: &str = "127.0.0.1";
    pub const DB_PORT: u16 = 3306;
    pub const DB_USER: &str = "evemu";
    pub const DB_PASS: &str = "evemu";
    pub const DB_DATABASE: &str = "evemu";
    pub const MIGRATIONS_DIR: &str = "migrations";
    pub const BASE_DIR: &str = "base";
    pub const DUNGEON_DIR: &str = "dungeons";
    pub const SEED_REGIONS: &str = "The Forge";
    pub const SEED_SATURATION: u8 = 80;

    pub const POOL_MAX_CONNECTIONS: u32 = 10;
    pub const POOL_MIN_CONNECTIONS: u32 = 0;
    pub const POOL_MAX_LIFETIME_SECS: u64 = 180;
}

/// Connection pool limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: defaults::POOL_MAX_CONNECTIONS,
            min_connections: defaults::POOL_MIN_CONNECTIONS,
            max_lifetime: Duration::from_secs(defaults::POOL_MAX_LIFETIME_SECS),
        }
    }
}

/// Tool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default log level, overridden by `RUST_LOG`
    pub log_level: Level,
    /// Database URL (MySQL connection string in production)
    pub database_url: String,
    /// Directory holding versioned `*.sql` migration files
    pub migrations_dir: PathBuf,
    /// Directory holding gzipped base dumps
    pub base_dir: PathBuf,
    /// Directory holding dungeon JSON files for `dungeon apply`
    pub dungeon_dir: PathBuf,
    /// Regions (names or numeric ids) to seed with market orders
    pub seed_regions: Vec<String>,
    /// Percentage of stations per region that receive seed orders
    pub seed_saturation: u8,
    /// Connection pool limits
    pub pool: PoolSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `EVEDB_LOG_LEVEL`: Trace, Debug, Info, Warn or Error (default: Info)
    /// - `EVEDB_DATABASE_URL`: full connection string; when unset the URL is
    ///   assembled from `EVEDB_DB_HOST`, `EVEDB_DB_PORT`, `EVEDB_DB_USER`,
    ///   `EVEDB_DB_PASS` and `EVEDB_DB_DATABASE`
    /// - `EVEDB_MIGRATIONS_DIR`: migration files (default: migrations)
    /// - `EVEDB_BASE_DIR`: gzipped base dumps (default: base)
    /// - `EVEDB_DUNGEON_DIR`: dungeon JSON files (default: dungeons)
    /// - `EVEDB_SEED_REGIONS`: comma separated region names or ids (default: The Forge)
    /// - `EVEDB_SEED_SATURATION`: 0-100 (default: 80)
    pub fn from_env() -> Result<Self, ConfigError> {
        let log_level_str =
            env::var("EVEDB_LOG_LEVEL").unwrap_or_else(|_| defaults::LOG_LEVEL.to_string());
        let log_level = parse_log_level(&log_level_str).ok_or(ConfigError::InvalidValue(
            "EVEDB_LOG_LEVEL must be one of Trace, Debug, Info, Warn, Error",
        ))?;

        let database_url = match env::var("EVEDB_DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let host =
                    env::var("EVEDB_DB_HOST").unwrap_or_else(|_| defaults::DB_HOST.to_string());
                let port = env::var("EVEDB_DB_PORT")
                    .unwrap_or_else(|_| defaults::DB_PORT.to_string())
                    .parse::<u16>()
                    .map_err(|_| {
                        ConfigError::InvalidValue("EVEDB_DB_PORT must be a valid port number")
                    })?;
                let user =
                    env::var("EVEDB_DB_USER").unwrap_or_else(|_| defaults::DB_USER.to_string());
                let pass =
                    env::var("EVEDB_DB_PASS").unwrap_or_else(|_| defaults::DB_PASS.to_string());
                let database = env::var("EVEDB_DB_DATABASE")
                    .unwrap_or_else(|_| defaults::DB_DATABASE.to_string());
                mysql_url(&user, &pass, &host, port, &database)
            }
        };

        let migrations_dir = env::var("EVEDB_MIGRATIONS_DIR")
            .unwrap_or_else(|_| defaults::MIGRATIONS_DIR.to_string())
            .into();
        let base_dir = env::var("EVEDB_BASE_DIR")
            .unwrap_or_else(|_| defaults::BASE_DIR.to_string())
            .into();
        let dungeon_dir = env::var("EVEDB_DUNGEON_DIR")
            .unwrap_or_else(|_| defaults::DUNGEON_DIR.to_string())
            .into();

        let seed_regions = parse_region_list(
            &env::var("EVEDB_SEED_REGIONS").unwrap_or_else(|_| defaults::SEED_REGIONS.to_string()),
        );

        let seed_saturation = env::var("EVEDB_SEED_SATURATION")
            .unwrap_or_else(|_| defaults::SEED_SATURATION.to_string())
            .parse::<u8>()
            .ok()
            .filter(|value| *value <= 100)
            .ok_or(ConfigError::InvalidValue(
                "EVEDB_SEED_SATURATION must be a number between 0 and 100",
            ))?;

        Ok(Config {
            log_level,
            database_url,
            migrations_dir,
            base_dir,
            dungeon_dir,
            seed_regions,
            seed_saturation,
            pool: PoolSettings::default(),
        })
    }

    /// Configuration pointing at an explicit database URL, everything else defaulted.
    pub fn with_database_url(database_url: impl Into<String>) -> Self {
        Config {
            log_level: Level::INFO,
            database_url: database_url.into(),
            migrations_dir: defaults::MIGRATIONS_DIR.into(),
            base_dir: defaults::BASE_DIR.into(),
            dungeon_dir: defaults::DUNGEON_DIR.into(),
            seed_regions: parse_region_list(defaults::SEED_REGIONS),
            seed_saturation: defaults::SEED_SATURATION,
            pool: PoolSettings::default(),
        }
    }
}

/// Build a MySQL URL. Credentials are used verbatim.
pub fn mysql_url(user: &str, pass: &str, host: &str, port: u16, database: &str) -> String {
    format!("mysql://{}:{}@{}:{}/{}", user, pass, host, port, database)
}

/// Parse the log level names the configuration file used.
pub fn parse_log_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

fn parse_region_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|region| !region.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),
}
