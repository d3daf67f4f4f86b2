//! Store configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::path::PathBuf;
use std::time::Duration;

/// Top-level persistence configuration.
///
/// Loaded once at startup via [`StoreConfig::from_env`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory for file snapshots.
    pub snapshot_dir: PathBuf,

    /// Whether the relational backend is used instead of files.
    pub mysql_enabled: bool,

    /// MySQL server host.
    pub mysql_host: String,

    /// MySQL server port.
    pub mysql_port: u16,

    /// Schema holding the `inventory` and `backpack` tables.
    pub mysql_database: String,

    /// MySQL user name.
    pub mysql_user: String,

    /// MySQL password.
    pub mysql_password: String,

    /// Seconds allowed for opening or probing a connection.
    pub connect_timeout_secs: u64,

    /// Seconds allowed for a single statement.
    pub statement_timeout_secs: u64,

    /// Capacity of the store event broadcast channel.
    pub event_capacity: usize,
}

impl StoreConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `MYSQL_PORT` is set but is not a valid port.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let mysql_port: u16 = std::env::var("MYSQL_PORT")
            .unwrap_or_else(|_| "3306".to_string())
            .parse()?;

        Ok(Self {
            snapshot_dir: PathBuf::from(env_or("SNAPSHOT_DIR", "data")),
            mysql_enabled: parse_env_bool("MYSQL_ENABLED", false),
            mysql_host: env_or("MYSQL_HOST", "127.0.0.1"),
            mysql_port,
            mysql_database: env_or("MYSQL_DATABASE", "rpg_inventory"),
            mysql_user: env_or("MYSQL_USER", "root"),
            mysql_password: env_or("MYSQL_PASSWORD", ""),
            connect_timeout_secs: parse_env("MYSQL_CONNECT_TIMEOUT_SECS", 5),
            statement_timeout_secs: parse_env("MYSQL_STATEMENT_TIMEOUT_SECS", 10),
            event_capacity: parse_env("STORE_EVENT_CAPACITY", 64),
        })
    }

    /// Connect/probe budget as a [`Duration`].
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Per-statement budget as a [`Duration`].
    #[must_use]
    pub const fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("data"),
            mysql_enabled: false,
            mysql_host: "127.0.0.1".to_string(),
            mysql_port: 3306,
            mysql_database: "rpg_inventory".to_string(),
            mysql_user: "root".to_string(),
            mysql_password: String::new(),
            connect_timeout_secs: 5,
            statement_timeout_secs: 10,
            event_capacity: 64,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_values_ignore_case() {
        for value in ["true", "TRUE", "True", "tRuE", "1", " true "] {
            assert_eq!(parse_bool(value), Some(true), "{value}");
        }
        for value in ["false", "FALSE", "False", "0"] {
            assert_eq!(parse_bool(value), Some(false), "{value}");
        }
        assert_eq!(parse_bool("yes"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = StoreConfig::default();
        assert_eq!(config.mysql_port, 3306);
        assert_eq!(config.mysql_host, "127.0.0.1");
        assert!(!config.mysql_enabled);
        assert_eq!(config.statement_timeout(), Duration::from_secs(10));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parse_env_falls_back_on_missing_key() {
        let value: u64 = parse_env("RPG_STORE_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(value, 42);
        assert!(parse_env_bool("RPG_STORE_TEST_SURELY_UNSET_KEY", true));
    }
}
