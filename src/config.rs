//! Process configuration.
//!
//! Loaded once at startup from environment variables (with an optional
//! `.env` file) layered over defaults, then read-only.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `HOST` | `0.0.0.0` | listen address |
//! | `PORT` | `3000` | listen port |
//! | `SHUTDOWN_TIMEOUT_SECS` | `30` | grace period for draining connections |
//! | `MAX_BODY_BYTES` | `1048576` | largest request body read into memory |
//! | `METRICS_ADDR` | unset | Prometheus exporter address; disabled when unset |
//! | `LOG_LEVEL` | `info` | default filter when `RUST_LOG` is unset |
//! | `LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `ENVIRONMENT` | `development` | free-form deployment name |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Output format for log lines.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Json }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    /// How long in-flight requests get to finish after a shutdown signal.
    pub shutdown_timeout: Duration,
    /// Request bodies above this many bytes are not read.
    pub max_body_bytes: usize,
    pub metrics_addr: Option<SocketAddr>,
    pub log: LogConfig,
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            metrics_addr: None,
            log: LogConfig::default(),
            environment: "development".to_owned(),
        }
    }
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env is the normal case in production.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to
    /// defaults for anything the lookup does not return.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = parse_or(&lookup, "HOST", defaults.host)?;
        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let timeout_secs = parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", DEFAULT_SHUTDOWN_TIMEOUT_SECS)?;
        let max_body_bytes = parse_or(&lookup, "MAX_BODY_BYTES", defaults.max_body_bytes)?;
        let metrics_addr = match lookup("METRICS_ADDR").filter(|v| !v.trim().is_empty()) {
            Some(raw) => Some(parse("METRICS_ADDR", raw)?),
            None => None,
        };
        let format = parse_or(&lookup, "LOG_FORMAT", defaults.log.format)?;

        Ok(Self {
            host,
            port,
            shutdown_timeout: Duration::from_secs(timeout_secs),
            max_body_bytes,
            metrics_addr,
            log: LogConfig {
                level: lookup("LOG_LEVEL").unwrap_or(defaults.log.level),
                format,
            },
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => parse(key, raw),
        None => Ok(default),
    }
}

fn parse<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = raw.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid { key, reason: e.to_string(), value: raw })
}
