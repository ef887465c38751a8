use std::path::PathBuf;

use thiserror::Error;

use crate::limits::{DEFAULT_SHORT_CODE_LEN, MAX_SHORT_CODE_LEN, MIN_SHORT_CODE_LEN};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: cannot parse '{value}'")]
    Invalid { var: &'static str, value: String },
    #[error("SALONBOOK_SHORT_CODE_LEN must be {MIN_SHORT_CODE_LEN}..={MAX_SHORT_CODE_LEN}, got {0}")]
    ShortCodeLen(usize),
}

/// Server settings, read once from `SALONBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends between background compactions.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<PathBuf>,
    pub tls_key: Option<PathBuf>,
    pub short_code_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5433,
            data_dir: PathBuf::from("./data"),
            password: "salonbook".into(),
            max_connections: 256,
            compact_threshold: 1000,
            metrics_port: None,
            tls_cert: None,
            tls_key: None,
            short_code_len: DEFAULT_SHORT_CODE_LEN,
        }
    }
}

fn parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any key lookup; unset keys take the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let d = Self::default();
        let metrics_port = match lookup("SALONBOOK_METRICS_PORT") {
            None => None,
            Some(value) => Some(value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "SALONBOOK_METRICS_PORT",
                value,
            })?),
        };
        let config = Self {
            bind: lookup("SALONBOOK_BIND").unwrap_or(d.bind),
            port: parsed(&lookup, "SALONBOOK_PORT", d.port)?,
            data_dir: lookup("SALONBOOK_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            password: lookup("SALONBOOK_PASSWORD").unwrap_or(d.password),
            max_connections: parsed(&lookup, "SALONBOOK_MAX_CONNECTIONS", d.max_connections)?,
            compact_threshold: parsed(&lookup, "SALONBOOK_COMPACT_THRESHOLD", d.compact_threshold)?,
            metrics_port,
            tls_cert: lookup("SALONBOOK_TLS_CERT").map(PathBuf::from),
            tls_key: lookup("SALONBOOK_TLS_KEY").map(PathBuf::from),
            short_code_len: parsed(&lookup, "SALONBOOK_SHORT_CODE_LEN", d.short_code_len)?,
        };
        if !(MIN_SHORT_CODE_LEN..=MAX_SHORT_CODE_LEN).contains(&config.short_code_len) {
            return Err(ConfigError::ShortCodeLen(config.short_code_len));
        }
        Ok(config)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("salonbook.wal")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
