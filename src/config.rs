use std::{env, path::PathBuf};

use log::LevelFilter;

/// Registry file used when none is given on the command line
pub const FILE_VAR: &str = "STUDENT_REGISTRY_FILE";
/// Log level filter: off, error, warn, info, debug or trace
pub const LOG_VAR: &str = "STUDENT_REGISTRY_LOG";

const DEFAULT_FILE: &str = "students.txt";

/// Configuration error type
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid log level in {var}: {value:?}")]
    InvalidLogLevel { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub registry_file: PathBuf,
    pub log_level: LevelFilter,
}

impl Config {
    /// Reads the process environment after loading a `.env` file, if there is one
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let registry_file = lookup(FILE_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE));

        let log_level = match lookup(LOG_VAR) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidLogLevel {
                    var: LOG_VAR,
                    value: value.clone(),
                })?,
            None => LevelFilter::Info,
        };

        Ok(Config {
            registry_file,
            log_level,
        })
    }
}
