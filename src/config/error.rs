//! Failures while loading, checking and saving the configuration file.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config file {} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot encode configuration as TOML: {0}")]
    Encode(#[from] toml::ser::Error),

    #[error("cannot write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A setting such as `serial.default_bitrate` holds an unusable value.
    #[error("{key} {problem}")]
    OutOfRange {
        key: &'static str,
        problem: &'static str,
    },

    /// A `SERIAL_HANDLE_API_*` override could not be parsed.
    #[error("{var}={value:?} is not a valid {expected}")]
    BadOverride {
        var: String,
        value: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub fn must_be_positive(key: &'static str) -> Self {
        Self::OutOfRange {
            key,
            problem: "must be greater than zero",
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
