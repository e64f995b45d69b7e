//! Service configuration loaded from TOML.
//!
//! ```toml
//! name = "cellar"
//! addr = "0.0.0.0:8080"
//! errors = "terse"
//!
//! [tls]
//! cert = "cert.pem"
//! key = "key.pem"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error_handler::{ErrorHandler, default_error_handler, terse_error_handler};

/// Errors raised while loading a [`Config`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Application name, used as the `app` span field.
    pub name: String,
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default)]
    pub errors: ErrorMode,
    /// Serve HTTPS when present.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// Which built-in error handler a service starts with.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Internal error messages are written to the response body.
    #[default]
    Verbose,
    /// Internal errors get an empty body.
    Terse,
}

impl ErrorMode {
    pub fn handler(self) -> ErrorHandler {
        match self {
            Self::Verbose => default_error_handler(),
            Self::Terse => terse_error_handler(),
        }
    }
}

/// PEM certificate chain and private key.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TlsConfig {
    pub cert: PathBuf,
    pub key: PathBuf,
}

fn default_addr() -> String {
    "0.0.0.0:8080".to_owned()
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        Self::from_toml_str(&raw)
    }
}
