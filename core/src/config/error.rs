use std::path::PathBuf;
use thiserror::Error;

/// Why the engine settings could not be produced.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer (file or `CCVIEW_*` environment) could not be read or merged.
    #[error("engine configuration could not be loaded: {0}")]
    Load(String),

    #[error("engine configuration file {0} does not exist")]
    NotFound(PathBuf),

    /// The built-in defaults did not serialize into the first layer.
    #[error("engine defaults could not be encoded: {0}")]
    Defaults(String),

    /// Every rejected setting, one message per field.
    #[error("engine configuration rejected: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Defaults(err.to_string())
    }
}
