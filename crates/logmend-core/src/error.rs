//! Error types for logmend

use std::io;
use std::path::PathBuf;

/// logmend error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Directory not writable: {0}")]
    DirectoryNotWritable(PathBuf),

    #[error("Invalid log file path: {0}")]
    InvalidPath(PathBuf),

    #[error("Sink closed: {0}")]
    SinkClosed(PathBuf),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for logmend
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::ConfigError(msg.into())
    }

    pub fn watch<S: Into<String>>(msg: S) -> Self {
        Error::WatchError(msg.into())
    }
}

/// How a sink write failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFailure {
    /// The target vanished or the pipe broke; the stream can be recreated
    Transient,
    /// Anything else; reported to observers and left alone
    Other,
}

impl SinkFailure {
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => SinkFailure::Transient,
            _ => SinkFailure::Other,
        }
    }

    pub fn is_transient(self) -> bool {
        self == SinkFailure::Transient
    }
}
