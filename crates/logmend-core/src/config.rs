//! Stream options and configuration file parsing
//!
//! Supports multiple configuration file formats:
//! - TOML (.toml)
//! - YAML (.yaml, .yml)
//! - JSON (.json)

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// Options for one managed log stream
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamOptions {
    /// Target file; also the registry key once made absolute
    #[serde(alias = "logFilePath")]
    pub log_file_path: PathBuf,
    /// Create the containing directory (and parents) if missing
    #[serde(default = "default_create_directory", alias = "createDirectory")]
    pub create_directory: bool,
    /// Consecutive recreate attempts allowed before giving up
    #[serde(default = "default_max_recreate_attempts", alias = "maxRecreateAttempts")]
    pub max_recreate_attempts: u32,
}

fn default_create_directory() -> bool {
    DEFAULT_CREATE_DIRECTORY
}

fn default_max_recreate_attempts() -> u32 {
    DEFAULT_MAX_RECREATE_ATTEMPTS
}

impl StreamOptions {
    pub fn new(log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: log_file_path.into(),
            create_directory: DEFAULT_CREATE_DIRECTORY,
            max_recreate_attempts: DEFAULT_MAX_RECREATE_ATTEMPTS,
        }
    }

    pub fn create_directory(mut self, create: bool) -> Self {
        self.create_directory = create;
        self
    }

    pub fn max_recreate_attempts(mut self, attempts: u32) -> Self {
        self.max_recreate_attempts = attempts;
        self
    }

    /// Absolute form of the target path, resolved against the working directory
    pub fn absolute_path(&self) -> Result<PathBuf> {
        if self.log_file_path.is_absolute() {
            Ok(self.log_file_path.clone())
        } else {
            Ok(std::env::current_dir()?.join(&self.log_file_path))
        }
    }
}

/// Configuration file structure (logmend.toml/yaml/json)
#[derive(Debug, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub streams: Vec<StreamOptions>,
}

impl ConfigFile {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::config(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let config: ConfigFile = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }

    /// Find and load a config file from a directory
    pub fn find_and_load(dir: &Path) -> Result<(Self, PathBuf)> {
        for name in CONFIG_FILES {
            let path = dir.join(name);
            if path.exists() {
                let config = Self::load(&path)?;
                return Ok((config, path));
            }
        }
        Err(Error::config(format!(
            "No config file found in {}. Expected one of: {:?}",
            dir.display(),
            CONFIG_FILES
        )))
    }

    /// Resolve relative log paths against `base_dir` (usually the config file's directory)
    pub fn into_options(self, base_dir: &Path) -> Vec<StreamOptions> {
        self.streams
            .into_iter()
            .map(|mut opts| {
                if opts.log_file_path.is_relative() {
                    opts.log_file_path = base_dir.join(&opts.log_file_path);
                }
                opts
            })
            .collect()
    }
}
