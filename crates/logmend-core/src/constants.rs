//! Constants and default values for logmend

use std::path::PathBuf;

/// Default logmend home directory name
pub const LOGMEND_DIR: &str = ".logmend";

/// Default log directory name
pub const LOGS_DIR: &str = "logs";

/// Default config file names to search for (in priority order)
pub const CONFIG_FILES: &[&str] = &[
    "logmend.toml",
    "logmend.yaml",
    "logmend.yml",
    "logmend.json",
];

/// Default bound on consecutive recreate attempts
pub const DEFAULT_MAX_RECREATE_ATTEMPTS: u32 = 3;

/// Whether the containing directory is created by default
pub const DEFAULT_CREATE_DIRECTORY: bool = true;

/// Number of chunks a sink buffers before writers have to wait
pub const DEFAULT_SINK_CAPACITY: usize = 1024;

/// Capacity of each instance's event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Get the logmend home directory
pub fn logmend_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(LOGMEND_DIR))
        .unwrap_or_else(|| PathBuf::from(LOGMEND_DIR))
}

/// Get the logs directory
pub fn logs_dir() -> PathBuf {
    logmend_home().join(LOGS_DIR)
}

/// Get the default log file path for a stream name
pub fn log_path(name: &str) -> PathBuf {
    logs_dir().join(format!("{}.log", name))
}
