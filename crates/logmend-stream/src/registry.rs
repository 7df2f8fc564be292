//! Process-wide registry: one managed stream per log file

use logmend_core::{Result, StreamOptions};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::stream::LogStream;

static GLOBAL: Lazy<StreamRegistry> = Lazy::new(StreamRegistry::new);

/// Maps absolute log file paths to their managed streams
#[derive(Default)]
pub struct StreamRegistry {
    streams: Mutex<HashMap<PathBuf, LogStream>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the whole process
    pub fn global() -> &'static StreamRegistry {
        &GLOBAL
    }

    /// Get the stream for `options.log_file_path`, opening it on first use.
    ///
    /// Options only matter for the call that opens the stream.
    pub fn create(&self, options: &StreamOptions) -> Result<LogStream> {
        let path = options.absolute_path()?;

        let mut streams = self.streams.lock();
        if let Some(existing) = streams.get(&path) {
            debug!("Reusing log stream: {}", path.display());
            return Ok(existing.clone());
        }

        let stream = LogStream::open(path.clone(), options)?;
        streams.insert(path, stream.clone());
        Ok(stream)
    }

    pub fn get(&self, path: &Path) -> Option<LogStream> {
        self.streams.lock().get(path).cloned()
    }

    /// Unregister `stream` and close it. Unknown streams and `None` are ignored.
    pub async fn remove(&self, stream: Option<&LogStream>) {
        let Some(stream) = stream else {
            return;
        };

        let removed = {
            let mut streams = self.streams.lock();
            match streams.get(stream.path()) {
                Some(registered) if registered == stream => streams.remove(stream.path()),
                _ => None,
            }
        };

        if let Some(stream) = removed {
            info!("Removing log stream: {}", stream.path().display());
            stream.close().await;
        }
    }

    /// Destroy every registered stream and clear the registry
    pub async fn reset(&self) {
        let streams: Vec<LogStream> = self.streams.lock().drain().map(|(_, s)| s).collect();
        if !streams.is_empty() {
            info!("Resetting {} log stream(s)", streams.len());
        }
        for stream in &streams {
            stream.destroy();
        }
        // let aborted writers observe cancellation before returning
        tokio::task::yield_now().await;
    }

    pub fn len(&self) -> usize {
        self.streams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.lock().is_empty()
    }

    /// Registered paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.streams.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

/// [`StreamRegistry::create`] on the global registry
pub fn create(options: &StreamOptions) -> Result<LogStream> {
    StreamRegistry::global().create(options)
}

/// [`StreamRegistry::remove`] on the global registry
pub async fn remove(stream: Option<&LogStream>) {
    StreamRegistry::global().remove(stream).await
}

/// [`StreamRegistry::reset`] on the global registry
pub async fn reset() {
    StreamRegistry::global().reset().await
}
