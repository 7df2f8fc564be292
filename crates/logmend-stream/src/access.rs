//! Line writer for access-log style consumers

use chrono::Utc;

use crate::stream::LogStream;

/// Appends lines to a managed stream.
///
/// The sink is looked up on every line, so a recreated sink is picked up
/// transparently; lines written while the stream has no sink are dropped.
#[derive(Debug, Clone)]
pub struct AccessLog {
    stream: LogStream,
    timestamps: bool,
}

impl AccessLog {
    pub fn new(stream: LogStream) -> Self {
        Self {
            stream,
            timestamps: true,
        }
    }

    /// Write lines exactly as given
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    /// Append one line. Returns whether it reached a sink.
    pub async fn log(&self, line: &str) -> bool {
        let formatted = if self.timestamps {
            let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S");
            format!("[{}] {}\n", timestamp, line)
        } else {
            format!("{}\n", line)
        };
        self.stream.write(formatted).await
    }

    pub fn stream(&self) -> &LogStream {
        &self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StreamRegistry;
    use logmend_core::StreamOptions;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_log_with_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let registry = StreamRegistry::new();
        let log = AccessLog::new(registry.create(&StreamOptions::new(&path)).unwrap());

        assert!(log.log("GET /index.html 200").await);
        registry.remove(Some(log.stream())).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("[20"));
        assert!(content.ends_with("] GET /index.html 200\n"));
    }

    #[tokio::test]
    async fn test_log_without_timestamp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let registry = StreamRegistry::new();
        let log = AccessLog::new(registry.create(&StreamOptions::new(&path)).unwrap())
            .without_timestamps();

        assert!(log.log("one").await);
        assert!(log.log("two").await);
        registry.remove(Some(log.stream())).await;

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn test_log_after_close_is_dropped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.log");
        let registry = StreamRegistry::new();
        let log = AccessLog::new(registry.create(&StreamOptions::new(&path)).unwrap());

        log.stream().close().await;
        assert!(!log.log("late").await);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        registry.reset().await;
    }
}
