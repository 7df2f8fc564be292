//! Directory watcher using notify

use logmend_core::{Error, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Watch event that may concern the target file
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub paths: Vec<PathBuf>,
    pub kind: WatchEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Create,
    Modify,
    Remove,
    Other,
}

impl From<notify::EventKind> for WatchEventKind {
    fn from(kind: notify::EventKind) -> Self {
        match kind {
            notify::EventKind::Create(_) => WatchEventKind::Create,
            notify::EventKind::Modify(_) => WatchEventKind::Modify,
            notify::EventKind::Remove(_) => WatchEventKind::Remove,
            _ => WatchEventKind::Other,
        }
    }
}

/// Whether a raw notify event may concern `target_name` inside `dir`.
///
/// Events without paths are treated as a match, as are events on the
/// watched directory itself.
/// Content changes such as truncation match too; callers decide whether
/// the file was actually replaced.
pub fn concerns_target(event: &Event, dir: &Path, target_name: &OsString) -> bool {
    if event.paths.is_empty() {
        return true;
    }

    event.paths.iter().any(|p| {
        p == dir || p.file_name().map(|n| n == target_name.as_os_str()).unwrap_or(false)
    })
}

/// Non-recursive watch on the directory containing one log file.
///
/// The callback runs on notify's thread and only sees events that
/// [`concerns_target`] accepts.
pub struct DirectoryWatch {
    watcher: Option<RecommendedWatcher>,
    dir: PathBuf,
    target_name: OsString,
}

impl DirectoryWatch {
    /// Start watching the parent directory of `target`
    pub fn start<F>(target: &Path, on_change: F) -> Result<Self>
    where
        F: Fn(WatchEvent) + Send + 'static,
    {
        let target_name = target
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| Error::InvalidPath(target.to_path_buf()))?;
        let parent = target
            .parent()
            .ok_or_else(|| Error::InvalidPath(target.to_path_buf()))?;
        let dir = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());

        let filter_dir = dir.clone();
        let filter_name = target_name.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if concerns_target(&event, &filter_dir, &filter_name) {
                    debug!("Watch event: {:?} on {:?}", event.kind, event.paths);
                    on_change(WatchEvent {
                        kind: event.kind.into(),
                        paths: event.paths,
                    });
                }
            }
            Err(e) => {
                warn!("Watch error: {}", e);
            }
        })
        .map_err(|e| Error::watch(format!("Failed to create watcher: {}", e)))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch(format!("Failed to watch {}: {}", dir.display(), e)))?;

        info!("Watching directory: {}", dir.display());
        Ok(Self {
            watcher: Some(watcher),
            dir,
            target_name,
        })
    }

    /// Stop watching. Calling this again is a no-op.
    pub fn stop(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            // the directory may already be gone, which removes the watch anyway
            if let Err(e) = watcher.unwatch(&self.dir) {
                debug!("Unwatch {} failed: {}", self.dir.display(), e);
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Get the watched directory
    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// Get the base name of the file this watch reports on
    pub fn target_name(&self) -> &OsString {
        &self.target_name
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use notify::EventKind;
    use std::fs;
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn name(s: &str) -> OsString {
        OsString::from(s)
    }

    #[test]
    fn test_concerns_target_matching_name() {
        let dir = Path::new("/var/log/app");
        let event = Event::new(EventKind::Remove(RemoveKind::File)).add_path(dir.join("access.log"));
        assert!(concerns_target(&event, dir, &name("access.log")));
    }

    #[test]
    fn test_concerns_target_other_file() {
        let dir = Path::new("/var/log/app");
        let event = Event::new(EventKind::Create(CreateKind::File)).add_path(dir.join("error.log"));
        assert!(!concerns_target(&event, dir, &name("access.log")));
    }

    #[test]
    fn test_concerns_target_without_paths() {
        let event = Event::new(EventKind::Modify(ModifyKind::Any));
        assert!(concerns_target(&event, Path::new("/var/log/app"), &name("access.log")));
    }

    #[test]
    fn test_concerns_target_directory_itself() {
        let dir = Path::new("/var/log/app");
        let event = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(dir.to_path_buf());
        assert!(concerns_target(&event, dir, &name("access.log")));
    }

    #[test]
    fn test_start_requires_file_name() {
        let result = DirectoryWatch::start(Path::new("/"), |_| {});
        assert!(matches!(result, Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_start_missing_directory() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing").join("access.log");
        assert!(DirectoryWatch::start(&target, |_| {}).is_err());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("access.log");
        let mut watch = DirectoryWatch::start(&target, |_| {}).unwrap();
        assert!(watch.is_active());
        assert_eq!(watch.target_name(), &name("access.log"));

        watch.stop();
        watch.stop();
        assert!(!watch.is_active());
    }

    #[test]
    fn test_event_kind_mapping() {
        assert_eq!(
            WatchEventKind::from(EventKind::Create(CreateKind::File)),
            WatchEventKind::Create
        );
        assert_eq!(
            WatchEventKind::from(EventKind::Modify(ModifyKind::Any)),
            WatchEventKind::Modify
        );
        assert_eq!(
            WatchEventKind::from(EventKind::Remove(RemoveKind::File)),
            WatchEventKind::Remove
        );
        assert_eq!(WatchEventKind::from(EventKind::Any), WatchEventKind::Other);
    }

    #[test]
    fn test_reports_removal_of_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("access.log");
        fs::write(&target, "hello\n").unwrap();

        let (tx, rx) = mpsc::channel();
        let watch = DirectoryWatch::start(&target, move |event| {
            let _ = tx.send(event);
        })
        .unwrap();

        fs::write(dir.path().join("unrelated.log"), "noise\n").unwrap();
        fs::remove_file(&target).unwrap();

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let target_name = name("access.log");
        assert!(event
            .paths
            .iter()
            .all(|p| p.file_name() == Some(target_name.as_os_str()) || p.as_path() == watch.directory()));
    }
}
