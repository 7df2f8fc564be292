//! logmend Watch - Directory watcher for managed log files

mod watcher;

pub use watcher::{concerns_target, DirectoryWatch, WatchEvent, WatchEventKind};
