//! Managed log stream: one sink, one directory watch, bounded recreation

use futures::future::join_all;
use logmend_core::{constants, Result, SinkFailure, StreamOptions};
use logmend_watch::DirectoryWatch;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace, warn};

use crate::event::StreamEvent;
use crate::factory::{self, FileIdentity, OpenedFile};
use crate::sink::{Completion, Sink, SinkWriter};

/// Lifecycle phase of a managed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sink open, watch active
    Live,
    /// Last recreate attempt failed; a retry is queued
    Recreating,
    /// Recreate budget spent
    Exhausted,
    /// Closed gracefully
    Closed,
    /// Torn down without flushing
    Destroyed,
}

impl Phase {
    /// No further recreation happens in these phases
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Exhausted | Phase::Closed | Phase::Destroyed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    SinkFailed { generation: u64 },
    DirectoryChanged,
    Retry,
}

struct State {
    phase: Phase,
    recreate_attempts: u32,
    sink: Option<SinkWriter>,
    identity: Option<FileIdentity>,
    watch: Option<DirectoryWatch>,
    next_generation: u64,
}

impl State {
    fn stop_watch(&mut self) {
        if let Some(mut watch) = self.watch.take() {
            watch.stop();
        }
    }
}

struct Inner {
    path: PathBuf,
    create_directory: bool,
    max_recreate_attempts: u32,
    state: Mutex<State>,
    pending: Arc<Mutex<HashMap<u64, Completion>>>,
    next_pending: AtomicU64,
    events: broadcast::Sender<StreamEvent>,
    triggers: mpsc::UnboundedSender<Trigger>,
}

/// Handle to the managed stream for one log file.
///
/// Clones share the same instance; equality is identity.
#[derive(Clone)]
pub struct LogStream {
    inner: Arc<Inner>,
}

impl LogStream {
    /// Open the file, install the directory watch and start the trigger driver.
    /// Must be called from within a tokio runtime.
    pub(crate) fn open(path: PathBuf, options: &StreamOptions) -> Result<Self> {
        let opened = factory::open_append(&path, options.create_directory)?;

        let (triggers, trigger_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(constants::EVENT_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            path,
            create_directory: options.create_directory,
            max_recreate_attempts: options.max_recreate_attempts,
            state: Mutex::new(State {
                phase: Phase::Live,
                recreate_attempts: 0,
                sink: None,
                identity: None,
                watch: None,
                next_generation: 0,
            }),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_pending: AtomicU64::new(0),
            events,
            triggers,
        });

        {
            let mut state = inner.state.lock();
            inner.install(&mut state, opened)?;
        }

        tokio::spawn(drive(Arc::downgrade(&inner), trigger_rx));

        info!("Opened log stream: {}", inner.path.display());
        Ok(Self { inner })
    }

    /// Absolute path of the target file
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn create_directory(&self) -> bool {
        self.inner.create_directory
    }

    pub fn max_recreate_attempts(&self) -> u32 {
        self.inner.max_recreate_attempts
    }

    /// Consecutive recreate attempts since the last success
    pub fn recreate_attempts(&self) -> u32 {
        self.inner.state.lock().recreate_attempts
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.lock().phase
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self.phase(), Phase::Exhausted | Phase::Destroyed)
    }

    /// Current sink, if the stream has one
    pub fn writable_sink(&self) -> Option<Sink> {
        self.inner.state.lock().sink.as_ref().map(SinkWriter::handle)
    }

    /// Subscribe to recreate/exhaustion/error events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.inner.events.subscribe()
    }

    /// Number of sink completions not yet settled
    pub fn pending_count(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Write through the current sink.
    ///
    /// Returns `false` when the chunk was dropped because there is no usable
    /// sink; that is never an error for the caller.
    pub async fn write(&self, chunk: impl Into<Vec<u8>>) -> bool {
        let Some(sink) = self.writable_sink() else {
            return false;
        };
        match sink.write(chunk).await {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping log write: {}", e);
                false
            }
        }
    }

    /// Stop watching, finish the sink and wait for every pending completion
    pub async fn close(&self) {
        {
            let mut state = self.inner.state.lock();
            state.stop_watch();
            if let Some(sink) = state.sink.take() {
                self.inner.track(sink.finish());
            }
            state.identity = None;
            if !state.phase.is_terminal() {
                state.phase = Phase::Closed;
            }
        }

        let (ids, pending): (Vec<u64>, Vec<Completion>) = self
            .inner
            .pending
            .lock()
            .iter()
            .map(|(id, done)| (*id, done.clone()))
            .unzip();
        debug!(
            "Draining {} pending completion(s) for {}",
            pending.len(),
            self.inner.path.display()
        );
        join_all(pending).await;

        let mut pending = self.inner.pending.lock();
        for id in &ids {
            pending.remove(id);
        }
    }

    /// Stop watching and abort the sink without flushing. The stream stays exhausted.
    pub fn destroy(&self) {
        let mut state = self.inner.state.lock();
        state.stop_watch();
        if let Some(sink) = state.sink.take() {
            sink.abort();
        }
        state.identity = None;
        state.recreate_attempts = self.inner.max_recreate_attempts;
        state.phase = Phase::Destroyed;
        debug!("Destroyed log stream: {}", self.inner.path.display());
    }
}

impl PartialEq for LogStream {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for LogStream {}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("path", &self.inner.path)
            .field("max_recreate_attempts", &self.inner.max_recreate_attempts)
            .finish_non_exhaustive()
    }
}

impl Inner {
    /// Spawn a sink writer for `opened` and watch its directory.
    ///
    /// The file is checked again once the watch is up, so a removal between
    /// open and watch still queues a disruption check.
    fn install(&self, state: &mut State, opened: OpenedFile) -> Result<()> {
        let triggers = self.triggers.clone();
        let watch = DirectoryWatch::start(&self.path, move |event| {
            trace!("{:?} event near log file {:?}", event.kind, event.paths);
            let _ = triggers.send(Trigger::DirectoryChanged);
        })?;

        if factory::is_disrupted(&self.path, opened.identity) {
            debug!("{} changed before its watch was ready", self.path.display());
            let _ = self.triggers.send(Trigger::DirectoryChanged);
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let writer = SinkWriter::spawn(
            self.path.clone(),
            generation,
            opened.file,
            constants::DEFAULT_SINK_CAPACITY,
            self.failure_hook(generation),
        );

        state.sink = Some(writer);
        state.identity = Some(opened.identity);
        state.watch = Some(watch);
        Ok(())
    }

    fn failure_hook(&self, generation: u64) -> impl FnOnce(io::Error) + Send + 'static {
        let triggers = self.triggers.clone();
        let events = self.events.clone();
        let path = self.path.clone();

        move |err: io::Error| match SinkFailure::classify(&err) {
            SinkFailure::Transient => {
                debug!("Log sink {} lost its target: {}", path.display(), err);
                let _ = triggers.send(Trigger::SinkFailed { generation });
            }
            SinkFailure::Other => {
                warn!("Log sink {} failed: {}", path.display(), err);
                let _ = events.send(StreamEvent::SinkError {
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }
    }

    /// Apply one trigger. Directory changes only recreate when the path is
    /// missing or names a different file; truncation keeps the same file and
    /// appends continue at its new end, so it is left alone.
    fn handle(&self, trigger: Trigger) {
        let mut state = self.state.lock();
        if state.phase.is_terminal() {
            debug!("Ignoring {:?} for {} ({:?})", trigger, self.path.display(), state.phase);
            return;
        }

        match trigger {
            Trigger::SinkFailed { generation } => {
                if state.sink.as_ref().map(SinkWriter::generation) != Some(generation) {
                    debug!("Ignoring failure of stale sink generation {}", generation);
                    return;
                }
            }
            Trigger::DirectoryChanged => {
                // a failed attempt already queued its own retry
                if state.phase == Phase::Recreating {
                    return;
                }
                if let Some(identity) = state.identity {
                    if !factory::is_disrupted(&self.path, identity) {
                        return;
                    }
                }
            }
            Trigger::Retry => {
                if state.phase != Phase::Recreating {
                    return;
                }
            }
        }

        self.recreate(&mut state);
    }

    fn recreate(&self, state: &mut State) {
        if state.recreate_attempts >= self.max_recreate_attempts {
            self.exhaust(state);
            return;
        }

        state.recreate_attempts += 1;
        state.phase = Phase::Recreating;
        warn!(
            "Recreating log stream {} (attempt {}/{})",
            self.path.display(),
            state.recreate_attempts,
            self.max_recreate_attempts
        );
        let _ = self.events.send(StreamEvent::Recreate {
            attempt: state.recreate_attempts,
        });

        state.stop_watch();
        if let Some(old) = state.sink.take() {
            self.track(old.finish());
        }
        state.identity = None;

        let reopened = factory::open_append(&self.path, self.create_directory)
            .and_then(|opened| self.install(state, opened));
        match reopened {
            Ok(()) => {
                state.recreate_attempts = 0;
                state.phase = Phase::Live;
                info!("Recreated log stream: {}", self.path.display());
            }
            Err(e) => {
                warn!("Failed to recreate log stream {}: {}", self.path.display(), e);
                let _ = self.triggers.send(Trigger::Retry);
            }
        }
    }

    fn exhaust(&self, state: &mut State) {
        state.stop_watch();
        if let Some(sink) = state.sink.take() {
            self.track(sink.finish());
        }
        state.identity = None;
        state.recreate_attempts = self.max_recreate_attempts;
        state.phase = Phase::Exhausted;

        error!(
            "Log stream {} gave up after {} recreate attempt(s)",
            self.path.display(),
            self.max_recreate_attempts
        );
        let _ = self.events.send(StreamEvent::RecreateExhausted {
            path: self.path.clone(),
        });
    }

    /// Keep `done` in the pending set until it settles
    fn track(&self, done: Completion) {
        let id = self.next_pending.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(id, done.clone());

        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            done.await;
            pending.lock().remove(&id);
        });
    }
}

/// Apply triggers one at a time until the stream is dropped
async fn drive(inner: Weak<Inner>, mut triggers: mpsc::UnboundedReceiver<Trigger>) {
    while let Some(trigger) = triggers.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.handle(trigger);
    }
}
