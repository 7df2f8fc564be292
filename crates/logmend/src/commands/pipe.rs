//! Pipe command implementation - fans stdin lines out to managed log streams

use anyhow::{bail, Result};
use logmend_core::{constants, ConfigFile, Error, StreamOptions};
use logmend_stream::{AccessLog, LogStream, StreamEvent, StreamRegistry};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::cli::PipeArgs;

/// Stream name used when neither a target nor a config file is given
const DEFAULT_STREAM_NAME: &str = "access";

pub async fn execute(args: PipeArgs) -> Result<()> {
    let options = resolve_options(&args)?;
    if options.is_empty() {
        bail!("No streams configured");
    }

    let registry = StreamRegistry::global();
    let mut logs = Vec::with_capacity(options.len());
    for opts in &options {
        let stream = registry.create(opts)?;
        info!("Streaming to {}", stream.path().display());
        spawn_event_logger(&stream);

        let log = AccessLog::new(stream);
        logs.push(if args.raw { log.without_timestamps() } else { log });
    }

    let dropped = tokio::select! {
        result = copy_lines(&logs) => result?,
        _ = shutdown_signal() => {
            info!("Received shutdown signal, closing streams...");
            0
        }
    };

    for log in &logs {
        registry.remove(Some(log.stream())).await;
    }

    if dropped > 0 {
        warn!("{} line(s) could not be written", dropped);
    }
    debug!("All streams closed");
    Ok(())
}

/// Pick streams from, in order: --config, --file, --name, a config file in
/// the working directory, then the default stream under ~/.logmend/logs.
fn resolve_options(args: &PipeArgs) -> Result<Vec<StreamOptions>> {
    if let Some(config_path) = &args.config {
        let config = ConfigFile::load(config_path)?;
        return Ok(config.into_options(base_dir(config_path)));
    }

    let single = |path: PathBuf| {
        vec![StreamOptions::new(path)
            .create_directory(!args.no_create_dir)
            .max_recreate_attempts(args.max_recreate_attempts)]
    };

    if let Some(file) = &args.file {
        return Ok(single(file.clone()));
    }
    if let Some(name) = &args.name {
        return Ok(single(constants::log_path(name)));
    }

    let cwd = std::env::current_dir()?;
    match ConfigFile::find_and_load(&cwd) {
        Ok((config, path)) => {
            debug!("Using config file {}", path.display());
            Ok(config.into_options(base_dir(&path)))
        }
        Err(Error::ConfigError(_)) => Ok(single(constants::log_path(DEFAULT_STREAM_NAME))),
        Err(e) => Err(e.into()),
    }
}

fn base_dir(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Copy stdin to every stream until EOF. Returns the number of lines some stream dropped.
async fn copy_lines(logs: &[AccessLog]) -> Result<usize> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut dropped = 0;

    while let Some(line) = lines.next_line().await? {
        for log in logs {
            if !log.log(&line).await {
                dropped += 1;
            }
        }
    }

    Ok(dropped)
}

fn spawn_event_logger(stream: &LogStream) {
    let mut events = stream.subscribe();
    let path = stream.path().to_path_buf();

    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StreamEvent::Recreate { attempt }) => {
                    warn!("Recreating {} (attempt {})", path.display(), attempt);
                }
                Ok(StreamEvent::RecreateExhausted { path }) => {
                    error!("Gave up recreating {}, lines are being dropped", path.display());
                }
                Ok(StreamEvent::SinkError { kind, message }) => {
                    error!("Write to {} failed ({:?}): {}", path.display(), kind, message);
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Missed {} event(s) for {}", n, path.display());
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigterm, mut sigint) = match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(term), Ok(int)) => (term, int),
        _ => {
            warn!("Could not install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
