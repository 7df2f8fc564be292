//! logmend Stream - Self-healing append-only log streams
//!
//! Each log file gets exactly one [`LogStream`] per process, handed out by the
//! [`StreamRegistry`]. A stream owns an append-mode sink and a watch on the
//! file's directory; when the file is deleted or moved away, or the sink
//! loses its target, the sink is reopened in place. Consecutive failed
//! attempts are bounded by `max_recreate_attempts`, after which the stream
//! publishes [`StreamEvent::RecreateExhausted`] and stops yielding a sink.

mod access;
mod event;
pub mod factory;
mod registry;
mod sink;
mod stream;

pub use access::AccessLog;
pub use event::StreamEvent;
pub use registry::{create, remove, reset, StreamRegistry};
pub use sink::Sink;
pub use stream::{LogStream, Phase};

pub use logmend_core::{Error, Result, StreamOptions};
