//! Events published by managed log streams

use std::io;
use std::path::PathBuf;

/// Observable changes in a stream's lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A recreate attempt started; `attempt` counts consecutive failures since the last success
    Recreate { attempt: u32 },

    /// The recreate budget is spent; the stream yields no sink from now on
    RecreateExhausted { path: PathBuf },

    /// The sink hit an error that recreating would not fix
    SinkError { kind: io::ErrorKind, message: String },
}

impl StreamEvent {
    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::Recreate { .. } => "recreate",
            StreamEvent::RecreateExhausted { .. } => "recreate_exhausted",
            StreamEvent::SinkError { .. } => "sink_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type() {
        assert_eq!(StreamEvent::Recreate { attempt: 1 }.event_type(), "recreate");
        assert_eq!(
            StreamEvent::RecreateExhausted {
                path: PathBuf::from("/var/log/app/access.log")
            }
            .event_type(),
            "recreate_exhausted"
        );
        assert_eq!(
            StreamEvent::SinkError {
                kind: io::ErrorKind::PermissionDenied,
                message: "denied".to_string()
            }
            .event_type(),
            "sink_error"
        );
    }
}
