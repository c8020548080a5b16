use std::io;
use std::time::Duration;

use thiserror::Error;

use lidarcast_core::PipelineError;

/// Errors reported by a scan source
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Cannot open scan source '{identifier}': {reason}")]
    Open { identifier: String, reason: String },
    #[error("Scan source unavailable: {0}")]
    Unavailable(String),
    #[error("Scan source ended after {0} cycles")]
    Exhausted(u64),
    #[error("Scan read timed out after {0:?}")]
    Timeout(Duration),
    #[error("Scan cycle dropped: {0}")]
    Transient(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SourceError {
    /// Fatal errors end the broadcast loop, the rest only cost one cycle
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SourceError::Timeout(_) | SourceError::Transient(_))
    }
}

/// Errors reported when pushing a payload to one subscriber
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Subscriber disconnected")]
    Disconnected,
    #[error("Send timed out after {0:?}")]
    Timeout(Duration),
    #[error("Send failed: {0}")]
    Send(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Reasons the broadcast loop stopped abnormally
#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("{0}")]
    Source(#[from] SourceError),
}

/// Startup errors of the server process
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] PipelineError),
    #[error("Invalid address '{0}'")]
    Address(String),
    #[error("Invalid configuration: scan rate must be a positive number of Hz, got {0}")]
    ScanRate(f64),
    #[error("{0}")]
    Source(#[from] SourceError),
    #[error("Cannot bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SourceError::Unavailable("gone".into()).is_fatal());
        assert!(SourceError::Exhausted(3).is_fatal());
        assert!(SourceError::Io(io::Error::new(io::ErrorKind::BrokenPipe, "x")).is_fatal());
        assert!(!SourceError::Timeout(Duration::from_millis(5)).is_fatal());
        assert!(!SourceError::Transient("short sweep".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            SourceError::Unavailable("connection closed".into()).to_string(),
            "Scan source unavailable: connection closed"
        );
        assert_eq!(
            BroadcastError::from(SourceError::Exhausted(4)).to_string(),
            "Scan source ended after 4 cycles"
        );
    }
}
