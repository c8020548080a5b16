//! Broadcast Sinks
//!
//! A sink is one connected subscriber. Sinks are created by an acceptor (the
//! WebSocket server, the `--output` flag, a test) and handed to the broadcast
//! loop through a [`SinkRegistry`]. From then on the loop owns the sink and
//! is the only one that sends to it or closes it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::mpsc;

use crate::error::SinkError;

/// Capability the broadcast loop needs from a subscriber
#[async_trait]
pub trait BroadcastSink: Send {
    /// Deliver one serialized payload
    async fn send(&mut self, payload: &str) -> Result<(), SinkError>;

    /// Close the connection. Errors are not interesting at this point.
    async fn close(&mut self) {}
}

/// Opaque handle of a registered sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SinkId(pub(crate) u64);

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sink#{}", self.0)
    }
}

/// Requests from acceptors to the broadcast loop
pub enum SinkCommand {
    Attach {
        id: SinkId,
        peer: String,
        sink: Box<dyn BroadcastSink>,
    },
    Detach {
        id: SinkId,
    },
}

impl fmt::Debug for SinkCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SinkCommand::Attach { id, peer, .. } => write!(f, "Attach({}, {})", id, peer),
            SinkCommand::Detach { id } => write!(f, "Detach({})", id),
        }
    }
}

/// Cloneable handle acceptors use to add and remove sinks.
///
/// Access to the active set is serialized through a channel, so acceptors
/// never wait for a tick in progress.
#[derive(Clone)]
pub struct SinkRegistry {
    tx: mpsc::UnboundedSender<SinkCommand>,
    next_id: Arc<AtomicU64>,
}

impl SinkRegistry {
    /// New registry plus the receiving end for the broadcast loop
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SinkRegistry {
                tx,
                next_id: Arc::new(AtomicU64::new(1)),
            },
            rx,
        )
    }

    /// Hand a sink over to the loop.
    ///
    /// Returns `None` when the loop has already closed; the sink is dropped.
    pub fn attach(&self, peer: impl Into<String>, sink: Box<dyn BroadcastSink>) -> Option<SinkId> {
        let id = SinkId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let peer = peer.into();
        match self.tx.send(SinkCommand::Attach { id, peer, sink }) {
            Ok(()) => Some(id),
            Err(_) => {
                log::debug!("{}: broadcast loop is closed, not attaching", id);
                None
            }
        }
    }

    /// Tell the loop a subscriber went away on its own
    pub fn detach(&self, id: SinkId) {
        // A closed loop has dropped the sink already
        let _ = self.tx.send(SinkCommand::Detach { id });
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Forwards payloads into a channel
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

#[async_trait]
impl BroadcastSink for ChannelSink {
    async fn send(&mut self, payload: &str) -> Result<(), SinkError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| SinkError::Disconnected)
    }
}

/// Writes one payload per line to standard output
pub struct StdoutSink {
    out: Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        StdoutSink {
            out: tokio::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BroadcastSink for StdoutSink {
    async fn send(&mut self, payload: &str) -> Result<(), SinkError> {
        self.out.write_all(payload.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink() {
        let (mut sink, mut rx) = ChannelSink::new();
        sink.send("hello").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");

        drop(rx);
        assert!(matches!(
            sink.send("again").await,
            Err(SinkError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_registry_ids_and_commands() {
        let (registry, mut rx) = SinkRegistry::new();
        let (a, _) = ChannelSink::new();
        let (b, _) = ChannelSink::new();

        let id_a = registry.attach("a", Box::new(a)).unwrap();
        let id_b = registry.clone().attach("b", Box::new(b)).unwrap();
        assert_ne!(id_a, id_b);
        registry.detach(id_a);

        match rx.recv().await.unwrap() {
            SinkCommand::Attach { id, peer, .. } => {
                assert_eq!(id, id_a);
                assert_eq!(peer, "a");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(rx.recv().await, Some(SinkCommand::Attach { id, .. }) if id == id_b));
        assert!(matches!(rx.recv().await, Some(SinkCommand::Detach { id }) if id == id_a));
    }

    #[tokio::test]
    async fn test_attach_after_close() {
        let (registry, rx) = SinkRegistry::new();
        drop(rx);
        assert!(registry.is_closed());
        let (sink, _) = ChannelSink::new();
        assert_eq!(registry.attach("late", Box::new(sink)), None);
    }
}
