//! Transport traits

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::types::CloseReason;

/// Generation number of a single `open` call.
///
/// Every event a transport emits is stamped with the generation it was
/// opened under, so the session can discard events from a connection it
/// has already abandoned.
pub type ConnectionId = u64;

/// Notifications a transport raises about its connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established and ready for `send`
    Opened,
    /// The connection is gone. Always the last event of a connection.
    Closed(Option<CloseReason>),
    /// The connection failed; `Closed` follows
    Errored(TransportError),
    /// One inbound frame
    Received(Bytes),
}

/// Sending half handed to a transport on `open`
#[derive(Debug, Clone)]
pub struct TransportEvents {
    connection: ConnectionId,
    tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
}

impl TransportEvents {
    /// Create an event sink for one connection generation
    pub fn new(
        connection: ConnectionId,
        tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    ) -> Self {
        Self { connection, tx }
    }

    /// Generation this sink stamps on its events
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Deliver an event. Returns false once the session has gone away.
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx.send((self.connection, event)).is_ok()
    }
}

/// Abstraction over the single socket a session talks through.
///
/// Implementations must not block: `open` starts connecting and reports
/// the outcome through `events`, `send` queues a frame, `close` starts
/// tearing the connection down and the transport later emits `Closed`.
#[async_trait]
pub trait Transport: Send {
    /// Start connecting to `address`
    async fn open(&mut self, address: &str, events: TransportEvents) -> Result<(), TransportError>;

    /// Queue one text frame for delivery
    async fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Close the connection if one is open; a no-op otherwise
    async fn close(&mut self) -> Result<(), TransportError>;
}
