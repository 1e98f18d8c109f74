//! Notifications raised by the session

use tokio::sync::mpsc;

use chorus_core::error::TransportError;
use chorus_core::CloseReason;
use chorus_protocol::{ChannelInfo, Participant, ProtocolError, UnknownCommand};

/// Receiving end of a session's notifications
pub type EventStream = mpsc::UnboundedReceiver<SessionEvent>;

/// Everything a consumer can observe about a session.
///
/// Failures arrive here as payloads; nothing is raised across this boundary
/// as a panic or a returned error.
#[derive(Debug)]
pub enum SessionEvent {
    /// Transport opened and handshake sent
    Connected,
    /// Transport closed and all connection state cleared
    Disconnected { reason: Option<CloseReason> },
    /// The transport failed; the connection is being closed
    TransportError(TransportError),
    /// An inbound frame was malformed; the connection was dropped
    ProtocolViolation(ProtocolError),
    /// Joined a channel or its settings changed
    ChannelUpdated(ChannelInfo),
    /// A participant entered the roster
    ParticipantJoined(Participant),
    /// A known participant's fields changed
    ParticipantUpdated(Participant),
    /// The server announced a participant's full state
    ParticipantChanged(Participant),
    /// A participant left the roster
    ParticipantLeft(Participant),
    /// Roster size after a join or departure
    RosterSizeChanged(usize),
    /// A command type the engine does not model, passed through verbatim
    Unrecognized(UnknownCommand),
}

/// Cloneable sending half used by the session and its roster
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    /// Create a sink and the stream it feeds
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Raise a notification. Dropped silently once the consumer is gone.
    pub fn emit(&self, event: SessionEvent) {
        if let Err(mpsc::error::SendError(event)) = self.tx.send(event) {
            tracing::trace!("No listener for {:?}", event);
        }
    }
}
