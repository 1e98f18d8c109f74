//! Command types for the Chorus protocol
//!
//! Every frame on the wire is a JSON array of command objects. Each object
//! carries a `type` discriminator plus fields specific to that type.
//!
//! # Command Flow
//!
//! Typical sequence for a session:
//!
//! 1. Client opens the socket and sends `hello`
//! 2. Server answers `hello` with the client's participant ID and its clock
//! 3. Client sends `channelJoin`; server answers with `channelUpdate`
//! 4. Client sends `timeSync` periodically, server echoes `timeSync`
//! 5. Presence flows as `participantUpdate`, `participantDelta` and
//!    `participantLeft`
//! 6. Anything else (chat broadcasts, extensions) is surfaced verbatim

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::participant::{ParticipantId, ParticipantUpdate};

/// Commands sent by the client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    /// Join handshake, sent once per connection
    #[serde(rename = "hello")]
    Hello {
        x: f64,
        y: f64,
        /// Per-client connection counter; informational only
        #[serde(skip_serializing_if = "Option::is_none")]
        counter: Option<u32>,
        /// Single-use auth token
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Keepalive ping carrying the local send time
    #[serde(rename = "timeSync")]
    TimeSync {
        #[serde(rename = "clientTime")]
        client_time: u64,
    },

    /// Chat message to the current channel
    #[serde(rename = "chat")]
    Chat { message: String },

    /// Update the local participant's attributes
    #[serde(rename = "userset")]
    UserSet { set: NameSet },

    /// Request to join (or reconfigure) a channel
    #[serde(rename = "channelJoin")]
    ChannelJoin {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        settings: Option<Value>,
    },
}

impl ClientCommand {
    /// The wire discriminator of this command
    pub fn kind(&self) -> &'static str {
        match self {
            ClientCommand::Hello { .. } => "hello",
            ClientCommand::TimeSync { .. } => "timeSync",
            ClientCommand::Chat { .. } => "chat",
            ClientCommand::UserSet { .. } => "userset",
            ClientCommand::ChannelJoin { .. } => "channelJoin",
        }
    }
}

/// Attributes carried by a `userset` command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameSet {
    pub name: String,
}

/// Commands received from the server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerCommand {
    /// Handshake acknowledgment
    #[serde(rename = "hello")]
    Hello(HelloAck),

    /// Response to a keepalive ping
    #[serde(rename = "timeSync")]
    TimeSync(TimeSyncAck),

    /// Full channel state after a join or settings change
    #[serde(rename = "channelUpdate")]
    ChannelUpdate(ChannelUpdate),

    /// A participant joined or changed
    #[serde(rename = "participantUpdate")]
    ParticipantUpdate(ParticipantUpdate),

    /// Partial update (movement, attributes) for a known participant
    #[serde(rename = "participantDelta")]
    ParticipantDelta(ParticipantUpdate),

    /// A participant left the channel
    #[serde(rename = "participantLeft")]
    ParticipantLeft(Departure),

    /// Any command type this crate does not model
    #[serde(skip)]
    Other(UnknownCommand),
}

impl ServerCommand {
    /// Discriminators that decode into a dedicated variant
    pub const KNOWN_KINDS: &'static [&'static str] = &[
        "hello",
        "timeSync",
        "channelUpdate",
        "participantUpdate",
        "participantDelta",
        "participantLeft",
    ];

    /// The wire discriminator of this command
    pub fn kind(&self) -> &str {
        match self {
            ServerCommand::Hello(_) => "hello",
            ServerCommand::TimeSync(_) => "timeSync",
            ServerCommand::ChannelUpdate(_) => "channelUpdate",
            ServerCommand::ParticipantUpdate(_) => "participantUpdate",
            ServerCommand::ParticipantDelta(_) => "participantDelta",
            ServerCommand::ParticipantLeft(_) => "participantLeft",
            ServerCommand::Other(unknown) => &unknown.kind,
        }
    }
}

/// Payload of an inbound `hello`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HelloAck {
    /// Participant ID the server assigned to this client
    pub id: ParticipantId,
    /// Server time in milliseconds
    #[serde(rename = "t")]
    pub server_time: f64,
    /// Echo of the client's send time, if the server provides one
    #[serde(rename = "e", default)]
    pub client_time: Option<f64>,
}

/// Payload of an inbound `timeSync`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TimeSyncAck {
    #[serde(rename = "t")]
    pub server_time: f64,
    #[serde(rename = "e", default)]
    pub client_time: Option<f64>,
}

/// Channel identity and settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// Payload of an inbound `channelUpdate`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChannelUpdate {
    pub channel: ChannelInfo,
    /// Full roster snapshot
    #[serde(default)]
    pub participants: Vec<ParticipantUpdate>,
    /// Participant ID assigned to this session, when the server re-states it
    #[serde(rename = "participantId", default)]
    pub participant_id: Option<ParticipantId>,
}

/// Payload of an inbound `participantLeft`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Departure {
    pub id: ParticipantId,
}

/// A command whose type this crate does not model, kept verbatim
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownCommand {
    /// The `type` discriminator
    pub kind: String,
    /// The complete command object, discriminator included
    pub payload: Value,
}
