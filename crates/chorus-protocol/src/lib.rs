//! chorus-protocol: Wire protocol for Chorus collaborative sessions
//!
//! This crate defines the JSON command batches exchanged between a client
//! and a channel server over a single persistent socket.

pub mod error;
pub mod message;
pub mod codec;
pub mod participant;

pub use error::ProtocolError;
pub use message::{
    ChannelInfo, ChannelUpdate, ClientCommand, Departure, HelloAck, NameSet, ServerCommand,
    TimeSyncAck, UnknownCommand,
};
pub use codec::{FrameCodec, MAX_FRAME_SIZE};
pub use participant::{Participant, ParticipantId, ParticipantUpdate, DEFAULT_COLOR};
