//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding frames.
///
/// Every decode variant marks the inbound frame as a protocol violation;
/// the session treats any of them as connection-fatal.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Frame exceeds the maximum accepted size
    #[error("Frame too large: {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame is not a JSON array of commands
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// A command in the batch has no string `type` field
    #[error("Command {index} has no type discriminator")]
    MissingDiscriminator { index: usize },

    /// A known command carried fields of the wrong shape
    #[error("Invalid {kind} command: {source}")]
    InvalidCommand {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
