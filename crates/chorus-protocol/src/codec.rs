//! JSON batch codec for protocol frames

use serde_json::Value;

use crate::error::ProtocolError;
use crate::message::{ClientCommand, ServerCommand, UnknownCommand};

/// Largest inbound frame accepted by default (8 MiB)
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Codec for encoding/decoding protocol frames.
///
/// A frame is always a batch: one JSON array holding one or more commands.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a custom inbound size limit
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Serialize a batch of commands into a single text frame
    pub fn encode(&self, commands: &[ClientCommand]) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(commands)?)
    }

    /// Parse a frame into its commands, preserving order.
    ///
    /// Command types without a dedicated variant decode to
    /// [`ServerCommand::Other`]; only structural problems are errors.
    pub fn decode(&self, src: &[u8]) -> Result<Vec<ServerCommand>, ProtocolError> {
        if src.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: src.len(),
                max: self.max_frame_size,
            });
        }

        let batch: Vec<Value> = serde_json::from_slice(src).map_err(ProtocolError::MalformedFrame)?;

        batch
            .into_iter()
            .enumerate()
            .map(|(index, value)| decode_command(index, value))
            .collect()
    }
}

fn decode_command(index: usize, value: Value) -> Result<ServerCommand, ProtocolError> {
    let kind = match value.get("type").and_then(Value::as_str) {
        Some(kind) => kind.to_string(),
        None => return Err(ProtocolError::MissingDiscriminator { index }),
    };

    if !ServerCommand::KNOWN_KINDS.contains(&kind.as_str()) {
        tracing::trace!("Passing through unrecognized command type {}", kind);
        return Ok(ServerCommand::Other(UnknownCommand {
            kind,
            payload: value,
        }));
    }

    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidCommand { kind, source })
}
