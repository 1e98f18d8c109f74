//! Per-session connection state

use serde_json::Value;

use chorus_core::config::DEFAULT_CHANNEL;
use chorus_core::traits::ConnectionId;
use chorus_core::ConnectionPhase;
use chorus_protocol::{ChannelInfo, ParticipantId};

/// Connection-scoped state owned by the session controller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Lifecycle phase
    pub phase: ConnectionPhase,
    /// ID the server assigned to this client, once known
    pub local_id: Option<ParticipantId>,
    /// Channel currently joined
    pub channel: Option<ChannelInfo>,
    /// Channel to join (or re-join) once connected
    pub desired_channel: Option<String>,
    /// Settings to request with the desired channel
    pub desired_settings: Option<Value>,
    /// Number of handshakes sent so far
    pub hello_count: u32,
    /// Generation of the current (or last) transport connection
    pub connection: ConnectionId,
}

impl SessionState {
    /// Create state for a fresh session
    pub fn new(desired_channel: Option<String>) -> Self {
        Self {
            desired_channel,
            ..Self::default()
        }
    }

    /// Counter value for the next handshake: omitted for the first one,
    /// then 1, 2, ...
    pub fn next_hello_counter(&mut self) -> Option<u32> {
        let counter = self.hello_count;
        self.hello_count += 1;
        (counter > 0).then_some(counter)
    }

    /// Start a new connection generation
    pub fn next_connection(&mut self) -> ConnectionId {
        self.connection += 1;
        self.connection
    }

    /// Record and return the channel to join.
    ///
    /// Falls back to the previously desired channel, then [`DEFAULT_CHANNEL`];
    /// settings fall back to the previously desired settings.
    pub fn resolve_channel(
        &mut self,
        id: Option<String>,
        settings: Option<Value>,
    ) -> (String, Option<Value>) {
        let channel = id
            .or_else(|| self.desired_channel.clone())
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
        let settings = settings.or_else(|| self.desired_settings.clone());

        self.desired_channel = Some(channel.clone());
        self.desired_settings = settings.clone();
        (channel, settings)
    }

    /// Forget everything tied to the connection that just ended
    pub fn clear_connection(&mut self) {
        self.phase = ConnectionPhase::Disconnected;
        self.local_id = None;
        self.channel = None;
    }
}
