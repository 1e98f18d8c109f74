//! Session controller
//!
//! Owns the connection lifecycle and everything tied to it:
//!
//! ```text
//! Disconnected --connect()--> Connecting --Opened--> Connected
//!      ^                          |                     |
//!      +------ Closed / connect timeout / protocol violation
//! ```
//!
//! The controller is driven by a single task (see [`SessionController::run`]),
//! so transport events, keepalive ticks, clock smoothing steps and API calls
//! are handled strictly one at a time.

use std::pin::Pin;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, Interval, MissedTickBehavior, Sleep};
use tokio_util::sync::CancellationToken;

use chorus_core::config::ClientConfig;
use chorus_core::error::{ConfigError, TransportError};
use chorus_core::traits::{ConnectionId, Transport, TransportEvent, TransportEvents};
use chorus_core::{CloseReason, ConnectionPhase};
use chorus_protocol::{
    ChannelInfo, ChannelUpdate, ClientCommand, FrameCodec, NameSet, Participant, ParticipantId,
    ServerCommand,
};

use super::events::{EventSink, EventStream, SessionEvent};
use super::state::SessionState;
use crate::clock::{self, ClockSynchronizer};
use crate::roster::Roster;

/// Position announced in the handshake
const HELLO_POSITION: (f64, f64) = (50.0, 50.0);

/// Close code used when the session drops a connection over a bad frame
const CLOSE_PROTOCOL_ERROR: u16 = 1002;

/// Requests forwarded from [`Client`](crate::Client) handles
#[derive(Debug)]
pub(crate) enum Request {
    Connect,
    Disconnect,
    SendChat(String),
    SetName(String),
    SetChannel {
        id: Option<String>,
        settings: Option<Value>,
    },
    Phase(oneshot::Sender<ConnectionPhase>),
    Participant {
        id: ParticipantId,
        reply: oneshot::Sender<Participant>,
    },
    OwnParticipant(oneshot::Sender<Participant>),
    Participants(oneshot::Sender<Vec<Participant>>),
    ParticipantCount(oneshot::Sender<usize>),
    Channel(oneshot::Sender<Option<ChannelInfo>>),
}

/// The session protocol engine for one client
pub struct SessionController<T> {
    config: ClientConfig,
    transport: T,
    codec: FrameCodec,
    state: SessionState,
    roster: Roster,
    clock: ClockSynchronizer,
    events: EventSink,
    transport_tx: mpsc::UnboundedSender<(ConnectionId, TransportEvent)>,
    transport_rx: mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>,
    keepalive: Option<Interval>,
    connect_deadline: Option<Pin<Box<Sleep>>>,
}

impl<T: Transport> SessionController<T> {
    /// Create a controller. Fails fast on invalid configuration, before
    /// any connection attempt.
    pub fn new(config: ClientConfig, transport: T) -> Result<(Self, EventStream), ConfigError> {
        config.validate()?;

        let (events, stream) = EventSink::channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();

        let controller = Self {
            state: SessionState::new(config.desired_channel.clone()),
            config,
            transport,
            codec: FrameCodec::new(),
            roster: Roster::new(events.clone()),
            clock: ClockSynchronizer::new(),
            events,
            transport_tx,
            transport_rx,
            keepalive: None,
            connect_deadline: None,
        };

        Ok((controller, stream))
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase
    }

    pub fn is_connected(&self) -> bool {
        self.state.phase == ConnectionPhase::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.state.phase == ConnectionPhase::Connecting
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn clock(&self) -> &ClockSynchronizer {
        &self.clock
    }

    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.state.local_id.as_ref()
    }

    /// The local participant, or the offline sentinel before the server
    /// has assigned an ID
    pub fn own_participant(&self) -> &Participant {
        match &self.state.local_id {
            Some(id) => self.roster.lookup(id),
            None => self.roster.lookup(&ParticipantId::default()),
        }
    }

    pub fn participant(&self, id: &ParticipantId) -> &Participant {
        self.roster.lookup(id)
    }

    pub fn participant_count(&self) -> usize {
        self.roster.len()
    }

    pub fn channel(&self) -> Option<&ChannelInfo> {
        self.state.channel.as_ref()
    }

    /// Open the transport. A no-op while connecting or connected.
    pub async fn connect(&mut self) {
        if self.state.phase != ConnectionPhase::Disconnected {
            tracing::debug!("connect() ignored while {}", self.state.phase);
            return;
        }

        let connection = self.state.next_connection();
        self.state.phase = ConnectionPhase::Connecting;
        self.connect_deadline = Some(Box::pin(time::sleep(self.config.connect_timeout)));

        tracing::info!("Connecting to {}", self.config.address);
        let events = TransportEvents::new(connection, self.transport_tx.clone());
        if let Err(e) = self.transport.open(&self.config.address, events).await {
            tracing::warn!("Failed to open transport: {}", e);
            self.events.emit(SessionEvent::TransportError(e));
            self.state.next_connection();
            self.teardown(None);
        }
    }

    /// Close the transport. State is cleared when the transport reports
    /// `Closed`, not here.
    pub async fn disconnect(&mut self) {
        if self.state.phase == ConnectionPhase::Disconnected {
            return;
        }
        tracing::debug!("Closing transport");
        self.close_transport().await;
    }

    /// Send a chat message to the current channel
    pub async fn send_chat(&mut self, message: impl Into<String>) {
        if !self.is_connected() {
            tracing::debug!("Dropping chat while {}", self.state.phase);
            return;
        }
        self.send_commands(&[ClientCommand::Chat {
            message: message.into(),
        }])
        .await;
    }

    /// Change the local participant's display name
    pub async fn set_participant_name(&mut self, name: impl Into<String>) {
        if !self.is_connected() {
            tracing::debug!("Dropping name change while {}", self.state.phase);
            return;
        }
        self.send_commands(&[ClientCommand::UserSet {
            set: NameSet { name: name.into() },
        }])
        .await;
    }

    /// Join a channel, or record it to be joined once connected.
    ///
    /// `None` re-requests the last desired channel (and settings).
    pub async fn set_channel(&mut self, id: Option<String>, settings: Option<Value>) {
        let (id, settings) = self.state.resolve_channel(id, settings);

        if !self.is_connected() {
            tracing::debug!("Channel {} recorded, joining once connected", id);
            return;
        }

        tracing::debug!("Joining channel {}", id);
        self.send_commands(&[ClientCommand::ChannelJoin { id, settings }])
            .await;
    }

    /// React to one transport event. Events from any connection other than
    /// the current one are discarded.
    pub async fn handle_transport_event(&mut self, connection: ConnectionId, event: TransportEvent) {
        if connection != self.state.connection {
            tracing::trace!("Ignoring {:?} from stale connection {}", event, connection);
            return;
        }

        match event {
            TransportEvent::Opened => self.on_opened().await,
            TransportEvent::Closed(reason) => self.on_closed(reason),
            TransportEvent::Errored(e) => self.on_errored(e).await,
            TransportEvent::Received(frame) => self.on_frame(frame).await,
        }
    }

    /// Drive the session until `cancel` fires or every request sender is
    /// dropped. An open transport is closed on the way out.
    pub(crate) async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request).await,
                    None => break,
                },
                Some((connection, event)) = self.transport_rx.recv() => {
                    self.handle_transport_event(connection, event).await;
                }
                _ = tick(&mut self.keepalive) => self.send_keepalive().await,
                _ = self.clock.next_step() => {}
                _ = expire(&mut self.connect_deadline) => self.on_connect_timeout().await,
            }
        }

        if self.state.phase != ConnectionPhase::Disconnected {
            self.close_transport().await;
        }
        tracing::debug!("Session task stopped");
    }

    async fn handle_request(&mut self, request: Request) {
        match request {
            Request::Connect => self.connect().await,
            Request::Disconnect => self.disconnect().await,
            Request::SendChat(message) => self.send_chat(message).await,
            Request::SetName(name) => self.set_participant_name(name).await,
            Request::SetChannel { id, settings } => self.set_channel(id, settings).await,
            Request::Phase(reply) => {
                let _ = reply.send(self.phase());
            }
            Request::Participant { id, reply } => {
                let _ = reply.send(self.participant(&id).clone());
            }
            Request::OwnParticipant(reply) => {
                let _ = reply.send(self.own_participant().clone());
            }
            Request::Participants(reply) => {
                let _ = reply.send(self.roster.participants().cloned().collect());
            }
            Request::ParticipantCount(reply) => {
                let _ = reply.send(self.participant_count());
            }
            Request::Channel(reply) => {
                let _ = reply.send(self.state.channel.clone());
            }
        }
    }

    async fn on_opened(&mut self) {
        if self.state.phase != ConnectionPhase::Connecting {
            tracing::warn!("Transport opened while {}", self.state.phase);
            return;
        }
        self.connect_deadline = None;

        let hello = ClientCommand::Hello {
            x: HELLO_POSITION.0,
            y: HELLO_POSITION.1,
            counter: self.state.next_hello_counter(),
            token: self.config.token.take(),
        };
        self.send_commands(&[hello]).await;

        let period = self.config.keepalive_interval;
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.keepalive = Some(ticker);

        self.state.phase = ConnectionPhase::Connected;
        tracing::info!("Connected to {}", self.config.address);
        self.events.emit(SessionEvent::Connected);
    }

    fn on_closed(&mut self, reason: Option<CloseReason>) {
        if self.state.phase == ConnectionPhase::Disconnected {
            tracing::debug!("Transport closed while already disconnected");
            return;
        }
        match &reason {
            Some(reason) => tracing::info!("Disconnected ({})", reason),
            None => tracing::info!("Disconnected"),
        }
        self.teardown(reason);
    }

    async fn on_errored(&mut self, error: TransportError) {
        tracing::warn!("Transport error: {}", error);
        self.events.emit(SessionEvent::TransportError(error));
        self.close_transport().await;
    }

    async fn on_connect_timeout(&mut self) {
        self.connect_deadline = None;
        if self.state.phase != ConnectionPhase::Connecting {
            return;
        }

        let timeout = self.config.connect_timeout;
        tracing::warn!("Transport did not open within {:?}", timeout);
        self.events
            .emit(SessionEvent::TransportError(TransportError::ConnectTimeout(timeout)));
        self.abandon_connection(None).await;
    }

    async fn on_frame(&mut self, frame: Bytes) {
        let commands = match self.codec.decode(&frame) {
            Ok(commands) => commands,
            Err(e) => {
                tracing::warn!("Protocol violation: {}", e);
                self.events.emit(SessionEvent::ProtocolViolation(e));
                self.abandon_connection(Some(CloseReason::new(
                    CLOSE_PROTOCOL_ERROR,
                    "protocol violation",
                )))
                .await;
                return;
            }
        };

        for command in commands {
            self.dispatch(command).await;
        }
    }

    async fn dispatch(&mut self, command: ServerCommand) {
        tracing::trace!("Dispatching {}", command.kind());

        match command {
            ServerCommand::Hello(ack) => {
                tracing::debug!("Server assigned participant ID {}", ack.id);
                self.state.local_id = Some(ack.id);
                self.clock
                    .report_server_time(ack.server_time, ack.client_time);
                self.set_channel(None, None).await;
            }

            ServerCommand::TimeSync(ack) => {
                self.clock
                    .report_server_time(ack.server_time, ack.client_time);
            }

            ServerCommand::ChannelUpdate(ChannelUpdate {
                channel,
                participants,
                participant_id,
            }) => {
                tracing::debug!(
                    "Channel {} with {} participants",
                    channel.id,
                    participants.len()
                );
                if self.state.desired_channel.is_none() {
                    self.state.desired_channel = Some(channel.id.clone());
                }
                self.state.desired_settings = channel.settings.clone();
                self.state.channel = Some(channel.clone());
                if let Some(id) = participant_id {
                    self.state.local_id = Some(id);
                }
                self.roster.replace_all(participants);
                self.events.emit(SessionEvent::ChannelUpdated(channel));
            }

            ServerCommand::ParticipantUpdate(update) => {
                let id = update.id.clone();
                self.roster.upsert(update);
                self.events.emit(SessionEvent::ParticipantChanged(
                    self.roster.lookup(&id).clone(),
                ));
            }

            ServerCommand::ParticipantDelta(update) => {
                if self.roster.contains(&update.id) {
                    self.roster.upsert(update);
                } else {
                    tracing::trace!("Dropping delta for unknown participant {}", update.id);
                }
            }

            ServerCommand::ParticipantLeft(departure) => {
                self.roster.remove(&departure.id);
            }

            ServerCommand::Other(command) => {
                self.events.emit(SessionEvent::Unrecognized(command));
            }
        }
    }

    async fn send_keepalive(&mut self) {
        if !self.is_connected() {
            return;
        }
        let client_time = clock::local_time_millis() as u64;
        tracing::trace!("Keepalive ping at {}", client_time);
        self.send_commands(&[ClientCommand::TimeSync { client_time }])
            .await;
    }

    async fn send_commands(&mut self, commands: &[ClientCommand]) {
        let frame = match self.codec.encode(commands) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to encode {} command(s): {}", commands.len(), e);
                return;
            }
        };

        tracing::trace!("Sending {}", frame);
        if let Err(e) = self.transport.send(frame).await {
            self.on_errored(e).await;
        }
    }

    async fn close_transport(&mut self) {
        if let Err(e) = self.transport.close().await {
            tracing::debug!("Error closing transport: {}", e);
        }
    }

    /// Close the transport and settle state now instead of waiting for
    /// `Closed`; anything the old connection still emits is ignored.
    async fn abandon_connection(&mut self, reason: Option<CloseReason>) {
        self.close_transport().await;
        self.state.next_connection();
        self.teardown(reason);
    }

    fn teardown(&mut self, reason: Option<CloseReason>) {
        self.keepalive = None;
        self.connect_deadline = None;
        self.clock.settle();
        self.state.clear_connection();
        self.roster.replace_all(Vec::new());
        self.events.emit(SessionEvent::Disconnected { reason });
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn expire(deadline: &mut Option<Pin<Box<Sleep>>>) {
    match deadline {
        Some(deadline) => deadline.as_mut().await,
        None => std::future::pending::<()>().await,
    }
}
