//! Cloneable handle to a running session
//!
//! [`Client::spawn`] moves a [`SessionController`] onto its own task and
//! returns a handle that forwards calls to it over a channel. Every handle
//! talks to the same session; the session stops when [`Client::shutdown`]
//! is called or the last handle is dropped.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use chorus_core::config::ClientConfig;
use chorus_core::error::ConfigError;
use chorus_core::traits::Transport;
use chorus_core::{ChorusError, ConnectionPhase};
use chorus_protocol::{ChannelInfo, Participant, ParticipantId};

use crate::clock;
use crate::session::{EventStream, Request, SessionController};

/// Handle to a session running on its own task
#[derive(Debug, Clone)]
pub struct Client {
    requests: mpsc::UnboundedSender<Request>,
    offset: watch::Receiver<f64>,
    cancel: CancellationToken,
}

impl Client {
    /// Validate `config` and start a session over `transport`.
    ///
    /// The session starts disconnected; call [`connect`](Self::connect).
    /// Must be called from within a tokio runtime.
    pub fn spawn<T>(config: ClientConfig, transport: T) -> Result<(Self, EventStream), ConfigError>
    where
        T: Transport + 'static,
    {
        let (controller, events) = SessionController::new(config, transport)?;
        let offset = controller.clock().subscribe();
        let (requests, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(controller.run(rx, cancel.clone()));

        let client = Self {
            requests,
            offset,
            cancel,
        };
        Ok((client, events))
    }

    pub fn connect(&self) -> Result<(), ChorusError> {
        self.request(Request::Connect)
    }

    pub fn disconnect(&self) -> Result<(), ChorusError> {
        self.request(Request::Disconnect)
    }

    pub fn send_chat(&self, message: impl Into<String>) -> Result<(), ChorusError> {
        self.request(Request::SendChat(message.into()))
    }

    pub fn set_name(&self, name: impl Into<String>) -> Result<(), ChorusError> {
        self.request(Request::SetName(name.into()))
    }

    /// Join `id`, or re-join the last requested channel when `None`
    pub fn set_channel(
        &self,
        id: Option<String>,
        settings: Option<Value>,
    ) -> Result<(), ChorusError> {
        self.request(Request::SetChannel { id, settings })
    }

    pub async fn phase(&self) -> Result<ConnectionPhase, ChorusError> {
        self.query(Request::Phase).await
    }

    /// A participant by ID, or the offline sentinel when not present
    pub async fn participant(&self, id: impl Into<ParticipantId>) -> Result<Participant, ChorusError> {
        let id = id.into();
        self.query(|reply| Request::Participant { id, reply }).await
    }

    pub async fn own_participant(&self) -> Result<Participant, ChorusError> {
        self.query(Request::OwnParticipant).await
    }

    pub async fn participants(&self) -> Result<Vec<Participant>, ChorusError> {
        self.query(Request::Participants).await
    }

    pub async fn participant_count(&self) -> Result<usize, ChorusError> {
        self.query(Request::ParticipantCount).await
    }

    pub async fn channel(&self) -> Result<Option<ChannelInfo>, ChorusError> {
        self.query(Request::Channel).await
    }

    /// Current smoothed offset to the server clock, in milliseconds
    pub fn server_time_offset(&self) -> f64 {
        *self.offset.borrow()
    }

    /// Estimated server time in milliseconds since the Unix epoch
    pub fn server_time(&self) -> f64 {
        clock::local_time_millis() + self.server_time_offset()
    }

    /// Stop the session task, closing the transport if it is open
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    fn request(&self, request: Request) -> Result<(), ChorusError> {
        self.requests
            .send(request)
            .map_err(|_| ChorusError::SessionClosed)
    }

    async fn query<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Request,
    ) -> Result<R, ChorusError> {
        let (reply, rx) = oneshot::channel();
        self.request(build(reply))?;
        rx.await.map_err(|_| ChorusError::SessionClosed)
    }
}
