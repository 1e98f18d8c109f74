//! WebSocket transport
//!
//! Each `open` spawns one connection task that owns the socket. The task
//! performs the handshake, forwards inbound text and binary frames to the
//! session, writes queued outbound frames, and finishes by emitting
//! `Closed`. A supervisor task watches it so `Closed` is emitted even if the
//! connection task dies.

use std::sync::Once;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;

use chorus_core::error::TransportError;
use chorus_core::traits::{Transport, TransportEvent, TransportEvents};
use chorus_core::CloseReason;

/// Work queued for the connection task
#[derive(Debug)]
enum Outbound {
    Frame(String),
    Close,
}

/// Make `ring` the process-wide rustls provider used for `wss://`.
///
/// Leaves an already installed provider in place.
fn install_crypto_provider() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        if rustls::crypto::ring::default_provider()
            .install_default()
            .is_err()
        {
            tracing::debug!("TLS crypto provider already installed");
        }
    });
}

/// [`Transport`] over a `ws://` or `wss://` connection
#[derive(Debug)]
pub struct WebSocketTransport {
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    task: Option<AbortHandle>,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    pub fn new() -> Self {
        install_crypto_provider();
        Self {
            outbound: None,
            task: None,
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&mut self, address: &str, events: TransportEvents) -> Result<(), TransportError> {
        let request = address
            .into_client_request()
            .map_err(|e| TransportError::InvalidAddress {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        if let Some(task) = self.task.take() {
            task.abort();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);

        let connection = tokio::spawn(run_connection(request, rx, events.clone()));
        self.task = Some(connection.abort_handle());
        tokio::spawn(supervise(connection, events));
        Ok(())
    }

    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::NotOpen)?;
        outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::NotOpen)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Outbound::Close);
        }
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Report a connection task that died without finishing as errored then
/// closed. An aborted task was replaced or dropped on purpose and stays
/// silent.
async fn supervise(connection: JoinHandle<()>, events: TransportEvents) {
    match connection.await {
        Ok(()) => {}
        Err(e) if e.is_cancelled() => {}
        Err(e) => {
            tracing::error!("[{}] Connection task failed: {}", events.connection(), e);
            events.emit(TransportEvent::Errored(TransportError::Connect(format!(
                "connection task failed: {}",
                e
            ))));
            events.emit(TransportEvent::Closed(None));
        }
    }
}

async fn run_connection(
    request: Request,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: TransportEvents,
) {
    let connection = events.connection();
    let uri = request.uri().clone();
    tracing::debug!("[{}] Connecting to {}", connection, uri);

    let connecting = tokio_tungstenite::connect_async(request);
    tokio::pin!(connecting);

    let stream = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok((stream, _response)) => break stream,
                Err(e) => {
                    tracing::debug!("[{}] Handshake with {} failed: {}", connection, uri, e);
                    events.emit(TransportEvent::Errored(TransportError::Connect(e.to_string())));
                    events.emit(TransportEvent::Closed(None));
                    return;
                }
            },
            request = outbound.recv() => match request {
                Some(Outbound::Frame(_)) => {
                    tracing::debug!("[{}] Dropping frame queued before open", connection);
                }
                Some(Outbound::Close) | None => {
                    tracing::debug!("[{}] Closed before the handshake finished", connection);
                    events.emit(TransportEvent::Closed(None));
                    return;
                }
            },
        }
    };

    if !events.emit(TransportEvent::Opened) {
        return;
    }

    let (mut sink, mut stream) = stream.split();
    let mut closing = false;
    let mut reason = None;

    // Once either side starts the close handshake, keep reading until the
    // stream ends so tungstenite can flush its close reply.
    loop {
        tokio::select! {
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    events.emit(TransportEvent::Received(Bytes::from(text)));
                }
                Some(Ok(Message::Binary(data))) => {
                    events.emit(TransportEvent::Received(Bytes::from(data)));
                }
                Some(Ok(Message::Close(frame))) => {
                    reason = frame.map(|f| CloseReason::new(f.code.into(), f.reason.into_owned()));
                    closing = true;
                }
                // Ping/pong are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    if !closing {
                        events.emit(TransportEvent::Errored(TransportError::Io(e.to_string())));
                    }
                    break;
                }
                None => break,
            },
            request = outbound.recv(), if !closing => match request {
                Some(Outbound::Frame(frame)) => {
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        events.emit(TransportEvent::Errored(TransportError::Io(e.to_string())));
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    tracing::debug!("[{}] Sending close frame", connection);
                    closing = true;
                    if sink.send(Message::Close(None)).await.is_err() {
                        break;
                    }
                }
            },
        }
    }

    match &reason {
        Some(reason) => tracing::debug!("[{}] Connection closed ({})", connection, reason),
        None => tracing::debug!("[{}] Connection closed", connection),
    }
    events.emit(TransportEvent::Closed(reason));
}
