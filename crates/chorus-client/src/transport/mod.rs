//! Transport implementations

mod websocket;

pub use websocket::WebSocketTransport;
