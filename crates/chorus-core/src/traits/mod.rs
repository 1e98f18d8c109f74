//! Core trait definitions

mod transport;

pub use transport::{ConnectionId, Transport, TransportEvent, TransportEvents};
