//! chorus-client: Session engine for Chorus collaborative channels
//!
//! The client keeps one socket to a channel server, tracks who is present
//! in the channel, keeps a smoothed estimate of the server clock, and
//! exposes chat, naming and channel selection to its consumer.

pub mod client;
pub mod clock;
pub mod roster;
pub mod session;
pub mod transport;

pub use client::Client;
pub use clock::ClockSynchronizer;
pub use roster::Roster;
pub use session::{EventStream, SessionController, SessionEvent, SessionState};
pub use transport::WebSocketTransport;
