//! Session lifecycle and protocol dispatch

mod controller;
mod events;
mod state;

pub use controller::SessionController;
pub use events::{EventSink, EventStream, SessionEvent};
pub use state::SessionState;

pub(crate) use controller::Request;
