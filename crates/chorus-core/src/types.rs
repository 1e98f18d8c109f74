//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of the session's single connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionPhase {
    /// No transport is open
    #[default]
    Disconnected,
    /// Transport requested, waiting for it to open
    Connecting,
    /// Transport open and handshake sent
    Connected,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionPhase::Disconnected => write!(f, "disconnected"),
            ConnectionPhase::Connecting => write!(f, "connecting"),
            ConnectionPhase::Connected => write!(f, "connected"),
        }
    }
}

/// Why a transport closed, as reported by the peer or the local side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    /// Close status code (1000 = normal, 1005 = none given)
    pub code: u16,
    /// Human-readable reason, possibly empty
    pub reason: String,
}

impl CloseReason {
    /// Create a new close reason
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "code {}", self.code)
        } else {
            write!(f, "code {}: {}", self.code, self.reason)
        }
    }
}
