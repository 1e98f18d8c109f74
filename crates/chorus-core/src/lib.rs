//! chorus-core: Core abstractions and configuration for Chorus
//!
//! This crate provides the error taxonomy, the transport seam, and the
//! construction-time configuration shared by the client engine and binary.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::ChorusError;
pub use types::{CloseReason, ConnectionPhase};
