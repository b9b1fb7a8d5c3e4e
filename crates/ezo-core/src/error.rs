//! Crate-level error type.

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum EzoError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid command {command:?}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Invalid address {0}: must be in 0..=127")]
    InvalidAddress(u8),

    #[error("Link has no address (serial sessions talk to a single peer)")]
    NotAddressable,

    #[error("Device reported error status {}", fmt_code(.0))]
    DeviceStatus(Option<u8>),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

fn fmt_code(code: &Option<u8>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "(none)".into(),
    }
}
