//! Event system for UI decoupling.
//!
//! Allows the CLI (or any other front end) to follow protocol activity
//! without tight coupling to the session logic.

use std::fmt;

use crate::protocol::{Outcome, TimeoutClass};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for the next query.
    Idle,
    /// Command written, waiting out the settle time or reading.
    AwaitingResponse,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::AwaitingResponse => write!(f, "Awaiting Response"),
        }
    }
}

/// Events emitted by an EZO session.
#[derive(Debug, Clone)]
pub enum EzoEvent {
    /// Transport opened.
    LinkOpened { link: String },
    /// Command written to the device.
    CommandSent { command: String, class: TimeoutClass },
    /// Session state changed.
    StateChanged { from: SessionState, to: SessionState },
    /// Raw bytes sent or received.
    Packet {
        direction: PacketDirection,
        length: usize,
        data: Vec<u8>,
    },
    /// Decoded outcome of a query.
    Response { command: String, outcome: Outcome },
    /// Peer address changed.
    AddressChanged { from: Option<u8>, to: u8 },
    /// One scan probe finished.
    Probe { address: u8, present: bool },
    /// Scan finished.
    ScanComplete { found: Vec<u8> },
    /// Transport closed.
    LinkClosed,
}

/// Packet direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Host -> Sensor
    Rx, // Sensor -> Host
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Observer trait for receiving session events.
pub trait EzoObserver: Send + Sync {
    fn on_event(&self, event: &EzoEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl EzoObserver for NullObserver {
    fn on_event(&self, _event: &EzoEvent) {}
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl EzoObserver for TracingObserver {
    fn on_event(&self, event: &EzoEvent) {
        match event {
            EzoEvent::LinkOpened { link } => {
                tracing::info!(link = %link, "Link opened");
            }
            EzoEvent::CommandSent { command, class } => {
                tracing::debug!(command = %command, timeout = %class, "Command sent");
            }
            EzoEvent::StateChanged { from, to } => {
                tracing::trace!(from = %from, to = %to, "State changed");
            }
            EzoEvent::Packet {
                direction,
                length,
                data,
            } => {
                tracing::trace!(dir = %direction, len = length, data = ?data, "Packet");
            }
            EzoEvent::Response { command, outcome } => match outcome {
                Outcome::Error(code) => {
                    tracing::warn!(command = %command, code = ?code, "Device reported error")
                }
                _ => tracing::debug!(command = %command, outcome = %outcome, "Response"),
            },
            EzoEvent::AddressChanged { from, to } => {
                tracing::debug!(from = ?from, to = to, "Address changed");
            }
            EzoEvent::Probe { address, present } => {
                tracing::trace!(address = address, present = present, "Probe");
            }
            EzoEvent::ScanComplete { found } => {
                tracing::info!(found = ?found, "Bus scan complete");
            }
            EzoEvent::LinkClosed => {
                tracing::info!("Link closed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Observer that records every event, for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingObserver {
        pub events: Mutex<Vec<EzoEvent>>,
    }

    impl EzoObserver for RecordingObserver {
        fn on_event(&self, event: &EzoEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_recording_observer() {
        let observer = RecordingObserver::default();
        observer.on_event(&EzoEvent::LinkClosed);
        observer.on_event(&EzoEvent::ScanComplete { found: vec![98] });
        assert_eq!(observer.events.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::AwaitingResponse.to_string(), "Awaiting Response");
        assert_eq!(PacketDirection::Rx.to_string(), "RX");
    }
}
