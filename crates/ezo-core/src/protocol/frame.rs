//! Byte framing per link kind.
//!
//! I2C commands end in a NUL and responses arrive as a fixed-size block whose
//! payload bytes may have bit 7 set by some single-board-computer bus
//! controllers. UART commands and responses end in a carriage return.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::command::Command;
use super::constants::{I2C_TERMINATOR, SERIAL_ERROR, SERIAL_OK, SERIAL_TERMINATOR};
use super::status::{Outcome, interpret, interpret_line};
use crate::transport::{EzoTransport, LinkKind, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framer {
    AddressedBus,
    SerialStream,
}

impl Framer {
    pub fn for_kind(kind: LinkKind) -> Self {
        match kind {
            LinkKind::AddressedBus => Framer::AddressedBus,
            LinkKind::SerialStream => Framer::SerialStream,
        }
    }

    pub fn terminator(&self) -> u8 {
        match self {
            Framer::AddressedBus => I2C_TERMINATOR,
            Framer::SerialStream => SERIAL_TERMINATOR,
        }
    }

    /// Command bytes followed by the terminator.
    pub fn encode(&self, command: &Command) -> Vec<u8> {
        let mut bytes = command.to_bytes();
        bytes.push(self.terminator());
        bytes
    }

    /// Undo link-level framing of one response.
    ///
    /// On the bus, the status byte is kept as read; every later byte has bit 7
    /// cleared and trailing NUL padding is dropped. A lone terminator is an
    /// empty frame. On a serial link the terminator is removed.
    pub fn decode(&self, raw: &[u8]) -> Vec<u8> {
        match self {
            Framer::AddressedBus => {
                if raw == [I2C_TERMINATOR] {
                    return Vec::new();
                }
                let Some((&status, rest)) = raw.split_first() else {
                    return Vec::new();
                };
                let mut out = Vec::with_capacity(raw.len());
                out.push(status);
                out.extend(rest.iter().map(|b| b & 0x7F));
                while out.len() > 1 && out.last() == Some(&I2C_TERMINATOR) {
                    out.pop();
                }
                out
            }
            Framer::SerialStream => {
                let end = raw
                    .iter()
                    .position(|&b| b == SERIAL_TERMINATOR)
                    .unwrap_or(raw.len());
                raw[..end].to_vec()
            }
        }
    }

    /// Read one raw response frame.
    ///
    /// The bus returns a fixed block in a single read. A serial link is read a
    /// byte at a time until the terminator arrives; if it has not arrived when
    /// `budget` runs out the read fails with [`TransportError::Timeout`].
    /// Unsolicited event lines (`*WA`, `*RS`, ...) are skipped within the same
    /// budget.
    pub fn read_frame<T: EzoTransport + ?Sized>(
        &self,
        transport: &mut T,
        read_len: usize,
        budget: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        match self {
            Framer::AddressedBus => transport.read(read_len),
            Framer::SerialStream => {
                let deadline = Instant::now() + budget;
                let mut line = Vec::new();
                loop {
                    if let Some(&b) = transport.read(1)?.first() {
                        line.push(b);
                        if b == SERIAL_TERMINATOR {
                            if is_event_line(&line) {
                                let event = String::from_utf8_lossy(&line);
                                debug!(event = %event.trim_end(), "Skipping event line");
                                line.clear();
                            } else {
                                trace!(len = line.len(), "Serial line complete");
                                return Ok(line);
                            }
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout {
                            timeout_ms: budget.as_millis() as u64,
                        });
                    }
                }
            }
        }
    }

    /// Turn decoded bytes into an outcome.
    pub fn interpret(&self, decoded: &[u8]) -> Outcome {
        match self {
            Framer::AddressedBus => interpret(decoded),
            Framer::SerialStream => interpret_line(decoded),
        }
    }
}

/// `*`-prefixed lines other than the `*OK`/`*ER` replies are device events.
fn is_event_line(line: &[u8]) -> bool {
    let text = line.strip_suffix(&[SERIAL_TERMINATOR]).unwrap_or(line);
    text.first() == Some(&b'*')
        && text != SERIAL_OK.as_bytes()
        && text != SERIAL_ERROR.as_bytes()
}
