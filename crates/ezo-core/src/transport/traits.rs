//! Transport layer abstraction.
//!
//! Defines the `EzoTransport` trait for raw byte I/O with a sensor,
//! allowing different implementations (I2C, serial, mock).

use std::fmt;
use std::io;

use thiserror::Error;

use crate::protocol::Address;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {path}")]
    NotFound { path: String },

    #[error("No device answering at address {address}")]
    NoSuchDevice { address: u8 },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Device busy: {0}")]
    Busy(String),

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Operation not supported by this link: {0}")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Physical link family. Decides framing and whether addressing applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Register-addressed bus (I2C).
    AddressedBus,
    /// Point-to-point byte stream (UART, FTDI).
    SerialStream,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::AddressedBus => write!(f, "i2c"),
            LinkKind::SerialStream => write!(f, "serial"),
        }
    }
}

/// Abstract sensor transport.
///
/// This trait enables:
/// - Linux `/dev/i2c-N` access
/// - UART and FTDI ports through `serialport`
/// - Mock implementation for unit testing
pub trait EzoTransport {
    fn kind(&self) -> LinkKind;

    /// Write raw bytes.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Read up to `max_len` bytes. Serial links return what arrives within a
    /// short bounded wait, possibly nothing.
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError>;

    /// Drop unread input left over from earlier exchanges.
    fn discard_input(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Currently selected peer, `None` on links without addressing.
    fn address(&self) -> Option<Address> {
        None
    }

    /// Select the peer for following transfers. Does not check presence.
    fn set_address(&mut self, _address: Address) -> Result<(), TransportError> {
        Err(TransportError::Unsupported("set_address"))
    }

    /// Release the underlying handle. Further I/O is an error.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Human-readable identity (device path, port name).
    fn describe(&self) -> String;
}

impl<T: EzoTransport + ?Sized> EzoTransport for Box<T> {
    fn kind(&self) -> LinkKind {
        (**self).kind()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        (**self).write(data)
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(max_len)
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        (**self).discard_input()
    }

    fn address(&self) -> Option<Address> {
        (**self).address()
    }

    fn set_address(&mut self, address: Address) -> Result<(), TransportError> {
        (**self).set_address(address)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Map an OS error from opening `path`.
pub(crate) fn open_error(path: &str, e: io::Error) -> TransportError {
    match e.kind() {
        io::ErrorKind::NotFound => TransportError::NotFound { path: path.into() },
        io::ErrorKind::PermissionDenied => TransportError::PermissionDenied { path: path.into() },
        _ => TransportError::Io(e),
    }
}
