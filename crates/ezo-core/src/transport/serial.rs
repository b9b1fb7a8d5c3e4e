//! UART and FTDI transport built on `serialport`.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info, instrument};

use super::traits::{EzoTransport, LinkKind, TransportError, open_error};
use crate::protocol::constants::{FTDI_VENDOR_ID, SERIAL_POLL_TIMEOUT_MS};

/// A serial port visible to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial_number: Option<String>,
    pub product: Option<String>,
}

impl PortInfo {
    pub fn is_ftdi(&self) -> bool {
        self.vendor_id == Some(FTDI_VENDOR_ID)
    }
}

/// Enumerate serial ports with their USB metadata.
pub fn list_ports() -> Result<Vec<PortInfo>, TransportError> {
    let ports = serialport::available_ports().map_err(map_serial_error)?;
    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => PortInfo {
                name: p.port_name,
                vendor_id: Some(usb.vid),
                product_id: Some(usb.pid),
                serial_number: usb.serial_number,
                product: usb.product,
            },
            _ => PortInfo {
                name: p.port_name,
                vendor_id: None,
                product_id: None,
                serial_number: None,
                product: None,
            },
        })
        .collect())
}

/// Serial transport for EZO devices in UART mode.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    name: String,
}

impl SerialTransport {
    /// Open a port at `baud_rate`, 8N1, no flow control.
    #[instrument(level = "info")]
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(SERIAL_POLL_TIMEOUT_MS))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::NotFound { path: path.into() },
                serialport::ErrorKind::Io(kind) => open_error(path, io::Error::new(kind, e.description)),
                _ => map_serial_error(e),
            })?;

        info!(port = %path, baud_rate, "Serial port opened");
        Ok(Self {
            port: Some(port),
            name: path.to_string(),
        })
    }

    /// Open the FTDI bridge whose USB serial number is `serial_number`.
    #[instrument(level = "info")]
    pub fn open_ftdi(serial_number: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let port = list_ports()?
            .into_iter()
            .find(|p| p.is_ftdi() && p.serial_number.as_deref() == Some(serial_number))
            .ok_or_else(|| TransportError::NotFound {
                path: format!("FTDI serial number {serial_number}"),
            })?;

        info!(port = %port.name, serial_number, "Found FTDI bridge");
        Self::open(&port.name, baud_rate)
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or_else(|| {
            TransportError::Io(io::Error::new(io::ErrorKind::NotConnected, "port closed"))
        })
    }
}

impl EzoTransport for SerialTransport {
    fn kind(&self) -> LinkKind {
        LinkKind::SerialStream
    }

    #[instrument(skip(self, data), fields(len = data.len(), port = %self.name))]
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let port = self.port()?;
        port.write_all(data)?;
        port.flush()?;
        debug!(bytes_written = data.len(), "Write complete");
        Ok(data.len())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max_len];
        match self.port()?.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.port()?
            .clear(ClearBuffer::Input)
            .map_err(map_serial_error)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.port.take().is_some() {
            debug!(port = %self.name, "Serial port closed");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

fn map_serial_error(e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::Io(kind) => TransportError::Io(io::Error::new(kind, e.description)),
        _ => TransportError::Io(io::Error::other(e.description)),
    }
}
