//! Linux i2c-dev transport.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;

use tracing::{debug, info, instrument};

use super::traits::{EzoTransport, LinkKind, TransportError, open_error};
use crate::protocol::Address;
use crate::protocol::constants::I2C_SLAVE;

/// I2C transport over `/dev/i2c-<bus>`.
pub struct I2cTransport {
    file: Option<File>,
    path: String,
    address: Address,
}

impl I2cTransport {
    /// Open the bus device and select `address`.
    #[instrument(level = "info", skip(address), fields(address = %address))]
    pub fn open(bus: u8, address: Address) -> Result<Self, TransportError> {
        let path = format!("/dev/i2c-{bus}");
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| open_error(&path, e))?;

        let mut transport = Self {
            file: Some(file),
            path,
            address,
        };
        transport.set_address(address)?;

        info!(path = %transport.path, address = %address, "I2C bus opened");
        Ok(transport)
    }

    fn file(&mut self) -> Result<&mut File, TransportError> {
        self.file.as_mut().ok_or_else(|| {
            TransportError::Io(io::Error::new(io::ErrorKind::NotConnected, "bus closed"))
        })
    }

    /// Absent peers surface as ENXIO/EREMOTEIO from the adapter.
    fn transfer_error(&self, e: io::Error) -> TransportError {
        match e.raw_os_error() {
            Some(libc::ENXIO) | Some(libc::EREMOTEIO) | Some(libc::ENODEV) => {
                TransportError::NoSuchDevice {
                    address: self.address.get(),
                }
            }
            Some(libc::EBUSY) => TransportError::Busy(self.path.clone()),
            _ => TransportError::Io(e),
        }
    }
}

impl EzoTransport for I2cTransport {
    fn kind(&self) -> LinkKind {
        LinkKind::AddressedBus
    }

    #[instrument(skip(self, data), fields(len = data.len(), address = %self.address))]
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let result = self.file()?.write_all(data);
        result.map_err(|e| self.transfer_error(e))?;
        debug!(bytes_written = data.len(), "Write complete");
        Ok(data.len())
    }

    #[instrument(skip(self), fields(address = %self.address))]
    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; max_len];
        let result = self.file()?.read(&mut buf);
        let n = result.map_err(|e| self.transfer_error(e))?;
        buf.truncate(n);
        debug!(bytes_read = n, "Read complete");
        Ok(buf)
    }

    fn address(&self) -> Option<Address> {
        Some(self.address)
    }

    fn set_address(&mut self, address: Address) -> Result<(), TransportError> {
        let fd = self.file()?.as_raw_fd();
        // SAFETY: fd is an open i2c-dev descriptor; I2C_SLAVE takes the
        // address by value.
        let rc = unsafe { libc::ioctl(fd, I2C_SLAVE as _, libc::c_ulong::from(address.get())) };
        if rc < 0 {
            return Err(self.transfer_error(io::Error::last_os_error()));
        }
        self.address = address;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.file.take().is_some() {
            debug!(path = %self.path, "I2C bus closed");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} @ {}", self.path, self.address)
    }
}
