//! Transport layer module.

#[cfg(target_os = "linux")]
pub mod i2c;
pub mod mock;
pub mod serial;
pub mod traits;

#[cfg(target_os = "linux")]
pub use i2c::I2cTransport;
pub use mock::{MockOp, MockTransport};
pub use serial::{PortInfo, SerialTransport, list_ports};
pub use traits::{EzoTransport, LinkKind, TransportError};

use crate::protocol::Address;
use crate::session::LinkConfig;

/// The closed set of real transports, chosen from configuration.
pub enum Link {
    #[cfg(target_os = "linux")]
    I2c(I2cTransport),
    Serial(SerialTransport),
}

impl Link {
    /// Open the link described by `config`.
    pub fn open(config: &LinkConfig) -> Result<Self, crate::EzoError> {
        match config {
            #[cfg(target_os = "linux")]
            LinkConfig::I2c { bus, address } => {
                let address = Address::new(*address)?;
                Ok(Link::I2c(I2cTransport::open(*bus, address)?))
            }
            #[cfg(not(target_os = "linux"))]
            LinkConfig::I2c { .. } => Err(TransportError::Unsupported("i2c-dev requires Linux").into()),
            LinkConfig::Serial { port, baud_rate } => {
                Ok(Link::Serial(SerialTransport::open(port, *baud_rate)?))
            }
            LinkConfig::Ftdi {
                serial_number,
                baud_rate,
            } => Ok(Link::Serial(SerialTransport::open_ftdi(
                serial_number,
                *baud_rate,
            )?)),
        }
    }

    fn inner(&self) -> &dyn EzoTransport {
        match self {
            #[cfg(target_os = "linux")]
            Link::I2c(t) => t,
            Link::Serial(t) => t,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn EzoTransport {
        match self {
            #[cfg(target_os = "linux")]
            Link::I2c(t) => t,
            Link::Serial(t) => t,
        }
    }
}

impl EzoTransport for Link {
    fn kind(&self) -> LinkKind {
        self.inner().kind()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.inner_mut().write(data)
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        self.inner_mut().read(max_len)
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        self.inner_mut().discard_input()
    }

    fn address(&self) -> Option<Address> {
        self.inner().address()
    }

    fn set_address(&mut self, address: Address) -> Result<(), TransportError> {
        self.inner_mut().set_address(address)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.inner_mut().close()
    }

    fn describe(&self) -> String {
        self.inner().describe()
    }
}
