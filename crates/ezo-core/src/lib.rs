//! EZO-Core: command/response protocol for Atlas Scientific EZO sensors.
//!
//! Sends ASCII commands to an EZO device and decodes its reply, over an I2C
//! bus (`/dev/i2c-N`), a native UART, or an FTDI USB-serial bridge.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: constants, command validation, framing, settle-time
//!   policy, status decoding
//! - **Transport**: raw byte I/O abstraction (i2c-dev, serialport, mock)
//! - **Session**: one device, `query(command) -> Outcome`
//! - **Scanner**: I2C address enumeration
//! - **Poll**: repeated readings with external cancellation
//! - **Events**: Observer pattern for UI decoupling
//!
//! # Example
//!
//! ```no_run
//! use ezo_core::session::{EzoSession, SessionConfig};
//!
//! let mut session = EzoSession::open(&SessionConfig::default())?;
//! println!("{}", session.query("R")?);
//! # Ok::<(), ezo_core::EzoError>(())
//! ```

pub mod error;
pub mod events;
pub mod poll;
pub mod protocol;
pub mod scanner;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use error::EzoError;
pub use events::{EzoEvent, EzoObserver, NullObserver, SessionState, TracingObserver};
pub use poll::{CancelToken, PollConfig, poll};
pub use protocol::{Address, Command, DeviceInfo, Framer, Outcome, StatusCode, TimeoutClass, TimingPolicy};
pub use session::{EzoSession, LinkConfig, SessionConfig};
pub use transport::{EzoTransport, Link, LinkKind, MockTransport, PortInfo, SerialTransport, TransportError, list_ports};
#[cfg(target_os = "linux")]
pub use transport::I2cTransport;
