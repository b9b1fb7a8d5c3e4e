//! EZO Session - command/response exchange with one device.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::EzoError;
use crate::poll::CancelToken;
use crate::events::{EzoEvent, EzoObserver, PacketDirection, SessionState, TracingObserver};
use crate::protocol::constants::*;
use crate::protocol::{Address, Command, DeviceInfo, Framer, Outcome, TimingPolicy};
use crate::scanner;
use crate::transport::{EzoTransport, Link, LinkKind, TransportError};

/// Which physical link to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkConfig {
    /// `/dev/i2c-<bus>`, peer at `address`.
    I2c {
        #[serde(default = "default_bus")]
        bus: u8,
        #[serde(default = "default_address")]
        address: u8,
    },
    /// Native UART or any serial device node.
    Serial {
        port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
    /// FTDI USB bridge located by its serial number.
    Ftdi {
        serial_number: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
    },
}

fn default_bus() -> u8 {
    DEFAULT_BUS
}

fn default_address() -> u8 {
    DEFAULT_ADDRESS
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig::I2c {
            bus: DEFAULT_BUS,
            address: DEFAULT_ADDRESS,
        }
    }
}

/// Configuration for an EZO session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Settle time for readings and calibrations, in ms.
    pub long_timeout_ms: u64,
    /// Settle time for every other command, in ms.
    pub short_timeout_ms: u64,
    /// Bytes requested per I2C response read.
    pub read_len: usize,
    /// Wall-clock budget for one serial response line, in ms.
    pub serial_read_budget_ms: u64,
    /// Free-form device name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Sensor module type, e.g. "pH".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub link: LinkConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            long_timeout_ms: LONG_TIMEOUT_MS,
            short_timeout_ms: SHORT_TIMEOUT_MS,
            read_len: I2C_READ_LEN,
            serial_read_budget_ms: SERIAL_READ_BUDGET_MS,
            name: None,
            module: None,
            link: LinkConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn timing(&self) -> TimingPolicy {
        TimingPolicy::new(
            Duration::from_millis(self.long_timeout_ms),
            Duration::from_millis(self.short_timeout_ms),
        )
    }
}

/// EZO Session - owns one transport and runs queries over it.
///
/// The transport is closed when the session is closed or dropped, whichever
/// comes first.
pub struct EzoSession<T: EzoTransport, O: EzoObserver = TracingObserver> {
    transport: T,
    observer: Arc<O>,
    framer: Framer,
    timing: TimingPolicy,
    read_len: usize,
    read_budget: Duration,
    state: SessionState,
    name: Option<String>,
    module: Option<String>,
    closed: bool,
}

impl EzoSession<Link, TracingObserver> {
    /// Open the configured link and start a session on it.
    pub fn open(config: &SessionConfig) -> Result<Self, EzoError> {
        let link = Link::open(&config.link)?;
        Ok(Self::new(link, config))
    }
}

impl<T: EzoTransport> EzoSession<T, TracingObserver> {
    /// Create a session over an open transport with the tracing observer.
    pub fn new(transport: T, config: &SessionConfig) -> Self {
        Self::with_observer(transport, config, Arc::new(TracingObserver))
    }
}

impl<T: EzoTransport, O: EzoObserver> EzoSession<T, O> {
    /// Create a session with a custom observer.
    pub fn with_observer(transport: T, config: &SessionConfig, observer: Arc<O>) -> Self {
        let framer = Framer::for_kind(transport.kind());
        observer.on_event(&EzoEvent::LinkOpened {
            link: transport.describe(),
        });
        Self {
            transport,
            observer,
            framer,
            timing: config.timing(),
            read_len: config.read_len,
            read_budget: Duration::from_millis(config.serial_read_budget_ms),
            state: SessionState::Idle,
            name: config.name.clone(),
            module: config.module.clone(),
            closed: false,
        }
    }

    /// Write `command`, wait its settle time, read and decode the reply.
    ///
    /// Sleep commands are written but never read back: reading would wake
    /// the device. They return [`Outcome::Sleeping`] straight away.
    #[instrument(skip(self), fields(link = %self.transport.describe()))]
    pub fn query(&mut self, command: &str) -> Result<Outcome, EzoError> {
        let command = Command::new(command)?;
        let class = self.timing.classify(&command);

        if self.framer == Framer::SerialStream {
            self.transport.discard_input()?;
        }

        let frame = self.framer.encode(&command);
        self.io().write(&frame)?;
        self.emit(EzoEvent::CommandSent {
            command: command.to_string(),
            class,
        });

        let Some(settle) = self.timing.settle_time(class) else {
            self.emit(EzoEvent::Response {
                command: command.to_string(),
                outcome: Outcome::Sleeping,
            });
            return Ok(Outcome::Sleeping);
        };

        self.set_state(SessionState::AwaitingResponse);
        let result = self.await_response(settle);
        self.set_state(SessionState::Idle);

        let outcome = result?;
        self.emit(EzoEvent::Response {
            command: command.to_string(),
            outcome: outcome.clone(),
        });
        Ok(outcome)
    }

    fn await_response(&mut self, settle: Duration) -> Result<Outcome, EzoError> {
        thread::sleep(settle);

        let framer = self.framer;
        let (read_len, budget) = (self.read_len, self.read_budget);
        let raw = framer.read_frame(&mut self.io(), read_len, budget)?;
        let decoded = framer.decode(&raw);
        Ok(framer.interpret(&decoded))
    }

    /// Re-target the session. Presence is only checked by the next transfer.
    pub fn set_address(&mut self, address: Address) -> Result<(), EzoError> {
        if self.transport.kind() != LinkKind::AddressedBus {
            return Err(EzoError::NotAddressable);
        }
        let from = self.transport.address();
        self.transport.set_address(address)?;
        self.emit(EzoEvent::AddressChanged {
            from: from.map(Address::get),
            to: address.get(),
        });
        Ok(())
    }

    pub fn address(&self) -> Option<Address> {
        self.transport.address()
    }

    /// Probe every bus address and list the ones that answer.
    pub fn scan(&mut self) -> Result<Vec<Address>, EzoError> {
        scanner::scan(&mut self.transport, self.observer.as_ref(), None)
    }

    /// [`scan`](Self::scan) that stops early once `cancel` is set.
    pub fn scan_with_cancel(&mut self, cancel: &CancelToken) -> Result<Vec<Address>, EzoError> {
        scanner::scan(&mut self.transport, self.observer.as_ref(), Some(cancel))
    }

    /// Ask the device what it is (`I` command).
    pub fn device_info(&mut self) -> Result<DeviceInfo, EzoError> {
        match self.query(INFO_COMMAND)? {
            Outcome::Success(payload) => DeviceInfo::parse(&payload),
            Outcome::Error(code) => Err(EzoError::DeviceStatus(code)),
            Outcome::Sleeping => Err(EzoError::UnexpectedResponse("sleep mode".into())),
        }
    }

    /// "<module> <address> <name>", skipping parts that are not set.
    pub fn device_label(&self) -> String {
        let address = self.address().map(|a| a.to_string());
        let parts: Vec<&str> = [self.module.as_deref(), address.as_deref(), self.name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            self.transport.describe()
        } else {
            parts.join(" ")
        }
    }

    pub fn link_kind(&self) -> LinkKind {
        self.transport.kind()
    }

    pub fn timing(&self) -> &TimingPolicy {
        &self.timing
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Close the transport now and surface any error doing so.
    pub fn close(mut self) -> Result<(), EzoError> {
        self.shutdown().map_err(EzoError::from)
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transport.close()?;
        self.emit(EzoEvent::LinkClosed);
        Ok(())
    }

    fn io(&mut self) -> ObservableTransport<'_, T, O> {
        ObservableTransport {
            inner: &mut self.transport,
            observer: self.observer.as_ref(),
        }
    }

    fn set_state(&mut self, to: SessionState) {
        if self.state != to {
            let from = self.state;
            self.state = to;
            self.emit(EzoEvent::StateChanged { from, to });
        }
    }

    fn emit(&self, event: EzoEvent) {
        self.observer.on_event(&event);
    }
}

impl<T: EzoTransport, O: EzoObserver> Drop for EzoSession<T, O> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "Failed to close transport");
        }
    }
}

/// Transport wrapper that emits packet events.
struct ObservableTransport<'a, T: EzoTransport, O: EzoObserver> {
    inner: &'a mut T,
    observer: &'a O,
}

impl<T: EzoTransport, O: EzoObserver> EzoTransport for ObservableTransport<'_, T, O> {
    fn kind(&self) -> LinkKind {
        self.inner.kind()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let res = self.inner.write(data);
        if res.is_ok() {
            self.observer.on_event(&EzoEvent::Packet {
                direction: PacketDirection::Tx,
                length: data.len(),
                data: data.to_vec(),
            });
        }
        res
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let res = self.inner.read(max_len);
        if let Ok(data) = &res
            && !data.is_empty()
        {
            self.observer.on_event(&EzoEvent::Packet {
                direction: PacketDirection::Rx,
                length: data.len(),
                data: data.clone(),
            });
        }
        res
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        debug!("Discarding stale input");
        self.inner.discard_input()
    }

    fn address(&self) -> Option<Address> {
        self.inner.address()
    }

    fn set_address(&mut self, address: Address) -> Result<(), TransportError> {
        self.inner.set_address(address)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.inner.close()
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::events::tests::RecordingObserver;
    use crate::transport::{MockOp, MockTransport};
    use std::time::Instant;

    fn fast_config() -> SessionConfig {
        SessionConfig {
            long_timeout_ms: 20,
            short_timeout_ms: 5,
            serial_read_budget_ms: 50,
            ..Default::default()
        }
    }

    fn bus_session(mock: &MockTransport) -> EzoSession<MockTransport, NullObserver> {
        EzoSession::with_observer(mock.clone(), &fast_config(), Arc::new(NullObserver))
    }

    #[test]
    fn test_query_success() {
        let mock = MockTransport::bus(&[98]);
        mock.queue_reply(&[1, b'7', b'.', b'0', b'2']);
        let mut session = bus_session(&mock);

        let outcome = session.query("R").unwrap();
        assert_eq!(outcome, Outcome::Success("7.02".into()));
        assert_eq!(
            mock.ops(),
            vec![MockOp::Write(b"R\0".to_vec()), MockOp::Read(I2C_READ_LEN)]
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_query_waits_settle_time() {
        let mock = MockTransport::bus(&[98]);
        let mut session = bus_session(&mock);

        let start = Instant::now();
        session.query("Cal,mid,7.00").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));

        let start = Instant::now();
        session.query("Status").unwrap();
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_sleep_never_reads() {
        let mock = MockTransport::bus(&[98]);
        let mut session = bus_session(&mock);

        assert_eq!(session.query("Sleep").unwrap(), Outcome::Sleeping);
        assert_eq!(mock.read_count(), 0);
        assert_eq!(mock.get_writes(), vec![b"Sleep\0".to_vec()]);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_error_status() {
        let mock = MockTransport::bus(&[98]);
        mock.queue_reply(&[2]);
        mock.queue_reply(&[254]);
        let mut session = bus_session(&mock);

        assert_eq!(session.query("X").unwrap(), Outcome::Error(Some(2)));
        assert_eq!(session.query("R").unwrap(), Outcome::Error(Some(254)));
        // Nothing queued: the device reports no data
        assert_eq!(session.query("R").unwrap(), Outcome::Error(Some(255)));
    }

    #[test]
    fn test_high_bit_glitch_corrected() {
        let mock = MockTransport::bus(&[98]);
        mock.queue_reply(&[1, b'9' | 0x80, b'.' | 0x80, b'1']);
        let mut session = bus_session(&mock);

        assert_eq!(session.query("R").unwrap(), Outcome::Success("9.1".into()));
    }

    #[test]
    fn test_invalid_command_not_sent() {
        let mock = MockTransport::bus(&[98]);
        let mut session = bus_session(&mock);

        assert!(matches!(
            session.query("R\r"),
            Err(EzoError::InvalidCommand { .. })
        ));
        assert!(mock.ops().is_empty());
    }

    #[test]
    fn test_absent_device_is_io_error() {
        let mock = MockTransport::bus(&[98]);
        let mut session = bus_session(&mock);

        session.set_address(Address::new(99).unwrap()).unwrap();
        assert_eq!(mock.current_address(), Some(99));
        let err = session.query("R").unwrap_err();
        assert!(matches!(
            err,
            EzoError::Transport(TransportError::NoSuchDevice { address: 99 })
        ));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_serial_query() {
        let mock = MockTransport::serial();
        mock.inject_stale(b"*OK\r");
        mock.queue_reply(b"8.34\r*OK\r");
        let mut session =
            EzoSession::with_observer(mock.clone(), &fast_config(), Arc::new(NullObserver));

        assert_eq!(session.query("R").unwrap(), Outcome::Success("8.34".into()));
        assert_eq!(mock.get_writes(), vec![b"R\r".to_vec()]);
        assert_eq!(mock.ops()[0], MockOp::Discard);
    }

    #[test]
    fn test_serial_query_skips_wake_event() {
        let mock = MockTransport::serial();
        mock.queue_reply(b"*WA\r7.00\r*OK\r");
        let mut session =
            EzoSession::with_observer(mock.clone(), &fast_config(), Arc::new(NullObserver));

        assert_eq!(session.query("R").unwrap(), Outcome::Success("7.00".into()));
    }

    #[test]
    fn test_serial_error_and_timeout() {
        let mock = MockTransport::serial();
        mock.queue_reply(b"*ER\r");
        let mut session =
            EzoSession::with_observer(mock.clone(), &fast_config(), Arc::new(NullObserver));

        assert_eq!(session.query("Bogus").unwrap(), Outcome::Error(Some(2)));

        // No reply at all
        let err = session.query("R").unwrap_err();
        assert!(matches!(
            err,
            EzoError::Transport(TransportError::Timeout { timeout_ms: 50 })
        ));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_serial_not_addressable() {
        let mock = MockTransport::serial();
        let mut session =
            EzoSession::with_observer(mock.clone(), &fast_config(), Arc::new(NullObserver));

        assert_eq!(session.address(), None);
        assert!(matches!(
            session.set_address(Address::default()),
            Err(EzoError::NotAddressable)
        ));
        assert!(matches!(session.scan(), Err(EzoError::NotAddressable)));
    }

    #[test]
    fn test_cancelled_scan_keeps_address() {
        let mock = MockTransport::bus(&[98, 99]);
        let mut session = bus_session(&mock);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(session.scan_with_cancel(&cancel).unwrap().is_empty());
        assert_eq!(mock.current_address(), Some(98));
        assert_eq!(session.scan().unwrap().len(), 2);
    }

    #[test]
    fn test_drop_closes_transport() {
        let mock = MockTransport::bus(&[98]);
        {
            let _session = bus_session(&mock);
        }
        assert!(mock.is_closed());
    }

    #[test]
    fn test_close_is_explicit_and_once() {
        let mock = MockTransport::bus(&[98]);
        let session = bus_session(&mock);
        session.close().unwrap();
        assert!(mock.is_closed());
        assert_eq!(
            mock.ops().iter().filter(|op| **op == MockOp::Close).count(),
            1
        );
    }

    #[test]
    fn test_device_info() {
        let mock = MockTransport::bus(&[98]);
        mock.queue_reply(b"\x01?I,pH,1.98");
        let mut session = bus_session(&mock);

        let info = session.device_info().unwrap();
        assert_eq!(info.device_type, "pH");
        assert_eq!(info.firmware, "1.98");

        mock.queue_reply(&[2]);
        assert!(matches!(
            session.device_info(),
            Err(EzoError::DeviceStatus(Some(2)))
        ));
    }

    #[test]
    fn test_device_label() {
        let mock = MockTransport::bus(&[98]);
        let config = SessionConfig {
            name: Some("tank".into()),
            module: Some("pH".into()),
            ..fast_config()
        };
        let session = EzoSession::with_observer(mock.clone(), &config, Arc::new(NullObserver));
        assert_eq!(session.device_label(), "pH 98 tank");

        let plain = bus_session(&mock);
        assert_eq!(plain.device_label(), "98");

        let serial =
            EzoSession::with_observer(MockTransport::serial(), &fast_config(), Arc::new(NullObserver));
        assert_eq!(serial.device_label(), "mock-serial");
    }

    #[test]
    fn test_events_emitted() {
        let mock = MockTransport::bus(&[98]);
        mock.queue_reply(&[1, b'1']);
        let observer = Arc::new(RecordingObserver::default());
        let mut session = EzoSession::with_observer(mock.clone(), &fast_config(), observer.clone());

        session.query("R").unwrap();
        drop(session);

        let events = observer.events.lock().unwrap();
        assert!(matches!(events.first(), Some(EzoEvent::LinkOpened { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            EzoEvent::Packet {
                direction: PacketDirection::Rx,
                ..
            }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            EzoEvent::Response {
                outcome: Outcome::Success(_),
                ..
            }
        )));
        assert!(matches!(events.last(), Some(EzoEvent::LinkClosed)));
    }

    #[test]
    fn test_config_toml() {
        let config = SessionConfig {
            name: Some("pool".into()),
            link: LinkConfig::Serial {
                port: "/dev/ttyAMA0".into(),
                baud_rate: 9600,
            },
            ..Default::default()
        };
        let text = toml::to_string_pretty(&config).unwrap();
        let back: SessionConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_defaults() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(
            config.link,
            LinkConfig::I2c {
                bus: 1,
                address: 98
            }
        );

        let config: SessionConfig =
            toml::from_str("short_timeout_ms = 500\n[link]\nkind = \"ftdi\"\nserial_number = \"DJ00RU5B\"\n")
                .unwrap();
        assert_eq!(config.short_timeout_ms, 500);
        assert_eq!(
            config.link,
            LinkConfig::Ftdi {
                serial_number: "DJ00RU5B".into(),
                baud_rate: 9600
            }
        );
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("ezo-config-{}.toml", std::process::id()));
        let config = SessionConfig {
            module: Some("EC".into()),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = SessionConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
