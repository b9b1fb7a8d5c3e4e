//! Mock transport for testing.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{EzoTransport, LinkKind, TransportError};
use crate::protocol::Address;
use crate::protocol::constants::{DEFAULT_ADDRESS, STATUS_NO_DATA};

/// Operations seen by the mock, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOp {
    SetAddress(u8),
    Write(Vec<u8>),
    Read(usize),
    Discard,
    Close,
}

#[derive(Debug)]
struct MockState {
    kind: LinkKind,
    address: Option<Address>,
    /// Addresses that answer on the bus.
    present: BTreeSet<u8>,
    /// Replies released by the next write.
    replies: VecDeque<Vec<u8>>,
    /// Bus: frames ready to read.
    frames: VecDeque<Vec<u8>>,
    /// Serial: bytes ready to read.
    stream: VecDeque<u8>,
    ops: Vec<MockOp>,
    closed: bool,
}

/// Mock transport for unit testing session and scanner logic.
///
/// Clones share state, so a test keeps one handle for inspection while the
/// session owns the other.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    fn with_kind(kind: LinkKind, address: Option<Address>, present: &[u8]) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                kind,
                address,
                present: present.iter().copied().collect(),
                replies: VecDeque::new(),
                frames: VecDeque::new(),
                stream: VecDeque::new(),
                ops: Vec::new(),
                closed: false,
            })),
        }
    }

    /// An I2C bus with devices at `present`, addressed at the default address.
    pub fn bus(present: &[u8]) -> Self {
        Self::with_kind(
            LinkKind::AddressedBus,
            Some(Address::default()),
            present,
        )
    }

    /// A point-to-point serial link.
    pub fn serial() -> Self {
        Self::with_kind(LinkKind::SerialStream, None, &[])
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Queue the device's answer to the next command written.
    pub fn queue_reply(&self, bytes: &[u8]) {
        self.lock().replies.push_back(bytes.to_vec());
    }

    /// Put bytes in the serial input buffer right away, as if left over.
    pub fn inject_stale(&self, bytes: &[u8]) {
        self.lock().stream.extend(bytes.iter().copied());
    }

    /// Add or remove a device from the simulated bus.
    pub fn set_present(&self, address: u8, present: bool) {
        let mut state = self.lock();
        if present {
            state.present.insert(address);
        } else {
            state.present.remove(&address);
        }
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                MockOp::Write(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn ops(&self) -> Vec<MockOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }

    pub fn read_count(&self) -> usize {
        self.lock()
            .ops
            .iter()
            .filter(|op| matches!(op, MockOp::Read(_)))
            .count()
    }

    /// Bytes still waiting in the serial input buffer.
    pub fn pending_input(&self) -> usize {
        self.lock().stream.len()
    }

    pub fn current_address(&self) -> Option<u8> {
        self.lock().address.map(Address::get)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl MockState {
    fn check_open(&self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "mock closed",
            )));
        }
        Ok(())
    }

    fn check_peer(&self) -> Result<(), TransportError> {
        match self.address {
            Some(addr) if !self.present.contains(&addr.get()) => {
                Err(TransportError::NoSuchDevice {
                    address: addr.get(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl EzoTransport for MockTransport {
    fn kind(&self) -> LinkKind {
        self.lock().kind
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.lock();
        state.check_open()?;
        state.ops.push(MockOp::Write(data.to_vec()));
        state.check_peer()?;

        if let Some(reply) = state.replies.pop_front() {
            match state.kind {
                LinkKind::AddressedBus => state.frames.push_back(reply),
                LinkKind::SerialStream => state.stream.extend(reply),
            }
        }
        Ok(data.len())
    }

    fn read(&mut self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.lock();
        state.check_open()?;
        state.ops.push(MockOp::Read(max_len));
        state.check_peer()?;

        match state.kind {
            LinkKind::AddressedBus => {
                // A present device with nothing to say reports "no data"
                let mut frame = state
                    .frames
                    .pop_front()
                    .unwrap_or_else(|| vec![STATUS_NO_DATA]);
                frame.resize(max_len, 0);
                Ok(frame)
            }
            LinkKind::SerialStream => {
                let n = max_len.min(state.stream.len());
                Ok(state.stream.drain(..n).collect())
            }
        }
    }

    fn discard_input(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.check_open()?;
        state.ops.push(MockOp::Discard);
        state.stream.clear();
        Ok(())
    }

    fn address(&self) -> Option<Address> {
        self.lock().address
    }

    fn set_address(&mut self, address: Address) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.check_open()?;
        if state.kind != LinkKind::AddressedBus {
            return Err(TransportError::Unsupported("set_address"));
        }
        state.ops.push(MockOp::SetAddress(address.get()));
        state.address = Some(address);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        if !state.closed {
            state.ops.push(MockOp::Close);
            state.closed = true;
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match self.lock().address {
            Some(addr) => format!("mock-bus @ {addr}"),
            None => "mock-serial".to_string(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::bus(&[DEFAULT_ADDRESS])
    }
}
