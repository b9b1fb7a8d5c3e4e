//! I2C bus scan.
//!
//! Each candidate address is selected and probed with a one-byte read. Any
//! transport error counts as "nobody home", so a transient bus fault hides a
//! device for that scan.

use tracing::{info, instrument, warn};

use crate::error::EzoError;
use crate::events::{EzoEvent, EzoObserver};
use crate::poll::CancelToken;
use crate::protocol::Address;
use crate::transport::{EzoTransport, LinkKind, TransportError};

/// Puts the saved address back, on the normal path via [`restore`] or on
/// unwind via `Drop`.
///
/// [`restore`]: RestoreAddress::restore
struct RestoreAddress<'a, T: EzoTransport + ?Sized> {
    transport: &'a mut T,
    saved: Address,
    restored: bool,
}

impl<T: EzoTransport + ?Sized> RestoreAddress<'_, T> {
    fn restore(mut self) -> Result<(), TransportError> {
        self.restored = true;
        self.transport.set_address(self.saved)
    }
}

impl<T: EzoTransport + ?Sized> Drop for RestoreAddress<'_, T> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = self.transport.set_address(self.saved) {
            warn!(address = %self.saved, error = %e, "Failed to restore address after scan");
        }
    }
}

/// Probe all addresses in ascending order and return those that answered.
///
/// The transport is re-addressed to whatever it pointed at before the scan,
/// on every exit path. A cancelled scan returns what it found so far.
#[instrument(skip_all)]
pub fn scan<T, O>(
    transport: &mut T,
    observer: &O,
    cancel: Option<&CancelToken>,
) -> Result<Vec<Address>, EzoError>
where
    T: EzoTransport + ?Sized,
    O: EzoObserver + ?Sized,
{
    if transport.kind() != LinkKind::AddressedBus {
        return Err(EzoError::NotAddressable);
    }
    let saved = transport.address().ok_or(EzoError::NotAddressable)?;

    let mut guard = RestoreAddress {
        transport,
        saved,
        restored: false,
    };
    let mut found = Vec::new();

    for candidate in Address::all() {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            info!(next = %candidate, "Scan cancelled");
            break;
        }

        let present = probe(&mut *guard.transport, candidate);
        observer.on_event(&EzoEvent::Probe {
            address: candidate.get(),
            present,
        });
        if present {
            found.push(candidate);
        }
    }

    guard.restore()?;
    observer.on_event(&EzoEvent::ScanComplete {
        found: found.iter().map(|a| a.get()).collect(),
    });
    Ok(found)
}

fn probe<T: EzoTransport + ?Sized>(transport: &mut T, candidate: Address) -> bool {
    transport
        .set_address(candidate)
        .and_then(|_| transport.read(1))
        .is_ok()
}
