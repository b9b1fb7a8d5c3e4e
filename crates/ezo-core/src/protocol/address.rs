//! Bus address of an EZO device.

use std::fmt;

use super::constants::{DEFAULT_ADDRESS, MAX_ADDRESS};
use crate::error::EzoError;

/// 7-bit I2C address in `0..=127`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u8);

impl Address {
    /// Validate and wrap a raw address.
    pub fn new(raw: u8) -> Result<Self, EzoError> {
        if raw > MAX_ADDRESS {
            return Err(EzoError::InvalidAddress(raw));
        }
        Ok(Self(raw))
    }

    /// Every address a scan visits, ascending.
    pub fn all() -> impl Iterator<Item = Address> {
        (0..=MAX_ADDRESS).map(Address)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Address {
    fn default() -> Self {
        Self(DEFAULT_ADDRESS)
    }
}

impl TryFrom<u8> for Address {
    type Error = EzoError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<Address> for u8 {
    fn from(addr: Address) -> u8 {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
