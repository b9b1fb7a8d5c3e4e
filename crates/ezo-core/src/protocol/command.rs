//! Validated outbound command text.

use std::fmt;

use super::constants::{I2C_TERMINATOR, SERIAL_TERMINATOR};
use crate::error::EzoError;

/// An immutable command, guaranteed to be Latin-1 and free of terminator bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
}

impl Command {
    pub fn new(text: impl Into<String>) -> Result<Self, EzoError> {
        let text = text.into();
        let invalid = |reason: &str| EzoError::InvalidCommand {
            command: text.clone(),
            reason: reason.to_string(),
        };

        if let Some(c) = text.chars().find(|&c| u32::from(c) > 0xFF) {
            return Err(invalid(&format!("character {c:?} is outside Latin-1")));
        }
        if text.bytes().any(|b| b == I2C_TERMINATOR || b == SERIAL_TERMINATOR) {
            return Err(invalid("contains a terminator byte"));
        }

        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Latin-1 encoding. Every char fits in one byte after validation.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.text.chars().map(|c| c as u8).collect()
    }

    /// Case-insensitive ASCII prefix test.
    pub fn starts_with_ignore_case(&self, prefix: &str) -> bool {
        let (text, prefix) = (self.text.as_bytes(), prefix.as_bytes());
        text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Decode bytes as Latin-1 text.
pub fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
