//! Parsing of the `I` (device information) response.

use std::fmt;

use crate::error::EzoError;

/// Reply to `I`, e.g. `?I,pH,1.98`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Sensor type, e.g. `pH`, `EC`, `RTD`.
    pub device_type: String,
    pub firmware: String,
}

impl DeviceInfo {
    pub fn parse(payload: &str) -> Result<Self, EzoError> {
        let mut fields = payload.trim().split(',');
        let header = fields.next().unwrap_or_default();
        if !header.eq_ignore_ascii_case("?I") {
            return Err(EzoError::UnexpectedResponse(format!(
                "expected ?I reply, got {payload:?}"
            )));
        }

        match (fields.next(), fields.next()) {
            (Some(device_type), Some(firmware)) if !device_type.is_empty() => Ok(Self {
                device_type: device_type.to_string(),
                firmware: firmware.to_string(),
            }),
            _ => Err(EzoError::UnexpectedResponse(format!(
                "incomplete ?I reply {payload:?}"
            ))),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (firmware {})", self.device_type, self.firmware)
    }
}
