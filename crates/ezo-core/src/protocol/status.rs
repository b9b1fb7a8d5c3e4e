//! Response status codes and decoded outcomes.
//!
//! An I2C response starts with a status byte; only `1` carries a payload.
//! UART responses have no status byte, so lines are mapped separately by
//! [`interpret_line`].

use std::fmt;

use super::command::latin1_to_string;
use super::constants::*;

/// First byte of an I2C response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    Malformed,
    PendingMoreTime,
    NoData,
    Unknown(u8),
}

impl StatusCode {
    pub fn from_u8(code: u8) -> Self {
        match code {
            STATUS_SUCCESS => StatusCode::Success,
            STATUS_MALFORMED => StatusCode::Malformed,
            STATUS_PENDING => StatusCode::PendingMoreTime,
            STATUS_NO_DATA => StatusCode::NoData,
            other => StatusCode::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            StatusCode::Success => STATUS_SUCCESS,
            StatusCode::Malformed => STATUS_MALFORMED,
            StatusCode::PendingMoreTime => STATUS_PENDING,
            StatusCode::NoData => STATUS_NO_DATA,
            StatusCode::Unknown(c) => *c,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Success => write!(f, "success"),
            StatusCode::Malformed => write!(f, "malformed command"),
            StatusCode::PendingMoreTime => write!(f, "still processing"),
            StatusCode::NoData => write!(f, "no data"),
            StatusCode::Unknown(c) => write!(f, "unknown status {c}"),
        }
    }
}

/// Result of one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    /// A sleep command was sent; nothing was read.
    Sleeping,
    /// Device-reported failure. `None` when the response was empty.
    Error(Option<u8>),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Outcome::Success(p) => Some(p),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Success(_) => Some(StatusCode::Success),
            Outcome::Error(code) => code.map(StatusCode::from_u8),
            Outcome::Sleeping => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(p) => write!(f, "Success: {p}"),
            Outcome::Sleeping => write!(f, "Sleep mode"),
            Outcome::Error(Some(c)) => write!(f, "Error {c} ({})", StatusCode::from_u8(*c)),
            Outcome::Error(None) => write!(f, "Error: empty response"),
        }
    }
}

/// Interpret a decoded I2C response (status byte + payload).
pub fn interpret(bytes: &[u8]) -> Outcome {
    let Some((&status, payload)) = bytes.split_first() else {
        return Outcome::Error(None);
    };

    if status != STATUS_SUCCESS {
        return Outcome::Error(Some(status));
    }

    let end = payload
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |i| i + 1);
    Outcome::Success(latin1_to_string(&payload[..end]))
}

/// Interpret one UART response line (terminator already stripped).
pub fn interpret_line(line: &[u8]) -> Outcome {
    if line.is_empty() {
        return Outcome::Error(None);
    }

    let text = latin1_to_string(line);
    match text.as_str() {
        SERIAL_ERROR => Outcome::Error(Some(STATUS_MALFORMED)),
        SERIAL_OK => Outcome::Success(String::new()),
        _ => Outcome::Success(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_strips_trailing_nulls() {
        let outcome = interpret(&[1, 72, 101, 108, 108, 111, 0, 0]);
        assert_eq!(outcome, Outcome::Success("Hello".into()));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(interpret(&[2]), Outcome::Error(Some(2)));
        assert_eq!(interpret(&[254, 0, 0]), Outcome::Error(Some(254)));
        assert_eq!(interpret(&[255]), Outcome::Error(Some(255)));
        assert_eq!(interpret(&[42, b'x']), Outcome::Error(Some(42)));
    }

    #[test]
    fn test_empty_is_unspecified_error() {
        assert_eq!(interpret(&[]), Outcome::Error(None));
        assert_eq!(Outcome::Error(None).status(), None);
    }

    #[test]
    fn test_success_without_payload() {
        assert_eq!(interpret(&[1]), Outcome::Success(String::new()));
        assert_eq!(interpret(&[1, 0, 0, 0]), Outcome::Success(String::new()));
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(StatusCode::from_u8(1), StatusCode::Success);
        assert_eq!(StatusCode::from_u8(2), StatusCode::Malformed);
        assert_eq!(StatusCode::from_u8(254), StatusCode::PendingMoreTime);
        assert_eq!(StatusCode::from_u8(255), StatusCode::NoData);
        assert_eq!(StatusCode::from_u8(7), StatusCode::Unknown(7));
        assert_eq!(StatusCode::Unknown(7).code(), 7);
        assert_eq!(
            Outcome::Error(Some(254)).status(),
            Some(StatusCode::PendingMoreTime)
        );
    }

    #[test]
    fn test_serial_lines() {
        assert_eq!(interpret_line(b"7.02"), Outcome::Success("7.02".into()));
        assert_eq!(interpret_line(b"*OK"), Outcome::Success(String::new()));
        assert_eq!(interpret_line(b"*ER"), Outcome::Error(Some(2)));
        assert_eq!(interpret_line(b"*RS"), Outcome::Success("*RS".into()));
        assert_eq!(interpret_line(b""), Outcome::Error(None));
    }

    #[test]
    fn test_display() {
        assert_eq!(Outcome::Success("7.00".into()).to_string(), "Success: 7.00");
        assert_eq!(
            Outcome::Error(Some(2)).to_string(),
            "Error 2 (malformed command)"
        );
    }
}
