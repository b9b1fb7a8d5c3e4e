//! Settle-time policy.
//!
//! EZO devices need time to process a command before a response can be read.
//! Readings and calibrations take the long wait, everything else the short
//! one. `SLEEP` is never followed by a read, since reading wakes the device.

use std::fmt;
use std::time::Duration;

use super::command::Command;
use super::constants::{LONG_TIMEOUT_MS, LONG_TIMEOUT_PREFIXES, SHORT_TIMEOUT_MS, SLEEP_PREFIXES};

/// How long to wait after a write before reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    Long,
    Short,
    /// No read follows.
    None,
}

impl fmt::Display for TimeoutClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutClass::Long => write!(f, "long"),
            TimeoutClass::Short => write!(f, "short"),
            TimeoutClass::None => write!(f, "none"),
        }
    }
}

/// Maps commands to settle times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingPolicy {
    pub long: Duration,
    pub short: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            long: Duration::from_millis(LONG_TIMEOUT_MS),
            short: Duration::from_millis(SHORT_TIMEOUT_MS),
        }
    }
}

impl TimingPolicy {
    pub fn new(long: Duration, short: Duration) -> Self {
        Self { long, short }
    }

    pub fn classify(&self, command: &Command) -> TimeoutClass {
        classify(command)
    }

    /// Wait for a class, `None` when no read should happen.
    pub fn settle_time(&self, class: TimeoutClass) -> Option<Duration> {
        match class {
            TimeoutClass::Long => Some(self.long),
            TimeoutClass::Short => Some(self.short),
            TimeoutClass::None => None,
        }
    }
}

/// Classify a command by its case-insensitive prefix.
pub fn classify(command: &Command) -> TimeoutClass {
    let has_prefix = |prefixes: &[&str]| prefixes.iter().any(|p| command.starts_with_ignore_case(p));

    if has_prefix(LONG_TIMEOUT_PREFIXES) {
        TimeoutClass::Long
    } else if has_prefix(SLEEP_PREFIXES) {
        TimeoutClass::None
    } else {
        TimeoutClass::Short
    }
}
