//! Continuous polling with caller-driven cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use crate::error::EzoError;
use crate::events::EzoObserver;
use crate::protocol::constants::{CONTINUOUS_OFF, LONG_TIMEOUT_MS, READ_COMMAND};
use crate::protocol::{Command, Outcome};
use crate::session::EzoSession;
use crate::transport::{EzoTransport, LinkKind};

/// Granularity at which idle time between readings checks for cancellation.
const IDLE_SLICE: Duration = Duration::from_millis(50);

/// Shared stop flag. Set from anywhere (signal handler, another thread); the
/// poll loop and bus scan check it between device transactions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Command sent each round.
    pub command: String,
    /// Time between the starts of consecutive readings.
    pub interval: Duration,
    /// Stop after this many readings.
    pub max_readings: Option<usize>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            command: READ_COMMAND.to_string(),
            interval: Duration::from_millis(LONG_TIMEOUT_MS),
            max_readings: None,
        }
    }
}

/// Query the device repeatedly until cancelled or `max_readings` is reached.
///
/// An interval shorter than the command's settle time is raised to it. On
/// serial links continuous mode is turned off first, so only polled readings
/// come back. Returns the number of readings taken.
#[instrument(skip_all, fields(command = %config.command))]
pub fn poll<T, O, F>(
    session: &mut EzoSession<T, O>,
    config: &PollConfig,
    cancel: &CancelToken,
    mut on_reading: F,
) -> Result<usize, EzoError>
where
    T: EzoTransport,
    O: EzoObserver,
    F: FnMut(&Outcome),
{
    let command = Command::new(config.command.as_str())?;
    let timing = *session.timing();
    let settle = timing
        .settle_time(timing.classify(&command))
        .unwrap_or_default();

    let interval = if config.interval < settle {
        warn!(
            requested_ms = config.interval.as_millis() as u64,
            settle_ms = settle.as_millis() as u64,
            "Polling interval shorter than settle time, using settle time"
        );
        settle
    } else {
        config.interval
    };

    if session.link_kind() == LinkKind::SerialStream {
        session.query(CONTINUOUS_OFF)?;
    }

    info!(interval_ms = interval.as_millis() as u64, "Polling started");
    let mut count = 0;
    while !cancel.is_cancelled() {
        let outcome = session.query(command.as_str())?;
        on_reading(&outcome);
        count += 1;

        if config.max_readings.is_some_and(|max| count >= max) {
            break;
        }
        idle(interval.saturating_sub(settle), cancel);
    }

    info!(readings = count, "Polling stopped");
    Ok(count)
}

fn idle(duration: Duration, cancel: &CancelToken) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline || cancel.is_cancelled() {
            return;
        }
        thread::sleep(IDLE_SLICE.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::session::SessionConfig;
    use crate::transport::MockTransport;

    fn session(mock: &MockTransport) -> EzoSession<MockTransport, NullObserver> {
        let config = SessionConfig {
            long_timeout_ms: 20,
            short_timeout_ms: 5,
            serial_read_budget_ms: 50,
            ..Default::default()
        };
        EzoSession::with_observer(mock.clone(), &config, Arc::new(NullObserver))
    }

    #[test]
    fn test_poll_stops_at_max() {
        let mock = MockTransport::bus(&[98]);
        for reading in [b"7.01", b"7.02", b"7.03"] {
            let mut reply = vec![1];
            reply.extend_from_slice(reading);
            mock.queue_reply(&reply);
        }
        let mut s = session(&mock);
        let config = PollConfig {
            interval: Duration::ZERO,
            max_readings: Some(3),
            ..Default::default()
        };

        let mut seen = Vec::new();
        let count = poll(&mut s, &config, &CancelToken::new(), |o| {
            seen.push(o.payload().unwrap_or_default().to_string())
        })
        .unwrap();
        assert_eq!(count, 3);
        assert_eq!(seen, vec!["7.01", "7.02", "7.03"]);
        assert_eq!(mock.get_writes().len(), 3);
    }

    #[test]
    fn test_interval_clamped_to_settle_time() {
        let mock = MockTransport::bus(&[98]);
        let mut s = session(&mock);
        let config = PollConfig {
            interval: Duration::from_millis(1),
            max_readings: Some(2),
            ..Default::default()
        };

        let start = Instant::now();
        poll(&mut s, &config, &CancelToken::new(), |_| {}).unwrap();
        // Two readings, each waiting the full 20ms settle time
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn test_cancel_before_start() {
        let mock = MockTransport::bus(&[98]);
        let mut s = session(&mock);
        let cancel = CancelToken::new();
        cancel.cancel();

        let count = poll(&mut s, &PollConfig::default(), &cancel, |_| {}).unwrap();
        assert_eq!(count, 0);
        assert!(mock.get_writes().is_empty());
    }

    #[test]
    fn test_cancel_between_readings() {
        let mock = MockTransport::bus(&[98]);
        let mut s = session(&mock);
        let cancel = CancelToken::new();
        let config = PollConfig {
            interval: Duration::from_secs(5),
            ..Default::default()
        };

        let start = Instant::now();
        let count = poll(&mut s, &config, &cancel, |_| cancel.cancel()).unwrap();
        assert_eq!(count, 1);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_serial_turns_off_continuous_mode() {
        let mock = MockTransport::serial();
        mock.queue_reply(b"*OK\r");
        mock.queue_reply(b"12.5\r*OK\r");
        let mut s = session(&mock);
        let config = PollConfig {
            max_readings: Some(1),
            ..Default::default()
        };

        let mut seen = Vec::new();
        poll(&mut s, &config, &CancelToken::new(), |o| seen.push(o.clone())).unwrap();
        assert_eq!(mock.get_writes(), vec![b"C,0\r".to_vec(), b"R\r".to_vec()]);
        assert_eq!(seen, vec![Outcome::Success("12.5".into())]);
    }

    #[test]
    fn test_device_errors_do_not_stop_polling() {
        let mock = MockTransport::bus(&[98]);
        mock.queue_reply(&[254]);
        mock.queue_reply(&[1, b'6']);
        let mut s = session(&mock);
        let config = PollConfig {
            max_readings: Some(2),
            interval: Duration::ZERO,
            ..Default::default()
        };

        let mut seen = Vec::new();
        poll(&mut s, &config, &CancelToken::new(), |o| seen.push(o.clone())).unwrap();
        assert_eq!(
            seen,
            vec![Outcome::Error(Some(254)), Outcome::Success("6".into())]
        );
    }
}
