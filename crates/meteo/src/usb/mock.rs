//! Scripted session for tests
//!
//! [`MockSession`] replays queued connect and read outcomes, falling back to
//! a fixed outcome once a queue runs dry. Call counters live behind an `Arc`
//! so tests can keep watching after the session moved into the driver.

use crate::error::{MeteoError, Result};
use crate::usb::session::{ConnectOutcome, SensorSession};
use protocol::RawPacket;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted result of `connect()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockConnect {
    Connected,
    NotFound,
    /// Fails as if a command write hit a broken pipe
    Fail,
}

/// Scripted result of `read()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockRead {
    Data(RawPacket),
    Timeout,
    /// Fails as if the device was unplugged
    Fail,
}

/// Call counters shared with the test
#[derive(Debug, Default)]
pub struct MockStats {
    connects: AtomicUsize,
    reads: AtomicUsize,
    releases: AtomicUsize,
}

impl MockStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Session replaying a script instead of talking to hardware
#[derive(Debug)]
pub struct MockSession {
    connects: VecDeque<MockConnect>,
    reads: VecDeque<MockRead>,
    connect_fallback: MockConnect,
    read_fallback: MockRead,
    read_delay: Duration,
    connected: bool,
    holds_handle: bool,
    stats: Arc<MockStats>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    /// A session whose device is never found and never sends data
    pub fn new() -> Self {
        Self {
            connects: VecDeque::new(),
            reads: VecDeque::new(),
            connect_fallback: MockConnect::NotFound,
            read_fallback: MockRead::Timeout,
            read_delay: Duration::ZERO,
            connected: false,
            holds_handle: false,
            stats: Arc::new(MockStats::default()),
        }
    }

    /// Queue the outcome of the next unscripted `connect()`
    pub fn then_connect(mut self, outcome: MockConnect) -> Self {
        self.connects.push_back(outcome);
        self
    }

    /// Queue the outcome of the next unscripted `read()`
    pub fn then_read(mut self, outcome: MockRead) -> Self {
        self.reads.push_back(outcome);
        self
    }

    /// Outcome of `connect()` once the queue is empty
    pub fn connect_fallback(mut self, outcome: MockConnect) -> Self {
        self.connect_fallback = outcome;
        self
    }

    /// Outcome of `read()` once the queue is empty
    pub fn read_fallback(mut self, outcome: MockRead) -> Self {
        self.read_fallback = outcome;
        self
    }

    /// Block each read for `delay`, like a real read timeout would
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Counters for this session
    pub fn stats(&self) -> Arc<MockStats> {
        Arc::clone(&self.stats)
    }
}

impl SensorSession for MockSession {
    fn connect(&mut self) -> Result<ConnectOutcome> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);
        if self.holds_handle {
            self.release();
        }

        let outcome = self.connects.pop_front().unwrap_or(self.connect_fallback);
        match outcome {
            MockConnect::Connected => {
                self.holds_handle = true;
                self.connected = true;
                Ok(ConnectOutcome::Connected)
            }
            MockConnect::NotFound => Ok(ConnectOutcome::NotFound),
            MockConnect::Fail => Err(MeteoError::Usb(rusb::Error::Pipe)),
        }
    }

    fn read(&mut self, _timeout: Duration) -> Result<Option<RawPacket>> {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        if !self.holds_handle {
            return Err(MeteoError::NotConnected);
        }
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }

        match self.reads.pop_front().unwrap_or(self.read_fallback) {
            MockRead::Data(packet) => Ok(Some(packet)),
            MockRead::Timeout => Ok(None),
            MockRead::Fail => Err(MeteoError::Usb(rusb::Error::NoDevice)),
        }
    }

    fn release(&mut self) {
        self.stats.releases.fetch_add(1, Ordering::SeqCst);
        self.holds_handle = false;
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_fallback() {
        let mut session = MockSession::new()
            .then_connect(MockConnect::Fail)
            .then_connect(MockConnect::Connected)
            .connect_fallback(MockConnect::NotFound);

        assert!(session.connect().is_err());
        assert_eq!(session.connect().unwrap(), ConnectOutcome::Connected);
        assert_eq!(session.connect().unwrap(), ConnectOutcome::NotFound);
        assert_eq!(session.stats().connects(), 3);
    }

    #[test]
    fn test_connect_releases_previous_handle() {
        let mut session = MockSession::new().connect_fallback(MockConnect::Connected);
        let stats = session.stats();

        session.connect().unwrap();
        assert_eq!(stats.releases(), 0);
        session.connect().unwrap();
        assert_eq!(stats.releases(), 1);
    }

    #[test]
    fn test_release_then_reconnect() {
        let mut session = MockSession::new()
            .then_connect(MockConnect::Connected)
            .then_connect(MockConnect::NotFound)
            .then_connect(MockConnect::Connected);

        session.connect().unwrap();
        assert!(session.is_connected());

        session.release();
        assert!(!session.is_connected());
        assert!(matches!(
            session.read(Duration::ZERO),
            Err(MeteoError::NotConnected)
        ));

        // Clean start: nothing left to release
        assert_eq!(session.connect().unwrap(), ConnectOutcome::NotFound);
        assert!(!session.is_connected());
        assert_eq!(session.stats().releases(), 1);

        assert_eq!(session.connect().unwrap(), ConnectOutcome::Connected);
        assert!(session.is_connected());
    }
}
