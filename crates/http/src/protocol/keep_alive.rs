//! Per-connection keep-alive bookkeeping.
//!
//! The clock carries two facts: the absolute deadline that bounds every read
//! wait of the current request cycle, and whether the connection may persist
//! after the current response. [`KeepAliveClock::expire`] drops persistence but
//! leaves the deadline alone, so the rest of a `Connection: close` request can
//! still be read before the response goes out.

use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(30);

/// The `max=` bound advertised in the `Keep-Alive` response header.
pub const DEFAULT_MAX_KEEP_ALIVE_REQUESTS: usize = 1000;

/// What the renderer announces in the `Connection` header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionPolicy {
    KeepAlive { timeout: Duration, max: usize },
    Close,
}

impl ConnectionPolicy {
    #[inline]
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, ConnectionPolicy::KeepAlive { .. })
    }
}

#[derive(Debug, Clone)]
pub struct KeepAliveClock {
    timeout: Duration,
    max_requests: usize,
    deadline: Instant,
    persistent: bool,
}

impl KeepAliveClock {
    /// Starts the clock at `now + timeout`.
    pub fn start(now: Instant, timeout: Duration, max_requests: usize) -> Self {
        Self { timeout, max_requests, deadline: now + timeout, persistent: true }
    }

    #[inline]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pushes the deadline to `now + timeout` and marks the connection persistent.
    pub fn reset(&mut self, now: Instant) {
        self.deadline = now + self.timeout;
        self.persistent = true;
    }

    /// The connection closes after the current response.
    pub fn expire(&mut self) {
        self.persistent = false;
    }

    #[inline]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        !self.persistent || now >= self.deadline
    }

    /// Applies a `Connection` header value: a `close` token expires the clock,
    /// anything else resets it.
    pub fn observe_connection_header(&mut self, value: &[u8], now: Instant) {
        let close = value.split(|b| *b == b',').any(|token| token.trim_ascii().eq_ignore_ascii_case(b"close"));
        if close {
            self.expire();
        } else {
            self.reset(now);
        }
    }

    pub fn policy(&self) -> ConnectionPolicy {
        if self.persistent {
            ConnectionPolicy::KeepAlive { timeout: self.timeout, max: self.max_requests }
        } else {
            ConnectionPolicy::Close
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(now: Instant) -> KeepAliveClock {
        KeepAliveClock::start(now, DEFAULT_KEEP_ALIVE_TIMEOUT, DEFAULT_MAX_KEEP_ALIVE_REQUESTS)
    }

    #[test]
    fn starts_at_now_plus_timeout() {
        let now = Instant::now();
        let clock = clock(now);
        assert_eq!(clock.deadline(), now + DEFAULT_KEEP_ALIVE_TIMEOUT);
        assert!(!clock.is_expired(now));
        assert!(clock.is_expired(now + DEFAULT_KEEP_ALIVE_TIMEOUT));
    }

    #[test]
    fn close_token_expires_but_keeps_deadline() {
        let now = Instant::now();
        let mut clock = clock(now);
        clock.observe_connection_header(b"close", now);

        assert!(clock.is_expired(now));
        assert_eq!(clock.deadline(), now + DEFAULT_KEEP_ALIVE_TIMEOUT);
        assert_eq!(clock.policy(), ConnectionPolicy::Close);
    }

    #[test]
    fn close_token_matches_in_list_and_any_case() {
        let now = Instant::now();
        let mut clock = clock(now);
        clock.observe_connection_header(b"Upgrade, CLOSE ", now);
        assert!(!clock.is_persistent());
    }

    #[test]
    fn other_values_reset_the_deadline() {
        let now = Instant::now();
        let mut clock = clock(now);
        clock.expire();

        let later = now + Duration::from_secs(5);
        clock.observe_connection_header(b"keep-alive", later);
        assert!(clock.is_persistent());
        assert_eq!(clock.deadline(), later + DEFAULT_KEEP_ALIVE_TIMEOUT);

        clock.observe_connection_header(b"whatever", later);
        assert!(clock.policy().is_keep_alive());
    }
}
