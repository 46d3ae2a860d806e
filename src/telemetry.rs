//! Outbound telemetry channel
//!
//! [`ReconnectingSocket`] dials the collector with a cooldown between
//! attempts, sends best-effort lines and drops the session on the first I/O
//! error. Payloads sent while no session is up are simply lost.

use core::fmt::{self, Write};
use heapless::String;
use log::{debug, info, warn};

use crate::NetError;
use crate::link::RetryTimer;

/// Longest telemetry line including the terminating newline
pub const MAX_LINE: usize = 64;

/// Client side of a stream socket, owned by one [`ReconnectingSocket`]
#[allow(async_fn_in_trait)]
pub trait Dial {
    /// Open a session, giving up after `timeout_ms`
    async fn connect(&mut self, timeout_ms: u32) -> Result<(), NetError>;
    /// Best-effort TCP keep-alive on the open session
    fn set_keep_alive(&mut self, interval_ms: u32) -> Result<(), NetError>;
    /// Switch the open session to non-blocking writes. Adapters whose
    /// writes never wait keep the default.
    fn set_nonblocking(&mut self) {}
    /// Queue `bytes` without blocking
    fn send(&mut self, bytes: &[u8]) -> Result<(), NetError>;
    /// Tear the session down, also after a partial connect
    fn close(&mut self);
}

/// Live session bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    pub opened_ms: u32,
    pub lines_sent: u32,
}

/// Outcome of [`ReconnectingSocket::ensure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// A session is up
    Connected,
    /// Still inside the cooldown window since the last attempt
    CoolingDown,
    /// This attempt failed; the next one waits for the cooldown
    Failed(NetError),
}

/// Line-oriented readings understood by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reading {
    Distance(u32),
    Alert(bool),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Distance(mm) => write!(f, "distance: {}", mm),
            Reading::Alert(active) => write!(f, "alert: {}", u8::from(*active)),
        }
    }
}

/// "Connect with cooldown, send best-effort, drop on error"
pub struct ReconnectingSocket<D: Dial> {
    dialer: D,
    session: Option<Session>,
    timer: RetryTimer,
    dial_timeout_ms: u32,
    keep_alive_ms: u32,
}

impl<D: Dial> ReconnectingSocket<D> {
    pub fn new(dialer: D, retry_interval_ms: u32, dial_timeout_ms: u32, keep_alive_ms: u32) -> Self {
        Self {
            dialer,
            session: None,
            timer: RetryTimer::new(retry_interval_ms),
            dial_timeout_ms,
            keep_alive_ms,
        }
    }

    /// Make sure a session is up, dialing at most once per cooldown
    pub async fn ensure(&mut self, now_ms: u32) -> Readiness {
        if self.session.is_some() {
            return Readiness::Connected;
        }

        if !self.timer.is_due(now_ms) {
            return Readiness::CoolingDown;
        }
        self.timer.mark(now_ms);

        match self.dialer.connect(self.dial_timeout_ms).await {
            Ok(()) => {
                if let Err(e) = self.dialer.set_keep_alive(self.keep_alive_ms) {
                    debug!("[DATA] keep-alive not available: {:?}", e);
                }
                self.dialer.set_nonblocking();
                self.session = Some(Session {
                    opened_ms: now_ms,
                    lines_sent: 0,
                });
                info!("[DATA] connected");
                Readiness::Connected
            }
            Err(e) => {
                debug!("[DATA] connect error: {:?}", e);
                self.dialer.close();
                Readiness::Failed(e)
            }
        }
    }

    /// Send one line. Without a session the payload is dropped; on an I/O
    /// error the session is torn down and the cooldown restarts at `now_ms`.
    pub fn send_line(&mut self, now_ms: u32, text: &str) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let mut line: String<MAX_LINE> = String::new();
        if line.push_str(text).is_err() || line.push('\n').is_err() {
            warn!("[DATA] line too long, dropped ({} bytes)", text.len());
            return false;
        }

        match self.dialer.send(line.as_bytes()) {
            Ok(()) => {
                session.lines_sent = session.lines_sent.wrapping_add(1);
                true
            }
            Err(e) => {
                warn!("[DATA] send error: {:?}", e);
                self.disconnect(now_ms);
                false
            }
        }
    }

    /// Format and send one reading
    pub fn send_reading(&mut self, now_ms: u32, reading: Reading) -> bool {
        let mut text: String<MAX_LINE> = String::new();
        if write!(text, "{}", reading).is_err() {
            return false;
        }
        self.send_line(now_ms, &text)
    }

    /// Drop the session, the next dial waits a full cooldown from `now_ms`
    pub fn disconnect(&mut self, now_ms: u32) {
        if self.session.take().is_some() {
            self.dialer.close();
            self.timer.mark(now_ms);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn last_attempt_ms(&self) -> Option<u32> {
        self.timer.last_attempt_ms()
    }

    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    pub fn dialer_mut(&mut self) -> &mut D {
        &mut self.dialer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_render_collector_format() {
        let mut text: String<MAX_LINE> = String::new();
        write!(text, "{}", Reading::Distance(1234)).unwrap();
        assert_eq!(text.as_str(), "distance: 1234");

        text.clear();
        write!(text, "{}", Reading::Alert(true)).unwrap();
        assert_eq!(text.as_str(), "alert: 1");

        text.clear();
        write!(text, "{}", Reading::Alert(false)).unwrap();
        assert_eq!(text.as_str(), "alert: 0");
    }
}
