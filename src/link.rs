//! Station link watchdog
//!
//! Keeps the WiFi association alive without ever blocking the control loop.
//! Link status is polled every tick; when it is down an association request
//! is issued at most once per retry interval.

use log::{info, warn};

/// Minimum spacing between attempts on one resource
///
/// The attempt timestamp is recorded whether or not the attempt succeeds,
/// so sustained failures are still spaced by `interval_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryTimer {
    interval_ms: u32,
    last_attempt_ms: Option<u32>,
}

impl RetryTimer {
    /// A timer that is due immediately
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_attempt_ms: None,
        }
    }

    pub fn is_due(&self, now_ms: u32) -> bool {
        match self.last_attempt_ms {
            Some(last) => now_ms.wrapping_sub(last) >= self.interval_ms,
            None => true,
        }
    }

    pub fn mark(&mut self, now_ms: u32) {
        self.last_attempt_ms = Some(now_ms);
    }

    /// `is_due` followed by `mark` when due
    pub fn fire(&mut self, now_ms: u32) -> bool {
        if self.is_due(now_ms) {
            self.mark(now_ms);
            true
        } else {
            false
        }
    }

    /// Make the timer due again
    pub fn clear(&mut self) {
        self.last_attempt_ms = None;
    }

    pub fn last_attempt_ms(&self) -> Option<u32> {
        self.last_attempt_ms
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }
}

/// Association state owned by the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Connecting,
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Radio could not be started
    NotStarted,
    /// Association request was rejected by the driver
    Rejected,
}

/// Platform station interface
pub trait Link {
    /// Current association status, must not block
    fn is_up(&mut self) -> bool;
    /// Issue a non-blocking association request
    fn associate(&mut self) -> Result<(), LinkError>;
}

/// Fire-and-forget association watchdog
pub struct LinkWatchdog<L: Link> {
    link: L,
    state: LinkState,
    timer: RetryTimer,
}

impl<L: Link> LinkWatchdog<L> {
    pub fn new(link: L, retry_interval_ms: u32) -> Self {
        Self {
            link,
            state: LinkState::Down,
            timer: RetryTimer::new(retry_interval_ms),
        }
    }

    /// Service the link once; never blocks, never fails
    pub fn poll(&mut self, now_ms: u32) {
        if self.link.is_up() {
            self.transition_to(LinkState::Up);
            return;
        }

        if self.state == LinkState::Up {
            warn!("[WIFI] WiFi connection lost!");
            self.transition_to(LinkState::Down);
        }

        if !self.timer.is_due(now_ms) {
            return;
        }

        self.timer.mark(now_ms);
        match self.link.associate() {
            Ok(()) => {
                info!("[WIFI] watchdog: attempting reconnect");
                self.transition_to(LinkState::Connecting);
            }
            Err(e) => {
                warn!("[WIFI] watchdog: association request failed: {:?}", e);
                self.transition_to(LinkState::Down);
            }
        }
    }

    /// Record an association made outside the watchdog (boot path)
    pub fn note_attempt(&mut self, now_ms: u32) {
        self.timer.mark(now_ms);
        if self.link.is_up() {
            self.transition_to(LinkState::Up);
        } else {
            self.transition_to(LinkState::Connecting);
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_up(&self) -> bool {
        self.state == LinkState::Up
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn transition_to(&mut self, new_state: LinkState) {
        if new_state != self.state {
            if new_state == LinkState::Up {
                info!("[WIFI] WiFi link up");
            }
            self.state = new_state;
        }
    }
}
