//! State shared between GPIO interrupts and the control loop
//!
//! Writers per field:
//! - `green`, `red`, `motion` latches: the GPIO interrupt handler
//! - `sys_on`, `last_ping_ms`: the control loop (command server and input drain)
//!
//! Every field is a single atomic or a critical-section cell, no lock is
//! ever held across I/O.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use log::debug;

use crate::config::NodeConfig;
use crate::debounce::{Event, GateMode, InputLatch};

/// System on/off flag, ping bookkeeping and the input latches
pub struct SharedState {
    sys_on: AtomicBool,
    last_ping_ms: AtomicU32,
    pinged: AtomicBool,
    pub green: InputLatch,
    pub red: InputLatch,
    pub motion: InputLatch,
}

impl SharedState {
    /// Fresh boot state: system off, never pinged
    pub const fn new(button_debounce_ms: u32, motion_debounce_ms: u32) -> Self {
        Self {
            sys_on: AtomicBool::new(false),
            last_ping_ms: AtomicU32::new(0),
            pinged: AtomicBool::new(false),
            green: InputLatch::new(GateMode::Momentary, button_debounce_ms),
            red: InputLatch::new(GateMode::Momentary, button_debounce_ms),
            motion: InputLatch::new(GateMode::Level, motion_debounce_ms),
        }
    }

    pub const fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.button_debounce_ms, config.motion_debounce_ms)
    }

    pub fn is_on(&self) -> bool {
        self.sys_on.load(Ordering::Acquire)
    }

    /// Loop side only
    pub fn set_on(&self, on: bool) {
        self.sys_on.store(on, Ordering::Release);
    }

    /// Loop side only
    pub fn record_ping(&self, now_ms: u32) {
        self.last_ping_ms.store(now_ms, Ordering::Relaxed);
        self.pinged.store(true, Ordering::Release);
    }

    pub fn last_ping_ms(&self) -> Option<u32> {
        if self.pinged.load(Ordering::Acquire) {
            Some(self.last_ping_ms.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Milliseconds since the collector last pinged, `None` before the first ping
    pub fn ping_age_ms(&self, now_ms: u32) -> Option<u32> {
        self.last_ping_ms().map(|at| now_ms.wrapping_sub(at))
    }

    /// Interrupt entry point for the green (start) button
    pub fn on_green_edge(&self, now_ms: u32) -> Option<Event> {
        self.green.record(false, now_ms)
    }

    /// Interrupt entry point for the red (stop) button
    pub fn on_red_edge(&self, now_ms: u32) -> Option<Event> {
        self.red.record(false, now_ms)
    }

    /// Interrupt entry point for the motion sensor; ignored while the system is off
    pub fn on_motion_edge(&self, level: bool, now_ms: u32) -> Option<Event> {
        if !self.is_on() {
            return None;
        }
        let event = self.motion.record(level, now_ms);
        if let Some(event) = event {
            debug!(
                "[INPUT] motion {}",
                if event.level { "ACTIVE" } else { "INACTIVE" }
            );
        }
        event
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::from_config(&NodeConfig::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boots_off_and_unpinged() {
        let state = SharedState::default();
        assert!(!state.is_on());
        assert_eq!(state.last_ping_ms(), None);
        assert_eq!(state.ping_age_ms(1_000), None);
    }

    #[test]
    fn ping_age_tracks_latest_ping() {
        let state = SharedState::default();
        state.record_ping(1_000);
        assert_eq!(state.ping_age_ms(3_500), Some(2_500));
    }

    #[test]
    fn motion_is_ignored_while_off() {
        let state = SharedState::default();
        assert!(state.on_motion_edge(true, 0).is_none());

        state.set_on(true);
        assert!(state.on_motion_edge(true, 10).is_some());
        assert!(state.motion.level());
    }

    #[test]
    fn button_bounce_is_filtered() {
        let state = SharedState::new(300, 200);
        assert!(state.on_green_edge(1_000).is_some());
        assert!(state.on_green_edge(1_050).is_none());
        assert!(state.on_green_edge(1_310).is_some());
    }
}
