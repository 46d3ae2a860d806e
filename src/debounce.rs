//! Debounced edge latches for buttons and the motion sensor
//!
//! [`DebounceGate`] is the time-window filter itself. It is `Copy`, never
//! allocates and does a fixed amount of work, so it can run inside a GPIO
//! interrupt handler. [`InputLatch`] wraps a gate for sharing between the
//! interrupt (the only writer) and the control loop (reader).

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use critical_section::Mutex;

/// Direction of an accepted transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// How a gate decides that an observation is an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Every observation outside the window is an event (push buttons)
    Momentary,
    /// Only a change of the latched level is an event (motion sensor)
    Level,
}

/// Debounced event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub edge: Edge,
    /// Level after the transition
    pub level: bool,
    pub at_ms: u32,
}

/// Edge-triggered, time-windowed state latch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceGate {
    mode: GateMode,
    window_ms: u32,
    last_event_ms: Option<u32>,
    latched: bool,
}

impl DebounceGate {
    pub const fn new(mode: GateMode, window_ms: u32) -> Self {
        Self {
            mode,
            window_ms,
            last_event_ms: None,
            latched: false,
        }
    }

    /// Feed one raw level. Returns an event only if at least `window_ms`
    /// passed since the last accepted event; rejected observations leave
    /// the window untouched. Timestamps wrap like the platform tick counter.
    pub fn observe(&mut self, level: bool, now_ms: u32) -> Option<Event> {
        if let Some(last) = self.last_event_ms {
            if now_ms.wrapping_sub(last) < self.window_ms {
                return None;
            }
        }

        if self.mode == GateMode::Level && level == self.latched {
            return None;
        }

        self.last_event_ms = Some(now_ms);
        self.latched = level;

        Some(Event {
            edge: if level { Edge::Rising } else { Edge::Falling },
            level,
            at_ms: now_ms,
        })
    }

    /// Drop the latched level back to low. The window keeps running from
    /// the last accepted event.
    pub fn reset_level(&mut self) {
        self.latched = false;
    }

    /// Last accepted level
    pub fn latched(&self) -> bool {
        self.latched
    }

    pub fn last_event_ms(&self) -> Option<u32> {
        self.last_event_ms
    }

    pub fn window_ms(&self) -> u32 {
        self.window_ms
    }
}

/// Interrupt-to-loop handoff for one physical input
///
/// The interrupt side calls [`InputLatch::record`]; it is the only writer
/// of the event counter. The loop side reads the counter through its own
/// cursor. Gate and level are only written inside the critical section,
/// by `record` and by the loop's [`InputLatch::rearm`]. Counters are bumped
/// with plain load/store because the target has no atomic RMW.
pub struct InputLatch {
    gate: Mutex<Cell<DebounceGate>>,
    events: AtomicU32,
    level: AtomicBool,
}

impl InputLatch {
    pub const fn new(mode: GateMode, window_ms: u32) -> Self {
        Self {
            gate: Mutex::new(Cell::new(DebounceGate::new(mode, window_ms))),
            events: AtomicU32::new(0),
            level: AtomicBool::new(false),
        }
    }

    /// Interrupt side: debounce a raw level and publish accepted events
    pub fn record(&self, level: bool, now_ms: u32) -> Option<Event> {
        critical_section::with(|cs| {
            let cell = self.gate.borrow(cs);
            let mut gate = cell.get();
            let event = gate.observe(level, now_ms)?;
            cell.set(gate);

            self.level.store(event.level, Ordering::Relaxed);
            let count = self.events.load(Ordering::Relaxed);
            self.events.store(count.wrapping_add(1), Ordering::Release);
            Some(event)
        })
    }

    /// Loop side: latest level if anything was accepted since `cursor`.
    /// Several events between two polls collapse into the newest one.
    pub fn poll(&self, cursor: &mut u32) -> Option<bool> {
        let count = self.events.load(Ordering::Acquire);
        if count == *cursor {
            return None;
        }
        *cursor = count;
        Some(self.level.load(Ordering::Relaxed))
    }

    /// Loop side: forget the latched level so the next high is an event
    /// again. The debounce window and the event counter are kept.
    pub fn rearm(&self) {
        critical_section::with(|cs| {
            let cell = self.gate.borrow(cs);
            let mut gate = cell.get();
            gate.reset_level();
            cell.set(gate);
            self.level.store(false, Ordering::Relaxed);
        });
    }

    /// Current event count, used to start a cursor without replaying history
    pub fn cursor(&self) -> u32 {
        self.events.load(Ordering::Acquire)
    }

    /// Latched level, regardless of cursors
    pub fn level(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_accepted() {
        let mut gate = DebounceGate::new(GateMode::Momentary, 300);
        let event = gate.observe(false, 5).unwrap();
        assert_eq!(event.edge, Edge::Falling);
        assert_eq!(event.at_ms, 5);
    }

    #[test]
    fn rejected_observation_does_not_extend_window() {
        let mut gate = DebounceGate::new(GateMode::Momentary, 300);
        assert!(gate.observe(false, 1_000).is_some());
        assert!(gate.observe(false, 1_200).is_none());
        assert!(gate.observe(false, 1_299).is_none());
        assert!(gate.observe(false, 1_300).is_some());
    }

    #[test]
    fn level_gate_ignores_repeats_without_consuming_window() {
        let mut gate = DebounceGate::new(GateMode::Level, 200);
        assert_eq!(gate.observe(true, 0).map(|e| e.level), Some(true));
        assert!(gate.observe(true, 500).is_none());
        assert_eq!(gate.last_event_ms(), Some(0));
        assert_eq!(gate.observe(false, 501).map(|e| e.edge), Some(Edge::Falling));
    }

    #[test]
    fn window_survives_tick_wraparound() {
        let mut gate = DebounceGate::new(GateMode::Momentary, 300);
        assert!(gate.observe(false, u32::MAX - 100).is_some());
        assert!(gate.observe(false, 100).is_none());
        assert!(gate.observe(false, 200).is_some());
    }

    #[test]
    fn latch_cursor_sees_each_batch_once() {
        let latch = InputLatch::new(GateMode::Level, 200);
        let mut cursor = latch.cursor();
        assert_eq!(latch.poll(&mut cursor), None);

        latch.record(true, 0);
        assert_eq!(latch.poll(&mut cursor), Some(true));
        assert_eq!(latch.poll(&mut cursor), None);

        latch.record(false, 300);
        latch.record(true, 600);
        assert_eq!(latch.poll(&mut cursor), Some(true));
        assert_eq!(latch.poll(&mut cursor), None);
    }

    #[test]
    fn reset_level_keeps_the_window() {
        let mut gate = DebounceGate::new(GateMode::Level, 200);
        assert!(gate.observe(true, 1_000).is_some());

        gate.reset_level();
        assert!(!gate.latched());
        assert_eq!(gate.last_event_ms(), Some(1_000));
        assert!(gate.observe(true, 1_050).is_none());
        assert!(gate.observe(true, 1_200).is_some());
    }
}
