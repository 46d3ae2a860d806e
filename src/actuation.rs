//! Distance to actuation mapping and the hardware seam of the control loop

use crate::config::{FREQ_MAX_HZ, FREQ_MIN_HZ};

/// Output command for the PWM actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuation {
    /// Duty cycle, 0 (off) to `u16::MAX` (full)
    pub duty: u16,
    /// Tone / PWM frequency in Hz
    pub freq_hz: u16,
}

impl Actuation {
    /// Actuator at rest
    pub const INERT: Actuation = Actuation {
        duty: 0,
        freq_hz: FREQ_MIN_HZ,
    };

    /// Clamp to the documented output range
    pub fn clamped(self) -> Self {
        Self {
            duty: self.duty,
            freq_hz: self.freq_hz.clamp(FREQ_MIN_HZ, FREQ_MAX_HZ),
        }
    }

    pub fn is_inert(&self) -> bool {
        self.duty == 0
    }
}

/// External distance to output mapping (fuzzy engine or fallback)
pub trait ActuationMap {
    fn map(&self, distance_mm: u32) -> Actuation;
}

impl<F> ActuationMap for F
where
    F: Fn(u32) -> Actuation,
{
    fn map(&self, distance_mm: u32) -> Actuation {
        self(distance_mm)
    }
}

/// Linear fallback mapping: full output at `min_mm`, nothing at `max_mm`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearMap {
    pub min_mm: u32,
    pub max_mm: u32,
}

impl LinearMap {
    pub const fn new(min_mm: u32, max_mm: u32) -> Self {
        Self { min_mm, max_mm }
    }
}

impl ActuationMap for LinearMap {
    fn map(&self, distance_mm: u32) -> Actuation {
        if distance_mm <= self.min_mm {
            return Actuation {
                duty: u16::MAX,
                freq_hz: FREQ_MAX_HZ,
            };
        }
        if distance_mm >= self.max_mm {
            return Actuation::INERT;
        }

        let span = u64::from(self.max_mm - self.min_mm);
        let remaining = u64::from(self.max_mm - distance_mm);
        let duty = remaining * u64::from(u16::MAX) / span;
        let freq_span = u64::from(FREQ_MAX_HZ - FREQ_MIN_HZ);
        let freq = u64::from(FREQ_MIN_HZ) + remaining * freq_span / span;

        Actuation {
            duty: duty as u16,
            freq_hz: freq as u16,
        }
    }
}

/// Hardware collaborators of the control loop
///
/// Calls are synchronous and bounded: ranging is capped by the echo timeout.
pub trait Board {
    fn read_distance_mm(&mut self) -> u32;
    fn set_actuator(&mut self, actuation: Actuation);
    fn set_indicator(&mut self, on: bool);
    /// Periodic housekeeping hook for memory-constrained targets
    fn reclaim_memory(&mut self) {}
}
