//! Thin `embedded-hal` wrappers for the node's peripherals

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal::pwm::SetDutyCycle;
use log::warn;

use crate::actuation::{Actuation, Board};

/// Longest wait for either echo edge
pub const ECHO_TIMEOUT_US: u64 = 30_000;

/// Distance source
pub trait Ranging {
    fn measure_mm(&mut self) -> u32;
}

/// HC-SR04 style ultrasonic ranger
///
/// `clock` returns a free-running microsecond counter.
pub struct Ultrasonic<T, E, D, C> {
    trigger: T,
    echo: E,
    delay: D,
    clock: C,
    max_mm: u32,
}

impl<T, E, D, C> Ultrasonic<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: FnMut() -> u64,
{
    /// `max_mm` is reported when no echo arrives
    pub fn new(trigger: T, echo: E, delay: D, clock: C, max_mm: u32) -> Self {
        Self {
            trigger,
            echo,
            delay,
            clock,
            max_mm,
        }
    }

    /// Width of the next high pulse on the echo pin
    fn echo_pulse_us(&mut self) -> Option<u64> {
        let start = (self.clock)();
        while !self.echo.is_high().ok()? {
            if (self.clock)().wrapping_sub(start) > ECHO_TIMEOUT_US {
                return None;
            }
        }

        let rise = (self.clock)();
        while self.echo.is_high().ok()? {
            if (self.clock)().wrapping_sub(rise) > ECHO_TIMEOUT_US {
                return None;
            }
        }
        Some((self.clock)().wrapping_sub(rise))
    }
}

impl<T, E, D, C> Ranging for Ultrasonic<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: FnMut() -> u64,
{
    fn measure_mm(&mut self) -> u32 {
        let _ = self.trigger.set_low();
        self.delay.delay_us(2);
        let _ = self.trigger.set_high();
        self.delay.delay_us(10);
        let _ = self.trigger.set_low();

        match self.echo_pulse_us() {
            // Round trip at 343 m/s: 0.1715 mm per microsecond
            Some(us) => u32::try_from(us * 1_715 / 10_000).unwrap_or(self.max_mm),
            None => self.max_mm,
        }
    }
}

/// [`Board`] made of a ranger, a PWM channel and an indicator pin
pub struct PinBoard<R, P, L> {
    ranger: R,
    pwm: P,
    indicator: L,
    freq_hz: u16,
    reclaim: Option<fn()>,
}

impl<R, P, L> PinBoard<R, P, L>
where
    R: Ranging,
    P: SetDutyCycle,
    L: OutputPin,
{
    pub fn new(ranger: R, pwm: P, indicator: L) -> Self {
        Self {
            ranger,
            pwm,
            indicator,
            freq_hz: Actuation::INERT.freq_hz,
            reclaim: None,
        }
    }

    /// Hook run by [`Board::reclaim_memory`]
    pub fn with_reclaim(mut self, hook: fn()) -> Self {
        self.reclaim = Some(hook);
        self
    }

    /// Last requested frequency. The PWM timer keeps the rate it was
    /// configured with at boot.
    pub fn frequency_hz(&self) -> u16 {
        self.freq_hz
    }
}

impl<R, P, L> Board for PinBoard<R, P, L>
where
    R: Ranging,
    P: SetDutyCycle,
    L: OutputPin,
{
    fn read_distance_mm(&mut self) -> u32 {
        self.ranger.measure_mm()
    }

    fn set_actuator(&mut self, actuation: Actuation) {
        self.freq_hz = actuation.freq_hz;
        if self
            .pwm
            .set_duty_cycle_fraction(actuation.duty, u16::MAX)
            .is_err()
        {
            warn!("[CTRL] failed to set PWM duty");
        }
    }

    fn set_indicator(&mut self, on: bool) {
        let _ = self.indicator.set_state(PinState::from(on));
    }

    fn reclaim_memory(&mut self) {
        if let Some(hook) = self.reclaim {
            hook();
        }
    }
}
