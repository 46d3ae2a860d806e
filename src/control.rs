//! Cooperative control loop
//!
//! One [`ControlLoop::tick`] per tick period, in this order:
//!
//! 1. link watchdog
//! 2. telemetry socket (only while the link is up)
//! 3. command server
//! 4. debounced inputs drained into the shared state
//! 5. actuation, or the inert output when the system is off
//! 6. periodic memory reclaim
//!
//! Commands are applied before physical inputs, so within one tick a button
//! press overrides a command received in the same tick.

use log::{debug, info};

use crate::actuation::{Actuation, ActuationMap, Board};
use crate::command::{CommandServer, Listener};
use crate::config::NodeConfig;
use crate::link::{Link, LinkState, LinkWatchdog, RetryTimer};
use crate::shared::SharedState;
use crate::telemetry::{Dial, Reading, ReconnectingSocket};

/// Loop-owned cursors into the input latches
#[derive(Debug, Clone, Copy, Default)]
struct InputCursors {
    green: u32,
    red: u32,
    motion: u32,
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// System was on after inputs and commands were applied
    pub active: bool,
    pub link: LinkState,
    pub distance_mm: Option<u32>,
    pub actuation: Actuation,
    pub commands: usize,
    /// Telemetry lines handed to the socket this tick
    pub lines_sent: u8,
}

/// Every collaborator of the loop, owned
pub struct ControlLoop<'s, L, D, S, B, M>
where
    L: Link,
    D: Dial,
    S: Listener,
    B: Board,
    M: ActuationMap,
{
    shared: &'s SharedState,
    watchdog: LinkWatchdog<L>,
    data: ReconnectingSocket<D>,
    commands: CommandServer<S>,
    board: B,
    mapper: M,
    cursors: InputCursors,
    buttons_enabled: bool,
    was_on: bool,
    pending_alert: Option<bool>,
    heartbeat: RetryTimer,
    reclaim: RetryTimer,
}

impl<'s, L, D, S, B, M> ControlLoop<'s, L, D, S, B, M>
where
    L: Link,
    D: Dial,
    S: Listener,
    B: Board,
    M: ActuationMap,
{
    pub fn new(
        config: &NodeConfig,
        shared: &'s SharedState,
        link: L,
        dialer: D,
        listener: S,
        board: B,
        mapper: M,
    ) -> Self {
        let cursors = InputCursors {
            green: shared.green.cursor(),
            red: shared.red.cursor(),
            motion: shared.motion.cursor(),
        };

        Self {
            shared,
            watchdog: LinkWatchdog::new(link, config.link_retry_ms),
            data: ReconnectingSocket::new(
                dialer,
                config.data_retry_ms,
                config.dial_timeout_ms,
                config.keep_alive_ms,
            ),
            commands: CommandServer::new(listener, config.ping_pulse_ms),
            board,
            mapper,
            cursors,
            buttons_enabled: config.buttons_enabled,
            was_on: shared.is_on(),
            pending_alert: None,
            heartbeat: RetryTimer::new(config.heartbeat_ms),
            reclaim: RetryTimer::new(config.reclaim_ms),
        }
    }

    /// Run one tick. Never blocks beyond the dial timeout and never fails.
    pub async fn tick(&mut self, now_ms: u32) -> TickReport {
        self.watchdog.poll(now_ms);

        if self.watchdog.is_up() {
            self.data.ensure(now_ms).await;
        }

        let commands = self
            .commands
            .poll(now_ms, self.shared, &mut self.board);
        self.commands.service_indicator(now_ms, &mut self.board);

        self.drain_inputs();

        let mut report = TickReport {
            active: false,
            link: self.watchdog.state(),
            distance_mm: None,
            actuation: Actuation::INERT,
            commands,
            lines_sent: 0,
        };

        if self.shared.is_on() {
            if !self.was_on {
                // Fresh start: send the first distance right away
                self.heartbeat.clear();
                self.was_on = true;
            }
            self.run_active(now_ms, &mut report);
        } else {
            if self.was_on {
                info!("[CTRL] system off, outputs reset");
                self.pending_alert = None;
                self.shared.motion.rearm();
                self.was_on = false;
            }
            self.board.set_actuator(Actuation::INERT);
        }

        if self.reclaim.fire(now_ms) {
            debug!("[MEM] reclaim pass");
            self.board.reclaim_memory();
        }

        report
    }

    fn run_active(&mut self, now_ms: u32, report: &mut TickReport) {
        let distance_mm = self.board.read_distance_mm();
        let actuation = self.mapper.map(distance_mm).clamped();
        self.board.set_actuator(actuation);
        debug!("[CTRL] dist: {} mm, duty {}", distance_mm, actuation.duty);

        report.active = true;
        report.distance_mm = Some(distance_mm);
        report.actuation = actuation;

        if let Some(active) = self.pending_alert.take() {
            if self.data.send_reading(now_ms, Reading::Alert(active)) {
                report.lines_sent += 1;
            }
        }

        if self.heartbeat.fire(now_ms)
            && self.data.send_reading(now_ms, Reading::Distance(distance_mm))
        {
            report.lines_sent += 1;
        }
    }

    fn drain_inputs(&mut self) {
        let green = self.shared.green.poll(&mut self.cursors.green);
        let red = self.shared.red.poll(&mut self.cursors.red);

        if self.buttons_enabled {
            if green.is_some() && !self.shared.is_on() {
                self.shared.set_on(true);
                info!("[INPUT] Green => System ON");
            }
            if red.is_some() && self.shared.is_on() {
                self.shared.set_on(false);
                info!("[INPUT] Red => System OFF");
            }
        }

        if let Some(active) = self.shared.motion.poll(&mut self.cursors.motion) {
            if self.shared.is_on() {
                self.pending_alert = Some(active);
            }
        }
    }

    pub fn shared(&self) -> &SharedState {
        self.shared
    }

    pub fn watchdog(&self) -> &LinkWatchdog<L> {
        &self.watchdog
    }

    pub fn watchdog_mut(&mut self) -> &mut LinkWatchdog<L> {
        &mut self.watchdog
    }

    pub fn data(&self) -> &ReconnectingSocket<D> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut ReconnectingSocket<D> {
        &mut self.data
    }

    pub fn commands(&self) -> &CommandServer<S> {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandServer<S> {
        &mut self.commands
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }
}
