//! Inbound command channel
//!
//! Plain text, newline terminated, case-insensitive after trimming. One
//! control connection is served at a time; while it is open the listener is
//! not polled, so further clients are refused by the stack. There are no
//! reply frames: `PING` answers by pulsing the indicator output.

use heapless::Vec;
use log::{debug, info, warn};

use crate::NetError;
use crate::actuation::{Actuation, Board};
use crate::config::{COMMAND_CHUNK, COMMAND_LINE_MAX};
use crate::shared::SharedState;

/// Most commands applied from a single read
const MAX_COMMANDS_PER_READ: usize = 16;

/// Keep-alive applied to accepted control connections
const CONTROL_KEEP_ALIVE_MS: u32 = 30_000;

/// Closed set of control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch the system on
    Start,
    /// Switch the system off
    Stop,
    /// Collector heartbeat
    Ping,
    /// Force the actuator output to zero right now
    Off,
}

impl Command {
    /// Parse one line; anything unrecognised yields `None`
    pub fn parse(line: &[u8]) -> Option<Command> {
        let word = line.trim_ascii();
        if word.eq_ignore_ascii_case(b"START") {
            Some(Command::Start)
        } else if word.eq_ignore_ascii_case(b"STOP") {
            Some(Command::Stop)
        } else if word.eq_ignore_ascii_case(b"PING") {
            Some(Command::Ping)
        } else if word.eq_ignore_ascii_case(b"OFF") {
            Some(Command::Off)
        } else {
            None
        }
    }
}

/// Reassembles lines across reads
///
/// A line longer than [`COMMAND_LINE_MAX`] is discarded up to its newline.
#[derive(Debug, Default)]
pub struct LineBuffer {
    line: Vec<u8, COMMAND_LINE_MAX>,
    overflowed: bool,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            line: Vec::new(),
            overflowed: false,
        }
    }

    /// Feed one chunk, returning the commands completed by it
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Command, MAX_COMMANDS_PER_READ> {
        let mut commands = Vec::new();

        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.overflowed && !self.line.is_empty() {
                    match Command::parse(&self.line) {
                        Some(command) => {
                            if commands.push(command).is_err() {
                                warn!("[CMD] too many commands in one read, dropping {:?}", command);
                            }
                        }
                        None => debug!("[CMD] ignoring unrecognised line"),
                    }
                }
                self.line.clear();
                self.overflowed = false;
            } else if !self.overflowed && self.line.push(byte).is_err() {
                debug!("[CMD] line overflow, discarding");
                self.line.clear();
                self.overflowed = true;
            }
        }

        commands
    }

    /// Bytes of an unterminated line waiting for the next read
    pub fn pending(&self) -> usize {
        self.line.len()
    }

    pub fn clear(&mut self) {
        self.line.clear();
        self.overflowed = false;
    }
}

/// Server side of the control socket
pub trait Listener {
    /// Accept a pending client without blocking; `Ok(false)` when none is
    /// ready, including one still in its handshake
    fn poll_accept(&mut self) -> Result<bool, NetError>;
    /// Best-effort TCP keep-alive on the accepted connection
    fn set_keep_alive(&mut self, interval_ms: u32) -> Result<(), NetError>;
    /// Non-blocking read; `Ok(0)` is a graceful close by the peer
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;
    /// Drop the accepted connection and go back to listening
    fn close(&mut self);
}

/// Accepted control connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    pub accepted_ms: u32,
}

/// Single-connection command server
pub struct CommandServer<S: Listener> {
    listener: S,
    peer: Option<Peer>,
    lines: LineBuffer,
    ping_pulse_ms: u32,
    indicator_since: Option<u32>,
}

impl<S: Listener> CommandServer<S> {
    pub fn new(listener: S, ping_pulse_ms: u32) -> Self {
        Self {
            listener,
            peer: None,
            lines: LineBuffer::new(),
            ping_pulse_ms,
            indicator_since: None,
        }
    }

    /// Accept or read once, applying every complete command. Returns the
    /// number of commands applied.
    pub fn poll<B: Board>(&mut self, now_ms: u32, shared: &SharedState, board: &mut B) -> usize {
        if self.peer.is_none() {
            match self.listener.poll_accept() {
                Ok(true) => {
                    if let Err(e) = self.listener.set_keep_alive(CONTROL_KEEP_ALIVE_MS) {
                        debug!("[CMD] keep-alive not available: {:?}", e);
                    }
                    self.peer = Some(Peer {
                        accepted_ms: now_ms,
                    });
                    info!("[CMD] control connection accepted");
                }
                Ok(false) | Err(NetError::WouldBlock) => return 0,
                Err(e) => {
                    warn!("[CMD] accept error: {:?}", e);
                    self.listener.close();
                    return 0;
                }
            }
        }

        let mut chunk = [0u8; COMMAND_CHUNK];
        match self.listener.recv(&mut chunk) {
            Ok(0) => {
                info!("[CMD] peer closed control connection");
                self.drop_peer();
                0
            }
            Ok(len) => {
                let commands = self.lines.feed(&chunk[..len]);
                for command in commands.iter() {
                    self.apply(*command, now_ms, shared, board);
                }
                commands.len()
            }
            Err(NetError::WouldBlock) => 0,
            Err(e) => {
                warn!("[CMD] control socket error: {:?}", e);
                self.drop_peer();
                0
            }
        }
    }

    /// Turn the PING indicator off once its pulse has elapsed
    pub fn service_indicator<B: Board>(&mut self, now_ms: u32, board: &mut B) {
        if let Some(since) = self.indicator_since {
            if now_ms.wrapping_sub(since) >= self.ping_pulse_ms {
                board.set_indicator(false);
                self.indicator_since = None;
            }
        }
    }

    fn apply<B: Board>(&mut self, command: Command, now_ms: u32, shared: &SharedState, board: &mut B) {
        match command {
            Command::Start => {
                if !shared.is_on() {
                    shared.set_on(true);
                    info!("[CMD] START => system ON");
                }
            }
            Command::Stop => {
                if shared.is_on() {
                    shared.set_on(false);
                    info!("[CMD] STOP => system OFF");
                }
            }
            Command::Ping => {
                shared.record_ping(now_ms);
                board.set_indicator(true);
                self.indicator_since = Some(now_ms);
                debug!("[CMD] PING");
            }
            Command::Off => {
                board.set_actuator(Actuation::INERT);
                info!("[CMD] OFF => actuator forced to zero");
            }
        }
    }

    fn drop_peer(&mut self) {
        self.listener.close();
        self.peer = None;
        self.lines.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    pub fn peer(&self) -> Option<&Peer> {
        self.peer.as_ref()
    }

    pub fn indicator_lit(&self) -> bool {
        self.indicator_since.is_some()
    }

    pub fn listener(&self) -> &S {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut S {
        &mut self.listener
    }
}
