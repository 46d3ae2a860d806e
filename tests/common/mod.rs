//! Scriptable stand-ins for the radio, sockets and board

#![allow(dead_code)]

use std::collections::VecDeque;

use sense_node::NetError;
use sense_node::actuation::{Actuation, Board};
use sense_node::command::Listener;
use sense_node::link::{Link, LinkError};
use sense_node::telemetry::Dial;

#[derive(Debug, Default)]
pub struct MockLink {
    pub up: bool,
    pub reject: bool,
    pub associations: usize,
    /// Come up on the next association request
    pub up_on_associate: bool,
}

impl MockLink {
    pub fn up() -> Self {
        Self {
            up: true,
            ..Self::default()
        }
    }
}

impl Link for MockLink {
    fn is_up(&mut self) -> bool {
        self.up
    }

    fn associate(&mut self) -> Result<(), LinkError> {
        self.associations += 1;
        if self.reject {
            return Err(LinkError::Rejected);
        }
        if self.up_on_associate {
            self.up = true;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MockDialer {
    /// Results handed out by `connect`, `Ok` once exhausted
    pub connect_results: VecDeque<Result<(), NetError>>,
    pub connects: usize,
    pub closes: usize,
    pub keep_alive_ms: Option<u32>,
    pub nonblocking: bool,
    /// Error returned by every `send` while set
    pub send_error: Option<NetError>,
    pub sent: Vec<String>,
}

impl MockDialer {
    pub fn failing(times: usize, error: NetError) -> Self {
        Self {
            connect_results: (0..times).map(|_| Err(error)).collect(),
            ..Self::default()
        }
    }
}

impl Dial for MockDialer {
    async fn connect(&mut self, _timeout_ms: u32) -> Result<(), NetError> {
        self.connects += 1;
        self.nonblocking = false;
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    fn set_keep_alive(&mut self, interval_ms: u32) -> Result<(), NetError> {
        self.keep_alive_ms = Some(interval_ms);
        Ok(())
    }

    fn set_nonblocking(&mut self) {
        self.nonblocking = true;
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), NetError> {
        if let Some(e) = self.send_error {
            return Err(e);
        }
        self.sent.push(String::from_utf8_lossy(bytes).into_owned());
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Listener fed with scripted clients and reads
#[derive(Debug, Default)]
pub struct MockListener {
    /// Clients waiting in the backlog
    pub backlog: usize,
    /// Polls the next client spends in its handshake before it can be accepted
    pub handshake_polls: usize,
    /// Reads of the current connection; `WouldBlock` once exhausted
    pub reads: VecDeque<Result<Vec<u8>, NetError>>,
    pub accepted: usize,
    pub open: usize,
    pub max_open: usize,
    pub closes: usize,
    pub keep_alive_ms: Option<u32>,
}

impl MockListener {
    pub fn with_client(reads: &[&[u8]]) -> Self {
        Self {
            backlog: 1,
            reads: reads.iter().map(|r| Ok(r.to_vec())).collect(),
            ..Self::default()
        }
    }

    pub fn push_read(&mut self, bytes: &[u8]) {
        self.reads.push_back(Ok(bytes.to_vec()));
    }
}

impl Listener for MockListener {
    fn poll_accept(&mut self) -> Result<bool, NetError> {
        if self.backlog == 0 {
            return Ok(false);
        }
        if self.handshake_polls > 0 {
            self.handshake_polls -= 1;
            return Ok(false);
        }
        self.backlog -= 1;
        self.accepted += 1;
        self.open += 1;
        self.max_open = self.max_open.max(self.open);
        Ok(true)
    }

    fn set_keep_alive(&mut self, interval_ms: u32) -> Result<(), NetError> {
        self.keep_alive_ms = Some(interval_ms);
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        assert!(self.open > 0, "recv without an accepted connection");
        match self.reads.pop_front() {
            Some(Ok(bytes)) => {
                buf[..bytes.len()].copy_from_slice(&bytes);
                Ok(bytes.len())
            }
            Some(Err(e)) => Err(e),
            None => Err(NetError::WouldBlock),
        }
    }

    fn close(&mut self) {
        self.closes += 1;
        self.open = self.open.saturating_sub(1);
    }
}

#[derive(Debug)]
pub struct MockBoard {
    pub distance_mm: u32,
    pub readings: usize,
    pub actuator: Actuation,
    pub actuations: Vec<Actuation>,
    pub indicator: bool,
    pub reclaims: usize,
}

impl MockBoard {
    pub fn at(distance_mm: u32) -> Self {
        Self {
            distance_mm,
            readings: 0,
            actuator: Actuation::INERT,
            actuations: Vec::new(),
            indicator: false,
            reclaims: 0,
        }
    }
}

impl Board for MockBoard {
    fn read_distance_mm(&mut self) -> u32 {
        self.readings += 1;
        self.distance_mm
    }

    fn set_actuator(&mut self, actuation: Actuation) {
        self.actuator = actuation;
        self.actuations.push(actuation);
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator = on;
    }

    fn reclaim_memory(&mut self) {
        self.reclaims += 1;
    }
}

/// Deterministic pseudo-random sequence (Numerical Recipes LCG)
pub struct Lcg(pub u32);

impl Lcg {
    pub fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        self.0
    }

    pub fn below(&mut self, bound: u32) -> u32 {
        (self.next() >> 8) % bound
    }
}
