#![cfg_attr(not(test), no_std)]

//! Battery sensing node firmware library
//!
//! Connectivity and control core for a station-mode sensing node: keeps the
//! WiFi link alive, streams distance telemetry to a collector over TCP, serves
//! a single-connection line protocol for remote control and drives a PWM
//! actuator from an ultrasonic distance reading.
//!
//! Everything outside the `wifi` and `net` modules is hardware agnostic and
//! builds on the host, which is where the tests run.

pub mod actuation;
pub mod command;
pub mod config;
pub mod control;
pub mod debounce;
pub mod hardware;
pub mod link;
pub mod shared;
pub mod telemetry;

#[cfg(feature = "firmware")]
pub mod net;
#[cfg(feature = "firmware")]
pub mod wifi;

/// Project version information
pub const VERSION: &str = "0.1.0-dev";

/// Error types for the sensing node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    /// WiFi driver or association error
    WiFiError,
    /// Build-time configuration was rejected
    ConfigError(config::ConfigError),
}

impl From<config::ConfigError> for NodeError {
    fn from(err: config::ConfigError) -> Self {
        NodeError::ConfigError(err)
    }
}

/// Socket level failures reported by the data and command channel adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// Non-blocking operation has nothing to do right now
    WouldBlock,
    /// Dial did not complete within its timeout
    TimedOut,
    /// Remote refused or the handshake failed
    Refused,
    /// Connection reset by peer
    Reset,
    /// No live connection behind the handle
    Closed,
    /// Network not configured (no address yet)
    Unreachable,
}
