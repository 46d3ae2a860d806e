//! Node configuration
//!
//! All tunables are fixed at build time. `build.rs` forwards them from the
//! environment (or a `.env` file) and [`NodeConfig::from_build_env`] parses
//! them once at startup. Unset keys keep their defaults.

use core::net::Ipv4Addr;
use core::str::FromStr;

/// WiFi configuration
/// Read from environment variables at compile time
pub const WIFI_SSID: &str = env!("WIFI_SSID");
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

/// Station credential limits of the 802.11 driver
pub const SSID_MAX_LEN: usize = 32;
pub const PASSWORD_MAX_LEN: usize = 64;

/// Default collector address for the telemetry channel
pub const TELEMETRY_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 10, 220);

/// Default TCP port of the collector
pub const TELEMETRY_PORT: u16 = 4321;

/// Default TCP port the command server listens on
pub const COMMAND_PORT: u16 = 1234;

/// Size of one non-blocking read on the command channel
pub const COMMAND_CHUNK: usize = 64;

/// Longest command line kept across reads
pub const COMMAND_LINE_MAX: usize = 64;

/// Frequency range accepted by the actuator, in Hz
pub const FREQ_MIN_HZ: u16 = 100;
pub const FREQ_MAX_HZ: u16 = 2000;

/// Configuration key that failed to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
    /// Minimum distance threshold is not below the maximum
    InvertedThresholds,
}

/// Runtime view of every tunable of the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub wifi_ssid: &'static str,
    pub wifi_password: &'static str,
    pub telemetry_host: Ipv4Addr,
    pub telemetry_port: u16,
    pub command_port: u16,
    /// Minimum spacing of station association attempts
    pub link_retry_ms: u32,
    /// Cap on the blocking association wait at boot
    pub boot_link_timeout_ms: u32,
    /// Minimum spacing of telemetry dial attempts
    pub data_retry_ms: u32,
    pub dial_timeout_ms: u32,
    pub keep_alive_ms: u32,
    pub button_debounce_ms: u32,
    pub motion_debounce_ms: u32,
    pub min_distance_mm: u32,
    pub max_distance_mm: u32,
    pub tick_ms: u32,
    /// Steady-state distance telemetry period; 0 sends on every active tick
    pub heartbeat_ms: u32,
    pub reclaim_ms: u32,
    pub ping_pulse_ms: u32,
    pub buttons_enabled: bool,
}

impl NodeConfig {
    pub const DEFAULT: NodeConfig = NodeConfig {
        wifi_ssid: "",
        wifi_password: "",
        telemetry_host: TELEMETRY_HOST,
        telemetry_port: TELEMETRY_PORT,
        command_port: COMMAND_PORT,
        link_retry_ms: 10_000,
        boot_link_timeout_ms: 15_000,
        data_retry_ms: 5_000,
        dial_timeout_ms: 200,
        keep_alive_ms: 30_000,
        button_debounce_ms: 300,
        motion_debounce_ms: 200,
        min_distance_mm: 100,
        max_distance_mm: 3_000,
        tick_ms: 100,
        heartbeat_ms: 2_000,
        reclaim_ms: 5_000,
        ping_pulse_ms: 100,
        buttons_enabled: true,
    };

    /// Build the configuration from the values baked in by `build.rs`
    pub fn from_build_env() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| match key {
            "TELEMETRY_HOST" => option_env!("TELEMETRY_HOST"),
            "TELEMETRY_PORT" => option_env!("TELEMETRY_PORT"),
            "COMMAND_PORT" => option_env!("COMMAND_PORT"),
            "LINK_RETRY_MS" => option_env!("LINK_RETRY_MS"),
            "DATA_RETRY_MS" => option_env!("DATA_RETRY_MS"),
            "DIAL_TIMEOUT_MS" => option_env!("DIAL_TIMEOUT_MS"),
            "BUTTON_DEBOUNCE_MS" => option_env!("BUTTON_DEBOUNCE_MS"),
            "MOTION_DEBOUNCE_MS" => option_env!("MOTION_DEBOUNCE_MS"),
            "MIN_DISTANCE_MM" => option_env!("MIN_DISTANCE_MM"),
            "MAX_DISTANCE_MM" => option_env!("MAX_DISTANCE_MM"),
            "TICK_MS" => option_env!("TICK_MS"),
            "HEARTBEAT_MS" => option_env!("HEARTBEAT_MS"),
            "BUTTONS_ENABLED" => option_env!("BUTTONS_ENABLED"),
            _ => None,
        })?;
        config.wifi_ssid = WIFI_SSID;
        config.wifi_password = WIFI_PASSWORD;
        config.check_credentials()?;
        Ok(config)
    }

    /// Reject credentials the radio driver cannot hold
    pub fn check_credentials(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.len() > SSID_MAX_LEN {
            return Err(ConfigError::InvalidValue("WIFI_SSID"));
        }
        if self.wifi_password.len() > PASSWORD_MAX_LEN {
            return Err(ConfigError::InvalidValue("WIFI_PASSWORD"));
        }
        Ok(())
    }

    /// Parse the tunables from a key lookup, keeping defaults for missing keys
    pub fn from_lookup<'a, F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let mut config = Self::DEFAULT;

        config.telemetry_host = parse_or(&lookup, "TELEMETRY_HOST", config.telemetry_host)?;
        config.telemetry_port = parse_or(&lookup, "TELEMETRY_PORT", config.telemetry_port)?;
        config.command_port = parse_or(&lookup, "COMMAND_PORT", config.command_port)?;
        config.link_retry_ms = parse_or(&lookup, "LINK_RETRY_MS", config.link_retry_ms)?;
        config.data_retry_ms = parse_or(&lookup, "DATA_RETRY_MS", config.data_retry_ms)?;
        config.dial_timeout_ms = parse_or(&lookup, "DIAL_TIMEOUT_MS", config.dial_timeout_ms)?;
        config.button_debounce_ms =
            parse_or(&lookup, "BUTTON_DEBOUNCE_MS", config.button_debounce_ms)?;
        config.motion_debounce_ms =
            parse_or(&lookup, "MOTION_DEBOUNCE_MS", config.motion_debounce_ms)?;
        config.min_distance_mm = parse_or(&lookup, "MIN_DISTANCE_MM", config.min_distance_mm)?;
        config.max_distance_mm = parse_or(&lookup, "MAX_DISTANCE_MM", config.max_distance_mm)?;
        config.tick_ms = parse_or(&lookup, "TICK_MS", config.tick_ms)?;
        config.heartbeat_ms = parse_or(&lookup, "HEARTBEAT_MS", config.heartbeat_ms)?;

        if let Some(raw) = lookup("BUTTONS_ENABLED") {
            config.buttons_enabled = match raw.trim() {
                "1" | "true" | "TRUE" | "on" => true,
                "0" | "false" | "FALSE" | "off" => false,
                _ => return Err(ConfigError::InvalidValue("BUTTONS_ENABLED")),
            };
        }

        if config.min_distance_mm >= config.max_distance_mm {
            return Err(ConfigError::InvertedThresholds);
        }

        Ok(config)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

fn parse_or<'a, F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<&'a str>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}
