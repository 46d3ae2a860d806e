//! WiFi station link for the ESP32-C3
//!
//! Wraps the esp-wifi controller behind the [`Link`] trait. Association
//! requests never wait; only the boot path waits, and only up to a cap.

use embassy_time::{Duration, Instant, Timer};
use esp_wifi::wifi::{AuthMethod, ClientConfiguration, Configuration, WifiController};
use log::{info, warn};

use crate::NodeError;
use crate::config::ConfigError;
use crate::link::{Link, LinkError};

/// Status poll period while waiting for the boot association
const BOOT_POLL_MS: u64 = 200;

/// Station-mode link with fixed credentials
pub struct StationLink<'a> {
    controller: WifiController<'a>,
}

impl<'a> StationLink<'a> {
    /// Configure the controller for station mode and start the radio
    pub fn new(
        mut controller: WifiController<'a>,
        ssid: &str,
        password: &str,
    ) -> Result<Self, NodeError> {
        info!("[WIFI] configuring station for network: {}", ssid);

        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let client_config = ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| ConfigError::InvalidValue("WIFI_SSID"))?,
            password: password
                .try_into()
                .map_err(|_| ConfigError::InvalidValue("WIFI_PASSWORD"))?,
            auth_method,
            ..Default::default()
        };

        controller
            .set_configuration(&Configuration::Client(client_config))
            .map_err(|_| NodeError::WiFiError)?;
        controller.start().map_err(|_| NodeError::WiFiError)?;

        Ok(Self { controller })
    }

    /// Associate once and wait up to `timeout_ms` for the link to come up.
    /// On timeout the watchdog takes over.
    pub async fn boot_connect(&mut self, timeout_ms: u32) -> bool {
        if let Err(e) = self.associate() {
            warn!("[WIFI] boot association request failed: {:?}", e);
            return false;
        }

        let started = Instant::now();
        let cap = Duration::from_millis(u64::from(timeout_ms));
        while !self.is_up() {
            if started.elapsed() > cap {
                warn!("[WIFI] boot Wi-Fi timeout - watchdog will retry");
                return false;
            }
            Timer::after(Duration::from_millis(BOOT_POLL_MS)).await;
        }

        info!("[WIFI] boot Wi-Fi up");
        true
    }

    /// Get WiFi controller for advanced operations
    pub fn controller_mut(&mut self) -> &mut WifiController<'a> {
        &mut self.controller
    }
}

impl Link for StationLink<'_> {
    fn is_up(&mut self) -> bool {
        self.controller.is_connected().unwrap_or(false)
    }

    fn associate(&mut self) -> Result<(), LinkError> {
        if !self.controller.is_started().unwrap_or(false) {
            self.controller
                .start()
                .map_err(|_| LinkError::NotStarted)?;
        }
        self.controller.connect().map_err(|_| LinkError::Rejected)
    }
}
