//! WiFi station link adapter.
//!
//! Implements [`WifiStatusPort`] for the heartbeat metrics and turns the
//! station's association state into connect / disconnect edges for the
//! backend services.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: queries the ESP-IDF WiFi driver
//!   (`esp_wifi_get_mode`, `esp_wifi_sta_get_ap_info`).
//! - **all other targets**: a scripted link for host-side runs and tests.
//!
//! Association itself (credentials, reconnect policy) belongs to the
//! network stack; this adapter only observes it.

use log::{debug, info};

use crate::app::ports::{WifiStatusError, WifiStatusPort};
use crate::metrics::wifi::{WifiLinkStatus, WifiMode, WifiState};

/// A change in station association seen by [`WifiAdapter::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
}

pub struct WifiAdapter {
    was_connected: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_link_up: bool,
}

impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            was_connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_link_up: false,
        }
    }

    /// Report the association edge, if any, since the previous poll.
    pub fn poll(&mut self) -> Option<LinkEvent> {
        let connected = self
            .link_status()
            .is_ok_and(|status| status.is_connected_station());

        if connected == self.was_connected {
            return None;
        }
        self.was_connected = connected;

        let event = if connected {
            LinkEvent::Connected
        } else {
            LinkEvent::Disconnected
        };
        info!("WiFi: link {:?}", event);
        Some(event)
    }

    /// Simulation: bring the scripted link up or down.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_link(&mut self, up: bool) {
        self.sim_link_up = up;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_link_status(&self) -> Result<WifiLinkStatus, WifiStatusError> {
        use esp_idf_svc::sys::*;

        let mut mode: wifi_mode_t = 0;
        // SAFETY: plain out-parameter query into the WiFi driver.
        let ret = unsafe { esp_wifi_get_mode(&mut mode) };
        if ret == ESP_ERR_WIFI_NOT_INIT as esp_err_t {
            return Err(WifiStatusError::NoInterface);
        }
        if ret != ESP_OK as esp_err_t {
            return Err(WifiStatusError::RequestFailed);
        }
        let mode = if mode == wifi_mode_t_WIFI_MODE_AP {
            WifiMode::AccessPoint
        } else {
            WifiMode::Station
        };

        let mut ap_info: wifi_ap_record_t = unsafe { core::mem::zeroed() };
        // SAFETY: `ap_info` is a zeroed record the driver fills in.
        let ret = unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) };
        if ret == ESP_ERR_WIFI_NOT_CONNECT as esp_err_t {
            return Ok(WifiLinkStatus {
                state: WifiState::Disconnected,
                mode,
                rssi: 0,
                channel: 0,
                link_mode: 0,
                tx_rate_mbps: 0.0,
            });
        }
        if ret != ESP_OK as esp_err_t {
            return Err(WifiStatusError::RequestFailed);
        }

        // 802.11 generation, highest PHY the AP advertises.
        let link_mode = if ap_info.phy_11n() != 0 {
            4
        } else if ap_info.phy_11g() != 0 {
            3
        } else if ap_info.phy_11b() != 0 {
            1
        } else {
            0
        };

        Ok(WifiLinkStatus {
            state: WifiState::Completed,
            mode,
            rssi: ap_info.rssi,
            channel: ap_info.primary,
            link_mode,
            // The IDF driver does not expose the current TX rate.
            tx_rate_mbps: 0.0,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_link_status(&self) -> Result<WifiLinkStatus, WifiStatusError> {
        let state = if self.sim_link_up {
            WifiState::Completed
        } else {
            WifiState::Disconnected
        };
        Ok(WifiLinkStatus {
            state,
            mode: WifiMode::Station,
            rssi: -60,
            channel: 6,
            link_mode: 4,
            tx_rate_mbps: 72.2,
        })
    }
}

impl WifiStatusPort for WifiAdapter {
    fn link_status(&self) -> Result<WifiLinkStatus, WifiStatusError> {
        let status = self.platform_link_status();
        if let Err(e) = &status {
            debug!("WiFi: status query failed: {}", e);
        }
        status
    }
}
