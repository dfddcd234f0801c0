//! Wi-Fi link quality metrics, sampled at the end of every heartbeat
//! interval.

use log::{debug, info, warn};

use crate::app::ports::{MetricsError, MetricsPort, WifiStatusError};

pub const RSSI_KEY: &str = "ncs_wifi_rssi";
pub const CHANNEL_KEY: &str = "ncs_wifi_channel";
pub const LINK_MODE_KEY: &str = "ncs_wifi_link_mode";
pub const TX_RATE_KEY: &str = "ncs_wifi_tx_rate_mbps";

/// Supplicant state of the interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Scanning,
    Authenticating,
    Associating,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiMode {
    Station,
    AccessPoint,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WifiLinkStatus {
    pub state: WifiState,
    pub mode: WifiMode,
    /// dBm.
    pub rssi: i8,
    pub channel: u8,
    /// 802.11 generation reported by the driver (4 = n, 5 = ac, 6 = ax).
    pub link_mode: u8,
    /// Current TX rate, or a non-positive value when the driver has none.
    pub tx_rate_mbps: f32,
}

impl WifiLinkStatus {
    /// Only an associated station has meaningful link numbers.
    pub fn is_connected_station(&self) -> bool {
        self.state == WifiState::Completed && self.mode == WifiMode::Station
    }
}

/// Record link metrics for the current heartbeat.  Returns `true` if the
/// link was up and the metrics were written.
pub fn collect<M: MetricsPort>(
    status: Result<WifiLinkStatus, WifiStatusError>,
    metrics: &mut M,
) -> bool {
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            warn!("Wi-Fi metrics skipped: {}", e);
            return false;
        }
    };

    if !status.is_connected_station() {
        debug!(
            "Wi-Fi metrics skipped: not a connected station ({:?}, {:?})",
            status.state, status.mode
        );
        return false;
    }

    record(metrics.set_signed(RSSI_KEY, i32::from(status.rssi)), RSSI_KEY);
    record(
        metrics.set_unsigned(CHANNEL_KEY, u32::from(status.channel)),
        CHANNEL_KEY,
    );
    record(
        metrics.set_unsigned(LINK_MODE_KEY, u32::from(status.link_mode)),
        LINK_MODE_KEY,
    );

    if status.tx_rate_mbps > 0.0 {
        record(
            metrics.set_unsigned(TX_RATE_KEY, status.tx_rate_mbps as u32),
            TX_RATE_KEY,
        );
        info!("TX rate: {:.1} Mbps", status.tx_rate_mbps);
    } else {
        info!("TX rate not available");
    }

    true
}

fn record(result: Result<(), MetricsError>, key: &str) {
    if let Err(e) = result {
        warn!("Failed to set {}: {}", key, e);
    }
}
