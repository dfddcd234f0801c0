//! Bridge configuration parameters
//!
//! Defaults mirror the board's build-time constants. Values can be
//! overridden by a blob stored in NVS (see [`crate::adapters::nvs`]).

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Core bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    // --- OTA triggers ---
    /// Periodic fallback between OTA checks (seconds)
    pub ota_check_interval_secs: u32,
    /// Delay between a network-connect event and its OTA check (seconds)
    pub connect_settle_secs: u32,
    /// Whether the OTA entry point is available at all
    pub ota_enabled: bool,

    // --- Buttons ---
    /// Hold time that turns a press into a long press (milliseconds)
    pub long_press_threshold_ms: u32,

    // --- Upload ---
    /// Let the SDK post a pending coredump itself when the network comes up
    pub post_coredump_on_connect: bool,

    // --- Trigger thread ---
    /// Stack size of the OTA trigger thread (KB)
    pub ota_thread_stack_kb: u16,
    /// FreeRTOS priority of the OTA trigger thread
    pub ota_thread_priority: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            // OTA triggers
            ota_check_interval_secs: 60 * 60, // 1/hour
            connect_settle_secs: 10,
            ota_enabled: true,

            // Buttons
            long_press_threshold_ms: 3000,

            // Upload
            post_coredump_on_connect: true,

            // Trigger thread (lowest application priority).  The release
            // check runs a TLS handshake on this stack.
            ota_thread_stack_kb: 12,
            ota_thread_priority: 1,
        }
    }
}

impl BridgeConfig {
    pub fn ota_check_interval(&self) -> Duration {
        Duration::from_secs(self.ota_check_interval_secs as u64)
    }

    pub fn connect_settle_delay(&self) -> Duration {
        Duration::from_secs(self.connect_settle_secs as u64)
    }

    /// Range-check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(60..=7 * 24 * 3600).contains(&self.ota_check_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "ota_check_interval_secs must be 60..=604800",
            ));
        }
        if self.connect_settle_secs > 300 {
            return Err(ConfigError::ValidationFailed(
                "connect_settle_secs must be <= 300",
            ));
        }
        if self.connect_settle_secs >= self.ota_check_interval_secs {
            return Err(ConfigError::ValidationFailed(
                "connect_settle_secs must be shorter than the check interval",
            ));
        }
        if !(500..=30_000).contains(&self.long_press_threshold_ms) {
            return Err(ConfigError::ValidationFailed(
                "long_press_threshold_ms must be 500..=30000",
            ));
        }
        if !(4..=64).contains(&self.ota_thread_stack_kb) {
            return Err(ConfigError::ValidationFailed(
                "ota_thread_stack_kb must be 4..=64",
            ));
        }
        if self.ota_thread_priority == 0 || self.ota_thread_priority > 24 {
            return Err(ConfigError::ValidationFailed(
                "ota_thread_priority must be 1..=24",
            ));
        }
        Ok(())
    }
}
