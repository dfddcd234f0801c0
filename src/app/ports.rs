//! Port traits: the hexagonal boundary between the bridge logic and the
//! diagnostics SDK / RTOS underneath it.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BackendServices / TriggerCoordinator
//! ```
//!
//! The SDK owns capture, storage and the upload wire format. Everything
//! this crate needs from it is expressed here so the domain logic runs on
//! the host against mocks.

use crate::config::BridgeConfig;
use crate::metrics::wifi::WifiLinkStatus;
use crate::scheduler::TriggerContext;

// ───────────────────────────────────────────────────────────────
// OTA check port (driven adapter: scheduler → SDK)
// ───────────────────────────────────────────────────────────────

/// Successful results of an OTA check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaCheckOutcome {
    /// The backend has no newer firmware for this device.
    NoUpdateAvailable,
    /// A newer image exists and its download has started.
    DownloadStarted,
}

/// The SDK's OTA-check entry point.
///
/// Implementations must be idempotent: the trigger scheduler calls this as
/// often as triggers arrive and never retries on its own.  `context` is
/// for logging and must not change what the check does.
pub trait OtaCheckPort {
    fn check_for_update(
        &mut self,
        context: TriggerContext,
    ) -> Result<OtaCheckOutcome, OtaCheckError>;
}

// ───────────────────────────────────────────────────────────────
// Metrics port (driven adapter: domain → heartbeat metrics)
// ───────────────────────────────────────────────────────────────

/// Heartbeat metric store.  Keys are the metric names configured in the
/// SDK's metric definitions file.
pub trait MetricsPort {
    fn set_signed(&mut self, key: &'static str, value: i32) -> Result<(), MetricsError>;

    fn set_unsigned(&mut self, key: &'static str, value: u32) -> Result<(), MetricsError>;

    /// Add `amount` to a counter metric.
    fn add(&mut self, key: &'static str, amount: i32) -> Result<(), MetricsError>;
}

// ───────────────────────────────────────────────────────────────
// Upload port (driven adapter: domain → SDK packetizer / HTTP client)
// ───────────────────────────────────────────────────────────────

/// Capture and upload controls exposed by the diagnostics SDK.
pub trait UploadPort {
    /// Close the current heartbeat interval immediately and serialize it.
    fn trigger_heartbeat(&mut self);

    /// Whether the packetizer holds anything worth sending.
    fn data_available(&self) -> bool;

    /// Post all pending chunks to the backend.
    fn post_data(&mut self) -> Result<(), UploadError>;

    /// Whether a coredump from a previous crash is waiting in flash.
    fn has_valid_coredump(&self) -> bool;

    /// Record a trace event with an attached log line.
    fn trace_event(&mut self, reason: &'static str, detail: &str);
}

// ───────────────────────────────────────────────────────────────
// Stack monitor port (driven adapter: domain → SDK thread metrics)
// ───────────────────────────────────────────────────────────────

/// Registers an RTOS thread so its unused stack is sampled every heartbeat.
pub trait StackMonitorPort {
    fn add_thread(
        &mut self,
        thread_name: &'static str,
        metric_key: &'static str,
    ) -> Result<(), StackMonitorError>;
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi status port (driven adapter: heartbeat → network stack)
// ───────────────────────────────────────────────────────────────

/// Snapshot of the station interface's link.
pub trait WifiStatusPort {
    fn link_status(&self) -> Result<WifiLinkStatus, WifiStatusError>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists the bridge configuration.
///
/// Implementations MUST validate before persisting; out-of-range values are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Returns [`BridgeConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<BridgeConfig, ConfigError>;

    fn save(&self, config: &BridgeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`OtaCheckPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaCheckError {
    /// OTA support is compiled out or switched off in config.
    Disabled,
    /// The SDK returned a negative status code.
    Failed(i32),
}

/// Errors from [`MetricsPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsError {
    /// The key is not declared in the metric definitions.
    UnknownKey,
    /// The key exists but has a different value type.
    TypeMismatch,
}

/// Errors from [`UploadPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadError {
    /// No network route to the backend.
    NotConnected,
    /// The HTTP client reported a failure status.
    PostFailed(i32),
}

/// Errors from [`StackMonitorPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMonitorError {
    /// No running thread carries the requested name.
    ThreadNotFound,
    /// The SDK's thread table has no free slot.
    TableFull,
}

/// Errors from [`WifiStatusPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiStatusError {
    /// No Wi-Fi interface is registered with the network stack.
    NoInterface,
    /// The interface exists but refused the status request.
    RequestFailed,
}

/// Errors from [`ConfigPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A field failed range validation; the message names it.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for OtaCheckError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Disabled => write!(f, "OTA support disabled"),
            Self::Failed(code) => write!(f, "OTA check failed (err {})", code),
        }
    }
}

impl core::fmt::Display for MetricsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownKey => write!(f, "unknown metric key"),
            Self::TypeMismatch => write!(f, "metric type mismatch"),
        }
    }
}

impl core::fmt::Display for UploadError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::PostFailed(code) => write!(f, "post failed (err {})", code),
        }
    }
}

impl core::fmt::Display for StackMonitorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ThreadNotFound => write!(f, "thread not found"),
            Self::TableFull => write!(f, "thread table full"),
        }
    }
}

impl core::fmt::Display for WifiStatusError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NoInterface => write!(f, "no Wi-Fi interface"),
            Self::RequestFailed => write!(f, "Wi-Fi status request failed"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
