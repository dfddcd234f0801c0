//! Backend services: the glue between board events and the diagnostics
//! SDK.
//!
//! [`BackendServices`] reacts to button edges, network up/down events and
//! the heartbeat collection hook.  SDK access flows through port traits
//! injected at call sites, so the whole service runs on the host against
//! mock adapters.
//!
//! ```text
//!  buttons ─────▶ ┌──────────────────────┐ ──▶ UploadPort / MetricsPort
//!  net up/down ──▶│   BackendServices    │ ──▶ StackMonitorPort
//!  heartbeat ────▶│                      │ ──▶ TriggerCoordinator
//!                 └──────────────────────┘
//! ```
//!
//! Methods take `&self`: the network handler may block for the connect
//! settle delay, so it runs on its own thread while the button scan keeps
//! going on another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::diagnostics::FaultInjector;
use crate::metrics;
use crate::metrics::wifi::WifiLinkStatus;
use crate::scheduler::TriggerCoordinator;

use super::buttons::{ButtonAction, ButtonActions, ButtonClassifier};
use super::ports::{MetricsPort, StackMonitorPort, UploadPort, WifiStatusError};

pub const SWITCH_1_COUNT_KEY: &str = "switch_1_toggle_count";
pub const SWITCH_2_TRACE_REASON: &str = "switch_2_toggled";

// ───────────────────────────────────────────────────────────────
// BackendServices
// ───────────────────────────────────────────────────────────────

pub struct BackendServices {
    triggers: Arc<TriggerCoordinator>,
    buttons: Mutex<ButtonClassifier>,
    wifi_connected: AtomicBool,
    stack_metrics_initialized: AtomicBool,
    post_coredump_on_connect: bool,
}

impl BackendServices {
    pub fn new(config: &BridgeConfig, triggers: Arc<TriggerCoordinator>) -> Self {
        Self {
            triggers,
            buttons: Mutex::new(ButtonClassifier::new(config.long_press_threshold_ms)),
            wifi_connected: AtomicBool::new(false),
            stack_metrics_initialized: AtomicBool::new(false),
            post_coredump_on_connect: config.post_coredump_on_connect,
        }
    }

    pub fn init(&self) {
        info!(
            "Backend services ready (OTA check every {}s, settle {}s)",
            self.triggers.check_interval().as_secs(),
            self.triggers.settle_delay().as_secs()
        );
    }

    pub fn is_wifi_connected(&self) -> bool {
        self.wifi_connected.load(Ordering::SeqCst)
    }

    // ── Buttons ───────────────────────────────────────────────

    /// Classify one button edge and act on it.  Returns the actions taken.
    ///
    /// A long-press fault on the device never returns.
    pub fn handle_buttons(
        &self,
        states: u32,
        changed: u32,
        now_ms: u64,
        sdk: &mut (impl UploadPort + MetricsPort),
        faults: &mut impl FaultInjector,
    ) -> ButtonActions {
        let actions = self
            .buttons
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .classify(states, changed, now_ms);

        for action in &actions {
            self.dispatch(*action, sdk, faults);
        }
        actions
    }

    fn dispatch(
        &self,
        action: ButtonAction,
        sdk: &mut (impl UploadPort + MetricsPort),
        faults: &mut impl FaultInjector,
    ) {
        match action {
            ButtonAction::HeartbeatUpload => {
                if self.is_wifi_connected() {
                    info!("Button: uploading heartbeat");
                    sdk.trigger_heartbeat();
                    post(sdk);
                } else {
                    warn!("Button: not connected, heartbeat not uploaded");
                }
            }
            ButtonAction::OtaCheck => self.triggers.notify_button(),
            ButtonAction::InjectFault(kind) => {
                warn!("Button: long press, injecting {}", kind);
                faults.inject(kind);
            }
            ButtonAction::Switch1Toggled => match sdk.add(SWITCH_1_COUNT_KEY, 1) {
                Ok(()) => info!("Switch 1 toggle counted"),
                Err(e) => error!("Failed to count switch 1 toggle: {}", e),
            },
            ButtonAction::Switch2Toggled => {
                sdk.trace_event(SWITCH_2_TRACE_REASON, "Switch state: 1");
                info!("Switch 2 toggle traced");
            }
        }
    }

    // ── Network ───────────────────────────────────────────────

    /// Network came up.  Blocks for the connect settle delay when this
    /// connect is what wakes the OTA task.
    pub fn handle_network_connected(&self, sdk: &mut (impl UploadPort + StackMonitorPort)) {
        self.wifi_connected.store(true, Ordering::SeqCst);
        info!("Network connected");

        if !self.stack_metrics_initialized.swap(true, Ordering::SeqCst) {
            let registered = metrics::stack::register_all(sdk);
            info!(
                "Stack metrics: {}/{} threads monitored",
                registered,
                metrics::stack::STACK_THREADS.len()
            );
        }

        self.triggers.notify_connected();
        self.upload_on_connect(sdk);
    }

    pub fn handle_network_disconnected(&self) {
        self.wifi_connected.store(false, Ordering::SeqCst);
        info!("Network disconnected");
    }

    fn upload_on_connect(&self, sdk: &mut impl UploadPort) {
        if self.post_coredump_on_connect && sdk.has_valid_coredump() {
            // The SDK posts the coredump itself on connect.
            info!("Coredump pending, leaving upload to the SDK");
            return;
        }

        info!("Sending captured data");
        sdk.trigger_heartbeat();
        if sdk.data_available() {
            post(sdk);
        } else {
            debug!("No data to send");
        }
    }

    // ── Heartbeat ─────────────────────────────────────────────

    /// Heartbeat collection hook.  Returns `true` if link metrics were
    /// recorded.
    pub fn collect_heartbeat(
        &self,
        status: Result<WifiLinkStatus, WifiStatusError>,
        sink: &mut impl MetricsPort,
    ) -> bool {
        metrics::wifi::collect(status, sink)
    }
}

fn post(sdk: &mut impl UploadPort) {
    match sdk.post_data() {
        Ok(()) => debug!("Data posted"),
        Err(e) => error!("Data post failed: {}", e),
    }
}
