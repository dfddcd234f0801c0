//! Integration tests for the board-event → BackendServices → SDK pipeline.
//!
//! Button edges come from `DkButtons`-shaped bitmasks, link edges from the
//! simulated WiFi adapter, and OTA checks from a live trigger task.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use diag_bridge::adapters::log_sink::LogSdk;
use diag_bridge::adapters::nvs::NvsAdapter;
use diag_bridge::adapters::wifi::{LinkEvent, WifiAdapter};
use diag_bridge::app::buttons::ButtonAction;
use diag_bridge::app::ports::{ConfigPort, UploadPort, WifiStatusPort};
use diag_bridge::app::service::{BackendServices, SWITCH_1_COUNT_KEY, SWITCH_2_TRACE_REASON};
use diag_bridge::config::BridgeConfig;
use diag_bridge::diagnostics::FaultKind;
use diag_bridge::drivers::button::{BUTTON_1, BUTTON_2, SWITCH_1, SWITCH_2};
use diag_bridge::metrics::stack::STACK_THREADS;
use diag_bridge::metrics::wifi::{CHANNEL_KEY, RSSI_KEY, TX_RATE_KEY};
use diag_bridge::scheduler::{TriggerContext, TriggerCoordinator};

use crate::mock_sdk::{CheckRecord, MockSdk, RecordingInjector, RecordingOtaClient};

const RECV: Duration = Duration::from_secs(3);

fn fast_config() -> BridgeConfig {
    BridgeConfig {
        connect_settle_secs: 0,
        ..BridgeConfig::default()
    }
}

fn bridge(config: &BridgeConfig) -> (Arc<BackendServices>, Receiver<CheckRecord>) {
    let triggers = Arc::new(TriggerCoordinator::from_config(config));
    let (client, rx) = RecordingOtaClient::new();
    Arc::clone(&triggers)
        .spawn(client, config)
        .expect("spawn trigger task");
    (Arc::new(BackendServices::new(config, triggers)), rx)
}

// ── Network edges ─────────────────────────────────────────────

#[test]
fn link_up_runs_connect_flow_and_ota_check() {
    let config = fast_config();
    let (services, rx) = bridge(&config);
    let mut wifi = WifiAdapter::new();
    let mut sdk = MockSdk {
        pending_data: true,
        ..MockSdk::default()
    };

    wifi.set_sim_link(true);
    assert_eq!(wifi.poll(), Some(LinkEvent::Connected));
    services.handle_network_connected(&mut sdk);

    assert!(services.is_wifi_connected());
    assert_eq!(sdk.threads.len(), STACK_THREADS.len() - 1);
    assert_eq!((sdk.heartbeats, sdk.posts), (1, 1));
    assert_eq!(
        rx.recv_timeout(RECV).expect("connect check").context,
        TriggerContext::Connect
    );

    wifi.set_sim_link(false);
    assert_eq!(wifi.poll(), Some(LinkEvent::Disconnected));
    services.handle_network_disconnected();
    assert!(!services.is_wifi_connected());
}

#[test]
fn reconnect_does_not_re_register_stack_metrics() {
    let (services, _rx) = bridge(&fast_config());
    let mut sdk = MockSdk::default();

    services.handle_network_connected(&mut sdk);
    services.handle_network_disconnected();
    services.handle_network_connected(&mut sdk);

    assert_eq!(sdk.threads.len(), STACK_THREADS.len() - 1);
    assert_eq!(sdk.heartbeats, 2);
}

// ── Buttons ───────────────────────────────────────────────────

#[test]
fn ota_button_reaches_the_trigger_task() {
    let (services, rx) = bridge(&fast_config());
    let mut sdk = MockSdk::default();
    let mut faults = RecordingInjector::default();

    services.handle_buttons(BUTTON_2, BUTTON_2, 10_000, &mut sdk, &mut faults);
    let actions = services.handle_buttons(0, BUTTON_2, 10_250, &mut sdk, &mut faults);
    assert_eq!(actions.as_slice(), &[ButtonAction::OtaCheck]);

    assert_eq!(
        rx.recv_timeout(RECV).expect("button check").context,
        TriggerContext::Button
    );
}

#[test]
fn full_board_session() {
    let (services, _rx) = bridge(&fast_config());
    let mut sdk = MockSdk::default();
    let mut faults = RecordingInjector::default();

    // Offline heartbeat request is refused.
    services.handle_buttons(BUTTON_1, BUTTON_1, 0, &mut sdk, &mut faults);
    services.handle_buttons(0, BUTTON_1, 200, &mut sdk, &mut faults);
    assert_eq!(sdk.heartbeats, 0);

    services.handle_network_connected(&mut sdk);
    let after_connect = sdk.heartbeats;

    services.handle_buttons(BUTTON_1, BUTTON_1, 1_000, &mut sdk, &mut faults);
    services.handle_buttons(0, BUTTON_1, 1_400, &mut sdk, &mut faults);
    assert_eq!(sdk.heartbeats, after_connect + 1);

    services.handle_buttons(SWITCH_1 | SWITCH_2, SWITCH_1 | SWITCH_2, 2_000, &mut sdk, &mut faults);
    services.handle_buttons(0, SWITCH_1 | SWITCH_2, 2_500, &mut sdk, &mut faults);
    assert_eq!(sdk.counters, vec![(SWITCH_1_COUNT_KEY, 1)]);
    assert_eq!(sdk.traces.len(), 1);
    assert_eq!(sdk.traces[0].0, SWITCH_2_TRACE_REASON);

    services.handle_buttons(BUTTON_2, BUTTON_2, 3_000, &mut sdk, &mut faults);
    services.handle_buttons(0, BUTTON_2, 6_000, &mut sdk, &mut faults);
    assert_eq!(faults.injected, vec![FaultKind::DivideByZero]);
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_records_link_only_when_associated() {
    let (services, _rx) = bridge(&fast_config());
    let mut wifi = WifiAdapter::new();
    let mut sdk = MockSdk::default();

    assert!(!services.collect_heartbeat(wifi.link_status(), &mut sdk));
    assert!(sdk.signed.is_empty());

    wifi.set_sim_link(true);
    assert!(services.collect_heartbeat(wifi.link_status(), &mut sdk));
    assert_eq!(sdk.signed, vec![(RSSI_KEY, -60)]);
    assert!(sdk.unsigned.contains(&(CHANNEL_KEY, 6)));
    assert!(sdk.unsigned.contains(&(TX_RATE_KEY, 72)));
}

// ── Adapters wired together ───────────────────────────────────

#[test]
fn log_sdk_drives_the_connect_upload() {
    let (services, _rx) = bridge(&fast_config());
    let mut sdk = LogSdk::new();

    services.handle_network_connected(&mut sdk);
    // The connect flow queued a heartbeat and posted it straight away.
    assert_eq!(sdk.queued_heartbeats(), 0);
    assert!(!sdk.data_available());
}

#[test]
fn stored_config_shapes_the_bridge() {
    let nvs = NvsAdapter::new().expect("nvs");
    let stored = BridgeConfig {
        long_press_threshold_ms: 1_000,
        connect_settle_secs: 0,
        ..BridgeConfig::default()
    };
    nvs.save(&stored).expect("save");

    let config = nvs.load().expect("load");
    let (services, _rx) = bridge(&config);
    let mut sdk = MockSdk::default();
    let mut faults = RecordingInjector::default();

    services.handle_buttons(BUTTON_1, BUTTON_1, 0, &mut sdk, &mut faults);
    services.handle_buttons(0, BUTTON_1, 1_200, &mut sdk, &mut faults);
    assert_eq!(faults.injected, vec![FaultKind::StackOverflow]);
}
