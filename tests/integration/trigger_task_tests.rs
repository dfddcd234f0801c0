//! End-to-end tests for the OTA trigger task running on its own thread.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use diag_bridge::config::BridgeConfig;
use diag_bridge::scheduler::{TriggerContext, TriggerCoordinator};

use crate::mock_sdk::{CheckRecord, RecordingOtaClient};

const RECV: Duration = Duration::from_secs(3);

fn start(interval: Duration, settle: Duration) -> (Arc<TriggerCoordinator>, Receiver<CheckRecord>) {
    let coord = Arc::new(TriggerCoordinator::new(interval, settle));
    let (client, rx) = RecordingOtaClient::flaky();
    Arc::clone(&coord)
        .spawn(client, &BridgeConfig::default())
        .expect("spawn trigger task");
    (coord, rx)
}

#[test]
fn periodic_checks_keep_running_through_failures() {
    let (_coord, rx) = start(Duration::from_millis(40), Duration::ZERO);

    // Every second check fails; the loop must not care.
    for _ in 0..4 {
        let record = rx.recv_timeout(RECV).expect("periodic check");
        assert_eq!(record.context, TriggerContext::Periodic);
    }
}

#[test]
fn button_interrupts_a_long_interval() {
    let (coord, rx) = start(Duration::from_secs(3600), Duration::ZERO);

    let pressed = Instant::now();
    coord.notify_button();
    let record = rx.recv_timeout(RECV).expect("button check");
    assert_eq!(record.context, TriggerContext::Button);
    assert!(record.at.duration_since(pressed) < Duration::from_secs(1));
}

#[test]
fn connect_waits_for_the_settle_delay() {
    let settle = Duration::from_millis(200);
    let (coord, rx) = start(Duration::from_secs(3600), settle);

    let connected = Instant::now();
    coord.notify_connected();
    assert!(connected.elapsed() >= settle);

    let record = rx.recv_timeout(RECV).expect("connect check");
    assert_eq!(record.context, TriggerContext::Connect);
    assert!(record.at.duration_since(connected) >= settle);
}

#[test]
fn presses_while_pending_collapse_into_one_check() {
    let coord = Arc::new(TriggerCoordinator::new(
        Duration::from_secs(3600),
        Duration::ZERO,
    ));
    // Raise the wake before the task exists so every press lands on a
    // pending wake.
    for _ in 0..5 {
        coord.notify_button();
    }
    let (client, rx) = RecordingOtaClient::new();
    Arc::clone(&coord)
        .spawn(client, &BridgeConfig::default())
        .expect("spawn trigger task");

    assert_eq!(
        rx.recv_timeout(RECV).expect("button check").context,
        TriggerContext::Button
    );
    assert!(rx.recv_timeout(Duration::from_millis(300)).is_err());
}

#[test]
fn button_during_settle_joins_the_connect_check() {
    let settle = Duration::from_millis(400);
    let (coord, rx) = start(Duration::from_secs(3600), settle);

    let notifier = {
        let coord = Arc::clone(&coord);
        std::thread::spawn(move || coord.notify_connected())
    };
    std::thread::sleep(Duration::from_millis(50));
    coord.notify_button();

    // The press raises the wake at once and drains both causes.
    let first = rx.recv_timeout(RECV).expect("combined check");
    assert_eq!(first.context, TriggerContext::ButtonAndConnect);

    // The connect notifier still raises its wake after the delay; nothing
    // is left in the cause set by then.
    notifier.join().expect("notifier thread");
    let second = rx.recv_timeout(RECV).expect("late connect wake");
    assert_eq!(second.context, TriggerContext::Manual);
}
