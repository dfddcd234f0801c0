//! Diagnostics Bridge firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  DkButtons       LogSdk              NvsAdapter   WifiAdapter  │
//! │  (GPIO scan)     (Metrics+Upload+    (Config)     (WifiStatus) │
//! │                   StackMonitor)                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            BackendServices (pure logic)                │    │
//! │  │  buttons · network edges · heartbeat collection        │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TriggerCoordinator ── ota_triggers thread ── OtaCheckPort     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Threads:
//! - `main`: button scan.
//! - `net_events`: link edges and the heartbeat timer.  May block for the
//!   connect settle delay.
//! - `ota_triggers`: coalesced OTA checks.
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::{AnyIOPin, Input, PinDriver, Pull};
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::wifi::{ClientConfiguration, Configuration, EspWifi};

use diag_bridge::adapters::log_sink::LogSdk;
use diag_bridge::adapters::nvs::NvsAdapter;
use diag_bridge::adapters::ota_client::DisabledOtaClient;
use diag_bridge::adapters::release::HttpOtaClient;
use diag_bridge::adapters::time::Uptime;
use diag_bridge::adapters::wifi::{LinkEvent, WifiAdapter};
use diag_bridge::app::ports::{ConfigPort, UploadPort, WifiStatusPort};
use diag_bridge::app::service::BackendServices;
use diag_bridge::config::BridgeConfig;
use diag_bridge::diagnostics::{self, PanicFaultInjector};
use diag_bridge::drivers::button::DkButtons;
use diag_bridge::drivers::task_pin::{self, Core};
use diag_bridge::error::Error;
use diag_bridge::pins;
use diag_bridge::scheduler::TriggerCoordinator;

/// Station credentials baked in at build time.
const WIFI_SSID: Option<&str> = option_env!("DIAG_BRIDGE_WIFI_SSID");
const WIFI_PASSWORD: Option<&str> = option_env!("DIAG_BRIDGE_WIFI_PASSWORD");
/// Release manifest polled by the OTA trigger task.
const OTA_MANIFEST_URL: Option<&str> = option_env!("DIAG_BRIDGE_OTA_MANIFEST_URL");

const NET_TASK_PRIORITY: u8 = 5;
const NET_TASK_STACK_KB: usize = 6;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Diag Bridge v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsAdapter::new() {
        Ok(nvs) => load_config(&nvs),
        Err(e) => {
            warn!("{}; running with defaults and no persistence", Error::from(e));
            BridgeConfig::default()
        }
    };
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => warn!("Config not printable: {}", e),
    }

    // ── 3. Network bring-up ───────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    // Must outlive the program; the driver stops when dropped.
    let mut esp_wifi = EspWifi::new(peripherals.modem, sysloop, None)?;
    start_station(&mut esp_wifi)?;

    // ── 4. OTA trigger task ───────────────────────────────────
    let triggers = Arc::new(TriggerCoordinator::from_config(&config));
    let _ota_task = match (config.ota_enabled, OTA_MANIFEST_URL) {
        (true, Some(url)) => {
            info!("OTA: release manifest at {}", url);
            Arc::clone(&triggers).spawn(HttpOtaClient::new(url), &config)?
        }
        (true, None) => {
            warn!("OTA: no release manifest URL built in");
            Arc::clone(&triggers).spawn(DisabledOtaClient, &config)?
        }
        (false, _) => Arc::clone(&triggers).spawn(DisabledOtaClient, &config)?,
    };

    // ── 5. Backend services ───────────────────────────────────
    let services = Arc::new(BackendServices::new(&config, triggers));
    services.init();
    let sdk = LogSdk::new();

    // ── 6. Network event thread ───────────────────────────────
    {
        let services = Arc::clone(&services);
        let mut sdk = sdk.clone();
        let _net_task = task_pin::spawn_on_core(
            Core::Pro,
            NET_TASK_PRIORITY,
            NET_TASK_STACK_KB,
            "net_events\0",
            move || network_loop(&services, &mut sdk),
        )?;
    }

    // ── 7. Button scan loop ───────────────────────────────────
    let mut buttons = DkButtons::new([
        button_input(pins::BUTTON_GPIOS[0])?,
        button_input(pins::BUTTON_GPIOS[1])?,
        button_input(pins::BUTTON_GPIOS[2])?,
        button_input(pins::BUTTON_GPIOS[3])?,
    ]);
    let clock = Uptime::new();
    let mut sdk = sdk;
    let mut faults = PanicFaultInjector;

    info!("System ready. Scanning buttons.");

    loop {
        if let Some(edge) = buttons.poll() {
            services.handle_buttons(edge.states, edge.changed, clock.millis(), &mut sdk, &mut faults);
        }
        std::thread::sleep(Duration::from_millis(pins::BUTTON_SCAN_MS));
    }
}

fn load_config(nvs: &NvsAdapter) -> BridgeConfig {
    match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("{}; using defaults", Error::from(e));
            BridgeConfig::default()
        }
    }
}

fn start_station(wifi: &mut EspWifi<'static>) -> Result<()> {
    let Some(ssid) = WIFI_SSID else {
        warn!("WiFi: no credentials built in, staying offline");
        return Ok(());
    };

    let client = ClientConfiguration {
        ssid: ssid
            .try_into()
            .map_err(|_| Error::Init("WiFi SSID longer than 32 bytes"))?,
        password: WIFI_PASSWORD
            .unwrap_or("")
            .try_into()
            .map_err(|_| Error::Init("WiFi password longer than 64 bytes"))?,
        ..Default::default()
    };
    wifi.set_configuration(&Configuration::Client(client))?;
    wifi.start()?;
    // Association completes in the background; `net_events` sees the edge.
    if let Err(e) = wifi.connect() {
        error!("WiFi: connect request failed: {}", e);
    }
    Ok(())
}

fn button_input(gpio: i32) -> Result<PinDriver<'static, AnyIOPin, Input>> {
    // SAFETY: the button GPIOs are not claimed by any other driver.
    let pin = unsafe { AnyIOPin::new(gpio) };
    let mut input = PinDriver::input(pin)?;
    input.set_pull(Pull::Up)?;
    Ok(input)
}

fn network_loop(services: &BackendServices, sdk: &mut LogSdk) {
    let mut wifi = WifiAdapter::new();
    let heartbeat = Duration::from_secs(pins::HEARTBEAT_INTERVAL_SECS);
    let mut last_heartbeat = Instant::now();

    loop {
        match wifi.poll() {
            Some(LinkEvent::Connected) => services.handle_network_connected(sdk),
            Some(LinkEvent::Disconnected) => services.handle_network_disconnected(),
            None => {}
        }

        if last_heartbeat.elapsed() >= heartbeat {
            last_heartbeat = Instant::now();
            services.collect_heartbeat(wifi.link_status(), sdk);
            sdk.trigger_heartbeat();
        }

        std::thread::sleep(Duration::from_millis(pins::LINK_POLL_MS));
    }
}
