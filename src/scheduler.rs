//! OTA trigger coalescer.
//!
//! Three trigger sources share one OTA-check task.  Producers record a
//! cause bit and raise a binary wake signal; the task drains every cause
//! recorded since its last wake and runs a single check for all of them.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        Trigger Sources                         │
//! │                                                                │
//! │  ┌──────────────┐   ┌───────────────────┐   ┌───────────────┐  │
//! │  │ Button 2     │   │ Network connected │   │ Check interval│  │
//! │  │ notify_button│   │ notify_connected  │   │ (timeout)     │  │
//! │  └──────┬───────┘   └─────────┬─────────┘   └───────┬───────┘  │
//! │         │ cause |= BUTTON     │ cause |= CONNECT    │          │
//! │         │                     │ settle delay        │          │
//! │         ▼                     ▼                     │          │
//! │  ┌────────────────────────────────────────┐         │          │
//! │  │  Wake signal (0/1, set only if clear)  │         │          │
//! │  └───────────────────┬────────────────────┘         │          │
//! │                      ▼                              ▼          │
//! │  ┌──────────────────────────────────────────────────────────┐  │
//! │  │  OTA trigger task: wait(signal, interval) → drain → check│  │
//! │  └──────────────────────────────────────────────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A notifier that finds a wake already pending only leaves its cause bit;
//! the pending wake drains it.  The connect notifier checks before its
//! settle delay and sets after, so a wake consumed inside that window
//! produces one extra check.  Checks are idempotent, so that is accepted.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};
use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, error, info, warn};

use crate::app::ports::{OtaCheckError, OtaCheckOutcome, OtaCheckPort};
use crate::config::BridgeConfig;
use crate::drivers::task_pin::{self, Core};

const CAUSE_BUTTON: u8 = 0b01;
const CAUSE_CONNECT: u8 = 0b10;
const CAUSE_MASK: u8 = CAUSE_BUTTON | CAUSE_CONNECT;

// ═══════════════════════════════════════════════════════════════
//  Causes and labels
// ═══════════════════════════════════════════════════════════════

/// Snapshot of the pending trigger causes.  Presence only: two button
/// presses before a drain look the same as one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerCauses(u8);

impl TriggerCauses {
    pub const EMPTY: Self = Self(0);
    pub const BUTTON: Self = Self(CAUSE_BUTTON);
    pub const NETWORK_CONNECTED: Self = Self(CAUSE_CONNECT);

    /// Unknown bits are dropped.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & CAUSE_MASK)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn button(self) -> bool {
        self.0 & CAUSE_BUTTON != 0
    }

    pub const fn network_connected(self) -> bool {
        self.0 & CAUSE_CONNECT != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Label for a check woken by the signal with these causes drained.
    pub fn context(self) -> TriggerContext {
        match (self.button(), self.network_connected()) {
            (true, true) => TriggerContext::ButtonAndConnect,
            (true, false) => TriggerContext::Button,
            (false, true) => TriggerContext::Connect,
            (false, false) => TriggerContext::Manual,
        }
    }
}

/// Why an OTA check ran.  Informational only; every context runs the
/// same check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerContext {
    Button,
    Connect,
    ButtonAndConnect,
    /// Woken with no recorded cause.
    Manual,
    /// The check interval elapsed without a wake.
    Periodic,
}

impl TriggerContext {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Connect => "connect",
            Self::ButtonAndConnect => "button+connect",
            Self::Manual => "manual",
            Self::Periodic => "periodic",
        }
    }
}

impl fmt::Display for TriggerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Coordinator
// ═══════════════════════════════════════════════════════════════

/// Shared state between the OTA trigger task and its notifiers.
///
/// Create one at start-up and share it by `Arc` (or keep it in a
/// `static`; [`TriggerCoordinator::new`] is `const`).
pub struct TriggerCoordinator {
    causes: AtomicU8,
    wake: Signal<CriticalSectionRawMutex, ()>,
    check_interval: Duration,
    settle_delay: Duration,
}

impl TriggerCoordinator {
    pub const fn new(check_interval: Duration, settle_delay: Duration) -> Self {
        Self {
            causes: AtomicU8::new(0),
            wake: Signal::new(),
            check_interval,
            settle_delay,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.ota_check_interval(), config.connect_settle_delay())
    }

    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Request a check on behalf of the OTA button.
    ///
    /// Never blocks; safe from the button callback context.
    pub fn notify_button(&self) {
        self.record(CAUSE_BUTTON);

        if self.wake.signaled() {
            debug!("OTA check already pending");
        } else {
            self.wake.signal(());
            info!("OTA check requested by button press");
        }
    }

    /// Request a check because the network came up.
    ///
    /// Blocks for the settle delay when it has to raise the wake itself,
    /// so call it from a context that may sleep.
    pub fn notify_connected(&self) {
        self.record(CAUSE_CONNECT);

        if self.wake.signaled() {
            debug!("OTA check already pending");
        } else {
            std::thread::sleep(self.settle_delay);
            self.wake.signal(());
            info!("OTA check scheduled for network connect");
        }
    }

    /// Whether a wake is raised and not yet consumed.
    pub fn wake_pending(&self) -> bool {
        self.wake.signaled()
    }

    /// Causes recorded since the last drain, without clearing them.
    pub fn pending_causes(&self) -> TriggerCauses {
        TriggerCauses::from_bits(self.causes.load(Ordering::SeqCst))
    }

    /// Wait for the next trigger and return its label.
    ///
    /// A wake drains the cause set; a timeout leaves it untouched.
    pub async fn next_trigger(&self) -> TriggerContext {
        match embassy_time::with_timeout(to_embassy(self.check_interval), self.wake.wait()).await {
            Ok(()) => self.take_causes().context(),
            Err(embassy_time::TimeoutError) => TriggerContext::Periodic,
        }
    }

    /// Body of the OTA trigger task.  Never returns.
    pub fn run<C: OtaCheckPort>(&self, client: &mut C) -> ! {
        info!(
            "OTA trigger task started (interval {}s, settle {}s)",
            self.check_interval.as_secs(),
            self.settle_delay.as_secs()
        );

        let mut disabled_warned = false;
        loop {
            let context = futures_lite::future::block_on(self.next_trigger());
            schedule_ota_check(client, context, &mut disabled_warned);
        }
    }

    /// Spawn the OTA trigger task on its own thread.
    pub fn spawn<C>(
        self: Arc<Self>,
        mut client: C,
        config: &BridgeConfig,
    ) -> std::io::Result<std::thread::JoinHandle<()>>
    where
        C: OtaCheckPort + Send + 'static,
    {
        task_pin::spawn_on_core(
            Core::App,
            config.ota_thread_priority,
            config.ota_thread_stack_kb as usize,
            "ota_triggers\0",
            move || {
                self.run(&mut client);
            },
        )
    }

    fn record(&self, cause: u8) {
        self.causes.fetch_or(cause, Ordering::SeqCst);
    }

    fn take_causes(&self) -> TriggerCauses {
        TriggerCauses::from_bits(self.causes.swap(0, Ordering::SeqCst))
    }
}

fn to_embassy(d: Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(d.as_micros().min(u64::MAX as u128) as u64)
}

/// Run one check and log its outcome.  Nothing here affects scheduling.
fn schedule_ota_check<C: OtaCheckPort>(
    client: &mut C,
    context: TriggerContext,
    disabled_warned: &mut bool,
) {
    info!("Starting OTA check ({})", context);

    match client.check_for_update(context) {
        Ok(OtaCheckOutcome::NoUpdateAvailable) => {
            info!("No new OTA update available ({})", context);
        }
        Ok(OtaCheckOutcome::DownloadStarted) => {
            info!("OTA download started ({})", context);
        }
        Err(OtaCheckError::Disabled) => {
            if !*disabled_warned {
                warn!("OTA support is disabled; enable it in the bridge config to run checks");
                *disabled_warned = true;
            }
        }
        Err(OtaCheckError::Failed(code)) => {
            error!("OTA check failed ({}), err {}", context, code);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
