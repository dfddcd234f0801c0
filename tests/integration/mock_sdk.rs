//! Mock SDK adapters for integration tests.
//!
//! Records every call so tests can assert on the full history without a
//! diagnostics SDK or network.

use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

use diag_bridge::app::ports::{
    MetricsError, MetricsPort, OtaCheckError, OtaCheckOutcome, OtaCheckPort, StackMonitorError,
    StackMonitorPort, UploadError, UploadPort,
};
use diag_bridge::diagnostics::{FaultInjector, FaultKind};
use diag_bridge::scheduler::TriggerContext;

// ── OTA client ────────────────────────────────────────────────

/// One OTA check as seen by the client.
#[derive(Debug, Clone, Copy)]
pub struct CheckRecord {
    pub context: TriggerContext,
    pub at: Instant,
}

/// Reports every check over a channel; fails every other one.
pub struct RecordingOtaClient {
    tx: Sender<CheckRecord>,
    calls: u32,
    fail_every_other: bool,
}

impl RecordingOtaClient {
    pub fn new() -> (Self, Receiver<CheckRecord>) {
        let (tx, rx) = mpsc::channel();
        (
            Self {
                tx,
                calls: 0,
                fail_every_other: false,
            },
            rx,
        )
    }

    pub fn flaky() -> (Self, Receiver<CheckRecord>) {
        let (mut client, rx) = Self::new();
        client.fail_every_other = true;
        (client, rx)
    }
}

impl OtaCheckPort for RecordingOtaClient {
    fn check_for_update(
        &mut self,
        context: TriggerContext,
    ) -> Result<OtaCheckOutcome, OtaCheckError> {
        self.calls += 1;
        let _ = self.tx.send(CheckRecord {
            context,
            at: Instant::now(),
        });
        if self.fail_every_other && self.calls % 2 == 0 {
            Err(OtaCheckError::Failed(-116))
        } else {
            Ok(OtaCheckOutcome::NoUpdateAvailable)
        }
    }
}

// ── SDK ───────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSdk {
    pub heartbeats: u32,
    pub posts: u32,
    pub pending_data: bool,
    pub coredump: bool,
    pub signed: Vec<(&'static str, i32)>,
    pub unsigned: Vec<(&'static str, u32)>,
    pub counters: Vec<(&'static str, i32)>,
    pub traces: Vec<(&'static str, String)>,
    pub threads: Vec<&'static str>,
}

impl MetricsPort for MockSdk {
    fn set_signed(&mut self, key: &'static str, value: i32) -> Result<(), MetricsError> {
        self.signed.push((key, value));
        Ok(())
    }

    fn set_unsigned(&mut self, key: &'static str, value: u32) -> Result<(), MetricsError> {
        self.unsigned.push((key, value));
        Ok(())
    }

    fn add(&mut self, key: &'static str, amount: i32) -> Result<(), MetricsError> {
        self.counters.push((key, amount));
        Ok(())
    }
}

impl UploadPort for MockSdk {
    fn trigger_heartbeat(&mut self) {
        self.heartbeats += 1;
    }

    fn data_available(&self) -> bool {
        self.pending_data
    }

    fn post_data(&mut self) -> Result<(), UploadError> {
        self.posts += 1;
        self.pending_data = false;
        Ok(())
    }

    fn has_valid_coredump(&self) -> bool {
        self.coredump
    }

    fn trace_event(&mut self, reason: &'static str, detail: &str) {
        self.traces.push((reason, detail.to_string()));
    }
}

impl StackMonitorPort for MockSdk {
    fn add_thread(
        &mut self,
        thread_name: &'static str,
        _metric_key: &'static str,
    ) -> Result<(), StackMonitorError> {
        if thread_name == "tcp_work" {
            return Err(StackMonitorError::ThreadNotFound);
        }
        self.threads.push(thread_name);
        Ok(())
    }
}

// ── Faults ────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingInjector {
    pub injected: Vec<FaultKind>,
}

impl FaultInjector for RecordingInjector {
    fn inject(&mut self, kind: FaultKind) {
        self.injected.push(kind);
    }
}
