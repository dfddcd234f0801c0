//! Log-backed diagnostics SDK adapter.
//!
//! Implements [`MetricsPort`], [`UploadPort`] and [`StackMonitorPort`] by
//! writing every call to the ESP-IDF logger (UART / USB-CDC in
//! production).  Heartbeats are counted so `data_available()` and
//! `post_data()` behave like a packetizer with a queue.  An adapter for the
//! real SDK implements the same traits.
//!
//! Clones share state, so the button thread and the network thread can
//! each hold one.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use log::info;

use crate::app::ports::{
    MetricsError, MetricsPort, StackMonitorError, StackMonitorPort, UploadError, UploadPort,
};

#[derive(Default)]
struct Shared {
    queued_heartbeats: AtomicU32,
    monitored_threads: AtomicU32,
    coredump_pending: AtomicBool,
}

/// Thread-table capacity of the SDK's stack monitor.
pub const MAX_MONITORED_THREADS: u32 = 16;

#[derive(Clone, Default)]
pub struct LogSdk {
    shared: Arc<Shared>,
}

impl LogSdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a coredump from the previous boot as waiting in flash.
    pub fn set_coredump_pending(&self, pending: bool) {
        self.shared.coredump_pending.store(pending, Ordering::SeqCst);
    }

    pub fn queued_heartbeats(&self) -> u32 {
        self.shared.queued_heartbeats.load(Ordering::SeqCst)
    }
}

impl MetricsPort for LogSdk {
    fn set_signed(&mut self, key: &'static str, value: i32) -> Result<(), MetricsError> {
        info!("METRIC | {} = {}", key, value);
        Ok(())
    }

    fn set_unsigned(&mut self, key: &'static str, value: u32) -> Result<(), MetricsError> {
        info!("METRIC | {} = {}", key, value);
        Ok(())
    }

    fn add(&mut self, key: &'static str, amount: i32) -> Result<(), MetricsError> {
        info!("METRIC | {} += {}", key, amount);
        Ok(())
    }
}

impl UploadPort for LogSdk {
    fn trigger_heartbeat(&mut self) {
        let queued = self.shared.queued_heartbeats.fetch_add(1, Ordering::SeqCst) + 1;
        info!("HEARTBEAT | collected ({} queued)", queued);
    }

    fn data_available(&self) -> bool {
        self.queued_heartbeats() > 0 || self.has_valid_coredump()
    }

    fn post_data(&mut self) -> Result<(), UploadError> {
        let sent = self.shared.queued_heartbeats.swap(0, Ordering::SeqCst);
        let coredump = self.shared.coredump_pending.swap(false, Ordering::SeqCst);
        info!("UPLOAD | posted {} heartbeat(s), coredump={}", sent, coredump);
        Ok(())
    }

    fn has_valid_coredump(&self) -> bool {
        self.shared.coredump_pending.load(Ordering::SeqCst)
    }

    fn trace_event(&mut self, reason: &'static str, detail: &str) {
        info!("TRACE | {} | {}", reason, detail);
    }
}

impl StackMonitorPort for LogSdk {
    fn add_thread(
        &mut self,
        thread_name: &'static str,
        metric_key: &'static str,
    ) -> Result<(), StackMonitorError> {
        let slot = self.shared.monitored_threads.fetch_add(1, Ordering::SeqCst);
        if slot >= MAX_MONITORED_THREADS {
            self.shared.monitored_threads.fetch_sub(1, Ordering::SeqCst);
            return Err(StackMonitorError::TableFull);
        }
        info!("STACK | {} -> {}", thread_name, metric_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeats_queue_until_posted() {
        let mut sdk = LogSdk::new();
        assert!(!sdk.data_available());
        sdk.trigger_heartbeat();
        sdk.trigger_heartbeat();
        assert_eq!(sdk.queued_heartbeats(), 2);
        assert!(sdk.data_available());
        sdk.post_data().unwrap();
        assert!(!sdk.data_available());
    }

    #[test]
    fn clones_share_the_queue() {
        let mut a = LogSdk::new();
        let b = a.clone();
        a.trigger_heartbeat();
        assert!(b.data_available());
    }

    #[test]
    fn coredump_is_cleared_by_post() {
        let mut sdk = LogSdk::new();
        sdk.set_coredump_pending(true);
        assert!(sdk.has_valid_coredump());
        sdk.post_data().unwrap();
        assert!(!sdk.has_valid_coredump());
    }

    #[test]
    fn thread_table_fills_up() {
        let mut sdk = LogSdk::new();
        for _ in 0..MAX_MONITORED_THREADS {
            sdk.add_thread("t", "k").unwrap();
        }
        assert_eq!(sdk.add_thread("t", "k"), Err(StackMonitorError::TableFull));
    }
}
