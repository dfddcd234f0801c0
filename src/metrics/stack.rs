//! Unused-stack metrics for the RTOS threads that matter to the bridge.
//!
//! Registered once, on the first network connect, because several of the
//! network threads only exist after the stack comes up.

use log::{error, info};

use crate::app::ports::StackMonitorPort;

/// A monitored thread and the heartbeat metric its free stack lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackThread {
    pub thread_name: &'static str,
    pub metric_key: &'static str,
}

const fn thread(thread_name: &'static str, metric_key: &'static str) -> StackThread {
    StackThread {
        thread_name,
        metric_key,
    }
}

pub const STACK_THREADS: [StackThread; 14] = [
    // Wi-Fi driver and supplicant
    thread("hostap_iface_wq", "ncs_wifi_hostap_iface_unused_stack"),
    thread("hostap_handler", "ncs_wifi_hostap_handler_unused_stack"),
    thread("nrf70_intr_wq", "ncs_wifi_intr_unused_stack"),
    thread("nrf70_bh_wq", "ncs_wifi_bh_unused_stack"),
    // Network stack
    thread("mflt_http", "ncs_mflt_http_unused_stack"),
    thread("conn_mgr_monitor", "ncs_conn_mgr_monitor_unused_stack"),
    thread("net_socket_service", "ncs_net_socket_service_unused_stack"),
    thread("rx_q[0]", "ncs_rx_q0_unused_stack"),
    thread("tx_q[0]", "ncs_tx_q0_unused_stack"),
    thread("net_mgmt", "ncs_net_mgmt_unused_stack"),
    thread("tcp_work", "ncs_tcp_work_unused_stack"),
    // System
    thread("shell_uart", "ncs_shell_uart_unused_stack"),
    thread("logging", "ncs_logging_unused_stack"),
    thread("main", "ncs_main_unused_stack"),
];

/// Register every thread in [`STACK_THREADS`].  A failure is logged and
/// the remaining threads are still tried.  Returns how many succeeded.
pub fn register_all<S: StackMonitorPort>(monitor: &mut S) -> usize {
    let mut registered = 0;
    for t in &STACK_THREADS {
        match monitor.add_thread(t.thread_name, t.metric_key) {
            Ok(()) => {
                info!("Stack monitor added for {}", t.thread_name);
                registered += 1;
            }
            Err(e) => error!("Failed to add stack monitor for {}: {}", t.thread_name, e),
        }
    }
    registered
}
