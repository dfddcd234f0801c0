//! Heartbeat metric collectors.
//!
//! | Collector | Runs                          | Records                        |
//! |-----------|-------------------------------|--------------------------------|
//! | `wifi`    | every heartbeat               | RSSI, channel, link mode, rate |
//! | `stack`   | once, on first network connect| per-thread unused stack        |

pub mod stack;
pub mod wifi;
