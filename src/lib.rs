//! Diagnostics bridge firmware library.
//!
//! Exposes the pure-logic modules for integration testing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod metrics;
pub mod pins;
pub mod scheduler;

pub mod adapters;
pub mod drivers;

#[cfg(any(target_os = "espidf", test))]
pub mod esp_time_driver;
