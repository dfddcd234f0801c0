//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements         | Connects to                   |
//! |--------------|--------------------|-------------------------------|
//! | `log_sink`   | MetricsPort        | Serial log output             |
//! |              | UploadPort         |                               |
//! |              | StackMonitorPort   |                               |
//! | `nvs`        | ConfigPort         | NVS / in-memory store         |
//! | `ota_client` | OtaCheckPort       | disabled / simulated checks   |
//! | `release`    | OtaCheckPort       | HTTP manifest + OTA partition |
//! | `time`       | -                  | ESP32 system timer            |
//! | `wifi`       | WifiStatusPort     | ESP-IDF WiFi STA              |

pub mod log_sink;
pub mod nvs;
pub mod ota_client;
pub mod release;
pub mod time;
pub mod wifi;
