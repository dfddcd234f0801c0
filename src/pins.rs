//! GPIO assignments for the development board.
//!
//! Single source of truth: the binary builds its input drivers from these
//! numbers instead of hard-coding them.

// ---------------------------------------------------------------------------
// Buttons and switches (active-low, internal pull-up)
// ---------------------------------------------------------------------------

/// Button 1 (the BOOT strap button): short press uploads a heartbeat, long press overflows a stack.
pub const BUTTON_1_GPIO: i32 = 0;
/// Button 2: short press requests an OTA check, long press divides by zero.
pub const BUTTON_2_GPIO: i32 = 4;
/// Slide switch 1: counted in the heartbeat metrics.
pub const SWITCH_1_GPIO: i32 = 5;
/// Slide switch 2: recorded as a trace event.
pub const SWITCH_2_GPIO: i32 = 6;

/// Inputs in bit order of `drivers::button`.
pub const BUTTON_GPIOS: [i32; 4] = [BUTTON_1_GPIO, BUTTON_2_GPIO, SWITCH_1_GPIO, SWITCH_2_GPIO];

// ---------------------------------------------------------------------------
// Scan timing
// ---------------------------------------------------------------------------

/// Button scan period.  Sampling this slowly is the debounce.
pub const BUTTON_SCAN_MS: u64 = 20;
/// How often the network thread samples the station link.
pub const LINK_POLL_MS: u64 = 500;
/// Heartbeat interval for the link metrics.
pub const HEARTBEAT_INTERVAL_SECS: u64 = 3600;
