//! Application core: the bridge's domain logic, no direct I/O.
//!
//! Button gestures are classified in [`buttons`], reactions to board and
//! network events live in [`service`], and everything the SDK provides is
//! reached through the **port traits** in [`ports`].

pub mod buttons;
pub mod ports;
pub mod service;
