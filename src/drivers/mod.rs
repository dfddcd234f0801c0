//! Board input scanning and task spawning helpers.

pub mod button;
pub mod task_pin;
