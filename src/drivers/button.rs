//! Development-kit button and switch scanner.
//!
//! ## Hardware
//!
//! Four active-low inputs with pull-ups: two momentary buttons and two
//! slide switches.  The main loop calls [`DkButtons::poll`] at the scan
//! period; sampling that slowly is the debounce.
//!
//! ## Reported edges
//!
//! `poll()` reports the full pressed-state bitmask plus the bits that
//! changed since the previous scan, the same `(states, has_changed)` pair
//! the vendor board library hands to its callback.
//!
//! | Bit | Input     |
//! |-----|-----------|
//! | 0   | Button 1  |
//! | 1   | Button 2  |
//! | 2   | Switch 1  |
//! | 3   | Switch 2  |

use embedded_hal::digital::InputPin;

pub const BUTTON_1: u32 = 1 << 0;
pub const BUTTON_2: u32 = 1 << 1;
pub const SWITCH_1: u32 = 1 << 2;
pub const SWITCH_2: u32 = 1 << 3;

/// Number of scanned inputs.
pub const INPUT_COUNT: usize = 4;

/// One scan that saw at least one input change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    /// Bit set = input currently pressed / switched on.
    pub states: u32,
    /// Bit set = input changed since the previous scan.
    pub changed: u32,
}

pub struct DkButtons<P> {
    pins: [P; INPUT_COUNT],
    last_states: u32,
}

impl<P: InputPin> DkButtons<P> {
    /// `pins` in bit order: button 1, button 2, switch 1, switch 2.
    pub fn new(pins: [P; INPUT_COUNT]) -> Self {
        Self {
            pins,
            last_states: 0,
        }
    }

    /// Pressed-state bitmask from the last scan.
    pub fn states(&self) -> u32 {
        self.last_states
    }

    /// Sample every input.  Returns `None` if nothing changed.
    pub fn poll(&mut self) -> Option<ButtonEdge> {
        let mut states = 0;
        for (i, pin) in self.pins.iter_mut().enumerate() {
            let bit = 1 << i;
            // A failed read keeps the previous level for that input.
            let pressed = pin.is_low().unwrap_or(self.last_states & bit != 0);
            if pressed {
                states |= bit;
            }
        }

        let changed = states ^ self.last_states;
        self.last_states = states;
        (changed != 0).then_some(ButtonEdge { states, changed })
    }
}
