//! Button gesture → bridge action mapping.
//!
//! | Input    | Gesture                      | Action                           |
//! |----------|------------------------------|----------------------------------|
//! | Button 1 | short press (release)        | `HeartbeatUpload`                |
//! | Button 1 | long press (release ≥ hold)  | `InjectFault(StackOverflow)`     |
//! | Button 2 | short press (release)        | `OtaCheck`                       |
//! | Button 2 | long press (release ≥ hold)  | `InjectFault(DivideByZero)`      |
//! | Switch 1 | switched on                  | `Switch1Toggled`                 |
//! | Switch 2 | switched on                  | `Switch2Toggled`                 |
//!
//! Gestures are decided on release, so the hold time is measured from the
//! press edge of the same button.

use heapless::Vec;

use crate::diagnostics::FaultKind;
use crate::drivers::button::{BUTTON_1, BUTTON_2, INPUT_COUNT, SWITCH_1, SWITCH_2};

/// What a button edge asks the bridge to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    /// Close the heartbeat interval and upload it now.
    HeartbeatUpload,
    /// Request an OTA check through the trigger coalescer.
    OtaCheck,
    /// Deliberately crash to exercise crash capture.
    InjectFault(FaultKind),
    /// Count a switch 1 toggle in the heartbeat metrics.
    Switch1Toggled,
    /// Record a switch 2 trace event.
    Switch2Toggled,
}

/// Up to one action per input per scan.
pub type ButtonActions = Vec<ButtonAction, INPUT_COUNT>;

pub struct ButtonClassifier {
    long_press_ms: u64,
    button1_pressed_at_ms: u64,
    button2_pressed_at_ms: u64,
}

impl ButtonClassifier {
    pub fn new(long_press_ms: u32) -> Self {
        Self {
            long_press_ms: long_press_ms as u64,
            button1_pressed_at_ms: 0,
            button2_pressed_at_ms: 0,
        }
    }

    /// Classify one `(states, changed)` edge observed at `now_ms`.
    pub fn classify(&mut self, states: u32, changed: u32, now_ms: u64) -> ButtonActions {
        let pressed = changed & states;
        let released = changed & !states;
        let mut actions = ButtonActions::new();

        if pressed & BUTTON_1 != 0 {
            self.button1_pressed_at_ms = now_ms;
        }
        if released & BUTTON_1 != 0 {
            let action = if self.is_long(self.button1_pressed_at_ms, now_ms) {
                ButtonAction::InjectFault(FaultKind::StackOverflow)
            } else {
                ButtonAction::HeartbeatUpload
            };
            push(&mut actions, action);
        }

        if pressed & BUTTON_2 != 0 {
            self.button2_pressed_at_ms = now_ms;
        }
        if released & BUTTON_2 != 0 {
            let action = if self.is_long(self.button2_pressed_at_ms, now_ms) {
                ButtonAction::InjectFault(FaultKind::DivideByZero)
            } else {
                ButtonAction::OtaCheck
            };
            push(&mut actions, action);
        }

        if pressed & SWITCH_1 != 0 {
            push(&mut actions, ButtonAction::Switch1Toggled);
        }
        if pressed & SWITCH_2 != 0 {
            push(&mut actions, ButtonAction::Switch2Toggled);
        }

        actions
    }

    fn is_long(&self, pressed_at_ms: u64, now_ms: u64) -> bool {
        now_ms.saturating_sub(pressed_at_ms) >= self.long_press_ms
    }
}

// Capacity equals the number of inputs and each input yields at most one
// action, so this cannot overflow.
fn push(actions: &mut ButtonActions, action: ButtonAction) {
    let _ = actions.push(action);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_press_button2_requests_ota() {
        let mut c = ButtonClassifier::new(3000);
        assert!(c.classify(BUTTON_2, BUTTON_2, 1_000).is_empty());
        let actions = c.classify(0, BUTTON_2, 1_200);
        assert_eq!(actions.as_slice(), &[ButtonAction::OtaCheck]);
    }

    #[test]
    fn long_press_button2_injects_divide_by_zero() {
        let mut c = ButtonClassifier::new(3000);
        c.classify(BUTTON_2, BUTTON_2, 10_000);
        let actions = c.classify(0, BUTTON_2, 13_000);
        assert_eq!(
            actions.as_slice(),
            &[ButtonAction::InjectFault(FaultKind::DivideByZero)]
        );
    }

    #[test]
    fn button1_short_and_long() {
        let mut c = ButtonClassifier::new(3000);
        c.classify(BUTTON_1, BUTTON_1, 5_000);
        assert_eq!(
            c.classify(0, BUTTON_1, 7_999).as_slice(),
            &[ButtonAction::HeartbeatUpload]
        );

        c.classify(BUTTON_1, BUTTON_1, 20_000);
        assert_eq!(
            c.classify(0, BUTTON_1, 25_000).as_slice(),
            &[ButtonAction::InjectFault(FaultKind::StackOverflow)]
        );
    }

    #[test]
    fn switches_fire_on_switch_on_only() {
        let mut c = ButtonClassifier::new(3000);
        assert_eq!(
            c.classify(SWITCH_1 | SWITCH_2, SWITCH_1 | SWITCH_2, 0).as_slice(),
            &[ButtonAction::Switch1Toggled, ButtonAction::Switch2Toggled]
        );
        assert!(c.classify(0, SWITCH_1 | SWITCH_2, 100).is_empty());
    }

    #[test]
    fn press_timestamps_are_per_button() {
        let mut c = ButtonClassifier::new(3000);
        c.classify(BUTTON_1, BUTTON_1, 0);
        c.classify(BUTTON_1 | BUTTON_2, BUTTON_2, 4_000);
        // Button 2 was held for 500 ms even though button 1 went down long ago.
        let actions = c.classify(0, BUTTON_1 | BUTTON_2, 4_500);
        assert_eq!(
            actions.as_slice(),
            &[
                ButtonAction::InjectFault(FaultKind::StackOverflow),
                ButtonAction::OtaCheck
            ]
        );
    }

    #[test]
    fn release_without_press_measures_from_boot() {
        let mut c = ButtonClassifier::new(3000);
        assert_eq!(
            c.classify(0, BUTTON_2, 100).as_slice(),
            &[ButtonAction::OtaCheck]
        );
    }
}
