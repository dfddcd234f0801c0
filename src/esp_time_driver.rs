//! embassy-time driver backed by the ESP-IDF high-resolution timer.
//!
//! Ticks are `esp_timer_get_time()` microseconds, embassy-time's default
//! 1 MHz tick rate.  Pending wakes sit in a [`WakeList`] serviced by one
//! `time_driver` thread, started on the first scheduled wake.

use core::task::Waker;

/// Wakers waiting on a tick deadline.
///
/// One entry per waker; re-arming keeps the earlier deadline.  An early
/// wake only re-polls the timer future, which re-arms itself.
#[derive(Default)]
pub struct WakeList {
    entries: Vec<(u64, Waker)>,
}

impl WakeList {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn schedule(&mut self, at: u64, waker: &Waker) {
        match self.entries.iter_mut().find(|(_, w)| w.will_wake(waker)) {
            Some(entry) => entry.0 = entry.0.min(at),
            None => self.entries.push((at, waker.clone())),
        }
    }

    /// Wake every entry due at `now`; returns the next deadline, if any.
    pub fn fire_due(&mut self, now: u64) -> Option<u64> {
        let mut next: Option<u64> = None;
        self.entries.retain(|(at, waker)| {
            if *at <= now {
                waker.wake_by_ref();
                false
            } else {
                next = Some(next.map_or(*at, |n| n.min(*at)));
                true
            }
        });
        next
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(target_os = "espidf")]
mod driver {
    use core::task::Waker;
    use core::time::Duration;
    use std::sync::{Condvar, Mutex, Once, PoisonError};

    use embassy_time_driver::Driver;
    use log::error;

    use super::WakeList;

    const DRIVER_THREAD_STACK: usize = 3 * 1024;

    struct EspTimeDriver {
        wakes: Mutex<WakeList>,
        changed: Condvar,
        started: Once,
    }

    embassy_time_driver::time_driver_impl!(static DRIVER: EspTimeDriver = EspTimeDriver {
        wakes: Mutex::new(WakeList::new()),
        changed: Condvar::new(),
        started: Once::new(),
    });

    fn now_us() -> u64 {
        // SAFETY: reads the monotonic system timer; callable from any task.
        unsafe { esp_idf_svc::sys::esp_timer_get_time() as u64 }
    }

    impl EspTimeDriver {
        fn run(&self) {
            let mut wakes = self.wakes.lock().unwrap_or_else(PoisonError::into_inner);
            loop {
                let now = now_us();
                wakes = match wakes.fire_due(now) {
                    Some(at) => {
                        self.changed
                            .wait_timeout(wakes, Duration::from_micros(at - now))
                            .unwrap_or_else(PoisonError::into_inner)
                            .0
                    }
                    None => self
                        .changed
                        .wait(wakes)
                        .unwrap_or_else(PoisonError::into_inner),
                };
            }
        }
    }

    impl Driver for EspTimeDriver {
        fn now(&self) -> u64 {
            now_us()
        }

        fn schedule_wake(&self, at: u64, waker: &Waker) {
            self.started.call_once(|| {
                let spawned = std::thread::Builder::new()
                    .name("time_driver".into())
                    .stack_size(DRIVER_THREAD_STACK)
                    .spawn(|| DRIVER.run());
                if let Err(e) = spawned {
                    error!("time driver thread failed to start: {}", e);
                }
            });

            self.wakes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .schedule(at, waker);
            self.changed.notify_one();
        }
    }
}
