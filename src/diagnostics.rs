//! Deliberate fault injection and the panic hook.
//!
//! The long-press gestures crash the device on purpose so the crash
//! capture and upload path can be exercised end to end.  The SDK's fault
//! handler takes the coredump; this module only has to fault reliably.
//!
//! On the host the injector panics with the fault name instead, so a
//! simulation run (or a `#[should_panic]` test) sees which fault fired
//! without tearing down the process on a real stack overflow.

use core::fmt;

/// Which crash to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Unbounded recursion until the stack guard trips.
    StackOverflow,
    /// Integer division by a runtime zero.
    DivideByZero,
}

impl FaultKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StackOverflow => "stack overflow",
            Self::DivideByZero => "divide by zero",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that can crash the device on request.
pub trait FaultInjector {
    fn inject(&mut self, kind: FaultKind);
}

/// Crashes for real on the device, panics with the fault name elsewhere.
#[derive(Debug, Default)]
pub struct PanicFaultInjector;

impl FaultInjector for PanicFaultInjector {
    #[cfg(target_os = "espidf")]
    fn inject(&mut self, kind: FaultKind) {
        log::warn!("Injecting fault: {}", kind);
        match kind {
            FaultKind::StackOverflow => {
                let _ = fib(core::hint::black_box(10_000));
            }
            FaultKind::DivideByZero => {
                let divisor: u32 = core::hint::black_box(0);
                let _ = core::hint::black_box(1_u32 / divisor);
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn inject(&mut self, kind: FaultKind) {
        log::warn!("Injecting fault: {} (sim)", kind);
        panic!("injected fault: {}", kind);
    }
}

// Each frame keeps `n` live across both calls so the recursion cannot be
// turned into a loop.
#[cfg(target_os = "espidf")]
fn fib(n: u32) -> u32 {
    if n <= 1 {
        return n;
    }
    let n = core::hint::black_box(n);
    fib(n - 1).wrapping_add(fib(n - 2))
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Log the panic reason before the default handler aborts.
///
/// Call once during init.  The coredump itself is written by the SDK's
/// fault handler after the abort.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        match info.location() {
            Some(loc) => log::error!("PANIC at {}:{}: {}", loc.file(), loc.line(), reason),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}
