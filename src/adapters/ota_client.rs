//! OTA check clients.
//!
//! | Client                  | Used when                                   |
//! |-------------------------|---------------------------------------------|
//! | `release::HttpOtaClient`| device, OTA enabled, manifest URL built in  |
//! | `DisabledOtaClient`     | OTA switched off or no manifest URL         |
//! | `SimOtaClient`          | host runs and tests                         |

use log::info;

use crate::app::ports::{OtaCheckError, OtaCheckOutcome, OtaCheckPort};
use crate::scheduler::TriggerContext;

/// Map an SDK OTA status code: negative is an error, zero means no update,
/// positive means a download started.
pub fn outcome_from_code(rv: i32) -> Result<OtaCheckOutcome, OtaCheckError> {
    match rv {
        rv if rv < 0 => Err(OtaCheckError::Failed(rv)),
        0 => Ok(OtaCheckOutcome::NoUpdateAvailable),
        _ => Ok(OtaCheckOutcome::DownloadStarted),
    }
}

// ───────────────────────────────────────────────────────────────
// Disabled client
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DisabledOtaClient;

impl OtaCheckPort for DisabledOtaClient {
    fn check_for_update(
        &mut self,
        _context: TriggerContext,
    ) -> Result<OtaCheckOutcome, OtaCheckError> {
        Err(OtaCheckError::Disabled)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation client
// ───────────────────────────────────────────────────────────────

/// Status code the simulation reports for its failing check.
pub const SIM_FAILURE_CODE: i32 = -5;

/// Cycles: no update, download started, failure.
#[derive(Debug, Default)]
pub struct SimOtaClient {
    checks: u32,
}

impl SimOtaClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checks(&self) -> u32 {
        self.checks
    }
}

impl OtaCheckPort for SimOtaClient {
    fn check_for_update(
        &mut self,
        context: TriggerContext,
    ) -> Result<OtaCheckOutcome, OtaCheckError> {
        let code = match self.checks % 3 {
            0 => 0,
            1 => 1,
            _ => SIM_FAILURE_CODE,
        };
        self.checks = self.checks.wrapping_add(1);
        info!("OTA(sim): check #{} ({}) -> {}", self.checks, context, code);
        outcome_from_code(code)
    }
}
