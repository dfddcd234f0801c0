//! Unified error type for start-up and the release download.
//!
//! Ports report their own small `Copy` errors and the services log them
//! where they occur.  The paths that surface an error to their caller
//! (config loading in `main`, the `ota_download` thread) fold them into
//! [`Error`].

use core::fmt;

use crate::adapters::release::ReleaseError;
use crate::app::ports::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Fetching or installing a release image failed.
    Release(ReleaseError),
    /// Peripheral or task initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Release(e) => write!(f, "release: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ReleaseError> for Error {
    fn from(e: ReleaseError) -> Self {
        Self::Release(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
