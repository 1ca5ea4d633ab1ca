//! Unified error type for the logger firmware.
//!
//! Port-level errors are small `Copy` enums defined next to their traits in
//! [`crate::app::ports`]; this module funnels them into one [`Error`] so
//! adapter constructors and the composition root handle failures uniformly.

use core::fmt;

use crate::app::ports::{ConfigError, LinkError, SensorError, StorageError};
use crate::calendar::CalendarError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The log volume failed.
    Storage(StorageError),
    /// The humidity sensor could not be read.
    Sensor(SensorError),
    /// The host link failed.
    Link(LinkError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
    /// Calendar text could not be parsed.
    Time(CalendarError),
    /// Peripheral initialisation failed (ESP-IDF error code).
    Init(&'static str, i32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Time(e) => write!(f, "time: {e}"),
            Self::Init(what, code) => write!(f, "init: {what} ({code})"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CalendarError> for Error {
    fn from(e: CalendarError) -> Self {
        Self::Time(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
