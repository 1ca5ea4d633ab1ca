//! On-disk log record.
//!
//! ```text
//! ┌──────────────┬──────────────┬──────────────┐
//! │ epoch (u32)  │ temp ×100    │ RH ×100      │
//! │ LE, 4 bytes  │ i16 LE       │ u16 LE       │
//! └──────────────┴──────────────┴──────────────┘
//! ```
//!
//! A failed sensor read still produces a record, carrying `i16::MAX` and
//! `u16::MAX` in the measurement fields, so gaps are visible in the log.

use crate::app::ports::{Reading, SensorError};

/// One 8-byte sample as stored in the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub epoch: u32,
    pub temp_x100: i16,
    pub rh_x100: u16,
}

impl LogRecord {
    pub const SIZE: usize = 8;
    pub const TEMP_SENTINEL: i16 = i16::MAX;
    pub const RH_SENTINEL: u16 = u16::MAX;

    /// Build a record from a sensor result taken at `epoch`.
    pub fn from_reading(epoch: u32, reading: Result<Reading, SensorError>) -> Self {
        match reading {
            Ok(r) => Self {
                epoch,
                temp_x100: (r.temperature_c * 100.0).round() as i16,
                rh_x100: (r.humidity_pct * 100.0).round() as u16,
            },
            Err(_) => Self {
                epoch,
                temp_x100: Self::TEMP_SENTINEL,
                rh_x100: Self::RH_SENTINEL,
            },
        }
    }

    /// True when the measurement fields carry the failure sentinels.
    pub fn is_sensor_failure(&self) -> bool {
        self.temp_x100 == Self::TEMP_SENTINEL && self.rh_x100 == Self::RH_SENTINEL
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.epoch.to_le_bytes());
        out[4..6].copy_from_slice(&self.temp_x100.to_le_bytes());
        out[6..8].copy_from_slice(&self.rh_x100.to_le_bytes());
        out
    }

    pub fn from_bytes(b: &[u8; Self::SIZE]) -> Self {
        Self {
            epoch: u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            temp_x100: i16::from_le_bytes([b[4], b[5]]),
            rh_x100: u16::from_le_bytes([b[6], b[7]]),
        }
    }
}
