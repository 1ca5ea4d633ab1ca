//! GPIO / peripheral pin assignments for the logger board.
//!
//! Single source of truth; every adapter references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Host presence
// ---------------------------------------------------------------------------

/// VBUS sense through a divider.  HIGH = USB host attached.
/// Must be an RTC-capable GPIO so it can serve as the ext0 wake source.
pub const VBUS_SENSE_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Humidity sensor (SHT4x on I2C0)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;
/// Standard-mode bus clock.
pub const I2C_FREQ_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// Discrete status LED, active HIGH.
pub const STATUS_LED_GPIO: i32 = 15;
