//! Wall clock and millisecond timebase.
//!
//! - **`target_os = "espidf"`**: wall time is the ESP-IDF system time
//!   (`gettimeofday`/`settimeofday`), which the RTC timer keeps counting
//!   through deep sleep.  The timebase wraps `esp_timer_get_time()` and
//!   the HAL delay.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` for host-side
//!   testing and simulation.

#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{Timebase, WallClock};

/// Unix time of 2000-01-01T00:00:00Z, the firmware epoch.
pub const UNIX_OFFSET_2000: i64 = 946_684_800;

/// Convert Unix seconds to firmware epoch seconds, saturating at both ends.
pub fn unix_to_epoch(unix: i64) -> u32 {
    (unix - UNIX_OFFSET_2000).clamp(0, i64::from(u32::MAX)) as u32
}

pub fn epoch_to_unix(epoch: u32) -> i64 {
    i64::from(epoch) + UNIX_OFFSET_2000
}

// ---------------------------------------------------------------------------
// Wall clock
// ---------------------------------------------------------------------------

pub struct SystemWallClock {
    #[cfg(not(target_os = "espidf"))]
    base: u32,
    #[cfg(not(target_os = "espidf"))]
    set_at: std::time::Instant,
}

impl Default for SystemWallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemWallClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            base: 0,
            #[cfg(not(target_os = "espidf"))]
            set_at: std::time::Instant::now(),
        }
    }
}

#[cfg(target_os = "espidf")]
impl WallClock for SystemWallClock {
    fn now(&self) -> u32 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        // SAFETY: tv is a valid out-pointer; the timezone argument may be null.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        unix_to_epoch(tv.tv_sec as i64)
    }

    fn set(&mut self, epoch: u32) {
        let tv = esp_idf_svc::sys::timeval {
            tv_sec: epoch_to_unix(epoch) as esp_idf_svc::sys::time_t,
            tv_usec: 0,
        };
        // SAFETY: tv is a valid in-pointer; the timezone argument may be null.
        if unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) } != 0 {
            warn!("SystemWallClock: settimeofday failed");
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl WallClock for SystemWallClock {
    fn now(&self) -> u32 {
        let elapsed = self.set_at.elapsed().as_secs();
        u32::try_from(u64::from(self.base) + elapsed).unwrap_or(u32::MAX)
    }

    fn set(&mut self, epoch: u32) {
        self.base = epoch;
        self.set_at = std::time::Instant::now();
    }
}

// ---------------------------------------------------------------------------
// Timebase
// ---------------------------------------------------------------------------

pub struct SystemTimebase {
    #[cfg(target_os = "espidf")]
    delay: esp_idf_svc::hal::delay::Delay,
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for SystemTimebase {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemTimebase {
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "espidf")]
            delay: esp_idf_svc::hal::delay::Delay::new_default(),
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(target_os = "espidf")]
impl Timebase for SystemTimebase {
    fn now_ms(&self) -> u64 {
        // SAFETY: reads the monotonic high-resolution timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}

#[cfg(not(target_os = "espidf"))]
impl Timebase for SystemTimebase {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
