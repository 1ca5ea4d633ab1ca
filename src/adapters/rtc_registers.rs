//! Retained register bank in RTC slow memory.
//!
//! - **`target_os = "espidf"`**: a word array in `.rtc_noinit`, which keeps
//!   its contents through deep sleep and software resets.  A power-on reset
//!   leaves it random, so it is zeroed when the reset reason says so.
//! - **`not(target_os = "espidf")`**: a plain array owned by the adapter.

use log::info;

use crate::app::ports::RetainedRegisters;
use crate::schedule::Register;

/// Words reserved in RTC memory.  The schedule uses the first
/// [`Register::COUNT`].
pub const RETAINED_WORDS: usize = 16;

const _: () = assert!(Register::COUNT <= RETAINED_WORDS);

#[cfg(target_os = "espidf")]
#[unsafe(link_section = ".rtc_noinit")]
static mut RTC_BANK: [u32; RETAINED_WORDS] = [0; RETAINED_WORDS];

pub struct RtcRegisters {
    #[cfg(not(target_os = "espidf"))]
    words: [u32; RETAINED_WORDS],
}

impl Default for RtcRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl RtcRegisters {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        use esp_idf_svc::sys::{esp_reset_reason, esp_reset_reason_t_ESP_RST_POWERON};

        let mut regs = Self {};
        // SAFETY: plain query of the ROM-latched reset reason.
        if unsafe { esp_reset_reason() } == esp_reset_reason_t_ESP_RST_POWERON {
            info!("RtcRegisters: power-on reset, clearing bank");
            regs.clear();
        }
        regs
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        info!("RtcRegisters: simulation backend");
        Self {
            words: [0; RETAINED_WORDS],
        }
    }

    /// Zero every word, as after full power removal.
    pub fn clear(&mut self) {
        for idx in 0..RETAINED_WORDS {
            self.store(idx, 0);
        }
    }

    #[cfg(target_os = "espidf")]
    fn load(&self, idx: usize) -> u32 {
        // SAFETY: idx < RETAINED_WORDS; single-threaded access from the
        // main task; volatile so the compiler never caches RTC memory.
        unsafe { (&raw const RTC_BANK).cast::<u32>().add(idx).read_volatile() }
    }

    #[cfg(target_os = "espidf")]
    fn store(&mut self, idx: usize, value: u32) {
        // SAFETY: as in `load`.
        unsafe {
            (&raw mut RTC_BANK)
                .cast::<u32>()
                .add(idx)
                .write_volatile(value);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn load(&self, idx: usize) -> u32 {
        self.words[idx]
    }

    #[cfg(not(target_os = "espidf"))]
    fn store(&mut self, idx: usize, value: u32) {
        self.words[idx] = value;
    }
}

impl RetainedRegisters for RtcRegisters {
    fn read(&self, reg: Register) -> u32 {
        self.load(reg.index())
    }

    fn write(&mut self, reg: Register, value: u32) {
        self.store(reg.index(), value);
    }
}
