//! Deep-sleep wake sources.
//!
//! - **`target_os = "espidf"`**: the RTC timer and ext0 on the VBUS-sense
//!   pin.  ext0 is level-triggered: presence is armed on level 1 and
//!   release on level 0, so the pin must not already sit at the armed
//!   level.
//! - **`not(target_os = "espidf")`**: records what was armed so the host
//!   simulation can inspect it.

use log::info;
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::{WakeCause, WakeControl};

/// The wake source left armed, as seen by the simulation.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmedSource {
    Timer { seconds: u32 },
    HostPresence,
    HostRelease,
}

pub struct DeepSleep {
    #[cfg(not(target_os = "espidf"))]
    cause: WakeCause,
    #[cfg(not(target_os = "espidf"))]
    armed: Vec<ArmedSource>,
}

#[cfg(target_os = "espidf")]
impl Default for DeepSleep {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "espidf")]
impl DeepSleep {
    pub fn new() -> Self {
        Self {}
    }

    /// Enter deep sleep with whatever is armed.  Does not return; the next
    /// wake is a reset.
    #[allow(unreachable_code)]
    pub fn enter(self) -> ! {
        info!("DeepSleep: entering");
        // SAFETY: all work for this cycle is done; nothing is held open.
        unsafe { esp_idf_svc::sys::esp_deep_sleep_start() };
        loop {
            core::hint::spin_loop();
        }
    }
}

#[cfg(not(target_os = "espidf"))]
impl DeepSleep {
    /// Simulated wake after `cause`.
    pub fn new(cause: WakeCause) -> Self {
        Self {
            cause,
            armed: Vec::new(),
        }
    }

    /// Sources armed since the last `disarm_all`.
    pub fn armed(&self) -> &[ArmedSource] {
        &self.armed
    }
}

#[cfg(target_os = "espidf")]
impl WakeControl for DeepSleep {
    #[allow(non_upper_case_globals)]
    fn wake_cause(&self) -> WakeCause {
        use esp_idf_svc::sys::*;

        // SAFETY: read-only query of the latched wake cause.
        match unsafe { esp_sleep_get_wakeup_cause() } {
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => WakeCause::PowerOn,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => WakeCause::Timer,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_EXT0 => WakeCause::HostPresence,
            _ => WakeCause::Other,
        }
    }

    fn disarm_all(&mut self) {
        // SAFETY: plain configuration call.
        let ret = unsafe {
            esp_idf_svc::sys::esp_sleep_disable_wakeup_source(
                esp_idf_svc::sys::esp_sleep_source_t_ESP_SLEEP_WAKEUP_ALL,
            )
        };
        if ret != esp_idf_svc::sys::ESP_OK {
            warn!("DeepSleep: disable wakeup sources returned {}", ret);
        }
    }

    fn arm_timer(&mut self, seconds: u32) {
        // SAFETY: plain configuration call.
        let ret = unsafe {
            esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(u64::from(seconds) * 1_000_000)
        };
        if ret != esp_idf_svc::sys::ESP_OK {
            warn!("DeepSleep: timer wakeup returned {}", ret);
        }
        info!("DeepSleep: timer armed for {} s", seconds);
    }

    fn arm_host_presence(&mut self) {
        arm_vbus_level(1);
        info!("DeepSleep: host-presence wake armed");
    }

    fn arm_host_release(&mut self) {
        arm_vbus_level(0);
        info!("DeepSleep: host-release wake armed");
    }
}

/// ext0 on the VBUS-sense pin at `level`, with the pin pulled low so an
/// unplugged cable reads 0.
#[cfg(target_os = "espidf")]
fn arm_vbus_level(level: i32) {
    use crate::pins::VBUS_SENSE_GPIO;
    use esp_idf_svc::sys::*;

    // SAFETY: VBUS_SENSE_GPIO is an RTC-capable pin reserved for this use.
    let ret = unsafe {
        rtc_gpio_pullup_dis(VBUS_SENSE_GPIO);
        rtc_gpio_pulldown_en(VBUS_SENSE_GPIO);
        esp_sleep_enable_ext0_wakeup(VBUS_SENSE_GPIO, level)
    };
    if ret != ESP_OK {
        warn!("DeepSleep: ext0 wakeup (level {}) returned {}", level, ret);
    }
}

#[cfg(not(target_os = "espidf"))]
impl WakeControl for DeepSleep {
    fn wake_cause(&self) -> WakeCause {
        self.cause
    }

    fn disarm_all(&mut self) {
        self.armed.clear();
    }

    fn arm_timer(&mut self, seconds: u32) {
        info!("DeepSleep (sim): timer armed for {} s", seconds);
        self.armed.push(ArmedSource::Timer { seconds });
    }

    fn arm_host_presence(&mut self) {
        info!("DeepSleep (sim): host-presence wake armed");
        self.armed.push(ArmedSource::HostPresence);
    }

    fn arm_host_release(&mut self) {
        info!("DeepSleep (sim): host-release wake armed");
        self.armed.push(ArmedSource::HostRelease);
    }
}
