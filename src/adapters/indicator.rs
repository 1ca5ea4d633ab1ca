//! Status LED on a single GPIO, active high.
//!
//! On ESP-IDF: drives [`STATUS_LED_GPIO`](crate::pins::STATUS_LED_GPIO).
//! On host/test: tracks state in-memory only.

#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::Indicator;

#[derive(Debug, Default)]
pub struct GpioLed {
    on: bool,
}

impl GpioLed {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        use esp_idf_svc::sys::*;

        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << crate::pins::STATUS_LED_GPIO,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: single-threaded init; cfg is valid for the call.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            warn!("GpioLed: config failed ({})", ret);
        }
        let mut led = Self { on: false };
        led.set(false);
        led
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self { on: false }
    }
}

impl Indicator for GpioLed {
    fn set(&mut self, on: bool) {
        #[cfg(target_os = "espidf")]
        // SAFETY: output pin configured in `new`; main task only.
        unsafe {
            esp_idf_svc::sys::gpio_set_level(crate::pins::STATUS_LED_GPIO, u32::from(on));
        }
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
