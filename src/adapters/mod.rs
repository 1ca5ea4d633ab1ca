//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements        | Connects to                     |
//! |-----------------|-------------------|---------------------------------|
//! | `clock`         | WallClock         | ESP-IDF system time / Instant   |
//! |                 | Timebase          | esp_timer + HAL delay           |
//! | `indicator`     | Indicator         | Status LED GPIO                 |
//! | `log_sink`      | EventSink         | Serial log output               |
//! | `log_store`     | LogStore          | SPIFFS at `/logfs` / host dir   |
//! | `nvs`           | ConfigPort        | NVS / in-memory store           |
//! | `rtc_registers` | RetainedRegisters | RTC slow memory (`.rtc_noinit`) |
//! | `sht4x`         | HumiditySensor    | SHT4x over embedded-hal I²C     |
//! | `sleep`         | WakeControl       | RTC timer + ext0 deep sleep     |
//! | `usb_link`      | HostLink          | USB Serial/JTAG + VBUS sense    |

pub mod clock;
pub mod indicator;
pub mod log_sink;
pub mod log_store;
pub mod nvs;
pub mod rtc_registers;
pub mod sht4x;
pub mod sleep;
pub mod usb_link;
