//! Wakelogger firmware entry point.
//!
//! Each boot is one wake cycle: build the adapters, run the cycle, enter
//! deep sleep.  Nothing but the retained registers and the log volume
//! survives to the next boot.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  RtcRegisters  SystemWallClock  SystemTimebase  FsLogStore     │
//! │  Sht4x         UsbSerialLink    DeepSleep       GpioLed        │
//! │  NvsConfigStore                 LogEventSink                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   WakeCycle → ServiceWindow → Session FSM → dispatch   │    │
//! │  │   ScheduleStore · calendar · log stream                │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use esp_idf_svc::hal::delay::Delay;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;

use wakelogger::adapters::clock::{SystemTimebase, SystemWallClock};
use wakelogger::adapters::indicator::GpioLed;
use wakelogger::adapters::log_sink::LogEventSink;
use wakelogger::adapters::log_store::FsLogStore;
use wakelogger::adapters::nvs::NvsConfigStore;
use wakelogger::adapters::rtc_registers::RtcRegisters;
use wakelogger::adapters::sht4x::Sht4x;
use wakelogger::adapters::sleep::DeepSleep;
use wakelogger::adapters::usb_link::UsbSerialLink;
use wakelogger::app::ports::{Board, ConfigPort};
use wakelogger::app::service::WakeCycle;
use wakelogger::config::LoggerConfig;
use wakelogger::pins;
use wakelogger::schedule::ScheduleStore;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Wakelogger v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load tunables from NVS (or defaults) ───────────────
    let config = match NvsConfigStore::new() {
        Ok(nvs) => nvs.load_or_repair(),
        Err(e) => {
            warn!("NVS unavailable ({}), using defaults", e);
            LoggerConfig::default()
        }
    };

    // ── 3. Construct adapters ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    // SDA/SCL must match pins::I2C_SDA_GPIO / pins::I2C_SCL_GPIO.
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;
    let mut sensor = Sht4x::new(i2c, Delay::new_default());

    let mut store = ScheduleStore::new(RtcRegisters::new(), SystemWallClock::new());
    let mut log = FsLogStore::new();
    let mut link = UsbSerialLink::new().map_err(wakelogger::error::Error::from)?;
    let mut timebase = SystemTimebase::new();
    let mut sleep = DeepSleep::new();
    let mut indicator = GpioLed::new();
    let mut sink = LogEventSink::new();

    // ── 4. One wake cycle ─────────────────────────────────────
    let plan = {
        let mut board = Board {
            log: &mut log,
            sensor: &mut sensor,
            link: &mut link,
            timebase: &mut timebase,
            wake: &mut sleep,
            indicator: &mut indicator,
        };
        WakeCycle::new(&config).run(&mut store, &mut board, &mut sink)
    };
    info!("Cycle done: {:?}", plan);

    // ── 5. Sleep; the next wake is a fresh boot ───────────────
    sleep.enter()
}
