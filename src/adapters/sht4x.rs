//! Sensirion SHT4x temperature/humidity sensor over I²C.
//!
//! Generic over the `embedded-hal` 1.0 [`I2c`] and [`DelayNs`] traits, so
//! the same driver runs against the ESP-IDF I²C master on target and a
//! scripted bus in tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::debug;

use crate::app::ports::{HumiditySensor, Reading, SensorError};

/// 7-bit bus address.
pub const SHT4X_ADDR: u8 = 0x44;
/// Single shot, medium repeatability.
pub const CMD_MEASURE_MEDIUM: u8 = 0xF6;
/// Conversion time for [`CMD_MEASURE_MEDIUM`].
const MEASURE_DELAY_MS: u32 = 5;

/// Sensirion CRC-8: polynomial 0x31, init 0xFF, no final XOR.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Decode a 6-byte measurement frame (`T_hi T_lo crc RH_hi RH_lo crc`).
pub fn decode(frame: &[u8; 6]) -> Result<Reading, SensorError> {
    if crc8(&frame[0..2]) != frame[2] || crc8(&frame[3..5]) != frame[5] {
        return Err(SensorError::Crc);
    }
    let t_ticks = u16::from_be_bytes([frame[0], frame[1]]);
    let rh_ticks = u16::from_be_bytes([frame[3], frame[4]]);

    let temperature_c = 175.0 * f32::from(t_ticks) / 65535.0 - 45.0;
    // The raw formula spans -6..119 %; only 0..100 is physical.
    let humidity_pct = (125.0 * f32::from(rh_ticks) / 65535.0 - 6.0).clamp(0.0, 100.0);

    Ok(Reading {
        temperature_c,
        humidity_pct,
    })
}

pub struct Sht4x<I2C, D> {
    i2c: I2C,
    delay: D,
}

impl<I2C: I2c, D: DelayNs> Sht4x<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self { i2c, delay }
    }

    /// Give the bus back, e.g. to power it down.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C: I2c, D: DelayNs> HumiditySensor for Sht4x<I2C, D> {
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.i2c
            .write(SHT4X_ADDR, &[CMD_MEASURE_MEDIUM])
            .map_err(|e| {
                debug!("Sht4x: command write failed: {:?}", e);
                SensorError::Bus
            })?;

        self.delay.delay_ms(MEASURE_DELAY_MS);

        let mut frame = [0u8; 6];
        self.i2c.read(SHT4X_ADDR, &mut frame).map_err(|e| {
            debug!("Sht4x: frame read failed: {:?}", e);
            SensorError::Bus
        })?;

        decode(&frame)
    }
}
