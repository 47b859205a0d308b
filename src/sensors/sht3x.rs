//! Sensirion SHT3x temperature/humidity sensor.
//!
//! A single-shot measurement is started with a two byte command, after which
//! the sensor answers with six bytes:
//! `[T_msb, T_lsb, T_crc, H_msb, H_lsb, H_crc]`.

use {
    crate::{
        error::{Error, Result},
        sensors::{Measures, Sensor},
    },
    std::time::Duration,
};

/// Default address with the ADDR pin pulled low.
pub const ADDRESS: u8 = 0x44;

/// Single shot, high repeatability, clock stretching enabled.
pub const MEASURE: [u8; 2] = [0x2C, 0x06];

pub const FRAME_LEN: usize = 6;

const CRC_POLYNOMIAL: u8 = 0x31;
const CRC_INIT: u8 = 0xFF;

#[derive(Debug, Clone)]
pub struct Sht3x {
    pub measurement_delay: Duration,
    pub verify_crc: bool,
}

impl Default for Sht3x {
    fn default() -> Self {
        Sht3x {
            measurement_delay: Duration::from_millis(20),
            verify_crc: false,
        }
    }
}

impl Sensor for Sht3x {
    fn name(&self) -> &'static str {
        "SHT3x"
    }

    fn command(&self) -> Option<&[u8]> {
        Some(&MEASURE[..])
    }

    fn measurement_delay(&self) -> Duration {
        self.measurement_delay
    }

    fn frame_len(&self) -> usize {
        FRAME_LEN
    }

    fn convert(&self, frame: &[u8]) -> Result<Measures> {
        convert(frame, self.verify_crc)
    }
}

pub fn convert(frame: &[u8], verify_crc: bool) -> Result<Measures> {
    if frame.len() != FRAME_LEN {
        return Err(Error::ConversionInvalid(format!(
            "SHT3x frame is {} bytes, expected {}",
            frame.len(),
            FRAME_LEN
        )));
    }

    if verify_crc {
        check_word("temperature", &frame[0..3])?;
        check_word("humidity", &frame[3..6])?;
    }

    let raw_t = u16::from_be_bytes([frame[0], frame[1]]);
    let raw_h = u16::from_be_bytes([frame[3], frame[4]]);

    Ok(Measures {
        temperature_f: fahrenheit(raw_t),
        humidity_pct: Some(humidity(raw_h)),
    })
}

/// Raw 16-bit temperature word to degrees Fahrenheit.
pub fn fahrenheit(raw: u16) -> f64 {
    f64::from(raw) * 315.0 / 65535.0 - 49.0
}

/// Raw 16-bit temperature word to degrees Celsius.
pub fn celsius(raw: u16) -> f64 {
    f64::from(raw) * 175.0 / 65535.0 - 45.0
}

/// Raw 16-bit humidity word to percent relative humidity.
pub fn humidity(raw: u16) -> f64 {
    f64::from(raw) * 100.0 / 65535.0
}

/// CRC-8 over a data word as specified in the SHT3x datasheet.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(CRC_INIT, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC_POLYNOMIAL
            } else {
                crc << 1
            };
        }
        crc
    })
}

fn check_word(field: &str, word: &[u8]) -> Result<()> {
    let expected = crc8(&word[..2]);
    if word[2] != expected {
        return Err(Error::ConversionInvalid(format!(
            "{} CRC mismatch: got 0x{:02x}, expected 0x{:02x}",
            field, word[2], expected
        )));
    }
    Ok(())
}
