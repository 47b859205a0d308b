//! Analog temperature sensor (TMP36) behind an ADC: 500 mV offset, 10 mV/°C.

use crate::{
    bus::adc::SAMPLE_LEN,
    error::{Error, Result},
    sensors::{celsius_to_fahrenheit, Measures, Sensor},
};

const OFFSET_MV: f64 = 500.0;
const MV_PER_DEGREE: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct Tmp36 {
    pub reference_mv: f64,
    pub steps: f64,
}

impl Default for Tmp36 {
    /// 10-bit converter referenced to 3.3 V.
    fn default() -> Self {
        Tmp36 {
            reference_mv: 3300.0,
            steps: 1024.0,
        }
    }
}

impl Tmp36 {
    pub fn millivolts(&self, count: u16) -> f64 {
        f64::from(count) * self.reference_mv / self.steps
    }

    pub fn measures(&self, count: u16) -> Measures {
        let celsius = (self.millivolts(count) - OFFSET_MV) / MV_PER_DEGREE;

        Measures {
            temperature_f: celsius_to_fahrenheit(celsius),
            humidity_pct: None,
        }
    }
}

impl Sensor for Tmp36 {
    fn name(&self) -> &'static str {
        "TMP36"
    }

    fn command(&self) -> Option<&[u8]> {
        None
    }

    fn frame_len(&self) -> usize {
        SAMPLE_LEN
    }

    fn convert(&self, frame: &[u8]) -> Result<Measures> {
        match *frame {
            [msb, lsb] => Ok(self.measures(u16::from_be_bytes([msb, lsb]))),
            _ => Err(Error::ConversionInvalid(format!(
                "ADC sample is {} bytes, expected {}",
                frame.len(),
                SAMPLE_LEN
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_scale() {
        let adc = Tmp36::default();

        assert_eq!(adc.millivolts(512), 1650.0);
        let m = adc.measures(512);
        assert!((m.temperature_f - 239.0).abs() < 1e-9);
        assert_eq!(m.humidity_pct, None);
    }

    #[test]
    fn offset_voltage_is_freezing() {
        let adc = Tmp36 {
            reference_mv: 1000.0,
            steps: 1000.0,
        };
        assert!((adc.measures(500).temperature_f - 32.0).abs() < 1e-9);
    }

    #[test]
    fn sample_is_big_endian() {
        let m = Tmp36::default().convert(&[0x02, 0x00]).unwrap();
        assert!((m.temperature_f - 239.0).abs() < 1e-9);
    }

    #[test]
    fn no_command_phase() {
        assert!(Tmp36::default().command().is_none());
    }

    #[test]
    fn wrong_length_is_invalid() {
        assert!(matches!(
            Tmp36::default().convert(&[0x02]),
            Err(Error::ConversionInvalid(_))
        ));
    }
}
