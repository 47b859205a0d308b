use {crate::error::Result, std::time::Duration};

pub mod sht3x;
pub mod tmp36;

pub use {sht3x::Sht3x, tmp36::Tmp36};

/// How a sensor family is driven over its bus and how its raw frame maps to
/// physical units. Implementations are stateless apart from configuration.
pub trait Sensor {
    fn name(&self) -> &'static str;

    /// Bytes that start a measurement, if the sensor needs one.
    fn command(&self) -> Option<&[u8]>;

    /// Time the sensor needs between the command and a valid read.
    fn measurement_delay(&self) -> Duration {
        Duration::from_millis(0)
    }

    fn frame_len(&self) -> usize;

    fn convert(&self, frame: &[u8]) -> Result<Measures>;
}

/// Values converted out of one raw frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measures {
    pub temperature_f: f64,
    pub humidity_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub name: String,
    pub value: f64,
}

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fahrenheit_reference_points() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }
}
