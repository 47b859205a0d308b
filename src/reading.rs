use {
    crate::sensors::{Measurement, Measures},
    chrono::{DateTime, Utc},
};

/// One converted sample. Values keep full precision; rounding is left to the
/// sink that publishes them.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    temperature_f: f64,
    humidity_pct: Option<f64>,
    timestamp: DateTime<Utc>,
}

impl Reading {
    pub fn new(measures: Measures, timestamp: DateTime<Utc>) -> Self {
        Reading {
            temperature_f: measures.temperature_f,
            humidity_pct: measures.humidity_pct,
            timestamp,
        }
    }

    pub fn temperature_f(&self) -> f64 {
        self.temperature_f
    }

    pub fn humidity_pct(&self) -> Option<f64> {
        self.humidity_pct
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Named values for metric backends: `<service>.temp` and, when the
    /// sensor reports it, `<service>.humidity`.
    pub fn measurements(&self, service: &str) -> Vec<Measurement> {
        let mut out = vec![Measurement {
            name: format!("{}.temp", service),
            value: self.temperature_f,
        }];

        if let Some(humidity) = self.humidity_pct {
            out.push(Measurement {
                name: format!("{}.humidity", service),
                value: humidity,
            });
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_names() {
        let reading = Reading::new(
            Measures {
                temperature_f: 77.07,
                humidity_pct: Some(54.69),
            },
            Utc::now(),
        );

        let names: Vec<_> = reading
            .measurements("rpi-thermometer")
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["rpi-thermometer.temp", "rpi-thermometer.humidity"]);
    }

    #[test]
    fn analog_reading_has_no_humidity_measurement() {
        let reading = Reading::new(
            Measures {
                temperature_f: 239.0,
                humidity_pct: None,
            },
            Utc::now(),
        );

        let measurements = reading.measurements("svc");
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].value, 239.0);
    }
}
