use {
    crate::{
        error::{Error, Result},
        publish::Publish,
        reading::Reading,
    },
    chrono::{DateTime, Utc},
    influxdb::{Client as DbClient, InfluxDbWriteable, WriteQuery},
    log::{debug, info},
};

const NAME: &str = "influxdb";

#[derive(InfluxDbWriteable)]
struct Point {
    time: DateTime<Utc>,
    value: f64,
    #[influxdb(tag)]
    id: String,
}

/// Writes one point per measurement (`<service>.temp`, `<service>.humidity`)
/// tagged with the device id.
pub struct InfluxSink {
    db: DbClient,
    service: String,
    id: String,
}

impl InfluxSink {
    pub fn new(address: &str, port: u16, database: &str, service: &str, id: &str) -> Self {
        info!("INFLUXDB connecting to {}:{}", address, port);

        InfluxSink {
            db: DbClient::new(format!("http://{}:{}", address, port), database),
            service: service.to_string(),
            id: id.to_string(),
        }
    }

    fn points(&self, reading: &Reading) -> Vec<WriteQuery> {
        reading
            .measurements(&self.service)
            .into_iter()
            .map(|measurement| {
                Point {
                    time: reading.timestamp(),
                    value: measurement.value,
                    id: self.id.clone(),
                }
                .into_query(measurement.name)
            })
            .collect()
    }
}

impl Publish for InfluxSink {
    fn name(&self) -> &str {
        NAME
    }

    async fn publish(&self, reading: &Reading) -> Result<()> {
        for point in self.points(reading) {
            self.db
                .query(point)
                .await
                .map_err(|e| Error::publish(NAME, e))?;
        }

        debug!("Wrote reading to {}", NAME);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::sensors::Measures, chrono::TimeZone, influxdb::Query};

    fn sink() -> InfluxSink {
        InfluxSink::new("localhost", 8086, "environment", "rpi-thermometer", "pi-1")
    }

    fn lines(sink: &InfluxSink, reading: &Reading) -> Vec<String> {
        sink.points(reading)
            .iter()
            .map(|point| point.build().unwrap().get())
            .collect()
    }

    #[test]
    fn one_tagged_point_per_measurement() {
        let reading = Reading::new(
            Measures {
                temperature_f: 77.5,
                humidity_pct: Some(54.25),
            },
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        );

        let lines = lines(&sink(), &reading);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("rpi-thermometer.temp,id=pi-1 value=77.5 "));
        assert!(lines[1].starts_with("rpi-thermometer.humidity,id=pi-1 value=54.25 "));
        assert!(lines[0].ends_with("1700000000000000000"));
    }

    #[test]
    fn analog_reading_writes_temperature_only() {
        let reading = Reading::new(
            Measures {
                temperature_f: 239.0,
                humidity_pct: None,
            },
            Utc::now(),
        );

        let lines = lines(&sink(), &reading);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("rpi-thermometer.temp,id=pi-1 "));
    }
}
