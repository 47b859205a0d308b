use {
    crate::{error::Result, publish::Publish, reading::Reading},
    log::info,
};

/// Writes readings to the log. Used when no remote sink is configured.
pub struct LogSink;

impl Publish for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, reading: &Reading) -> Result<()> {
        match reading.humidity_pct() {
            Some(humidity) => info!(
                "Temp: {:.2} F, Humidity: {:.2} RH",
                reading.temperature_f(),
                humidity
            ),
            None => info!("Temp: {:.2} F", reading.temperature_f()),
        }
        Ok(())
    }
}
