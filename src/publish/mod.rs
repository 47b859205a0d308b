//! Where readings go once they leave the sampling loop.

use {
    crate::{error::Result, reading::Reading},
    std::future::Future,
};

mod influx;
mod logger;
mod mqtt;
mod otlp;

pub use {
    influx::InfluxSink,
    logger::LogSink,
    mqtt::{MqttConnection, MqttSink},
    otlp::{meter_provider, OtlpSink},
};

/// Accepts one reading at a time.
///
/// A call returns once the sink has taken the reading; delivery guarantees
/// beyond that (acknowledgements, retries) belong to the sink.
pub trait Publish {
    fn name(&self) -> &str;

    fn publish(&self, reading: &Reading) -> impl Future<Output = Result<()>> + Send;
}

pub enum Sink {
    Mqtt(MqttSink),
    Influx(InfluxSink),
    Otlp(OtlpSink),
    Log(LogSink),
}

impl Publish for Sink {
    fn name(&self) -> &str {
        match self {
            Sink::Mqtt(sink) => sink.name(),
            Sink::Influx(sink) => sink.name(),
            Sink::Otlp(sink) => sink.name(),
            Sink::Log(sink) => sink.name(),
        }
    }

    async fn publish(&self, reading: &Reading) -> Result<()> {
        match self {
            Sink::Mqtt(sink) => sink.publish(reading).await,
            Sink::Influx(sink) => sink.publish(reading).await,
            Sink::Otlp(sink) => sink.publish(reading).await,
            Sink::Log(sink) => sink.publish(reading).await,
        }
    }
}
