use {
    crate::{
        config::OtlpConfig,
        error::{Error, Result},
        publish::Publish,
        reading::Reading,
    },
    log::{debug, info},
    opentelemetry::{
        metrics::{Gauge, MeterProvider as _},
        KeyValue,
    },
    opentelemetry_otlp::WithExportConfig,
    opentelemetry_sdk::{metrics::SdkMeterProvider, runtime, Resource},
};

const NAME: &str = "otlp";
const METER: &str = "rpi-thermometer";

/// Builds the exporting meter provider. It is handed to `OtlpSink` and to
/// shutdown directly and never installed as the global provider.
pub fn meter_provider(config: &OtlpConfig, service: &str) -> Result<SdkMeterProvider> {
    info!("OTLP exporting to {} every {:?}", config.endpoint, config.period);

    opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(config.endpoint.clone()),
        )
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service.to_string(),
        )]))
        .with_period(config.period)
        .build()
        .map_err(|e| Error::ConfigInvalid {
            key: "OTEL_EXPORTER_OTLP_ENDPOINT".into(),
            reason: e.to_string(),
        })
}

/// Records `<service>.temp` and `<service>.humidity` gauges tagged with the
/// device id. Export happens on the provider's own period.
pub struct OtlpSink {
    temperature: Gauge<f64>,
    humidity: Gauge<f64>,
    attributes: [KeyValue; 1],
}

impl OtlpSink {
    pub fn new(provider: &SdkMeterProvider, service: &str, id: &str) -> Self {
        let meter = provider.meter(METER);

        OtlpSink {
            temperature: meter
                .f64_gauge(format!("{}.temp", service))
                .with_description("temperature in F")
                .init(),
            humidity: meter
                .f64_gauge(format!("{}.humidity", service))
                .with_description("relative humidity in %")
                .init(),
            attributes: [KeyValue::new("id", id.to_string())],
        }
    }
}

impl Publish for OtlpSink {
    fn name(&self) -> &str {
        NAME
    }

    async fn publish(&self, reading: &Reading) -> Result<()> {
        self.temperature.record(reading.temperature_f(), &self.attributes);
        if let Some(humidity) = reading.humidity_pct() {
            self.humidity.record(humidity, &self.attributes);
        }

        debug!("Recorded reading for OTLP export");
        Ok(())
    }
}
