use {
    crate::{
        bus::{AdcLine, BusSession, I2cSession},
        config::{Config, SensorConfig},
        health::Health,
        publish::{meter_provider, InfluxSink, LogSink, MqttSink, OtlpSink, Sink},
        sampler::Sampler,
        sensors::Sensor,
    },
    anyhow::{Context, Result},
    log::{error, info, warn},
    opentelemetry_sdk::metrics::SdkMeterProvider,
    std::time::Duration,
    tokio::{
        net::TcpListener,
        signal::unix::{signal, Signal, SignalKind},
        task::{self, JoinHandle, LocalSet},
        time,
    },
};

pub mod bus;
pub mod config;
pub mod error;
pub mod health;
pub mod publish;
pub mod reading;
pub mod sampler;
pub mod sensors;
pub mod shutdown;

const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn client() -> Result<()> {
    pretty_env_logger::init();
    color_backtrace::install();

    let config = startup(Config::from_env()).context("Failed to load configuration")?;

    // The health server's connections run as local tasks.
    let local = LocalSet::new();
    match &config.sensor {
        SensorConfig::Sht3x {
            device,
            address,
            sensor,
        } => {
            let bus = startup(I2cSession::open(device, *address))
                .context("Failed to open sensor bus")?;
            local
                .run_until(run(&config, bus, Box::new(sensor.clone())))
                .await
        }
        SensorConfig::Tmp36 { path, sensor } => {
            let bus = startup(AdcLine::open(path)).context("Failed to open ADC line")?;
            local
                .run_until(run(&config, bus, Box::new(sensor.clone())))
                .await
        }
    }
}

/// Logs errors that end the process before handing them to `anyhow`.
fn startup<T>(result: error::Result<T>) -> Result<T> {
    result.map_err(|e| {
        if e.is_fatal() {
            error!("Fatal: {}", e);
        }
        e.into()
    })
}

/// Everything after the bus is claimed. Returning early drops `bus`, which
/// releases it.
async fn run<B>(config: &Config, bus: B, sensor: Box<dyn Sensor + Send + Sync>) -> Result<()>
where
    B: BusSession + Send + Sync + 'static,
{
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let listener = TcpListener::bind(("0.0.0.0", config.health.port))
        .await
        .with_context(|| format!("Failed to bind health endpoint to port {}", config.health.port))?;

    let health = Health::new(config.health.max_age);
    let (trigger, shutdown) = shutdown::channel();

    let mut sinks = Vec::new();
    let mut mqtt = None;

    if let Some(mqtt_config) = &config.mqtt {
        let (sink, connection) = MqttSink::connect(mqtt_config);
        mqtt = Some((sink.clone(), task::spawn(connection.run())));
        sinks.push(Sink::Mqtt(sink));
    }

    if let Some(db) = &config.influx {
        sinks.push(Sink::Influx(InfluxSink::new(
            &db.address,
            db.port,
            &db.database,
            &config.service,
            &config.device_id,
        )));
    }

    let mut otlp = None;
    if let Some(otlp_config) = &config.otlp {
        let provider = startup(meter_provider(otlp_config, &config.service))
            .context("Failed to start OTLP exporter")?;
        sinks.push(Sink::Otlp(OtlpSink::new(
            &provider,
            &config.service,
            &config.device_id,
        )));
        otlp = Some(provider);
    }

    if sinks.is_empty() {
        info!("No sinks configured, readings go to the log only");
        sinks.push(Sink::Log(LogSink));
    }

    let serving = task::spawn_local(health::serve(listener, health.clone(), shutdown.clone()));
    let mut sampling = task::spawn(
        Sampler::new(bus, sensor, sinks, config.interval, health).run(shutdown),
    );
    info!("Initialization complete");

    let finished = tokio::select! {
        _ = terminated(&mut sigterm) => {
            info!("Shutdown requested");
            None
        }
        finished = &mut sampling => Some(finished),
    };

    trigger.fire();
    let sampled = match finished {
        Some(finished) => {
            warn!("Sampling task ended before shutdown");
            finished
        }
        None => sampling.await,
    };

    if let Some((sink, connection)) = mqtt {
        disconnect(sink, connection).await;
    }

    if let Some(provider) = otlp {
        flush(provider).await;
    }

    match serving.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Health endpoint failed: {}", e),
        Err(e) => error!("Health endpoint task failed: {}", e),
    }

    sampled
        .context("Sampling task panicked")?
        .context("Sampling ended with an error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn terminated(sigterm: &mut Signal) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        }
        _ = sigterm.recv() => {}
    }
}

async fn disconnect(sink: MqttSink, mut connection: JoinHandle<()>) {
    match time::timeout(DISCONNECT_TIMEOUT, sink.disconnect()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("{}", e),
        Err(_) => warn!("Timed out queueing MQTT disconnect"),
    }

    if time::timeout(DISCONNECT_TIMEOUT, &mut connection)
        .await
        .is_err()
    {
        warn!("MQTT connection did not close in time");
        connection.abort();
    }
}

/// Exports whatever is still buffered, then stops the periodic reader.
async fn flush(provider: SdkMeterProvider) {
    match task::spawn_blocking(move || provider.shutdown()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to flush OTLP metrics: {}", e),
        Err(e) => warn!("OTLP flush task failed: {}", e),
    }
}
