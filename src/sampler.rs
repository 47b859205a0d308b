//! The sampling loop: command, read, convert, publish, wait, repeat.
//!
//! A failed cycle is logged and skipped; the next one still starts on
//! schedule. Only shutdown ends the loop, after which the bus is
//! closed.

use {
    crate::{
        bus::BusSession,
        error::{Error, Result},
        health::Health,
        publish::Publish,
        reading::Reading,
        sensors::Sensor,
        shutdown::Shutdown,
    },
    chrono::Utc,
    log::{debug, error, info, trace, warn},
    std::time::Duration,
    tokio::time::{self, MissedTickBehavior},
};

/// Upper bound on a single sink's publish, further capped by the interval.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Sampling,
    Publishing,
}

pub struct Sampler<B, P> {
    bus: B,
    sensor: Box<dyn Sensor + Send + Sync>,
    sinks: Vec<P>,
    interval: Duration,
    health: Health,
    state: State,
}

impl<B, P> Sampler<B, P>
where
    B: BusSession,
    P: Publish,
{
    pub fn new(
        bus: B,
        sensor: Box<dyn Sensor + Send + Sync>,
        sinks: Vec<P>,
        interval: Duration,
        health: Health,
    ) -> Self {
        Sampler {
            bus,
            sensor,
            sinks,
            interval,
            health,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Runs cycles on a fixed cadence until `shutdown` fires, then closes the
    /// bus. Fails without sampling if the bus is already closed; otherwise a
    /// close failure is the only error returned.
    pub async fn run(mut self, mut shutdown: Shutdown) -> Result<()> {
        if !self.bus.is_open() {
            error!("Sensor bus closed before sampling started");
            return Err(Error::IoFailure("bus is closed".into()));
        }

        info!(
            "Sampling {} every {:?} into {} sink(s)",
            self.sensor.name(),
            self.interval,
            self.sinks.len()
        );

        let mut interval = time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = self.cycle() => {}
                _ = shutdown.recv() => break,
            }
        }

        self.transition(State::Idle);
        info!("Sampling stopped");
        self.bus.close()
    }

    /// One full cycle. Returns how many sinks accepted the reading.
    pub async fn cycle(&mut self) -> usize {
        self.transition(State::Sampling);

        let reading = match self.sample().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Skipping cycle: {}", e);
                self.transition(State::Idle);
                return 0;
            }
        };
        self.health.record_reading();

        self.transition(State::Publishing);
        let delivered = self.publish(&reading).await;

        self.transition(State::Idle);
        delivered
    }

    pub async fn sample(&mut self) -> Result<Reading> {
        if let Some(command) = self.sensor.command() {
            self.bus.write_command(command)?;

            let delay = self.sensor.measurement_delay();
            if !delay.is_zero() {
                time::sleep(delay).await;
            }
        }

        let frame = self.bus.read_bytes(self.sensor.frame_len())?;
        let measures = self.sensor.convert(&frame)?;
        let reading = Reading::new(measures, Utc::now());

        debug!(
            "Read {:.2} F, humidity {:?}",
            reading.temperature_f(),
            reading.humidity_pct()
        );
        Ok(reading)
    }

    async fn publish(&self, reading: &Reading) -> usize {
        let limit = self.interval.min(PUBLISH_TIMEOUT);
        let mut delivered = 0;

        for sink in &self.sinks {
            let published = match time::timeout(limit, sink.publish(reading)).await {
                Ok(published) => published,
                Err(_) => Err(Error::publish(
                    sink.name(),
                    format!("no answer within {:?}", limit),
                )),
            };

            match published {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Dropping reading for {}: {}", sink.name(), e),
            }
        }

        delivered
    }

    fn transition(&mut self, next: State) {
        trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }
}
