use {
    crate::{
        config::MqttConfig,
        error::{Error, Result},
        publish::Publish,
        reading::Reading,
    },
    log::{debug, info, warn},
    rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS},
    serde::Serialize,
    std::time::Duration,
    tokio::time,
};

const NAME: &str = "mqtt";
const CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct Payload {
    #[serde(rename = "tempF")]
    temp_f: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    humidity: Option<String>,
    action: &'static str,
}

pub fn payload(reading: &Reading) -> Result<Vec<u8>> {
    let payload = Payload {
        temp_f: format!("{:.2}", reading.temperature_f()),
        humidity: reading.humidity_pct().map(|h| format!("{:.2}", h)),
        action: "log",
    };

    serde_json::to_vec(&payload).map_err(|e| Error::publish(NAME, e))
}

/// Publishes each reading as one JSON message, QoS 1, not retained.
#[derive(Clone)]
pub struct MqttSink {
    client: AsyncClient,
    topic: String,
}

/// The network side of an `MqttSink`; must be polled for anything to leave
/// the process.
pub struct MqttConnection {
    eventloop: EventLoop,
}

impl MqttSink {
    pub fn connect(config: &MqttConfig) -> (MqttSink, MqttConnection) {
        info!("MQTT connecting to {}:{}", config.server, config.port);

        let mut options = MqttOptions::new(&config.client_id, &config.server, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(false);
        if let Some((user, pass)) = &config.credentials {
            options.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(options, CAPACITY);
        let sink = MqttSink {
            client,
            topic: config.topic.clone(),
        };

        (sink, MqttConnection { eventloop })
    }

    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from MQTT server");
        self.client
            .disconnect()
            .await
            .map_err(|e| Error::publish(NAME, e))
    }
}

impl Publish for MqttSink {
    fn name(&self) -> &str {
        NAME
    }

    /// Never waits on the broker: a full request queue (broker down or
    /// slow) fails the publish instead of stalling the caller.
    async fn publish(&self, reading: &Reading) -> Result<()> {
        let payload = payload(reading)?;

        self.client
            .try_publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| Error::publish(NAME, e))?;

        debug!("Published reading to {}", self.topic);
        Ok(())
    }
}

impl MqttConnection {
    /// Drives the connection until a disconnect has been sent. Connection
    /// errors are logged and the broker is retried.
    pub async fn run(mut self) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => info!("Connected to MQTT server"),
                Ok(Event::Incoming(Packet::PubAck(ack))) => debug!("MQTT puback {}", ack.pkid),
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("MQTT disconnect sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Lost connection to MQTT server: {}", e);
                    time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::sensors::Measures,
        chrono::Utc,
        serde_json::{json, Value},
    };

    fn reading(temperature_f: f64, humidity_pct: Option<f64>) -> Reading {
        Reading::new(
            Measures {
                temperature_f,
                humidity_pct,
            },
            Utc::now(),
        )
    }

    #[test]
    fn payload_uses_two_decimal_strings() {
        let bytes = payload(&reading(77.0673, Some(54.6883))).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(
            value,
            json!({"tempF": "77.07", "humidity": "54.69", "action": "log"})
        );
    }

    #[test]
    fn payload_omits_missing_humidity() {
        let bytes = payload(&reading(239.0, None)).unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value, json!({"tempF": "239.00", "action": "log"}));
    }

    fn config(port: u16) -> MqttConfig {
        MqttConfig {
            server: "127.0.0.1".into(),
            port,
            topic: "home/thermo".into(),
            client_id: "test".into(),
            credentials: None,
            keep_alive: Duration::from_secs(10),
        }
    }

    #[tokio::test]
    async fn publish_queues_on_the_client() {
        // Nothing polls the connection, so the request only lands in the
        // client's queue.
        let (sink, _connection) = MqttSink::connect(&config(1883));
        sink.publish(&reading(70.0, Some(40.0))).await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_broker_fails_fast_once_the_queue_is_full() {
        // Nothing listens on port 1; the connection keeps failing and backing
        // off, so queued requests are never drained.
        let (sink, connection) = MqttSink::connect(&config(1));
        let driver = tokio::spawn(connection.run());

        let mut failures = 0;
        for _ in 0..CAPACITY * 3 {
            let published = time::timeout(Duration::from_secs(1), sink.publish(&reading(70.0, None)))
                .await
                .expect("publish blocked on a dead broker");
            if let Err(e) = published {
                assert!(matches!(e, Error::PublishFailure { ref sink, .. } if sink == "mqtt"));
                failures += 1;
            }
        }

        assert!(failures >= CAPACITY);
        driver.abort();
    }
}
