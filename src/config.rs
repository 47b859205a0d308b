//! Settings read from the environment at startup.

use {
    crate::{
        error::{Error, Result},
        sensors::{sht3x, Sht3x, Tmp36},
    },
    std::{env, fmt::Display, str::FromStr, time::Duration},
};

const I2C_DEV: &str = "/dev/i2c-1";
const ADC_PATH: &str = "/sys/bus/iio/devices/iio:device0/in_voltage0_raw";
const SERVICE_NAME: &str = "rpi-thermometer";
const CLIENT_ID: &str = "pi-thermo";
const DB_NAME: &str = "environment";

#[derive(Debug, Clone)]
pub struct Config {
    pub sensor: SensorConfig,
    pub interval: Duration,
    pub service: String,
    pub device_id: String,
    pub mqtt: Option<MqttConfig>,
    pub influx: Option<InfluxConfig>,
    pub otlp: Option<OtlpConfig>,
    pub health: HealthConfig,
}

#[derive(Debug, Clone)]
pub enum SensorConfig {
    Sht3x {
        device: String,
        address: u8,
        sensor: Sht3x,
    },
    Tmp36 {
        path: String,
        sensor: Tmp36,
    },
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub server: String,
    pub port: u16,
    pub topic: String,
    pub client_id: String,
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
}

#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub address: String,
    pub port: u16,
    pub database: String,
}

#[derive(Debug, Clone)]
pub struct OtlpConfig {
    pub endpoint: String,
    pub period: Duration,
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub port: u16,
    /// Report unhealthy when the last good reading is older than this.
    pub max_age: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let sensor = match env.get("SENSOR_KIND").as_deref().unwrap_or("sht3x") {
            "sht3x" => SensorConfig::Sht3x {
                device: env.get("I2C_DEV").unwrap_or_else(|| I2C_DEV.to_string()),
                address: match env.get("I2C_ADDR") {
                    Some(raw) => parse_address(&raw)?,
                    None => sht3x::ADDRESS,
                },
                sensor: Sht3x {
                    measurement_delay: Duration::from_millis(env.parse_or(
                        "MEASUREMENT_DELAY_MS",
                        Sht3x::default().measurement_delay.as_millis() as u64,
                    )?),
                    verify_crc: env.parse_or("SHT3X_VERIFY_CRC", false)?,
                },
            },
            "tmp36" => {
                let defaults = Tmp36::default();
                let sensor = Tmp36 {
                    reference_mv: env.parse_or("ADC_REFERENCE_MV", defaults.reference_mv)?,
                    steps: env.parse_or("ADC_STEPS", defaults.steps)?,
                };
                if sensor.steps <= 0.0 {
                    return Err(invalid("ADC_STEPS", "must be positive"));
                }

                SensorConfig::Tmp36 {
                    path: env.get("ADC_PATH").unwrap_or_else(|| ADC_PATH.to_string()),
                    sensor,
                }
            }
            other => {
                return Err(invalid(
                    "SENSOR_KIND",
                    format!("unknown sensor {:?}, expected sht3x or tmp36", other),
                ))
            }
        };

        let interval = env.parse_or("SAMPLE_INTERVAL_SECS", 5u64)?;
        if interval == 0 {
            return Err(invalid("SAMPLE_INTERVAL_SECS", "must be at least 1"));
        }

        let service = env
            .get("SERVICE_NAME")
            .unwrap_or_else(|| SERVICE_NAME.to_string());
        let device_id = env
            .get("DEVICE_ID")
            .or_else(|| env.get("BALENA_DEVICE_UUID"))
            .unwrap_or_else(|| service.clone());

        let mqtt = match env.get("MQTT_SERVER") {
            Some(server) => Some(MqttConfig {
                server,
                port: env.parse_required("MQTT_PORT")?,
                topic: env.required("MQTT_TOPIC")?,
                client_id: env.get("MQTT_CLIENT_ID").unwrap_or_else(|| CLIENT_ID.to_string()),
                credentials: match (env.get("MQTT_USER"), env.get("MQTT_PASS")) {
                    (Some(user), Some(pass)) => Some((user, pass)),
                    (None, None) => None,
                    (Some(_), None) => return Err(Error::ConfigMissing("MQTT_PASS".into())),
                    (None, Some(_)) => return Err(Error::ConfigMissing("MQTT_USER".into())),
                },
                keep_alive: Duration::from_secs(10),
            }),
            None => None,
        };

        let influx = match env.get("DB_ADDR") {
            Some(address) => Some(InfluxConfig {
                address,
                port: env.parse_required("DB_PORT")?,
                database: env.get("DB_NAME").unwrap_or_else(|| DB_NAME.to_string()),
            }),
            None => None,
        };

        let otlp = match env.get("OTEL_EXPORTER_OTLP_ENDPOINT") {
            Some(endpoint) => {
                let period = env.parse_or("OTEL_EXPORT_PERIOD_SECS", 5u64)?;
                if period == 0 {
                    return Err(invalid("OTEL_EXPORT_PERIOD_SECS", "must be at least 1"));
                }
                Some(OtlpConfig {
                    endpoint,
                    period: Duration::from_secs(period),
                })
            }
            None => None,
        };

        let health = HealthConfig {
            port: env.parse_or("HEALTH_PORT", 8080)?,
            max_age: env
                .get("HEALTH_MAX_AGE_SECS")
                .map(|raw| parse("HEALTH_MAX_AGE_SECS", &raw).map(Duration::from_secs))
                .transpose()?,
        };

        Ok(Config {
            sensor,
            interval: Duration::from_secs(interval),
            service,
            device_id,
            mqtt,
            influx,
            otlp,
            health,
        })
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::ConfigMissing(key.to_string()))
    }

    fn parse_required<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        parse(key, &self.required(key)?)
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => parse(key, &raw),
            None => Ok(default),
        }
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| invalid(key, e))
}

fn parse_address(raw: &str) -> Result<u8> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => raw.parse(),
    };

    match parsed {
        Ok(address) if address <= 0x7F => Ok(address),
        Ok(_) => Err(invalid("I2C_ADDR", "not a 7-bit address")),
        Err(e) => Err(invalid("I2C_ADDR", e)),
    }
}

fn invalid(key: &str, reason: impl ToString) -> Error {
    Error::ConfigInvalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
