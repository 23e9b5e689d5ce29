//! Layered runtime configuration.
//!
//! Sources are merged in increasing precedence:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. `SENSORWATCH_*` environment variables (e.g. `SENSORWATCH_WINDOW_SIZE=100`)
//! 4. command-line overrides
//!
//! [`Settings`] is the raw, string-typed result of the merge.
//! [`Settings::validate`] turns it into a [`PipelineConfig`] or a
//! [`ConfigError`], before anything is connected or drawn.
//!
//! # Example file
//!
//! ```toml
//! broker_uri = "ws://damoa.io:9002"
//! topic = "ek/sensor/3"
//! field = "3T0"
//! window_size = 50
//! reconnect_period = "1s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::data::duration::parse_duration;
use crate::data::{DEFAULT_FIELD, DEFAULT_WINDOW_SIZE};
use crate::source::{
    check_keep_alive, BrokerEndpoint, MqttSource, MqttSourceBuilder, MIN_RECONNECT_PERIOD,
};
use crate::ConfigError;

pub const DEFAULT_BROKER_URI: &str = "ws://damoa.io:9002";
pub const DEFAULT_TOPIC: &str = "ek/sensor/3";
pub const DEFAULT_LOG_FILE: &str = "sensorwatch.log";

/// Shortest accepted UI refresh interval.
pub const MIN_REFRESH: Duration = Duration::from_millis(10);

/// Merged settings, as read from all sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub broker_uri: String,
    pub topic: String,
    pub field: String,
    pub window_size: usize,
    pub reconnect_period: String,
    pub keep_alive: String,
    #[serde(default)]
    pub client_id: Option<String>,
    pub log_file: PathBuf,
    pub refresh: String,
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub broker_uri: Option<String>,
    pub topic: Option<String>,
    pub field: Option<String>,
    pub window_size: Option<usize>,
    pub client_id: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Validated configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub broker_uri: String,
    pub topic: String,
    pub field: String,
    pub window_size: usize,
    pub reconnect_period: Duration,
    pub keep_alive: Duration,
    pub client_id: Option<String>,
    pub log_file: PathBuf,
    pub refresh: Duration,
}

impl Settings {
    /// Merge defaults, the optional file, the environment and `overrides`.
    ///
    /// A missing file is an error when a path is given explicitly.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        Self::load_with_env(path, overrides, Environment::with_prefix("SENSORWATCH"))
    }

    fn load_with_env(
        path: Option<&Path>,
        overrides: Overrides,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("broker_uri", DEFAULT_BROKER_URI)?
            .set_default("topic", DEFAULT_TOPIC)?
            .set_default("field", DEFAULT_FIELD)?
            .set_default("window_size", DEFAULT_WINDOW_SIZE as u64)?
            .set_default("reconnect_period", "1s")?
            .set_default("keep_alive", "30s")?
            .set_default("log_file", DEFAULT_LOG_FILE)?
            .set_default("refresh", "100ms")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(env.try_parsing(true))
            .set_override_option("broker_uri", overrides.broker_uri)?
            .set_override_option("topic", overrides.topic)?
            .set_override_option("field", overrides.field)?
            .set_override_option("window_size", overrides.window_size.map(|n| n as u64))?
            .set_override_option("client_id", overrides.client_id)?
            .set_override_option(
                "log_file",
                overrides.log_file.map(|p| p.to_string_lossy().into_owned()),
            )?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Check every setting and convert durations.
    pub fn validate(&self) -> Result<PipelineConfig, ConfigError> {
        let broker_uri = self.broker_uri.trim();
        if broker_uri.is_empty() {
            return Err(ConfigError::Missing("broker_uri"));
        }
        BrokerEndpoint::parse(broker_uri)?;

        if self.topic.is_empty() {
            return Err(ConfigError::Missing("topic"));
        }
        if self.field.is_empty() {
            return Err(ConfigError::Missing("field"));
        }
        if self.window_size == 0 {
            return Err(ConfigError::InvalidWindow(0));
        }

        let reconnect_period = duration_setting("reconnect_period", &self.reconnect_period)?;
        at_least("reconnect_period", reconnect_period, MIN_RECONNECT_PERIOD)?;
        let keep_alive = duration_setting("keep_alive", &self.keep_alive)?;
        check_keep_alive(keep_alive)?;
        let refresh = duration_setting("refresh", &self.refresh)?;
        at_least("refresh", refresh, MIN_REFRESH)?;

        Ok(PipelineConfig {
            broker_uri: broker_uri.to_string(),
            topic: self.topic.clone(),
            field: self.field.clone(),
            window_size: self.window_size,
            reconnect_period,
            keep_alive,
            client_id: self.client_id.clone().filter(|c| !c.trim().is_empty()),
            log_file: self.log_file.clone(),
            refresh,
        })
    }
}

impl PipelineConfig {
    /// An MQTT source builder carrying these settings.
    pub fn mqtt_builder(&self) -> MqttSourceBuilder {
        let builder = MqttSource::builder()
            .broker(&self.broker_uri)
            .topic(&self.topic)
            .keep_alive(self.keep_alive)
            .reconnect_period(self.reconnect_period);
        match &self.client_id {
            Some(id) => builder.client_id(id),
            None => builder,
        }
    }
}

fn duration_setting(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    parse_duration(value).map_err(|_| ConfigError::InvalidDuration {
        key,
        value: value.to_string(),
    })
}

fn at_least(key: &'static str, actual: Duration, min: Duration) -> Result<(), ConfigError> {
    if actual < min {
        return Err(ConfigError::TooShort { key, min, actual });
    }
    Ok(())
}
