use crate::observability::{LogConfig, LogFormat};
use crate::repositories::{IsolationLevel, PgStoreOptions};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub isolation_level: IsolationLevel,
    /// Row-lock wait limit in milliseconds; unset waits indefinitely.
    pub lock_timeout_ms: Option<u64>,
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

impl DatabaseSettings {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn store_options(&self) -> PgStoreOptions {
        PgStoreOptions {
            isolation_level: self.isolation_level,
            lock_timeout: self.lock_timeout_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl ApplicationSettings {
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new(&self.log_level, LogFormat::from(self.log_format.as_str()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TransferSettings {
    /// Deadline for one transfer's unit of work in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl TransferSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsSettings {
    pub exporter_addr: Option<SocketAddr>,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        builder.build()?.try_deserialize()
    }
}
