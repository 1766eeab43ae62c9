use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;

use crate::capture::DeviceConstraints;
use crate::remote::RetryPolicy;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub remote: RemoteConfig,
    pub capture: CaptureConfig,
    pub polling: PollingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "consult-scribe".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Request timeout; generous because uploads carry whole recordings
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            sample_rate: 44100,
        }
    }
}

impl CaptureConfig {
    pub fn constraints(&self) -> DeviceConstraints {
        DeviceConstraints {
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            sample_rate: self.sample_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    pub grace_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: 15,
            initial_delay_ms: 3000,
            backoff_multiplier: 1.5,
            max_delay_ms: 10000,
            grace_delay_ms: 3000,
        }
    }
}

impl PollingConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
