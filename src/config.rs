use crate::env::{
    LOG_DEST_BATCH_SIZE_ENV, LOG_DEST_CHANNEL_BUFFER_ENV, LOG_DEST_FLUSH_INTERVAL_MS_ENV,
    LOG_DEST_MAX_BACKOFF_MS_ENV, LOG_DEST_REOPEN_BACKOFF_MS_ENV, LOG_DEST_RETRIES_ENV,
};
use crate::host::TemplateSettings;
use crate::worker::WorkerConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

/// Everything the host needs to bind and drive one destination.
///
/// `options` and `template` are handed to the destination through its
/// [`DestinationHost`](crate::host::DestinationHost); the remaining fields
/// configure the [`DestinationWorker`](crate::worker::DestinationWorker).
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    pub options: BTreeMap<String, String>,
    pub template: TemplateSettings,
    pub batch_size: usize,
    pub channel_buffer: usize,
    pub flush_interval_ms: u64,
    pub retries: u32,
    pub reopen_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            options: BTreeMap::new(),
            template: TemplateSettings::default(),
            batch_size: 128,
            channel_buffer: 1024,
            flush_interval_ms: 1000,
            retries: 3,
            reopen_backoff_ms: 100,
            max_backoff_ms: 10_000,
        }
    }
}

/// Error type returned when loading a [`DestinationConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid destination config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for environment variable {key}")]
    InvalidEnv { key: &'static str, value: String },
}

impl DestinationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override settings from `LOG_DEST_*` environment variables.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Like [`apply_env`](Self::apply_env) with an explicit variable lookup.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, LOG_DEST_BATCH_SIZE_ENV, &mut self.batch_size)?;
        override_from(&lookup, LOG_DEST_CHANNEL_BUFFER_ENV, &mut self.channel_buffer)?;
        override_from(&lookup, LOG_DEST_FLUSH_INTERVAL_MS_ENV, &mut self.flush_interval_ms)?;
        override_from(&lookup, LOG_DEST_RETRIES_ENV, &mut self.retries)?;
        override_from(&lookup, LOG_DEST_REOPEN_BACKOFF_MS_ENV, &mut self.reopen_backoff_ms)?;
        override_from(&lookup, LOG_DEST_MAX_BACKOFF_MS_ENV, &mut self.max_backoff_ms)?;
        Ok(self)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            channel_buffer: self.channel_buffer,
            flush_interval: Duration::from_millis(self.flush_interval_ms),
            retries: self.retries,
            reopen_backoff: Duration::from_millis(self.reopen_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

fn override_from<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value })?;
    }
    Ok(())
}
