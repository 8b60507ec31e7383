use crate::config::DestinationConfig;
use crate::destination::DestinationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Rendering settings shared by every destination of a pipeline.
///
/// Destinations only hold a reference; the host owns the value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSettings {
    /// Time zone used when formatting timestamps, `None` for local time.
    pub time_zone: Option<String>,
    /// Number of fractional second digits.
    pub frac_digits: u8,
    /// Escape special characters in rendered values.
    pub escape: bool,
}

/// What a destination may ask of the pipeline that hosts it.
///
/// Everything here is owned by the host. Options and template settings are
/// read-only; the batch size is the one value a destination may write, to
/// signal its preferred batching window.
pub trait DestinationHost: Send + Sync {
    /// Fetch a single configuration value, `None` if it was not set.
    fn option(&self, key: &str) -> Option<String>;

    fn template_settings(&self) -> Arc<TemplateSettings>;

    /// Current delivery sequence position.
    fn seq_num(&self) -> u64;

    fn batch_size(&self) -> usize;

    fn set_batch_size(&self, batch_size: usize);

    /// Read an option or fall back to a provided default.
    fn option_or(&self, key: &str, default: &str) -> String {
        self.option(key).unwrap_or_else(|| default.to_string())
    }
}

/// Read and parse an option.
///
/// **Returns**
/// - `Ok(None)` if the option is absent; missing configuration is never an
///   error.
/// - `Err(..)` if it is present but does not parse.
pub fn parse_option<T: FromStr>(
    host: &dyn DestinationHost,
    key: &str,
) -> Result<Option<T>, DestinationError> {
    match host.option(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| DestinationError::InvalidOption {
                key: key.to_string(),
                value,
            }),
    }
}

/// In-process host binding for a single destination.
///
/// Holds the destination's options and the shared template settings, and the
/// two counters the host mutates while driving the destination: the sequence
/// number and the batch size.
#[derive(Debug)]
pub struct PipeHost {
    options: BTreeMap<String, String>,
    template: Arc<TemplateSettings>,
    seq_num: AtomicU64,
    batch_size: AtomicUsize,
}

impl PipeHost {
    pub fn new(options: BTreeMap<String, String>, template: Arc<TemplateSettings>) -> Self {
        PipeHost {
            options,
            template,
            seq_num: AtomicU64::new(0),
            batch_size: AtomicUsize::new(1),
        }
    }

    pub fn from_config(config: &DestinationConfig) -> Self {
        let host = PipeHost::new(config.options.clone(), Arc::new(config.template.clone()));
        host.set_batch_size(config.batch_size);
        host
    }

    /// Assign the next sequence number. Only the host side calls this.
    pub fn advance_seq_num(&self) -> u64 {
        self.seq_num.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl DestinationHost for PipeHost {
    fn option(&self, key: &str) -> Option<String> {
        self.options.get(key).cloned()
    }

    fn template_settings(&self) -> Arc<TemplateSettings> {
        Arc::clone(&self.template)
    }

    fn seq_num(&self) -> u64 {
        self.seq_num.load(Ordering::Relaxed)
    }

    fn batch_size(&self) -> usize {
        self.batch_size.load(Ordering::Relaxed)
    }

    fn set_batch_size(&self, batch_size: usize) {
        self.batch_size.store(batch_size.max(1), Ordering::Relaxed);
    }
}
