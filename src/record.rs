use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A log message as handed to [`RecordDestination::send`].
///
/// [`RecordDestination::send`]: crate::destination::RecordDestination::send
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub target: String,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub message: Option<String>,
    pub service_name: Option<String>,
}

impl LogRecord {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: Utc::now(),
            level: level.into(),
            target: String::new(),
            fields: BTreeMap::new(),
            message: Some(message.into()),
            service_name: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
