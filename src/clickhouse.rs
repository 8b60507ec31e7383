use crate::destination::{BoxError, LogDestination, RecordDestination};
use crate::host::{parse_option, DestinationHost};
use crate::record::LogRecord;
use crate::result::InsertResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Settings for [`ClickHouseDestination`], read from host options.
///
/// | option | default |
/// |---|---|
/// | `url` | `http://127.0.0.1:8123` |
/// | `database` | `default` |
/// | `table` | `logs` |
/// | `user`, `password` | unset |
/// | `service-name` | unset |
/// | `batch-lines` | host batch size is left alone |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClickHouseConfig {
    /// Base URL without query, e.g. "http://127.0.0.1:8123"
    pub url: String,
    pub database: String,
    pub table: String,
    pub service_name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ClickHouseConfig {
    pub fn from_host(host: &dyn DestinationHost) -> Self {
        ClickHouseConfig {
            url: host
                .option_or("url", "http://127.0.0.1:8123")
                .trim_end_matches('/')
                .to_string(),
            database: host.option_or("database", "default"),
            table: host.option_or("table", "logs"),
            service_name: host.option("service-name"),
            user: host.option("user"),
            password: host.option("password"),
        }
    }
}

/// Batching ClickHouse destination using the HTTP interface.
///
/// `send` only buffers the row and answers [`InsertResult::Queued`]; rows are
/// written with a single `JSONEachRow` insert on `flush`. A flush takes the
/// whole buffer whatever the outcome: after a failure the host sends the
/// records again, or drops them once it runs out of retries.
pub struct ClickHouseDestination {
    client: Client,
    config: ClickHouseConfig,
    opened: AtomicBool,
    buffer: Mutex<Vec<ClickHouseRow>>,
}

impl ClickHouseDestination {
    /// Build the destination from the options of its host.
    ///
    /// **Returns**
    /// - `Err(..)` if `batch-lines` is present but not a number. When it is
    ///   valid it is written to the host as the preferred batch size.
    pub fn new(host: Arc<dyn DestinationHost>) -> Result<Self, BoxError> {
        if let Some(batch_lines) = parse_option::<usize>(host.as_ref(), "batch-lines")? {
            host.set_batch_size(batch_lines);
        }

        Ok(ClickHouseDestination {
            client: Client::new(),
            config: ClickHouseConfig::from_host(host.as_ref()),
            opened: AtomicBool::new(false),
            buffer: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &ClickHouseConfig {
        &self.config
    }

    /// Number of rows waiting for the next flush.
    pub async fn buffered(&self) -> usize {
        self.buffer.lock().await.len()
    }

    fn credentials_query(&self) -> String {
        let mut query = String::new();
        if let Some(user) = &self.config.user {
            query.push_str(&format!("&user={}", urlencoding::encode(user)));
        }
        if let Some(password) = &self.config.password {
            query.push_str(&format!("&password={}", urlencoding::encode(password)));
        }
        query
    }

    fn insert_endpoint(&self) -> String {
        format!(
            "{}/?database={}&query=INSERT%20INTO%20{}%20FORMAT%20JSONEachRow{}",
            self.config.url,
            urlencoding::encode(&self.config.database),
            urlencoding::encode(&self.config.table),
            self.credentials_query()
        )
    }

    fn ping_endpoint(&self) -> String {
        format!("{}/ping", self.config.url)
    }

    fn map_record(&self, record: &LogRecord) -> Result<ClickHouseRow, serde_json::Error> {
        Ok(ClickHouseRow {
            timestamp: record.timestamp.to_rfc3339(),
            level: record.level.clone(),
            target: record.target.clone(),
            message: record.message.clone(),
            service_name: self
                .config
                .service_name
                .clone()
                .or_else(|| record.service_name.clone()),
            fields: serde_json::to_string(&record.fields)?,
        })
    }

    async fn post_rows(&self, rows: &[ClickHouseRow]) -> Result<InsertResult, BoxError> {
        let mut body = String::new();
        for row in rows {
            body.push_str(&serde_json::to_string(row)?);
            body.push('\n');
        }

        let resp = match self.client.post(self.insert_endpoint()).body(body).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                tracing::warn!(url = %self.config.url, error = %e, "ClickHouse unreachable");
                return Ok(InsertResult::NotConnected);
            }
            Err(e) => return Err(e.into()),
        };

        if resp.status().is_success() {
            Ok(InsertResult::Success)
        } else {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            tracing::warn!(%status, body = %text, "ClickHouse insert failed");
            Ok(InsertResult::Error)
        }
    }
}

#[derive(Serialize)]
struct ClickHouseRow {
    timestamp: String,
    level: String,
    target: String,
    message: Option<String>,
    service_name: Option<String>,
    fields: String,
}

#[async_trait]
impl LogDestination for ClickHouseDestination {
    async fn open(&self) -> Result<bool, BoxError> {
        let ok = match self.client.get(self.ping_endpoint()).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(url = %self.config.url, error = %e, "ClickHouse ping failed");
                false
            }
        };
        self.opened.store(ok, Ordering::Release);
        Ok(ok)
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.opened.store(false, Ordering::Release);
        Ok(())
    }

    fn is_opened(&self) -> Result<bool, BoxError> {
        Ok(self.opened.load(Ordering::Acquire))
    }

    fn name_by_unique_options(&self) -> Result<String, BoxError> {
        Ok(format!(
            "clickhouse,{},{},{}",
            self.config.url, self.config.database, self.config.table
        ))
    }

    async fn flush(&self) -> Result<InsertResult, BoxError> {
        let rows = std::mem::take(&mut *self.buffer.lock().await);
        if rows.is_empty() {
            return Ok(InsertResult::Success);
        }

        let result = self.post_rows(&rows).await;
        if !matches!(result, Ok(InsertResult::Success)) {
            tracing::debug!(rows = rows.len(), "discarding rows of failed ClickHouse insert");
        }
        result
    }
}

#[async_trait]
impl RecordDestination for ClickHouseDestination {
    async fn send(&self, record: &LogRecord) -> Result<InsertResult, BoxError> {
        if !self.opened.load(Ordering::Acquire) {
            return Ok(InsertResult::NotConnected);
        }
        let row = self.map_record(record)?;
        self.buffer.lock().await.push(row);
        Ok(InsertResult::Queued)
    }
}
