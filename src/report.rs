use chrono::{DateTime, Utc};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Mutex;

/// Contract operation a fault was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Open,
    Close,
    IsOpened,
    NameByUniqueOptions,
    OnQueueEmpty,
    Flush,
    Send,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Close => "close",
            Operation::IsOpened => "is_opened",
            Operation::NameByUniqueOptions => "name_by_unique_options",
            Operation::OnQueueEmpty => "on_queue_empty",
            Operation::Flush => "flush",
            Operation::Send => "send",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the fault surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Fault {
    /// The implementation returned `Err`.
    Error(String),
    /// The implementation panicked.
    Panic(String),
}

impl Fault {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_string()
        };
        Fault::Panic(detail)
    }

    pub fn detail(&self) -> &str {
        match self {
            Fault::Error(detail) | Fault::Panic(detail) => detail,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Error(detail) => write!(f, "error: {}", detail),
            Fault::Panic(detail) => write!(f, "panic: {}", detail),
        }
    }
}

/// Diagnostic emitted once per isolated fault.
#[derive(Debug, Clone, Serialize)]
pub struct FaultReport {
    pub timestamp: DateTime<Utc>,
    /// Destination identity, if it has been resolved.
    pub destination: Option<String>,
    pub operation: Operation,
    pub fault: Fault,
}

/// Channel through which the proxy reports isolated faults to the host.
pub trait FaultReporter: Send + Sync {
    fn report(&self, report: &FaultReport);
}

/// Reporter that emits each fault as a `tracing` error event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl FaultReporter for TracingReporter {
    fn report(&self, report: &FaultReport) {
        tracing::error!(
            destination = report.destination.as_deref().unwrap_or("<unknown>"),
            operation = %report.operation,
            fault = %report.fault,
            "exception in log destination"
        );
    }
}

/// Reporter that keeps every report in memory.
///
/// Useful for hosts that surface faults through their own status API, and
/// for tests that count reports.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<FaultReport>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<FaultReport> {
        match self.reports.lock() {
            Ok(reports) => reports.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.reports().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FaultReporter for CollectingReporter {
    fn report(&self, report: &FaultReport) {
        let mut reports = match self.reports.lock() {
            Ok(reports) => reports,
            Err(poisoned) => poisoned.into_inner(),
        };
        reports.push(report.clone());
    }
}
