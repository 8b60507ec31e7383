use crate::destination::{BoxError, LogDestination, RecordDestination};
use crate::record::LogRecord;
use crate::report::{Fault, FaultReport, FaultReporter, Operation, TracingReporter};
use crate::result::InsertResult;
use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

/// Lifecycle state of a destination as seen through its proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationState {
    Closed,
    Open,
    /// A contract call faulted. Behaves like `Closed` until the next
    /// successful `open`.
    Failed,
}

impl DestinationState {
    fn from_u8(value: u8) -> Self {
        match value {
            STATE_OPEN => DestinationState::Open,
            STATE_FAILED => DestinationState::Failed,
            _ => DestinationState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            DestinationState::Closed => STATE_CLOSED,
            DestinationState::Open => STATE_OPEN,
            DestinationState::Failed => STATE_FAILED,
        }
    }
}

impl fmt::Display for DestinationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DestinationState::Closed => "closed",
            DestinationState::Open => "open",
            DestinationState::Failed => "failed",
        };
        f.write_str(s)
    }
}

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_FAILED: u8 = 2;

/// Host-facing wrapper around a [`LogDestination`].
///
/// Every method is total: whatever the wrapped implementation does (return
/// `Err`, panic), the proxy returns a value the host can act on. Each fault
/// is reported exactly once through the injected [`FaultReporter`] and
/// replaced by a fixed fallback:
///
/// | operation | fallback |
/// |---|---|
/// | `open` | `false` |
/// | `close` | returns normally |
/// | `is_opened` | `false` |
/// | `on_queue_empty` | returns normally |
/// | `flush` | [`InsertResult::Error`] |
/// | `name_by_unique_options` | `None` |
/// | `send` | [`InsertResult::Error`] |
///
/// Successful calls are passed through unchanged and are not logged.
///
/// The proxy also tracks the lifecycle state. A fault in any operation moves
/// it to [`DestinationState::Failed`], after which `is_opened` answers `false`
/// without consulting the implementation until the host opens it again.
pub struct DestinationProxy<D> {
    inner: D,
    reporter: Arc<dyn FaultReporter>,
    state: AtomicU8,
    identity: OnceLock<String>,
}

impl<D: LogDestination> DestinationProxy<D> {
    pub fn new(inner: D, reporter: Arc<dyn FaultReporter>) -> Self {
        DestinationProxy {
            inner,
            reporter,
            state: AtomicU8::new(STATE_CLOSED),
            identity: OnceLock::new(),
        }
    }

    /// Proxy that reports faults as `tracing` error events.
    pub fn with_tracing(inner: D) -> Self {
        Self::new(inner, Arc::new(TracingReporter))
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn state(&self) -> DestinationState {
        DestinationState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Identity from the first successful `name_by_unique_options` call.
    pub fn identity(&self) -> Option<&str> {
        self.identity.get().map(String::as_str)
    }

    pub async fn open(&self) -> bool {
        match self.isolate_async(Operation::Open, || self.inner.open()).await {
            Some(true) => {
                self.set_state(DestinationState::Open);
                true
            }
            Some(false) => {
                self.set_state(DestinationState::Closed);
                false
            }
            None => false,
        }
    }

    pub async fn close(&self) {
        if self
            .isolate_async(Operation::Close, || self.inner.close())
            .await
            .is_some()
        {
            self.set_state(DestinationState::Closed);
        }
    }

    /// `true` only while the proxy is open and the implementation agrees.
    pub fn is_opened(&self) -> bool {
        if self.state() == DestinationState::Failed {
            return false;
        }
        match self.isolate(Operation::IsOpened, || self.inner.is_opened()) {
            Some(opened) => opened && self.state() == DestinationState::Open,
            None => false,
        }
    }

    pub fn name_by_unique_options(&self) -> Option<String> {
        let name = self.isolate(Operation::NameByUniqueOptions, || {
            self.inner.name_by_unique_options()
        })?;
        // the name is a function of configuration, so the first one stays valid
        let _ = self.identity.set(name.clone());
        Some(name)
    }

    pub async fn on_queue_empty(&self) {
        self.isolate_async(Operation::OnQueueEmpty, || self.inner.on_queue_empty())
            .await;
    }

    pub async fn flush(&self) -> InsertResult {
        self.isolate_async(Operation::Flush, || self.inner.flush())
            .await
            .unwrap_or(InsertResult::Error)
    }

    fn set_state(&self, state: DestinationState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn isolate<T>(&self, operation: Operation, call: impl FnOnce() -> Result<T, BoxError>) -> Option<T> {
        let fault = match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => Fault::Error(e.to_string()),
            Err(payload) => Fault::from_panic(payload),
        };
        self.fail(operation, fault);
        None
    }

    async fn isolate_async<'a, T>(
        &'a self,
        operation: Operation,
        call: impl FnOnce() -> BoxFuture<'a, Result<T, BoxError>>,
    ) -> Option<T> {
        let fault = match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(value)) => return Some(value),
                Ok(Err(e)) => Fault::Error(e.to_string()),
                Err(payload) => Fault::from_panic(payload),
            },
            Err(payload) => Fault::from_panic(payload),
        };
        self.fail(operation, fault);
        None
    }

    fn fail(&self, operation: Operation, fault: Fault) {
        self.set_state(DestinationState::Failed);

        let report = FaultReport {
            timestamp: Utc::now(),
            destination: self.identity.get().cloned(),
            operation,
            fault,
        };
        let reporter = &self.reporter;
        if panic::catch_unwind(AssertUnwindSafe(|| reporter.report(&report))).is_err() {
            tracing::error!(
                destination = report.destination.as_deref().unwrap_or("<unknown>"),
                operation = %report.operation,
                fault = %report.fault,
                "fault reporter panicked while reporting destination fault"
            );
        }
    }
}

impl<D: RecordDestination> DestinationProxy<D> {
    pub async fn send(&self, record: &LogRecord) -> InsertResult {
        self.isolate_async(Operation::Send, || self.inner.send(record))
            .await
            .unwrap_or(InsertResult::Error)
    }
}

impl<D> fmt::Debug for DestinationProxy<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationProxy")
            .field("identity", &self.identity.get())
            .field("state", &DestinationState::from_u8(self.state.load(Ordering::Acquire)))
            .finish()
    }
}
