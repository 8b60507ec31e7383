use crate::destination::{BoxError, LogDestination, RecordDestination};
use crate::record::LogRecord;
use crate::result::InsertResult;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// A destination that simply drops all records.
///
/// Useful for measuring the overhead of the worker and proxy without any
/// external I/O, and for tests that don't care about persistence.
#[derive(Debug, Default)]
pub struct NoopDestination {
    opened: AtomicBool,
}

#[async_trait]
impl LogDestination for NoopDestination {
    async fn open(&self) -> Result<bool, BoxError> {
        self.opened.store(true, Ordering::Relaxed);
        Ok(true)
    }

    async fn close(&self) -> Result<(), BoxError> {
        self.opened.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn is_opened(&self) -> Result<bool, BoxError> {
        Ok(self.opened.load(Ordering::Relaxed))
    }

    fn name_by_unique_options(&self) -> Result<String, BoxError> {
        Ok("noop".to_string())
    }
}

#[async_trait]
impl RecordDestination for NoopDestination {
    async fn send(&self, _record: &LogRecord) -> Result<InsertResult, BoxError> {
        Ok(InsertResult::Drop)
    }
}
