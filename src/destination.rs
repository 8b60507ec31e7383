use crate::record::LogRecord;
use crate::result::InsertResult;
use async_trait::async_trait;
use std::error::Error;

/// Error type returned by destination implementations.
///
/// Returning `Err` from any contract method is how an implementation raises a
/// fault; the [`DestinationProxy`](crate::proxy::DestinationProxy) isolates it
/// from the host.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Contract every pluggable log destination implements.
///
/// The host never calls these methods directly; it goes through a
/// [`DestinationProxy`](crate::proxy::DestinationProxy), which turns every
/// `Err` and every panic into a reported fault plus a safe fallback value.
///
/// All methods take `&self`: the host polls [`is_opened`](Self::is_opened)
/// from a supervisory path while a delivery may be in flight, so
/// implementations keep mutable state behind atomics or locks.
#[async_trait]
pub trait LogDestination: Send + Sync {
    /// Establish any external connection or resource.
    ///
    /// **Returns**
    /// - `Ok(true)` if the destination is now usable.
    /// - `Ok(false)` if it is not; the host will try again later, so this
    ///   must be safe to call after a previous failure.
    async fn open(&self) -> Result<bool, BoxError>;

    /// Release resources. Must be safe to call even if `open` never
    /// succeeded.
    async fn close(&self) -> Result<(), BoxError>;

    /// Cheap, side-effect-free health check.
    fn is_opened(&self) -> Result<bool, BoxError>;

    /// Stable identity derived only from this destination's configuration.
    ///
    /// The host uses it for deduplication and in diagnostics, so it must not
    /// depend on mutable runtime state.
    fn name_by_unique_options(&self) -> Result<String, BoxError>;

    /// Called when the host's outbound queue for this destination drains.
    ///
    /// Default implementation is a no-op.
    async fn on_queue_empty(&self) -> Result<(), BoxError> {
        Ok(())
    }

    /// Force delivery of anything buffered.
    ///
    /// The result follows the same semantics as a delivery attempt. Default
    /// implementation reports [`InsertResult::Success`], which is right for
    /// destinations that never buffer.
    async fn flush(&self) -> Result<InsertResult, BoxError> {
        Ok(InsertResult::Success)
    }
}

/// A destination that accepts individual [`LogRecord`]s.
#[async_trait]
pub trait RecordDestination: LogDestination {
    /// Attempt to deliver one record.
    ///
    /// Return [`InsertResult::Queued`] when the record was only buffered and
    /// will be confirmed by a later [`flush`](LogDestination::flush), and
    /// [`InsertResult::NotConnected`] when there is no live connection; do
    /// not close the destination yourself in that case, the host reconnects.
    async fn send(&self, record: &LogRecord) -> Result<InsertResult, BoxError>;
}

/// Convenience errors for destination implementations.
#[derive(thiserror::Error, Debug)]
pub enum DestinationError {
    #[error("invalid value {value:?} for option `{key}`")]
    InvalidOption { key: String, value: String },
}
