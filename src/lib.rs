//! Contract for pluggable log destinations and the machinery that lets a
//! host pipeline drive them without ever being taken down by one.
//!
//! - [`destination::LogDestination`] is what a sink implements.
//! - [`proxy::DestinationProxy`] isolates every call: errors and panics
//!   become a [`report::FaultReport`] plus a fixed fallback value.
//! - [`worker::DestinationWorker`] is a host-side driver that opens,
//!   delivers, batches, flushes and closes a destination through its proxy.

pub mod config;
pub mod destination;
pub mod env;
pub mod host;
pub mod init;
pub mod noop;
pub mod proxy;
pub mod record;
pub mod report;
pub mod result;
pub mod worker;

#[cfg(feature = "clickhouse")]
pub mod clickhouse;

pub use destination::{BoxError, LogDestination, RecordDestination};
pub use host::{DestinationHost, PipeHost, TemplateSettings};
pub use proxy::{DestinationProxy, DestinationState};
pub use record::LogRecord;
pub use report::{FaultReport, FaultReporter};
pub use result::InsertResult;
pub use worker::{DestinationWorker, WorkerConfig, WorkerHandle};
