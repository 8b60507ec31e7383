//! Environment variable names used by this crate to override destination
//! and worker settings from the deployment environment.
//!
//! These are purely helpers; destinations themselves only ever see the
//! options their host hands them.

/// Host batch size, in messages.
pub const LOG_DEST_BATCH_SIZE_ENV: &str = "LOG_DEST_BATCH_SIZE";

/// Capacity of the worker's inbound channel.
pub const LOG_DEST_CHANNEL_BUFFER_ENV: &str = "LOG_DEST_CHANNEL_BUFFER";

/// Maximum time between flushes of a partial batch, in milliseconds.
pub const LOG_DEST_FLUSH_INTERVAL_MS_ENV: &str = "LOG_DEST_FLUSH_INTERVAL_MS";

/// Delivery attempts per message before it is dropped.
pub const LOG_DEST_RETRIES_ENV: &str = "LOG_DEST_RETRIES";

/// Initial delay before reopening a destination, in milliseconds.
pub const LOG_DEST_REOPEN_BACKOFF_MS_ENV: &str = "LOG_DEST_REOPEN_BACKOFF_MS";

/// Upper bound for the reopen/retry backoff, in milliseconds.
pub const LOG_DEST_MAX_BACKOFF_MS_ENV: &str = "LOG_DEST_MAX_BACKOFF_MS";
