use serde::Serialize;
use std::fmt;

/// Outcome of a single delivery attempt (or of a flush).
///
/// The set is closed: a destination reports exactly one of these values per
/// attempt and the host matches on them exhaustively. The numeric codes are
/// the ones hosts exchange on the wire and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertResult {
    /// Message intentionally discarded.
    Drop,
    /// Delivery failed.
    Error,
    /// The destination takes over acknowledgement of this message.
    ExplicitAckMgmt,
    /// Message delivered.
    Success,
    /// Message buffered, not yet confirmed.
    Queued,
    /// The destination has no live connection.
    NotConnected,
}

/// What the host does with a message after seeing an [`InsertResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    /// Move past the message without acknowledging delivery.
    Advance,
    /// Keep the message and try again after backoff.
    Retry,
    /// Leave acknowledgement to the destination.
    DeferAck,
    /// Acknowledge and move on.
    Ack,
    /// Keep the ack pending until a later flush confirms it.
    HoldAck,
    /// Reconnect, then try again.
    RetryAfterReconnect,
}

/// Returned when a numeric result code is outside the known range.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("unknown insert result code {0}")]
pub struct UnknownInsertResult(pub i32);

impl InsertResult {
    pub const ALL: [InsertResult; 6] = [
        InsertResult::Drop,
        InsertResult::Error,
        InsertResult::ExplicitAckMgmt,
        InsertResult::Success,
        InsertResult::Queued,
        InsertResult::NotConnected,
    ];

    pub fn code(self) -> i32 {
        match self {
            InsertResult::Drop => 0,
            InsertResult::Error => 1,
            InsertResult::ExplicitAckMgmt => 2,
            InsertResult::Success => 3,
            InsertResult::Queued => 4,
            InsertResult::NotConnected => 5,
        }
    }

    pub fn host_action(self) -> HostAction {
        match self {
            InsertResult::Drop => HostAction::Advance,
            InsertResult::Error => HostAction::Retry,
            InsertResult::ExplicitAckMgmt => HostAction::DeferAck,
            InsertResult::Success => HostAction::Ack,
            InsertResult::Queued => HostAction::HoldAck,
            InsertResult::NotConnected => HostAction::RetryAfterReconnect,
        }
    }

    /// `Error` and `NotConnected`: recoverable by retrying later.
    pub fn is_transient_failure(self) -> bool {
        matches!(self, InsertResult::Error | InsertResult::NotConnected)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InsertResult::Drop => "drop",
            InsertResult::Error => "error",
            InsertResult::ExplicitAckMgmt => "explicit_ack_mgmt",
            InsertResult::Success => "success",
            InsertResult::Queued => "queued",
            InsertResult::NotConnected => "not_connected",
        }
    }
}

impl TryFrom<i32> for InsertResult {
    type Error = UnknownInsertResult;

    fn try_from(code: i32) -> Result<Self, UnknownInsertResult> {
        InsertResult::ALL
            .into_iter()
            .find(|r| r.code() == code)
            .ok_or(UnknownInsertResult(code))
    }
}

impl fmt::Display for InsertResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
