//! Sink trait definition.

use airlift_types::protocol::LogLevel;
use serde_json::Value;

use crate::error;

/// Run bookkeeping timestamps attached to every sink write.
///
/// A slice is the span of records between two consecutive checkpoints;
/// `slice_started_at` advances each time a state payload is persisted.
/// Both are ISO-8601 UTC strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStamps {
    pub job_started_at: String,
    pub slice_started_at: String,
}

/// Destination contract for routed records, checkpoints, and logs.
///
/// Writes are synchronous and never retried by the engine: a failure is
/// fatal for the run and resumability comes from the persisted state.
pub trait Sink: Send {
    /// Append one batch of records for a stream.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`](crate::SinkError) on write failure; the engine
    /// treats this as fatal.
    fn write_records(
        &mut self,
        stream: &str,
        rows: &[Value],
        stamps: &WriteStamps,
    ) -> error::Result<()>;

    /// Durably persist a state payload.
    ///
    /// The engine guarantees all buffers covering this state have been
    /// flushed before this is called.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`](crate::SinkError) on write failure.
    fn write_state(&mut self, state: &Value, stamps: &WriteStamps) -> error::Result<()>;

    /// Record a connector log line.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`](crate::SinkError) on write failure.
    fn write_log(
        &mut self,
        level: LogLevel,
        message: &str,
        stamps: &WriteStamps,
    ) -> error::Result<()>;

    /// Most recently persisted state payload, or `None` when this sink has
    /// no history (which signals a full sync from scratch).
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`](crate::SinkError) on read failure.
    fn read_last_state(&mut self) -> error::Result<Option<Value>>;
}

/// Current UTC time as an ISO-8601 string, microsecond precision.
pub(crate) fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verify the trait is object-safe (used as `Box<dyn Sink>`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn Sink) {}
    }

    #[test]
    fn now_iso8601_is_utc() {
        assert!(now_iso8601().ends_with('Z'));
    }
}
