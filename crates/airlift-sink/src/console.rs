//! Console sink: prints everything, remembers nothing.

use airlift_types::protocol::LogLevel;
use serde_json::Value;

use crate::error;
use crate::sink::{Sink, WriteStamps};

/// Stateless sink printing messages to stdout.
///
/// `read_last_state` always reports no history, so every run against the
/// console is a full sync.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn write_records(
        &mut self,
        stream: &str,
        rows: &[Value],
        _stamps: &WriteStamps,
    ) -> error::Result<()> {
        for row in rows {
            println!("[{stream}] {row}");
        }
        Ok(())
    }

    fn write_state(&mut self, state: &Value, _stamps: &WriteStamps) -> error::Result<()> {
        println!("[state] {state}");
        Ok(())
    }

    fn write_log(
        &mut self,
        level: LogLevel,
        message: &str,
        _stamps: &WriteStamps,
    ) -> error::Result<()> {
        println!("[{level}] {message}");
        Ok(())
    }

    fn read_last_state(&mut self) -> error::Result<Option<Value>> {
        Ok(None)
    }
}
