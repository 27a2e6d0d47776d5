//! Per-stream record buffering.
//!
//! Records are grouped by stream in first-seen order and flushed to the
//! sink in batches, either when a buffer fills or when a checkpoint forces
//! everything out. Within a stream, sink write order always matches
//! arrival order.

use std::collections::{HashMap, HashSet};

use airlift_sink::{Sink, WriteStamps};
use airlift_types::catalog::ConfiguredCatalog;
use airlift_types::protocol::RecordMessage;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::PipelineError;

/// Buffers records per stream and batches sink writes.
pub struct StreamRouter {
    /// Buffers in first-seen order; batch flushes walk this order.
    buffers: Vec<StreamBuffer>,
    /// Stream name to `buffers` index.
    index: HashMap<String, usize>,
    /// Streams the configured catalog allows.
    known: HashSet<String>,
    max_buffer_size: usize,
    records_flushed: u64,
}

struct StreamBuffer {
    stream: String,
    rows: Vec<Value>,
}

impl StreamRouter {
    pub fn new(catalog: &ConfiguredCatalog, max_buffer_size: usize) -> Self {
        Self {
            buffers: Vec::new(),
            index: HashMap::new(),
            known: catalog.stream_names().into_iter().collect(),
            max_buffer_size,
            records_flushed: 0,
        }
    }

    /// Buffers one record, flushing its stream's batch if it is now full.
    /// A record for a stream outside the configured catalog is a protocol
    /// violation.
    pub fn route(
        &mut self,
        record: RecordMessage,
        sink: &mut dyn Sink,
        stamps: &WriteStamps,
    ) -> Result<(), PipelineError> {
        if !self.known.contains(&record.stream) {
            return Err(PipelineError::ProtocolViolation(format!(
                "record for unknown stream `{}`",
                record.stream
            )));
        }
        let slot = match self.index.get(&record.stream) {
            Some(&slot) => slot,
            None => {
                let slot = self.buffers.len();
                self.index.insert(record.stream.clone(), slot);
                self.buffers.push(StreamBuffer {
                    stream: record.stream.clone(),
                    rows: Vec::with_capacity(self.max_buffer_size),
                });
                slot
            }
        };
        let buffer = &mut self.buffers[slot];
        buffer.rows.push(record.data);
        if buffer.rows.len() >= self.max_buffer_size {
            let written = flush_buffer(buffer, sink, stamps)?;
            self.records_flushed += written;
        }
        Ok(())
    }

    /// Flushes every non-empty buffer, in first-seen stream order. Called
    /// before a checkpoint is persisted and at end of stream.
    pub fn flush_all(
        &mut self,
        sink: &mut dyn Sink,
        stamps: &WriteStamps,
    ) -> Result<(), PipelineError> {
        for buffer in &mut self.buffers {
            let written = flush_buffer(buffer, sink, stamps)?;
            self.records_flushed += written;
        }
        Ok(())
    }

    /// Drops all buffered records without writing them. Used when the
    /// connector dies mid-run and the tail since the last checkpoint
    /// cannot be trusted.
    pub fn discard_all(&mut self) {
        let pending = self.pending();
        if pending > 0 {
            warn!(records = pending, "discarding unflushed records");
        }
        for buffer in &mut self.buffers {
            buffer.rows.clear();
        }
    }

    /// Records currently buffered across all streams.
    pub fn pending(&self) -> usize {
        self.buffers.iter().map(|b| b.rows.len()).sum()
    }

    /// Records written to the sink so far.
    pub fn records_flushed(&self) -> u64 {
        self.records_flushed
    }
}

fn flush_buffer(
    buffer: &mut StreamBuffer,
    sink: &mut dyn Sink,
    stamps: &WriteStamps,
) -> Result<u64, PipelineError> {
    if buffer.rows.is_empty() {
        return Ok(0);
    }
    let count = buffer.rows.len() as u64;
    sink.write_records(&buffer.stream, &buffer.rows, stamps)?;
    debug!(stream = %buffer.stream, records = count, "flushed batch");
    buffer.rows.clear();
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlift_types::catalog::Catalog;
    use serde_json::json;

    /// Sink that records every call for assertion.
    #[derive(Default)]
    struct RecordingSink {
        batches: Vec<(String, Vec<Value>)>,
    }

    impl Sink for RecordingSink {
        fn write_records(
            &mut self,
            stream: &str,
            rows: &[Value],
            _stamps: &WriteStamps,
        ) -> airlift_sink::Result<()> {
            self.batches.push((stream.to_string(), rows.to_vec()));
            Ok(())
        }

        fn write_state(&mut self, _state: &Value, _stamps: &WriteStamps) -> airlift_sink::Result<()> {
            Ok(())
        }

        fn write_log(
            &mut self,
            _level: airlift_types::protocol::LogLevel,
            _message: &str,
            _stamps: &WriteStamps,
        ) -> airlift_sink::Result<()> {
            Ok(())
        }

        fn read_last_state(&mut self) -> airlift_sink::Result<Option<Value>> {
            Ok(None)
        }
    }

    fn catalog(streams: &[&str]) -> ConfiguredCatalog {
        let catalog: Catalog = serde_json::from_value(json!({
            "streams": streams
                .iter()
                .map(|name| json!({ "name": name, "json_schema": {} }))
                .collect::<Vec<_>>()
        }))
        .unwrap();
        catalog.configure(None)
    }

    fn record(stream: &str, id: u64) -> RecordMessage {
        RecordMessage {
            stream: stream.to_string(),
            data: json!({ "id": id }),
            emitted_at: None,
        }
    }

    fn stamps() -> WriteStamps {
        WriteStamps {
            job_started_at: "2026-08-30T00:00:00.000000+00:00".into(),
            slice_started_at: "2026-08-30T00:00:00.000000+00:00".into(),
        }
    }

    #[test]
    fn test_flushes_exactly_at_max() {
        let mut router = StreamRouter::new(&catalog(&["users"]), 3);
        let mut sink = RecordingSink::default();
        for id in 0..3 {
            router.route(record("users", id), &mut sink, &stamps()).unwrap();
        }
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(sink.batches[0].1.len(), 3);
        assert_eq!(router.pending(), 0);
        assert_eq!(router.records_flushed(), 3);
    }

    #[test]
    fn test_partial_buffer_waits_for_flush_all() {
        let mut router = StreamRouter::new(&catalog(&["users"]), 10);
        let mut sink = RecordingSink::default();
        router.route(record("users", 1), &mut sink, &stamps()).unwrap();
        router.route(record("users", 2), &mut sink, &stamps()).unwrap();
        assert!(sink.batches.is_empty());
        assert_eq!(router.pending(), 2);

        router.flush_all(&mut sink, &stamps()).unwrap();
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(router.pending(), 0);
    }

    #[test]
    fn test_flush_all_walks_first_seen_order() {
        let mut router = StreamRouter::new(&catalog(&["a", "b", "c"]), 100);
        let mut sink = RecordingSink::default();
        for stream in ["c", "a", "b", "a"] {
            router.route(record(stream, 0), &mut sink, &stamps()).unwrap();
        }
        router.flush_all(&mut sink, &stamps()).unwrap();
        let order: Vec<&str> = sink.batches.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(order, ["c", "a", "b"]);
        assert_eq!(sink.batches[1].1.len(), 2);
    }

    #[test]
    fn test_unknown_stream_is_rejected() {
        let mut router = StreamRouter::new(&catalog(&["users"]), 10);
        let mut sink = RecordingSink::default();
        let err = router
            .route(record("orders", 1), &mut sink, &stamps())
            .unwrap_err();
        assert!(matches!(err, PipelineError::ProtocolViolation(_)));
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn test_discard_drops_pending_without_writes() {
        let mut router = StreamRouter::new(&catalog(&["users"]), 10);
        let mut sink = RecordingSink::default();
        router.route(record("users", 1), &mut sink, &stamps()).unwrap();
        router.discard_all();
        assert_eq!(router.pending(), 0);
        assert!(sink.batches.is_empty());
    }

    #[test]
    fn test_within_stream_order_preserved_across_batches() {
        let mut router = StreamRouter::new(&catalog(&["users"]), 2);
        let mut sink = RecordingSink::default();
        for id in 0..5 {
            router.route(record("users", id), &mut sink, &stamps()).unwrap();
        }
        router.flush_all(&mut sink, &stamps()).unwrap();
        let ids: Vec<u64> = sink
            .batches
            .iter()
            .flat_map(|(_, rows)| rows.iter())
            .map(|row| row["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, (0..5).collect::<Vec<_>>());
    }
}
