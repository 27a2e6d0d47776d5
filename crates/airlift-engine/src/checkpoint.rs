//! Checkpoint bookkeeping.
//!
//! Tracks the job and slice timestamps stamped onto every sink write and
//! persists state payloads through the sink. A slice is the span between
//! two checkpoints; persisting a state starts a new one.

use airlift_sink::{Sink, WriteStamps};
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::PipelineError;

pub struct CheckpointManager {
    job_started_at: String,
    slice_started_at: String,
    states_persisted: u64,
}

impl CheckpointManager {
    pub fn new() -> Self {
        let now = now_iso8601();
        Self {
            job_started_at: now.clone(),
            slice_started_at: now,
            states_persisted: 0,
        }
    }

    pub fn stamps(&self) -> WriteStamps {
        WriteStamps {
            job_started_at: self.job_started_at.clone(),
            slice_started_at: self.slice_started_at.clone(),
        }
    }

    /// Loads the last persisted checkpoint from the sink. A JSON `null`
    /// payload counts as no checkpoint.
    pub fn last_checkpoint(&self, sink: &mut dyn Sink) -> Result<Option<Value>, PipelineError> {
        let state = sink.read_last_state()?.filter(|v| !v.is_null());
        match &state {
            Some(_) => info!("resuming from persisted state"),
            None => info!("no persisted state, starting from scratch"),
        }
        Ok(state)
    }

    /// Persists one state payload and opens a new slice. The caller must
    /// have flushed all buffered records first.
    pub fn record(&mut self, sink: &mut dyn Sink, state: &Value) -> Result<(), PipelineError> {
        sink.write_state(state, &self.stamps())?;
        self.states_persisted += 1;
        self.slice_started_at = now_iso8601();
        debug!(states = self.states_persisted, "checkpoint persisted");
        Ok(())
    }

    pub fn states_persisted(&self) -> u64 {
        self.states_persisted
    }
}

impl Default for CheckpointManager {
    fn default() -> Self {
        Self::new()
    }
}

fn now_iso8601() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
