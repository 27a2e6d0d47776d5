//! Run orchestration.
//!
//! Drives one extract-load run end to end: discover the catalog, build the
//! sink, load the last checkpoint, then pull the connector's read stream,
//! routing records and persisting state as it goes. All buffered records
//! are flushed before any state payload is persisted, so a resumed run
//! never skips records covered by its checkpoint.

use std::time::Instant;

use airlift_sink::{SinkContext, SinkRegistry};
use airlift_types::protocol::{LogLevel, ProtocolMessage};
use anyhow::anyhow;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::adapter::ConnectorAdapter;
use crate::checkpoint::CheckpointManager;
use crate::errors::PipelineError;
use crate::router::StreamRouter;

/// Lifecycle of one run, for log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Discovering,
    Resuming,
    Extracting,
    Flushing,
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Records buffered per stream before a batch write.
    pub max_buffer_size: usize,
    /// Streams to sync; `None` selects the whole catalog.
    pub selected_streams: Option<Vec<String>>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_buffer_size: 1000,
            selected_streams: None,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub records_read: u64,
    pub records_written: u64,
    pub states_persisted: u64,
    pub streams: Vec<String>,
    pub duration_secs: f64,
}

/// Runs one pipeline to completion. The sink is constructed from the
/// registry after discovery, once the stream set is known.
pub fn run_pipeline(
    adapter: &mut ConnectorAdapter,
    sinks: &SinkRegistry,
    selector: &str,
    destination_config: &Value,
    options: &RunOptions,
) -> Result<RunOutcome, PipelineError> {
    let result = drive(adapter, sinks, selector, destination_config, options);
    match &result {
        Ok(outcome) => info!(
            records = outcome.records_written,
            states = outcome.states_persisted,
            duration_secs = format!("{:.2}", outcome.duration_secs),
            "run complete"
        ),
        Err(err) => {
            error!(error = %err, "run failed");
            for line in err.diagnostics() {
                error!("connector diagnostic: {line}");
            }
        }
    }
    result
}

fn drive(
    adapter: &mut ConnectorAdapter,
    sinks: &SinkRegistry,
    selector: &str,
    destination_config: &Value,
    options: &RunOptions,
) -> Result<RunOutcome, PipelineError> {
    let started = Instant::now();
    adapter.enable_redaction();

    debug!(state = ?RunState::Discovering, connector = %adapter.connector_name(), "discovering catalog");
    let catalog = adapter.discover()?;
    if let Some(selected) = &options.selected_streams {
        for name in selected {
            if !catalog.stream_names().contains(name) {
                return Err(PipelineError::Infrastructure(anyhow!(
                    "selected stream `{name}` is not in the connector catalog"
                )));
            }
        }
    }
    let configured = catalog.configure(options.selected_streams.as_deref());
    let streams = configured.stream_names();
    if streams.is_empty() {
        return Err(PipelineError::Infrastructure(anyhow!(
            "connector catalog has no streams to sync"
        )));
    }
    info!(streams = streams.len(), "catalog configured");

    let context = SinkContext {
        stream_names: &streams,
        destination_config,
    };
    let mut sink = sinks.create(selector, &context)?;

    debug!(state = ?RunState::Resuming, "loading last checkpoint");
    let mut checkpoints = CheckpointManager::new();
    let last_state = checkpoints.last_checkpoint(sink.as_mut())?;

    debug!(state = ?RunState::Extracting, "starting read");
    let mut router = StreamRouter::new(&configured, options.max_buffer_size);
    let mut records_read: u64 = 0;
    let messages = adapter.read(&configured, last_state.as_ref())?;

    for message in messages {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                // The tail since the last checkpoint cannot be trusted;
                // the resumed run will re-extract it.
                router.discard_all();
                return Err(err);
            }
        };
        match message {
            ProtocolMessage::Record(record) => {
                records_read += 1;
                router.route(record, sink.as_mut(), &checkpoints.stamps())?;
            }
            ProtocolMessage::State(state) => {
                router.flush_all(sink.as_mut(), &checkpoints.stamps())?;
                checkpoints.record(sink.as_mut(), &state.data)?;
            }
            ProtocolMessage::Log(log) => {
                forward_log(log.level, &log.message);
                sink.write_log(log.level, &log.message, &checkpoints.stamps())?;
            }
            other => {
                router.discard_all();
                return Err(PipelineError::ProtocolViolation(format!(
                    "{} message is not valid during read",
                    other.message_type()
                )));
            }
        }
    }

    debug!(state = ?RunState::Flushing, pending = router.pending(), "end of stream");
    router.flush_all(sink.as_mut(), &checkpoints.stamps())?;

    Ok(RunOutcome {
        records_read,
        records_written: router.records_flushed(),
        states_persisted: checkpoints.states_persisted(),
        streams,
        duration_secs: started.elapsed().as_secs_f64(),
    })
}

fn forward_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Fatal | LogLevel::Error => error!(source = "connector", "{message}"),
        LogLevel::Warn => warn!(source = "connector", "{message}"),
        LogLevel::Info => info!(source = "connector", "{message}"),
        LogLevel::Debug | LogLevel::Trace => debug!(source = "connector", "{message}"),
    }
}
