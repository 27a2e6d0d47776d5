//! Airlift extract-load engine.
//!
//! Launches a source connector subprocess, consumes its line-delimited
//! protocol output, buffers records per stream, and loads them into a
//! destination sink with resumable checkpoints.

pub mod adapter;
pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod redact;
pub mod router;

pub use adapter::{ConnectorAdapter, MessageStream, Operation};
pub use checkpoint::CheckpointManager;
pub use config::{parse_config, RunConfig};
pub use errors::PipelineError;
pub use orchestrator::{run_pipeline, RunOptions, RunOutcome};
pub use redact::SecretRedactor;
pub use router::StreamRouter;
