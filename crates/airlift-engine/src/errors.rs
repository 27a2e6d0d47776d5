//! Pipeline error taxonomy.
//!
//! Errors are split by who has to act on them: a protocol violation points at
//! the connector author, a config error points at the operator's config file,
//! a sink write failure points at the destination. Everything without a clear
//! owner lands in [`PipelineError::Infrastructure`].

use std::path::PathBuf;

use airlift_sink::SinkError;
use airlift_types::protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The connector emitted output that breaks the line protocol contract,
    /// or a message that is not valid at this point of the run.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The connector reported a failure or exited abnormally. `diagnostics`
    /// carries the most recent log and stderr lines captured before death.
    #[error("connector failed: {message}")]
    ConnectorFailure {
        message: String,
        diagnostics: Vec<String>,
    },

    /// The connector rejected its configuration. Points the operator at the
    /// file that needs fixing.
    #[error("config error in {}: {message}", config_path.display())]
    ConfigError {
        message: String,
        config_path: PathBuf,
    },

    #[error("sink write failed: {0}")]
    SinkWrite(#[from] SinkError),

    #[error(transparent)]
    Infrastructure(#[from] anyhow::Error),
}

impl From<ProtocolError> for PipelineError {
    fn from(err: ProtocolError) -> Self {
        PipelineError::ProtocolViolation(err.to_string())
    }
}

impl PipelineError {
    /// Diagnostic lines attached to the error, if any.
    pub fn diagnostics(&self) -> &[String] {
        match self {
            PipelineError::ConnectorFailure { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}
