//! Sink error types.

/// Errors produced by [`Sink`](crate::Sink) operations and sink
/// construction.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The destination selector string could not be parsed.
    #[error("invalid destination selector: {0}")]
    Selector(String),

    /// No sink registered under the selector's name.
    #[error("unknown sink `{0}`")]
    UnknownSink(String),

    /// Constructor arguments did not match the sink's signature.
    #[error("sink `{name}`: {message}")]
    Arguments { name: String, message: String },

    /// A persisted state line/row could not be decoded.
    #[error("malformed persisted state: {0}")]
    CorruptState(#[from] serde_json::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SinkError>;
