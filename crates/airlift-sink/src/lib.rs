//! Destination sinks for the Airlift engine.
//!
//! Provides the [`Sink`] trait plus the three reference implementations
//! (append-file, `SQLite` warehouse tables, console) and the
//! [`SinkRegistry`] that resolves a `name(arg, ...)` destination selector
//! into a constructed sink.

pub mod console;
pub mod error;
pub mod file;
pub mod registry;
pub mod sink;
pub mod warehouse;

pub use console::ConsoleSink;
pub use error::{Result, SinkError};
pub use file::AppendFileSink;
pub use registry::{SinkConstructor, SinkContext, SinkRegistry, SinkSelector};
pub use sink::{Sink, WriteStamps};
pub use warehouse::SqliteWarehouseSink;
