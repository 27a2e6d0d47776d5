//! Stream catalog types.
//!
//! A [`Catalog`] is the set of [`Stream`]s a source connector exposes, as
//! returned by its `discover` operation. A [`ConfiguredCatalog`] narrows it
//! to the streams selected for a run, each tagged with the sync mode chosen
//! for that run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How data is read from a source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// One-time full read of all records.
    FullRefresh,
    /// Cursor-based incremental reads since the last checkpoint.
    Incremental,
}

/// How routed records are written to the destination.
///
/// Only append is supported: every run adds rows, deduplication is left to
/// downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSyncMode {
    Append,
}

/// A discoverable stream exposed by a source connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    /// Stream name (e.g. `"surveys"`).
    pub name: String,
    /// Opaque JSON schema of the stream's records.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub json_schema: Value,
    /// Sync modes this stream supports.
    #[serde(default)]
    pub supported_sync_modes: Vec<SyncMode>,
    /// Source-defined default cursor path for incremental sync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cursor_field: Option<Vec<String>>,
}

impl Stream {
    pub fn supports_incremental(&self) -> bool {
        self.supported_sync_modes.contains(&SyncMode::Incremental)
    }
}

/// Collection of streams discovered from a source connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub streams: Vec<Stream>,
}

impl Catalog {
    /// Build the [`ConfiguredCatalog`] for a run.
    ///
    /// Streams not named in `selection` (when given) are left out. Each kept
    /// stream is tagged `incremental` whenever it declares support for it,
    /// else `full_refresh`; this choice is fixed here and never mutated
    /// mid-run. The destination mode is always append.
    pub fn configure(&self, selection: Option<&[String]>) -> ConfiguredCatalog {
        let streams = self
            .streams
            .iter()
            .filter(|stream| match selection {
                Some(names) => names.iter().any(|n| n == &stream.name),
                None => true,
            })
            .map(|stream| ConfiguredStream {
                sync_mode: if stream.supports_incremental() {
                    SyncMode::Incremental
                } else {
                    SyncMode::FullRefresh
                },
                destination_sync_mode: DestinationSyncMode::Append,
                cursor_field: stream.default_cursor_field.clone().unwrap_or_default(),
                stream: stream.clone(),
            })
            .collect();
        ConfiguredCatalog { streams }
    }

    pub fn stream_names(&self) -> Vec<String> {
        self.streams.iter().map(|s| s.name.clone()).collect()
    }
}

/// A stream selected for a run, tagged with its chosen sync modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    pub stream: Stream,
    pub sync_mode: SyncMode,
    pub destination_sync_mode: DestinationSyncMode,
    /// Cursor path used for incremental sync; empty for full refresh.
    #[serde(default)]
    pub cursor_field: Vec<String>,
}

/// The subset and sync-mode-tagged form of the catalog used for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    pub streams: Vec<ConfiguredStream>,
}

impl ConfiguredCatalog {
    pub fn stream_names(&self) -> Vec<String> {
        self.streams.iter().map(|c| c.stream.name.clone()).collect()
    }

    pub fn contains(&self, stream_name: &str) -> bool {
        self.streams.iter().any(|c| c.stream.name == stream_name)
    }
}
