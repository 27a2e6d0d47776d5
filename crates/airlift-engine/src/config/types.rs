//! Run configuration schema.

use airlift_types::connector::ConnectorDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One pipeline run, parsed from a YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Human-readable pipeline name, used in logs.
    pub pipeline: String,

    pub connector: ConnectorConfig,

    /// Destination selector, `name` or `name(arg, ...)`.
    #[serde(default = "default_destination")]
    pub destination: String,

    /// Configuration handed to the connector verbatim.
    #[serde(default = "empty_object")]
    pub source_configuration: Value,

    /// Configuration for the destination sink.
    #[serde(default = "empty_object")]
    pub destination_configuration: Value,

    /// Streams to sync; omitted means the whole catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streams: Option<Vec<String>>,

    /// Records buffered per stream before a batch write.
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
}

/// How to launch the source connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub name: String,
    /// Program and leading arguments; the operation is appended.
    pub command: Vec<String>,
}

impl RunConfig {
    pub fn descriptor(&self) -> ConnectorDescriptor {
        ConnectorDescriptor::new(&self.connector.name, self.connector.command.clone())
    }
}

fn default_destination() -> String {
    "console".to_string()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn default_max_buffer_size() -> usize {
    1000
}
