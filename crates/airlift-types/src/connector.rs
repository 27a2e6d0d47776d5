//! Connector identity.

use serde::{Deserialize, Serialize};

/// Identifies a resolved connector: a display name plus the command
/// template used to launch it.
///
/// The descriptor is built by the caller (from the run configuration or an
/// external registry) and is immutable once a run starts. The engine never
/// downloads or installs connector code itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorDescriptor {
    /// Connector name (e.g. `"source-surveymonkey"`).
    pub name: String,
    /// Program and leading arguments, e.g.
    /// `[".venv/source-faker/bin/python", "connectors/source-faker/main.py"]`.
    /// The operation and `--config`/`--catalog`/`--state` flags are appended
    /// by the process adapter.
    pub entrypoint: Vec<String>,
}

impl ConnectorDescriptor {
    pub fn new(name: impl Into<String>, entrypoint: Vec<String>) -> Self {
        Self {
            name: name.into(),
            entrypoint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrip() {
        let desc = ConnectorDescriptor::new(
            "source-faker",
            vec!["python".into(), "main.py".into()],
        );
        let json = serde_json::to_string(&desc).unwrap();
        let back: ConnectorDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(desc, back);
    }
}
