pub mod check;
pub mod discover;
pub mod run;
pub mod spec;

use std::path::Path;

use airlift_engine::{config, ConnectorAdapter, RunConfig};
use anyhow::{Context, Result};

/// Parse the run config and build the connector adapter from it.
pub(crate) fn load(config_path: &Path) -> Result<(RunConfig, ConnectorAdapter)> {
    let config = config::parse_config(config_path)
        .with_context(|| format!("loading run config {}", config_path.display()))?;
    let adapter = ConnectorAdapter::new(
        config.descriptor(),
        config.source_configuration.clone(),
        config_path.to_path_buf(),
    );
    Ok((config, adapter))
}

/// Like [`load`], but with the secret redactor already built from the
/// connector spec. Commands that surface connector log output must use
/// this so configured secrets never reach the log stream.
pub(crate) fn load_redacted(config_path: &Path) -> Result<(RunConfig, ConnectorAdapter)> {
    let (config, mut adapter) = load(config_path)?;
    adapter.enable_redaction();
    Ok((config, adapter))
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    #[test]
    fn load_redacted_masks_configured_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("connector.sh");
        std::fs::write(
            &script,
            r#"#!/bin/sh
if [ "$1" = spec ]; then
  echo '{"type":"SPEC","spec":{"connectionSpecification":{"properties":{"api_key":{"type":"string","airbyte_secret":true}}}}}'
fi
"#,
        )
        .unwrap();
        let config_path = dir.path().join("run.yaml");
        std::fs::write(
            &config_path,
            format!(
                r#"
pipeline: p
connector:
  name: source-test
  command: ["/bin/sh", "{}"]
source_configuration:
  api_key: sekrit-key
"#,
                script.display()
            ),
        )
        .unwrap();

        let (_, adapter) = super::load_redacted(&config_path).unwrap();
        assert_eq!(
            adapter.redactor().redact("key is sekrit-key"),
            "key is ***"
        );
    }
}
