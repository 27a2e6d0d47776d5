use std::path::Path;

use anyhow::Result;

/// Execute the `discover` command: print the connector's stream catalog.
pub fn execute(config_path: &Path) -> Result<()> {
    let (config, adapter) = super::load_redacted(config_path)?;
    let catalog = adapter.discover()?;

    println!("Streams offered by '{}':", config.connector.name);
    for stream in &catalog.streams {
        let mode = if stream.supports_incremental() {
            "incremental"
        } else {
            "full_refresh"
        };
        let cursor = stream
            .default_cursor_field
            .as_ref()
            .filter(|fields| !fields.is_empty())
            .map(|fields| format!(" (cursor: {})", fields.join(".")))
            .unwrap_or_default();
        println!("  {} [{mode}]{cursor}", stream.name);
    }
    Ok(())
}
