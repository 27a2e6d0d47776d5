use std::path::Path;

use anyhow::{Context, Result};

/// Execute the `spec` command: print the connector's configuration spec.
pub fn execute(config_path: &Path) -> Result<()> {
    let (_, adapter) = super::load(config_path)?;
    let spec = adapter.spec()?;
    let pretty = serde_json::to_string_pretty(&spec).context("rendering spec")?;
    println!("{pretty}");
    Ok(())
}
