use std::path::Path;

use airlift_types::protocol::CheckStatus;
use anyhow::{bail, Result};

/// Execute the `check` command: validate config and source connectivity.
pub fn execute(config_path: &Path) -> Result<()> {
    let (config, adapter) = super::load_redacted(config_path)?;
    let status = adapter.check()?;
    match status.status {
        CheckStatus::Succeeded => {
            println!(
                "Connection check for '{}' succeeded.",
                config.connector.name
            );
            Ok(())
        }
        CheckStatus::Failed => {
            let detail = status.message.unwrap_or_else(|| "no detail given".into());
            bail!(
                "connection check for '{}' failed: {detail}",
                config.connector.name
            );
        }
    }
}
