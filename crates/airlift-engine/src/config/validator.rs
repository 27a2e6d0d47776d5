//! Run config validation.

use airlift_sink::SinkSelector;
use anyhow::{bail, Result};

use super::types::RunConfig;

pub fn validate(config: &RunConfig) -> Result<()> {
    if config.pipeline.trim().is_empty() {
        bail!("`pipeline` must not be empty");
    }
    if config.connector.name.trim().is_empty() {
        bail!("`connector.name` must not be empty");
    }
    if config.connector.command.is_empty() {
        bail!("`connector.command` must name a program to run");
    }
    if config.max_buffer_size == 0 {
        bail!("`max_buffer_size` must be at least 1");
    }
    if let Err(err) = SinkSelector::parse(&config.destination) {
        bail!("invalid `destination` selector: {err}");
    }
    if !config.source_configuration.is_object() {
        bail!("`source_configuration` must be a mapping");
    }
    if !config.destination_configuration.is_object() {
        bail!("`destination_configuration` must be a mapping");
    }
    if let Some(streams) = &config.streams {
        if streams.is_empty() {
            bail!("`streams` must name at least one stream when present");
        }
    }
    Ok(())
}
