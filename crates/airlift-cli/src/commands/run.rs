use std::path::Path;

use airlift_engine::{run_pipeline, RunOptions};
use airlift_sink::SinkRegistry;
use anyhow::Result;

/// Execute the `run` command: parse the config and drive one full run.
pub fn execute(config_path: &Path, destination_override: Option<&str>) -> Result<()> {
    let (config, mut adapter) = super::load(config_path)?;
    let destination = destination_override.unwrap_or(&config.destination);

    tracing::info!(
        pipeline = config.pipeline,
        connector = config.connector.name,
        destination = destination,
        "run config loaded"
    );

    let options = RunOptions {
        max_buffer_size: config.max_buffer_size,
        selected_streams: config.streams.clone(),
    };
    let registry = SinkRegistry::builtin();
    let outcome = run_pipeline(
        &mut adapter,
        &registry,
        destination,
        &config.destination_configuration,
        &options,
    )?;

    println!("Pipeline '{}' completed successfully.", config.pipeline);
    println!("  Streams:         {}", outcome.streams.join(", "));
    println!("  Records read:    {}", outcome.records_read);
    println!("  Records written: {}", outcome.records_written);
    println!("  Checkpoints:     {}", outcome.states_persisted);
    println!("  Duration:        {:.2}s", outcome.duration_secs);
    if outcome.duration_secs > 0.0 {
        println!(
            "  Throughput:      {:.0} rows/sec",
            outcome.records_read as f64 / outcome.duration_secs
        );
    }
    Ok(())
}
