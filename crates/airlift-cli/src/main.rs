mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "airlift",
    version,
    about = "Run line-protocol source connectors and load their records into a destination"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an extract-load pipeline
    Run {
        /// Path to run config YAML file
        config: PathBuf,
        /// Override the config's destination selector, e.g. "file(./out)"
        #[arg(long)]
        destination: Option<String>,
    },
    /// Validate config and source connectivity
    Check {
        /// Path to run config YAML file
        config: PathBuf,
    },
    /// List the streams the source connector offers
    Discover {
        /// Path to run config YAML file
        config: PathBuf,
    },
    /// Print the source connector's configuration spec
    Spec {
        /// Path to run config YAML file
        config: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Run {
            config,
            destination,
        } => commands::run::execute(&config, destination.as_deref()),
        Commands::Check { config } => commands::check::execute(&config),
        Commands::Discover { config } => commands::discover::execute(&config),
        Commands::Spec { config } => commands::spec::execute(&config),
    }
}
