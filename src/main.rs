//! mlops-pipeline entry point

use clap::Parser;
use mlops_pipeline::cli::{run, Cli};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mlops_pipeline=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // No subcommand trains with the default paths
    run(cli.command.unwrap_or_default())
}
