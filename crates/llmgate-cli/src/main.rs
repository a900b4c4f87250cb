//! llmgate binary: parse arguments, set up logging, dispatch.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use llmgate_cli::{Cli, Commands, handlers};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter())),
        )
        .init();

    match cli.command {
        Commands::Serve(args) => handlers::serve::execute(args).await,
    }
}
