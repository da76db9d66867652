mod cli;

use clap::Parser;
use cli::Cli;
use datafetch::config::Config;
use datafetch::engine::BatchCoordinator;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load_with(cli.config.as_deref())?;
    let coordinator = BatchCoordinator::from_config(config)?;

    coordinator
        .execute(&cli.request, &cli.working_directory)
        .await
        .inspect_err(|err| error!(error = %err, "Fetch request failed"))?;

    Ok(())
}
