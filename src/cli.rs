use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "datafetch")]
#[command(about = "Stage the inputs of a fetch request into a job directory", long_about = None)]
pub struct Cli {
    /// JSON fetch request to execute
    #[arg(long)]
    pub request: PathBuf,

    /// Job directory receiving staged files and the manifest
    #[arg(long)]
    pub working_directory: PathBuf,

    /// Configuration file (defaults to $DATAFETCH_CONFIG or config/datafetch.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
