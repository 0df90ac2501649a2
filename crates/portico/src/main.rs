//! Portico - Entry Point

use clap::Parser;
use portico::Cli;

/// Parse arguments, run the backend and exit with its exit code
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let exit_code = portico::run(cli).await?;
    std::process::exit(exit_code);
}
