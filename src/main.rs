use anyhow::Result;
use atlana::{cli, logging};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let _guard = logging::init(&args.command)?;
    cli::commands::execute(args).await
}
