//! EDR Accident Pipeline - Main Entry Point

use clap::Parser;
use cli::{run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run(Cli::parse()).await
}
