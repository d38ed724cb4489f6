//! Binary crate for the `solcast` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - Wiring the data layer together (composition root)
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod context;
mod render;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    solcast_core::init()?;
    let cmd = cli::Cli::parse();
    cmd.run().await
}
