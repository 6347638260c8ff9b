//! Newsreel CLI — automated news-to-audio pipeline.
//!
//! Discovers news leads, filters duplicates by vector similarity, and turns
//! the survivors into researched, scripted, voiced stories.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
