//! helpsync CLI — one-shot help-center to knowledge-base imports.
//!
//! Lists recently updated help-center articles, stages them as plain-text
//! documents, and uploads them to a knowledge-base project.

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
