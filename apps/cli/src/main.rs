//! Intake CLI: contact intake and document processing.
//!
//! Records contact-form submissions, stores uploaded documents, and turns
//! them into a searchable index with per-contact insights.

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
