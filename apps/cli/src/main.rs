//! LeadSync CLI: CRM lead synchronization service.
//!
//! Mirrors Zoho CRM leads into a local database and sends new-lead alerts,
//! cold outreach and a daily summary by email.

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
