#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the county demographics scraper.
//!
//! `county_facts scrape` fetches QuickFacts demographics for every county
//! in an election file and writes them to a CSV table. `county_facts
//! resolve` prints the page token each county resolves to without touching
//! the network. With no subcommand an interactive menu is shown.
//!
//! Uses `indicatif-log-bridge` (via [`county_facts_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

mod interactive;
mod resolve;
mod scrape;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "county_facts", about = "County demographics scraper for QuickFacts")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape demographics for every county in an election CSV
    Scrape(scrape::ScrapeArgs),
    /// Print the QuickFacts page token for every county in an election CSV
    Resolve(resolve::ResolveArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = county_facts_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::Scrape(args) => {
            let summary = scrape::run(&args, &multi).await?;
            println!("{summary}");
        }
        Commands::Resolve(args) => resolve::run(&args)?,
    }

    Ok(())
}
