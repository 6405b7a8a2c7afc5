//! Menu-driven front end using `dialoguer`, shown when no subcommand is
//! given.

use std::path::PathBuf;

use county_facts_cli_utils::MultiProgress;
use dialoguer::{Confirm, Input, Select};

use crate::resolve::ResolveArgs;
use crate::scrape::{self, ScrapeArgs};

/// Top-level actions available in the interactive menu.
enum Action {
    Scrape,
    Resolve,
}

impl Action {
    const ALL: &[Self] = &[Self::Scrape, Self::Resolve];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Scrape => "Scrape county demographics",
            Self::Resolve => "Resolve county page tokens (dry run)",
        }
    }
}

/// Prompts for an action and its options, then runs it.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected command fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("County Facts");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Scrape => {
            let args = prompt_scrape_args()?;
            let summary = scrape::run(&args, multi).await?;
            println!("{summary}");
        }
        Action::Resolve => {
            let input = prompt_path("Election CSV", None)?;
            crate::resolve::run(&ResolveArgs {
                input,
                region_column: county_facts_place_models::REGION_COLUMN.to_owned(),
                place_column: county_facts_place_models::PLACE_COLUMN.to_owned(),
            })?;
        }
    }

    Ok(())
}

fn prompt_scrape_args() -> Result<ScrapeArgs, Box<dyn std::error::Error>> {
    let mut args = ScrapeArgs::new(prompt_path("Election CSV", None)?);
    args.output = prompt_path("Output CSV", Some(scrape::DEFAULT_OUTPUT))?;

    if args.output.exists() {
        args.resume = Confirm::new()
            .with_prompt("Output exists. Resume from it?")
            .default(true)
            .interact()?;
        if args.resume {
            args.skip_existing = Confirm::new()
                .with_prompt("Skip counties already in the output?")
                .default(true)
                .interact()?;
        }
    }

    args.limit = prompt_optional_usize("County limit (empty for no limit)")?;

    args.no_cache = !Confirm::new()
        .with_prompt("Use the response cache?")
        .default(true)
        .interact()?;

    Ok(args)
}

fn prompt_path(
    prompt: &str,
    default: Option<&str>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut input = Input::<String>::new().with_prompt(prompt);
    if let Some(default) = default {
        input = input.default(default.to_owned());
    }
    Ok(PathBuf::from(input.interact_text()?.trim()))
}

fn prompt_optional_usize(prompt: &str) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    if input.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(input.trim().parse()?))
    }
}
