//! The `resolve` command: a dry run that maps counties to page tokens.

use std::io::Write;
use std::path::PathBuf;

use county_facts_place_models::{PLACE_COLUMN, Place, REGION_COLUMN};
use county_facts_store::input::{InputColumns, read_places};

#[derive(Debug, Clone, clap::Args)]
pub struct ResolveArgs {
    /// Election CSV listing the counties to resolve
    pub input: PathBuf,
    /// Input column holding the state name
    #[arg(long, default_value = REGION_COLUMN)]
    pub region_column: String,
    /// Input column holding the county name
    #[arg(long, default_value = PLACE_COLUMN)]
    pub place_column: String,
}

/// Prints `state,county,token,error` for every county in `args.input`.
///
/// # Errors
///
/// Returns an error if the input cannot be read or stdout cannot be
/// written.
pub fn run(args: &ResolveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let columns = InputColumns {
        region: args.region_column.clone(),
        place: args.place_column.clone(),
    };
    let places = read_places(&args.input, &columns)?;

    let stdout = std::io::stdout();
    let (resolved, unsupported) = write_tokens(&places, stdout.lock())?;

    log::info!(
        "Resolved {resolved} of {} county(ies) ({unsupported} unsupported)",
        places.len()
    );
    Ok(())
}

/// Writes one CSV row per place. Returns `(resolved, unsupported)` counts.
fn write_tokens(places: &[Place], out: impl Write) -> Result<(usize, usize), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([REGION_COLUMN, PLACE_COLUMN, "token", "error"])?;

    let mut resolved = 0;
    let mut unsupported = 0;
    for (place, result) in county_facts_resolver::resolve_all(places) {
        match result {
            Ok(token) => {
                resolved += 1;
                writer.write_record([
                    place.region.as_str(),
                    place.name.as_str(),
                    token.as_str(),
                    "",
                ])?;
            }
            Err(e) => {
                unsupported += 1;
                writer.write_record([
                    place.region.as_str(),
                    place.name.as_str(),
                    "",
                    e.to_string().as_str(),
                ])?;
            }
        }
    }

    writer.flush()?;
    Ok((resolved, unsupported))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_tokens_and_errors() {
        let places = vec![
            Place::new("Louisiana", "Orleans"),
            Place::new("District of Columbia", "District of Columbia"),
            Place::new("Alaska", "District 1"),
        ];

        let mut out = Vec::new();
        let counts = write_tokens(&places, &mut out).unwrap();

        assert_eq!(counts, (2, 1));
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "state,county,token,error\n\
             Louisiana,Orleans,orleansparishlouisiana,\n\
             District of Columbia,District of Columbia,DC,\n\
             Alaska,District 1,,Unsupported region: Alaska\n"
        );
    }
}
