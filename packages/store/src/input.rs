//! Reads the places to scrape from cleaned election returns.
//!
//! Only the identity columns are consumed. A county appears once per
//! election year in the returns, so rows are deduplicated, keeping the
//! first-seen order.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use county_facts_place_models::{PLACE_COLUMN, Place, REGION_COLUMN};

use crate::StoreError;

/// Names of the identity columns in the election file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputColumns {
    /// Column holding the state name.
    pub region: String,
    /// Column holding the county-equivalent name.
    pub place: String,
}

impl Default for InputColumns {
    fn default() -> Self {
        Self {
            region: REGION_COLUMN.to_owned(),
            place: PLACE_COLUMN.to_owned(),
        }
    }
}

/// Reads the distinct places listed in the election CSV at `path`.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be read or lacks one of the
/// identity columns.
pub fn read_places(path: &Path, columns: &InputColumns) -> Result<Vec<Place>, StoreError> {
    let file = std::fs::File::open(path).map_err(|e| StoreError::io(path, e))?;
    let places = parse_places(file, columns, &path.display().to_string())?;
    log::info!("Read {} distinct places from {}", places.len(), path.display());
    Ok(places)
}

/// Parses distinct places from any CSV source. `label` names the source in
/// error messages.
///
/// # Errors
///
/// Returns [`StoreError`] if the CSV is malformed or lacks one of the
/// identity columns.
pub fn parse_places(
    reader: impl Read,
    columns: &InputColumns,
    label: &str,
) -> Result<Vec<Place>, StoreError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader.headers().map_err(|e| StoreError::Csv {
        path: label.to_owned(),
        source: e,
    })?;
    let region_idx = column_index(headers, &columns.region, label)?;
    let place_idx = column_index(headers, &columns.place, label)?;

    let mut seen = BTreeSet::new();
    let mut places = Vec::new();

    for result in reader.records() {
        let row = result.map_err(|e| StoreError::Csv {
            path: label.to_owned(),
            source: e,
        })?;

        let region = row.get(region_idx).unwrap_or("").trim();
        let name = row.get(place_idx).unwrap_or("").trim();
        if region.is_empty() || name.is_empty() {
            log::debug!(
                "Skipping row {} with blank identity",
                row.position().map_or(0, csv::Position::line)
            );
            continue;
        }

        let place = Place::new(region, name);
        if seen.insert(place.clone()) {
            places.push(place);
        }
    }

    Ok(places)
}

fn column_index(
    headers: &csv::StringRecord,
    column: &str,
    label: &str,
) -> Result<usize, StoreError> {
    headers
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| StoreError::MissingColumn {
            path: label.to_owned(),
            column: column.to_owned(),
        })
}
