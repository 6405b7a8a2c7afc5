#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Keyed table of scraped demographic records.
//!
//! [`RecordStore`] holds at most one [`Record`] per [`Place`] and keeps rows
//! in first-insertion order. It persists to a flat CSV whose header is the
//! two identity columns followed by the schema's attribute names, in that
//! exact order. [`input`] reads the list of places to scrape from the
//! cleaned election returns.

pub mod input;

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use county_facts_place_models::{AttributeSchema, AttributeSet, Place};

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The file header does not match the store schema.
    #[error("Incorrect columns in {path}: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        /// File that was being imported.
        path: String,
        /// Header the store requires.
        expected: Vec<String>,
        /// Header found in the file.
        found: Vec<String>,
    },

    /// An upserted attribute set does not follow the store schema.
    #[error("Attributes for {place} do not match the store schema")]
    AttributeMismatch {
        /// Place the attributes were meant for.
        place: Place,
    },

    /// A cell could not be parsed as a floating-point number.
    #[error("Invalid value '{value}' for {column} at {path}:{line}")]
    InvalidValue {
        /// File being read.
        path: String,
        /// One-based line number.
        line: u64,
        /// Column name.
        column: String,
        /// Raw cell contents.
        value: String,
    },

    /// The same place appears on more than one row.
    #[error("Duplicate record for {place} at {path}:{line}")]
    DuplicatePlace {
        /// File being read.
        path: String,
        /// One-based line number of the second occurrence.
        line: u64,
        /// The repeated place.
        place: Place,
    },

    /// A required input column is missing.
    #[error("Missing column '{column}' in {path}")]
    MissingColumn {
        /// File being read.
        path: String,
        /// Column that was expected.
        column: String,
    },

    /// CSV reading or writing failed.
    #[error("CSV error in {path}: {source}")]
    Csv {
        /// File being read or written.
        path: String,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path that caused the error.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl StoreError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.display().to_string(),
            source,
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// One place and its scraped attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Place identity.
    pub place: Place,
    /// Attribute values in schema order.
    pub attributes: AttributeSet,
}

/// What [`RecordStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// A new row was appended.
    Inserted,
    /// An existing row was replaced in place.
    Updated,
}

/// In-memory demographic table keyed by [`Place`].
#[derive(Debug, Clone)]
pub struct RecordStore {
    schema: AttributeSchema,
    records: Vec<Record>,
    index: BTreeMap<Place, usize>,
}

impl RecordStore {
    /// Creates an empty store with a fixed schema.
    #[must_use]
    pub const fn new(schema: AttributeSchema) -> Self {
        Self {
            schema,
            records: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Creates a store hydrated from a previously exported file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be read or does not match
    /// `schema`.
    pub fn open(path: &Path, schema: AttributeSchema) -> Result<Self, StoreError> {
        let mut store = Self::new(schema);
        store.import(path)?;
        Ok(store)
    }

    /// The schema every record follows.
    #[must_use]
    pub const fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Full table header: identity columns followed by attribute names.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        self.schema.header()
    }

    /// Inserts a record for `place`, or replaces the attributes of the
    /// existing one without moving it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AttributeMismatch`] if `attributes` does not
    /// name exactly the schema's attributes in schema order. The store is
    /// left unchanged in that case.
    pub fn upsert(
        &mut self,
        place: Place,
        attributes: AttributeSet,
    ) -> Result<Upserted, StoreError> {
        if !attributes.matches_schema(&self.schema) {
            return Err(StoreError::AttributeMismatch { place });
        }

        if let Some(&row) = self.index.get(&place) {
            self.records[row].attributes = attributes;
            return Ok(Upserted::Updated);
        }

        self.index.insert(place.clone(), self.records.len());
        self.records.push(Record { place, attributes });
        Ok(Upserted::Inserted)
    }

    /// Replaces the store contents with the rows of a CSV file.
    ///
    /// The header must equal [`Self::header`] exactly. Nothing is changed
    /// unless the whole file is valid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaMismatch`] on a header mismatch, and other
    /// [`StoreError`] variants for unreadable files, malformed numbers, rows
    /// of the wrong width, or duplicated places.
    pub fn import(&mut self, path: &Path) -> Result<usize, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .from_path(path)
            .map_err(|e| StoreError::csv(path, e))?;

        let found: Vec<String> = reader
            .headers()
            .map_err(|e| StoreError::csv(path, e))?
            .iter()
            .map(str::to_owned)
            .collect();
        let expected = self.schema.header();
        if found != expected {
            return Err(StoreError::SchemaMismatch {
                path: path.display().to_string(),
                expected,
                found,
            });
        }

        let mut records = Vec::new();
        let mut index = BTreeMap::new();

        for result in reader.records() {
            let row = result.map_err(|e| StoreError::csv(path, e))?;
            let line = row.position().map_or(0, csv::Position::line);
            let place = Place::new(&row[0], &row[1]);

            let mut attributes = AttributeSet::new();
            for (name, raw) in self.schema.names().zip(row.iter().skip(2)) {
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| StoreError::InvalidValue {
                        path: path.display().to_string(),
                        line,
                        column: name.to_owned(),
                        value: raw.to_owned(),
                    })?;
                attributes.push(name, value);
            }

            if index.insert(place.clone(), records.len()).is_some() {
                return Err(StoreError::DuplicatePlace {
                    path: path.display().to_string(),
                    line,
                    place,
                });
            }
            records.push(Record { place, attributes });
        }

        let count = records.len();
        self.records = records;
        self.index = index;

        log::info!("Imported {count} records from {}", path.display());
        Ok(count)
    }

    /// Writes every record to `path` as CSV, in store order.
    ///
    /// Rows are written to a sibling temporary file that is renamed over
    /// `path` once complete. Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be written.
    pub fn export(&self, path: &Path) -> Result<usize, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp_path = tmp_path_for(path);
        let mut writer =
            csv::Writer::from_path(&tmp_path).map_err(|e| StoreError::csv(&tmp_path, e))?;

        writer
            .write_record(self.schema.header())
            .map_err(|e| StoreError::csv(&tmp_path, e))?;

        for record in &self.records {
            let mut row = Vec::with_capacity(2 + record.attributes.len());
            row.push(record.place.region.clone());
            row.push(record.place.name.clone());
            row.extend(record.attributes.iter().map(|v| v.value.to_string()));
            writer
                .write_record(&row)
                .map_err(|e| StoreError::csv(&tmp_path, e))?;
        }

        writer.flush().map_err(|e| StoreError::io(&tmp_path, e))?;
        drop(writer);

        std::fs::rename(&tmp_path, path).map_err(|e| StoreError::io(path, e))?;

        log::info!(
            "Exported {} records to {}",
            self.records.len(),
            path.display()
        );
        Ok(self.records.len())
    }

    /// Returns the record for `place`, if present.
    #[must_use]
    pub fn get(&self, place: &Place) -> Option<&Record> {
        self.index.get(place).map(|&row| &self.records[row])
    }

    /// Returns `true` if a record for `place` exists.
    #[must_use]
    pub fn contains(&self, place: &Place) -> bool {
        self.index.contains_key(place)
    }

    /// Records in store order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
