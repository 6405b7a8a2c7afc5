//! The fixed demographic attribute schema.
//!
//! An [`AttributeSchema`] is an ordered list of `(name, mnemonic)` pairs.
//! `name` becomes a column in the persisted table; `mnemonic` is the
//! `data-mnemonic` tag QuickFacts puts on the table row holding the value.
//! The default schema is embedded at compile time from
//! `schema/quickfacts.toml`.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::{PLACE_COLUMN, REGION_COLUMN};

const QUICKFACTS_SCHEMA_TOML: &str = include_str!("../schema/quickfacts.toml");

/// Errors raised while building an [`AttributeSchema`].
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema has no attributes.
    #[error("attribute schema is empty")]
    Empty,

    /// Two attributes share a name.
    #[error("duplicate attribute name '{name}'")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// An attribute name collides with one of the place identity columns.
    #[error("attribute name '{name}' collides with a place identity column")]
    ReservedName {
        /// The offending name.
        name: String,
    },

    /// The schema TOML could not be parsed.
    #[error("invalid schema TOML: {0}")]
    Toml(#[from] toml::de::Error),
}

/// One named numeric attribute and the external tag it is scraped from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attribute {
    /// Column name in the persisted table (e.g. `"race_wht_pct"`).
    pub name: String,
    /// QuickFacts `data-mnemonic` value (e.g. `"RHI125218"`).
    pub mnemonic: String,
}

impl Attribute {
    /// Creates a new `Attribute`.
    #[must_use]
    pub fn new(name: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mnemonic: mnemonic.into(),
        }
    }
}

#[derive(Deserialize)]
struct SchemaFile {
    attributes: Vec<Attribute>,
}

/// Ordered, closed set of attributes scraped for every place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSchema {
    attributes: Vec<Attribute>,
}

impl AttributeSchema {
    /// Builds a schema from an ordered attribute list.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the list is empty, contains a duplicate
    /// name, or reuses an identity column name.
    pub fn new(attributes: Vec<Attribute>) -> Result<Self, SchemaError> {
        if attributes.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = BTreeSet::new();
        for attribute in &attributes {
            if attribute.name == REGION_COLUMN || attribute.name == PLACE_COLUMN {
                return Err(SchemaError::ReservedName {
                    name: attribute.name.clone(),
                });
            }
            if !seen.insert(attribute.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    name: attribute.name.clone(),
                });
            }
        }

        Ok(Self { attributes })
    }

    /// Parses a schema from TOML (`[[attributes]]` tables with `name` and
    /// `mnemonic` keys).
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the TOML is malformed or the attribute
    /// list is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchemaError> {
        let file: SchemaFile = toml::de::from_str(toml_str)?;
        Self::new(file.attributes)
    }

    /// The embedded QuickFacts race/ethnicity schema.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (a compile-time asset, so
    /// this is caught by the unit tests).
    #[must_use]
    pub fn quickfacts() -> Self {
        Self::from_toml(QUICKFACTS_SCHEMA_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded QuickFacts schema: {e}"))
    }

    /// Attributes in column order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Attribute names in column order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Number of attributes (identity columns excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Always `false`; a schema cannot be constructed empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Full table header: identity columns followed by attribute names.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        [REGION_COLUMN, PLACE_COLUMN]
            .into_iter()
            .chain(self.names())
            .map(str::to_owned)
            .collect()
    }
}

/// A single named value inside an [`AttributeSet`].
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeValue {
    /// Attribute name.
    pub name: String,
    /// Parsed value.
    pub value: f64,
}

/// Ordered attribute values for one place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    values: Vec<AttributeValue>,
}

impl AttributeSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { values: Vec::new() }
    }

    /// Appends a value.
    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.values.push(AttributeValue {
            name: name.into(),
            value,
        });
    }

    /// Looks up a value by attribute name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }

    /// Values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.values.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns `true` if the names match `schema` exactly, in order.
    #[must_use]
    pub fn matches_schema(&self, schema: &AttributeSchema) -> bool {
        self.values.len() == schema.len()
            && self.values.iter().map(|v| v.name.as_str()).eq(schema.names())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (name, value) in iter {
            set.push(name, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_schema_parses() {
        let schema = AttributeSchema::quickfacts();
        assert_eq!(schema.len(), 8);
        assert_eq!(schema.attributes()[0], Attribute::new("race_wht_pct", "RHI125218"));
        assert_eq!(
            schema.attributes()[7],
            Attribute::new("race_whtnothsp_pct", "RHI825218")
        );
    }

    #[test]
    fn header_starts_with_identity_columns() {
        let header = AttributeSchema::quickfacts().header();
        assert_eq!(header[0], "state");
        assert_eq!(header[1], "county");
        assert_eq!(header[2], "race_wht_pct");
        assert_eq!(header.len(), 10);
    }

    #[test]
    fn mnemonics_are_unique() {
        let schema = AttributeSchema::quickfacts();
        let mut seen = BTreeSet::new();
        for attribute in schema.attributes() {
            assert!(
                seen.insert(&attribute.mnemonic),
                "Duplicate mnemonic: {}",
                attribute.mnemonic
            );
        }
    }

    #[test]
    fn rejects_empty_schema() {
        assert!(matches!(AttributeSchema::new(vec![]), Err(SchemaError::Empty)));
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = AttributeSchema::new(vec![
            Attribute::new("a", "X1"),
            Attribute::new("a", "X2"),
        ]);
        assert!(matches!(result, Err(SchemaError::DuplicateName { name }) if name == "a"));
    }

    #[test]
    fn rejects_identity_column_names() {
        let result = AttributeSchema::new(vec![Attribute::new("county", "X1")]);
        assert!(matches!(result, Err(SchemaError::ReservedName { .. })));
    }

    #[test]
    fn attribute_set_matches_schema_in_order() {
        let schema = AttributeSchema::new(vec![
            Attribute::new("a", "X1"),
            Attribute::new("b", "X2"),
        ])
        .unwrap();

        let ordered: AttributeSet = [("a", 1.0), ("b", 2.0)].into_iter().collect();
        let reversed: AttributeSet = [("b", 2.0), ("a", 1.0)].into_iter().collect();
        let short: AttributeSet = [("a", 1.0)].into_iter().collect();

        assert!(ordered.matches_schema(&schema));
        assert!(!reversed.matches_schema(&schema));
        assert!(!short.matches_schema(&schema));
        assert_eq!(ordered.get("b"), Some(2.0));
        assert_eq!(ordered.get("c"), None);
    }
}
