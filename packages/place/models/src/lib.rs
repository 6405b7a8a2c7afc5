#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Place identity and demographic attribute types.
//!
//! A [`Place`] is one county-equivalent unit (county, parish, borough,
//! independent city) identified by its state and its name exactly as they
//! appear in the election returns. The [`schema`] module describes the
//! closed set of numeric attributes scraped for every place.

pub mod schema;

use std::fmt;

pub use schema::{Attribute, AttributeSchema, AttributeSet, AttributeValue, SchemaError};

/// Column holding the region (state) name in every persisted table.
pub const REGION_COLUMN: &str = "state";

/// Column holding the place (county-equivalent) name in every persisted table.
pub const PLACE_COLUMN: &str = "county";

/// A (region, place) pair, e.g. `("Louisiana", "Orleans")`.
///
/// Both fields are free text and compared case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Place {
    /// State name (e.g. "Virginia").
    pub region: String,
    /// County-equivalent name (e.g. "Fairfax City").
    pub name: String,
}

impl Place {
    /// Creates a new `Place`.
    #[must_use]
    pub fn new(region: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.name, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_place_then_region() {
        let place = Place::new("Louisiana", "Orleans");
        assert_eq!(place.to_string(), "Orleans, Louisiana");
    }

    #[test]
    fn identity_is_case_sensitive() {
        assert_ne!(
            Place::new("Virginia", "Fairfax City"),
            Place::new("Virginia", "Fairfax city")
        );
    }
}
