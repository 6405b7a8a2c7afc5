#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resolves election-data place names to QuickFacts page tokens.
//!
//! QuickFacts addresses a county-equivalent as
//! `<name><term><state>`, lowercased with punctuation removed, e.g.
//! `autaugacountyalabama` or `orleansparishlouisiana`. Resolution applies,
//! in order of precedence:
//!
//! 1. Unsupported states fail with [`ResolveError::UnsupportedRegion`].
//! 2. The federal district resolves to a fixed short token.
//! 3. Literal overrides from [`tables::LITERAL_OVERRIDES`].
//! 4. The derived form, using the state's subdivision term or the
//!    independent-city term.
//!
//! Anything not covered by 1-3 falls through to the derived form, which may
//! not exist on QuickFacts. That surfaces as a 404 at fetch time rather than
//! as a resolver error.

pub mod normalize;
pub mod tables;

use std::fmt;

use county_facts_place_models::Place;

use crate::normalize::{normalize, strip_suffix_word};

/// Errors that can occur while resolving a place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The state's subdivision scheme is not modeled.
    #[error("Unsupported region: {region}")]
    UnsupportedRegion {
        /// State name as given.
        region: String,
    },
}

/// The path segment addressing one place's QuickFacts page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageToken(String);

impl PageToken {
    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolves `place` to its QuickFacts page token.
///
/// # Errors
///
/// Returns [`ResolveError::UnsupportedRegion`] if the place lies in a state
/// listed in [`tables::UNSUPPORTED_REGIONS`].
pub fn resolve(place: &Place) -> Result<PageToken, ResolveError> {
    resolve_parts(&place.region, &place.name)
}

/// Resolves a `(region, name)` pair to its QuickFacts page token.
///
/// # Errors
///
/// Returns [`ResolveError::UnsupportedRegion`] if `region` is listed in
/// [`tables::UNSUPPORTED_REGIONS`].
pub fn resolve_parts(region: &str, name: &str) -> Result<PageToken, ResolveError> {
    if tables::is_unsupported(region) {
        return Err(ResolveError::UnsupportedRegion {
            region: region.to_owned(),
        });
    }

    if (region, name) == tables::FEDERAL_DISTRICT {
        return Ok(PageToken(tables::FEDERAL_DISTRICT_TOKEN.to_owned()));
    }

    if let Some(token) = tables::literal_override(region, name) {
        log::trace!("Literal override for {name}, {region}: {token}");
        return Ok(PageToken(token.to_owned()));
    }

    Ok(PageToken(derive(region, name)))
}

/// Resolves every place in `places`, preserving order.
///
/// Useful as a dry run before a scrape: unsupported places show up as
/// errors without touching the network.
pub fn resolve_all(
    places: &[Place],
) -> impl Iterator<Item = (&Place, Result<PageToken, ResolveError>)> {
    places.iter().map(|place| (place, resolve(place)))
}

fn derive(region: &str, name: &str) -> String {
    let (base, term) = if tables::has_independent_cities(region)
        && let Some(city) = strip_suffix_word(name, tables::INDEPENDENT_CITY_TERM)
    {
        (city, tables::INDEPENDENT_CITY_TERM)
    } else {
        let term = tables::region_term(region);
        (strip_suffix_word(name, term).unwrap_or(name), term)
    };

    format!("{}{term}{}", normalize(base), normalize(region))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(region: &str, name: &str) -> String {
        resolve_parts(region, name).unwrap().into_string()
    }

    #[test]
    fn derives_default_county_token() {
        assert_eq!(token("Alabama", "Autauga"), "autaugacountyalabama");
        assert_eq!(token("New Mexico", "Doña Ana"), "donaanacountynewmexico");
    }

    #[test]
    fn louisiana_uses_parish() {
        assert_eq!(token("Louisiana", "Orleans"), "orleansparishlouisiana");
        assert_eq!(token("Louisiana", "St. Tammany"), "sttammanyparishlouisiana");
    }

    #[test]
    fn federal_district_uses_short_token() {
        assert_eq!(token("District of Columbia", "District of Columbia"), "DC");
    }

    #[test]
    fn alaska_is_unsupported() {
        for name in ["Anchorage", "District 1", "Juneau"] {
            assert_eq!(
                resolve_parts("Alaska", name),
                Err(ResolveError::UnsupportedRegion {
                    region: "Alaska".to_owned()
                })
            );
        }
    }

    #[test]
    fn independent_cities_use_city_term() {
        assert_eq!(token("Maryland", "Baltimore City"), "baltimorecitymaryland");
        assert_eq!(token("Maryland", "Baltimore"), "baltimorecountymaryland");
        assert_eq!(token("Missouri", "St. Louis City"), "stlouiscitymissouri");
        assert_eq!(token("Missouri", "St. Louis"), "stlouiscountymissouri");
        assert_eq!(token("Virginia", "Fairfax City"), "fairfaxcityvirginia");
        assert_eq!(token("Nevada", "Carson City"), "carsoncitynevada");
    }

    #[test]
    fn city_suffix_outside_independent_city_states_is_part_of_the_name() {
        assert_eq!(token("Iowa", "Sioux City"), "siouxcitycountyiowa");
    }

    #[test]
    fn existing_term_suffix_is_not_repeated() {
        assert_eq!(token("Alabama", "Autauga County"), "autaugacountyalabama");
        assert_eq!(token("Louisiana", "Orleans Parish"), "orleansparishlouisiana");
    }

    #[test]
    fn literal_overrides_win_over_derivation() {
        for (region, name, expected) in tables::LITERAL_OVERRIDES {
            assert_eq!(token(region, name), *expected);
        }
        assert_eq!(token("Virginia", "James City"), "jamescitycountyvirginia");
        assert_eq!(
            token("New York", "Kings"),
            "kingscountybrooklynboroughnewyork"
        );
    }

    #[test]
    fn derived_tokens_never_contain_separators() {
        let places = [
            ("Maryland", "Prince George's"),
            ("Florida", "Miami-Dade"),
            ("Missouri", "Ste. Genevieve"),
            ("Virginia", "Colonial Heights City"),
            ("Texas", "De Witt"),
        ];
        for (region, name) in places {
            let t = token(region, name);
            assert!(
                !t.contains([' ', '.', '-', '\'']),
                "{name}, {region} resolved to {t}"
            );
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let place = Place::new("Virginia", "Richmond City");
        assert_eq!(resolve(&place), resolve(&place));
        assert_eq!(resolve(&place).unwrap().as_str(), "richmondcityvirginia");
    }

    #[test]
    fn resolve_all_preserves_order() {
        let places = vec![
            Place::new("Alaska", "District 1"),
            Place::new("Alabama", "Autauga"),
        ];
        let resolved: Vec<_> = resolve_all(&places).collect();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].0, &places[0]);
        assert!(resolved[0].1.is_err());
        assert_eq!(
            resolved[1].1.as_ref().map(PageToken::as_str),
            Ok("autaugacountyalabama")
        );
    }
}
