//! Static naming tables for county-equivalents.
//!
//! QuickFacts addresses each county-equivalent by a token built from the
//! place name, the legal term for the subdivision, and the state name. Most
//! tokens can be derived; the tables here cover the states and places
//! where the derivation needs help.

use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Term appended when no region or place rule applies.
pub const DEFAULT_TERM: &str = "county";

/// Term appended for independent cities.
pub const INDEPENDENT_CITY_TERM: &str = "city";

/// The federal district, which QuickFacts addresses by a fixed short token.
pub const FEDERAL_DISTRICT: (&str, &str) = ("District of Columbia", "District of Columbia");

/// Token for [`FEDERAL_DISTRICT`].
pub const FEDERAL_DISTRICT_TOKEN: &str = "DC";

/// States whose subdivisions are not modeled.
///
/// Alaska reports election results by state house district, which does not
/// line up with its boroughs and census areas.
pub const UNSUPPORTED_REGIONS: &[&str] = &["Alaska"];

/// States whose primary subdivisions use a legal term other than "county".
pub const REGION_TERMS: &[(&str, &str)] = &[("Louisiana", "parish")];

/// States containing independent cities that are reported separately from
/// the surrounding county (e.g. "Baltimore City" next to "Baltimore").
pub const INDEPENDENT_CITY_REGIONS: &[&str] = &["Maryland", "Missouri", "Nevada", "Virginia"];

/// `(state, place, token)` triples whose token cannot be derived.
pub const LITERAL_OVERRIDES: &[(&str, &str, &str)] = &[
    // Five boroughs: QuickFacts names both the county and the borough.
    ("New York", "Bronx", "bronxcountybronxboroughnewyork"),
    ("New York", "Kings", "kingscountybrooklynboroughnewyork"),
    ("New York", "New York", "newyorkcountymanhattanboroughnewyork"),
    ("New York", "Queens", "queenscountyqueensboroughnewyork"),
    ("New York", "Richmond", "richmondcountystatenislandboroughnewyork"),
    // Counties whose name ends in "City".
    ("Virginia", "Charles City", "charlescitycountyvirginia"),
    ("Virginia", "James City", "jamescitycountyvirginia"),
    // Cities whose name ends in "City".
    ("Missouri", "Kansas City", "kansascitycitymissouri"),
    // Renamed since the election returns were published.
    ("South Dakota", "Shannon", "oglalalakotacountysouthdakota"),
];

static REGION_TERM_MAP: LazyLock<BTreeMap<&'static str, &'static str>> =
    LazyLock::new(|| REGION_TERMS.iter().copied().collect());

static OVERRIDE_MAP: LazyLock<BTreeMap<&'static str, BTreeMap<&'static str, &'static str>>> =
    LazyLock::new(|| {
        let mut map: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
        for &(region, place, token) in LITERAL_OVERRIDES {
            map.entry(region).or_default().insert(place, token);
        }
        map
    });

/// Returns the literal token for `(region, place)`, if one is configured.
#[must_use]
pub fn literal_override(region: &str, place: &str) -> Option<&'static str> {
    OVERRIDE_MAP
        .get(region)
        .and_then(|places| places.get(place))
        .copied()
}

/// Returns the legal term for the primary subdivisions of `region`.
#[must_use]
pub fn region_term(region: &str) -> &'static str {
    REGION_TERM_MAP.get(region).copied().unwrap_or(DEFAULT_TERM)
}

/// Returns `true` if `region`'s subdivision scheme is not modeled.
#[must_use]
pub fn is_unsupported(region: &str) -> bool {
    UNSUPPORTED_REGIONS.contains(&region)
}

/// Returns `true` if `region` reports independent cities separately.
#[must_use]
pub fn has_independent_cities(region: &str) -> bool {
    INDEPENDENT_CITY_REGIONS.contains(&region)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn overrides_are_unique() {
        let mut seen = BTreeSet::new();
        for (region, place, _) in LITERAL_OVERRIDES {
            assert!(
                seen.insert((region, place)),
                "Duplicate override: {place}, {region}"
            );
        }
    }

    #[test]
    fn override_tokens_are_path_safe() {
        for (region, place, token) in LITERAL_OVERRIDES {
            assert!(
                token.chars().all(|c| c.is_ascii_alphanumeric()),
                "Override for {place}, {region} is not path safe: {token}"
            );
        }
    }

    #[test]
    fn looks_up_overrides_by_region_and_place() {
        assert_eq!(
            literal_override("Virginia", "James City"),
            Some("jamescitycountyvirginia")
        );
        assert_eq!(literal_override("Virginia", "James city"), None);
        assert_eq!(literal_override("Ohio", "James City"), None);
    }

    #[test]
    fn region_term_defaults_to_county() {
        assert_eq!(region_term("Louisiana"), "parish");
        assert_eq!(region_term("Texas"), "county");
        assert_eq!(region_term("louisiana"), "county");
    }

    #[test]
    fn unsupported_regions() {
        assert!(is_unsupported("Alaska"));
        assert!(!is_unsupported("Arizona"));
    }
}
