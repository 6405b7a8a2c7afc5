//! QuickFacts page extraction.
//!
//! A QuickFacts table puts each statistic on its own row tagged with a
//! `data-mnemonic` attribute. The machine-readable number lives on a
//! descendant cell's `data-value` attribute:
//!
//! ```html
//! <tr data-mnemonic="RHI125218">
//!   <td>White alone, percent</td>
//!   <td data-value="76.6">76.6%</td>
//! </tr>
//! ```
//!
//! Extraction is all-or-nothing: the first missing row or value fails the
//! whole page.

use county_facts_place_models::{Attribute, AttributeSchema, AttributeSet, Place};
use scraper::{Html, Selector};

/// Errors raised while extracting attributes from a page.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// No row carries the attribute's mnemonic.
    #[error("Missing '{attribute}' row ({mnemonic}) on page for {place}")]
    MissingElement {
        /// Attribute name.
        attribute: String,
        /// QuickFacts mnemonic that was searched for.
        mnemonic: String,
        /// Place being extracted.
        place: Place,
    },

    /// The row exists but has no `data-value` cell.
    #[error("Missing value for '{attribute}' ({mnemonic}) on page for {place}")]
    MissingValue {
        /// Attribute name.
        attribute: String,
        /// QuickFacts mnemonic of the row.
        mnemonic: String,
        /// Place being extracted.
        place: Place,
    },

    /// The `data-value` is not a finite number.
    #[error("Invalid value '{value}' for '{attribute}' on page for {place}")]
    InvalidValue {
        /// Attribute name.
        attribute: String,
        /// Raw attribute text.
        value: String,
        /// Place being extracted.
        place: Place,
    },

    /// A CSS selector built from the schema failed to parse.
    #[error("Invalid CSS selector '{selector}': {message}")]
    Selector {
        /// Selector source.
        selector: String,
        /// Parser message.
        message: String,
    },
}

impl ExtractionError {
    /// Name of the attribute that failed, if the error is tied to one.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::MissingElement { attribute, .. }
            | Self::MissingValue { attribute, .. }
            | Self::InvalidValue { attribute, .. } => Some(attribute),
            Self::Selector { .. } => None,
        }
    }
}

/// Extracts a fixed attribute schema from QuickFacts pages.
///
/// Selectors are compiled once, so one extractor serves a whole batch.
#[derive(Debug)]
pub struct PageExtractor {
    schema: AttributeSchema,
    rows: Vec<Selector>,
    value: Selector,
}

impl PageExtractor {
    /// Compiles the row selectors for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Selector`] if a mnemonic produces an
    /// unparsable selector.
    pub fn new(schema: AttributeSchema) -> Result<Self, ExtractionError> {
        let rows = schema
            .attributes()
            .iter()
            .map(|a| parse_selector(&format!(r#"tr[data-mnemonic="{}"]"#, a.mnemonic)))
            .collect::<Result<Vec<_>, _>>()?;
        let value = parse_selector("[data-value]")?;

        Ok(Self {
            schema,
            rows,
            value,
        })
    }

    /// The schema this extractor produces.
    #[must_use]
    pub const fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Extracts every schema attribute from `html`.
    ///
    /// `place` only labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] naming the first attribute whose row or
    /// value is missing or unparsable.
    pub fn extract(&self, html: &str, place: &Place) -> Result<AttributeSet, ExtractionError> {
        let document = Html::parse_document(html);
        let mut attributes = AttributeSet::new();

        for (attribute, row_selector) in self.schema.attributes().iter().zip(&self.rows) {
            let value = self.extract_one(&document, attribute, row_selector, place)?;
            attributes.push(&attribute.name, value);
        }

        Ok(attributes)
    }

    fn extract_one(
        &self,
        document: &Html,
        attribute: &Attribute,
        row_selector: &Selector,
        place: &Place,
    ) -> Result<f64, ExtractionError> {
        let row = document.select(row_selector).next().ok_or_else(|| {
            ExtractionError::MissingElement {
                attribute: attribute.name.clone(),
                mnemonic: attribute.mnemonic.clone(),
                place: place.clone(),
            }
        })?;

        let raw = row
            .select(&self.value)
            .find_map(|cell| cell.value().attr("data-value"))
            .ok_or_else(|| ExtractionError::MissingValue {
                attribute: attribute.name.clone(),
                mnemonic: attribute.mnemonic.clone(),
                place: place.clone(),
            })?;

        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ExtractionError::InvalidValue {
                attribute: attribute.name.clone(),
                value: raw.to_owned(),
                place: place.clone(),
            })
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|e| ExtractionError::Selector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fmt::Write as _;

    /// Builds a QuickFacts-like page with one row per `(mnemonic, value)`.
    pub fn page(rows: &[(&str, &str)]) -> String {
        let mut html = String::from(
            "<html><body><table><thead><tr><th>Fact</th><th>Value</th></tr></thead><tbody>",
        );
        for (mnemonic, value) in rows {
            write!(
                html,
                r#"<tr data-mnemonic="{mnemonic}"><td>Label</td><td data-value="{value}" data-srcnote="x">{value}%</td></tr>"#
            )
            .unwrap();
        }
        html.push_str("</tbody></table></body></html>");
        html
    }

    /// A complete page for the embedded QuickFacts schema.
    pub fn full_page(first_value: &str) -> String {
        let schema = AttributeSchema::quickfacts();
        let rows: Vec<(&str, &str)> = schema
            .attributes()
            .iter()
            .enumerate()
            .map(|(i, a)| (a.mnemonic.as_str(), if i == 0 { first_value } else { "1.5" }))
            .collect();
        page(&rows)
    }

    fn extractor() -> PageExtractor {
        PageExtractor::new(AttributeSchema::quickfacts()).unwrap()
    }

    #[test]
    fn extracts_all_attributes_in_schema_order() {
        let place = Place::new("Alabama", "Autauga");
        let attributes = extractor().extract(&full_page("76.6"), &place).unwrap();

        assert!(attributes.matches_schema(&AttributeSchema::quickfacts()));
        assert_eq!(attributes.get("race_wht_pct"), Some(76.6));
        assert_eq!(attributes.get("race_whtnothsp_pct"), Some(1.5));
    }

    #[test]
    fn ignores_unrelated_rows_and_order() {
        let schema = AttributeSchema::new(vec![
            Attribute::new("a", "AAA1"),
            Attribute::new("b", "BBB2"),
        ])
        .unwrap();
        let extractor = PageExtractor::new(schema).unwrap();
        let html = page(&[("ZZZ9", "3"), ("BBB2", "2.25"), ("AAA1", "-0.5")]);

        let attributes = extractor
            .extract(&html, &Place::new("Ohio", "Adams"))
            .unwrap();

        let names: Vec<&str> = attributes.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(attributes.get("a"), Some(-0.5));
        assert_eq!(attributes.get("b"), Some(2.25));
    }

    #[test]
    fn missing_row_names_the_attribute_and_place() {
        let schema = AttributeSchema::quickfacts();
        let rows: Vec<(&str, &str)> = schema
            .attributes()
            .iter()
            .filter(|a| a.name != "race_asn_pct")
            .map(|a| (a.mnemonic.as_str(), "1.0"))
            .collect();

        let err = extractor()
            .extract(&page(&rows), &Place::new("Louisiana", "Orleans"))
            .unwrap_err();

        assert!(matches!(err, ExtractionError::MissingElement { .. }));
        assert_eq!(err.attribute(), Some("race_asn_pct"));
        let message = err.to_string();
        assert!(message.contains("race_asn_pct"), "{message}");
        assert!(message.contains("Orleans, Louisiana"), "{message}");
    }

    #[test]
    fn row_without_value_cell_fails() {
        let schema = AttributeSchema::new(vec![Attribute::new("a", "AAA1")]).unwrap();
        let extractor = PageExtractor::new(schema).unwrap();
        let html = r#"<table><tr data-mnemonic="AAA1"><td>Label</td><td>76.6%</td></tr></table>"#;

        let err = extractor
            .extract(html, &Place::new("Ohio", "Adams"))
            .unwrap_err();

        assert!(matches!(err, ExtractionError::MissingValue { .. }));
        assert_eq!(err.attribute(), Some("a"));
    }

    #[test]
    fn non_numeric_value_fails() {
        let schema = AttributeSchema::new(vec![Attribute::new("a", "AAA1")]).unwrap();
        let extractor = PageExtractor::new(schema).unwrap();

        for bad in ["D", "", "NaN", "inf"] {
            let err = extractor
                .extract(&page(&[("AAA1", bad)]), &Place::new("Ohio", "Adams"))
                .unwrap_err();
            assert!(
                matches!(err, ExtractionError::InvalidValue { .. }),
                "{bad:?} gave {err}"
            );
        }
    }

    #[test]
    fn empty_document_fails_on_first_attribute() {
        let err = extractor()
            .extract("", &Place::new("Ohio", "Adams"))
            .unwrap_err();
        assert_eq!(err.attribute(), Some("race_wht_pct"));
    }
}
