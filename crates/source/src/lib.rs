//! Listing dataset sources.
//!
//! Provides the `ListingSource` trait and a JSON-rows implementation. A
//! source only maps dataset columns onto `Listing` fields and coerces cell
//! values; it carries no scoring logic.

use std::path::{Path, PathBuf};

use landrisk_model::{ColumnMapping, Listing};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from reading a dataset.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Expected a JSON array of rows")]
    NotAnArray,

    #[error("Row {0} is not a JSON object")]
    RowNotObject(usize),
}

/// Trait for listing dataset sources.
pub trait ListingSource {
    /// Load every row of the dataset.
    fn load(&self) -> Result<Vec<Listing>, SourceError>;

    /// Get the source name for logging.
    fn name(&self) -> &'static str;
}

/// A JSON file holding an array of row objects keyed by column name.
#[derive(Debug, Clone)]
pub struct JsonRowsSource {
    path: PathBuf,
    columns: ColumnMapping,
}

impl JsonRowsSource {
    pub fn new(path: impl AsRef<Path>, columns: ColumnMapping) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ListingSource for JsonRowsSource {
    fn load(&self) -> Result<Vec<Listing>, SourceError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        let listings = parse_rows(&text, &self.columns)?;

        tracing::debug!(
            path = %self.path.display(),
            rows = listings.len(),
            "Loaded listings"
        );
        Ok(listings)
    }

    fn name(&self) -> &'static str {
        "json-rows"
    }
}

/// Parse a JSON array of row objects.
pub fn parse_rows(text: &str, columns: &ColumnMapping) -> Result<Vec<Listing>, SourceError> {
    let document: Value = serde_json::from_str(text)?;
    let rows = document.as_array().ok_or(SourceError::NotAnArray)?;

    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            row.as_object()
                .map(|object| row_to_listing(object, columns))
                .ok_or(SourceError::RowNotObject(i))
        })
        .collect()
}

/// Map one row onto a `Listing`. Absent or unusable cells become `None`.
pub fn row_to_listing(row: &Map<String, Value>, columns: &ColumnMapping) -> Listing {
    let number = |column: &str| row.get(column).and_then(coerce_number);
    let text = |column: &str| row.get(column).and_then(coerce_text);

    Listing {
        unit_price: number(&columns.unit_price),
        gov_price: number(&columns.gov_price),
        fraud_probability: number(&columns.fraud_probability),
        description: text(&columns.description),
        district: text(&columns.district),
        ward: text(&columns.ward),
        street: text(&columns.street),
        market_ref_price: number(&columns.market_ref_price),
        area_m2: number(&columns.area_m2),
        total_price: number(&columns.total_price),
    }
}

/// Read a cell as a finite number.
///
/// Accepts JSON numbers and numeric strings such as `" 1,250.5 "`.
/// Anything else is missing.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

/// Read a cell as non-empty text. Numbers are kept as their JSON text.
pub fn coerce_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const ROWS: &str = r#"[
        {
            "Unit Price (million VND/m²)": 380,
            "Gov Price 2026 Corrected (million VND/m²)": "190",
            "Độ tin cậy tin ảo (%)": 12.5,
            "Listing Text": "Sổ hồng riêng",
            "District": "Quận 3",
            "Ward": 7,
            "Street": "Võ Văn Tần",
            "Area (m²)": "1,250.5"
        },
        {
            "Unit Price (million VND/m²)": "n/a",
            "Listing Text": "",
            "District": null
        }
    ]"#;

    #[test]
    fn test_parse_rows_with_default_columns() {
        let listings = parse_rows(ROWS, &ColumnMapping::default()).unwrap();
        assert_eq!(listings.len(), 2);

        let first = &listings[0];
        assert_eq!(first.unit_price, Some(380.0));
        assert_eq!(first.gov_price, Some(190.0));
        assert_eq!(first.fraud_probability, Some(12.5));
        assert_eq!(first.description.as_deref(), Some("Sổ hồng riêng"));
        assert_eq!(first.ward.as_deref(), Some("7"));
        assert_eq!(first.area_m2, Some(1250.5));
        assert_eq!(first.market_ref_price, None);

        let second = &listings[1];
        assert_eq!(second, &Listing::default());
    }

    #[test]
    fn test_overridden_column_names() {
        let columns = ColumnMapping {
            unit_price: "price_per_m2".to_string(),
            gov_price: "gov".to_string(),
            ..Default::default()
        };
        let listings = parse_rows(r#"[{"price_per_m2": 250, "gov": 125}]"#, &columns).unwrap();
        assert_eq!(listings[0].unit_price, Some(250.0));
        assert_eq!(listings[0].gov_price, Some(125.0));
    }

    #[test]
    fn test_structural_errors() {
        let columns = ColumnMapping::default();
        assert!(matches!(
            parse_rows(r#"{"rows": []}"#, &columns),
            Err(SourceError::NotAnArray)
        ));
        assert!(matches!(
            parse_rows(r#"[{}, 3]"#, &columns),
            Err(SourceError::RowNotObject(1))
        ));
        assert!(matches!(parse_rows("[", &columns), Err(SourceError::Parse(_))));
    }

    #[test]
    fn test_coerce_number() {
        assert_eq!(coerce_number(&json!(42)), Some(42.0));
        assert_eq!(coerce_number(&json!(" 3.5 ")), Some(3.5));
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!("inf")), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&json!(null)), None);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let source = JsonRowsSource::new("/nonexistent/listings.json", ColumnMapping::default());
        assert!(matches!(source.load(), Err(SourceError::Io { .. })));
        assert_eq!(source.name(), "json-rows");
    }
}
