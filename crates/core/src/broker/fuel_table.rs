//! Semicolon-delimited fuel property table.
//!
//! ```text
//! Index;Rhod;Rhol;Md;...
//! 0;0;0;0;...
//! 1;500;500;0.08;...
//! ```
//!
//! The first line names the columns and must include `Index`. Each following
//! line is one fuel class. Row 0 of every model's fuel matrix is reserved for
//! "no data" and stays zero unless the table defines index 0.

use crate::error::{DataError, Result};
use crate::model::{FuelMatrix, MAX_FUEL_INDEX};
use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Name of the mandatory fuel index column
pub const INDEX_COLUMN: &str = "Index";

const DELIMITER: char = ';';

/// Parsed fuel table: one named-attribute map per fuel class
#[derive(Debug, Clone, Default)]
pub struct FuelTable {
    columns: Vec<String>,
    rows: Vec<FxHashMap<String, f64>>,
}

fn tokenize(line: &str) -> Vec<&str> {
    line.split(DELIMITER)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect()
}

impl FuelTable {
    /// Parse table text, failing on the first malformed row.
    ///
    /// Cells that are not numbers read as 0.0.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MalformedTable`] when the header is missing or has
    /// no `Index` column, or when a row's value count differs from the
    /// header's.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, true)
    }

    /// Read a table file, skipping (with a warning) rows whose value count
    /// differs from the header's.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Io`] if the file cannot be read, or
    /// [`DataError::MalformedTable`] for a missing or index-less header.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        debug!("Reading fuel table {}", path.as_ref().display());
        Self::parse_with(&text, false)
    }

    fn parse_with(text: &str, strict: bool) -> Result<Self> {
        let mut lines = text.lines().enumerate().filter(|(_, line)| !line.trim().is_empty());
        let Some((_, header)) = lines.next() else {
            return Err(DataError::MalformedTable {
                line: 1,
                reason: "missing header line".to_string(),
            });
        };
        let columns: Vec<String> = tokenize(header).into_iter().map(str::to_string).collect();
        if !columns.iter().any(|column| column == INDEX_COLUMN) {
            return Err(DataError::MalformedTable {
                line: 1,
                reason: format!("header has no '{INDEX_COLUMN}' column"),
            });
        }

        let mut rows = Vec::new();
        for (number, line) in lines {
            let values = tokenize(line);
            if values.len() != columns.len() {
                let reason = format!(
                    "{} values for {} columns (fuel {})",
                    values.len(),
                    columns.len(),
                    values.first().copied().unwrap_or("?")
                );
                if strict {
                    return Err(DataError::MalformedTable {
                        line: number + 1,
                        reason,
                    });
                }
                warn!("Skipping fuel table line {}: {}", number + 1, reason);
                continue;
            }
            let row = columns
                .iter()
                .zip(values)
                .map(|(column, value)| {
                    let parsed = value.parse::<f64>().unwrap_or_else(|_| {
                        debug!(
                            "Fuel table line {}: '{}' is not a number for {}, using 0",
                            number + 1,
                            value,
                            column
                        );
                        0.0
                    });
                    (column.clone(), parsed)
                })
                .collect();
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    /// Number of fuel classes
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Attributes of the fuel class whose `Index` is `index`
    #[must_use]
    pub fn row_for_index(&self, index: usize) -> Option<&FxHashMap<String, f64>> {
        self.rows
            .iter()
            .find(|row| row.get(INDEX_COLUMN).is_some_and(|&i| i as usize == index))
    }

    /// Value of `parameter` for fuel `index`
    #[must_use]
    pub fn value(&self, index: usize, parameter: &str) -> Option<f64> {
        self.row_for_index(index)?.get(parameter).copied()
    }

    /// Overwrite `key` on every fuel class that defines it; returns how many.
    pub fn set_all(&mut self, key: &str, value: f64) -> usize {
        let mut updated = 0;
        for row in &mut self.rows {
            if let Some(slot) = row.get_mut(key) {
                *slot = value;
                updated += 1;
            }
        }
        updated
    }

    /// Dense matrix of `parameters` indexed by fuel class.
    ///
    /// A parameter missing for some class is logged and left at 0 for it.
    #[must_use]
    pub fn build_matrix(&self, parameters: &[String]) -> FuelMatrix {
        let mut matrix = FuelMatrix::new(parameters.to_vec());
        for row in &self.rows {
            let Some(&index) = row.get(INDEX_COLUMN) else {
                continue;
            };
            if index < 0.0 || index as usize >= MAX_FUEL_INDEX {
                warn!("Fuel index {} outside 0..{}, skipped", index, MAX_FUEL_INDEX);
                continue;
            }
            for (column, parameter) in parameters.iter().enumerate() {
                match row.get(parameter) {
                    Some(&value) => matrix.set(index as usize, column, value),
                    None => warn!(
                        "Parameter {} could not be found for fuel {} in the fuel table",
                        parameter, index
                    ),
                }
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FUELS_TABLE;

    #[test]
    fn test_parse_minimal_table() {
        let table = FuelTable::parse("Index;h1;h10\n0;1.0;2.0\n1;3.0;4.0").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, "h10"), Some(4.0));
        assert_eq!(table.value(0, "h1"), Some(1.0));
        assert_eq!(table.value(2, "h1"), None);
    }

    #[test]
    fn test_non_numeric_cell_reads_zero() {
        let table = FuelTable::parse("Index;name;h1\n3;grass;0.5").unwrap();
        assert_eq!(table.value(3, "name"), Some(0.0));
        assert_eq!(table.value(3, "h1"), Some(0.5));
    }

    #[test]
    fn test_malformed_tables() {
        assert!(matches!(
            FuelTable::parse(""),
            Err(DataError::MalformedTable { line: 1, .. })
        ));
        assert!(matches!(
            FuelTable::parse("h1;h10\n1;2"),
            Err(DataError::MalformedTable { line: 1, .. })
        ));
        assert!(matches!(
            FuelTable::parse("Index;h1\n0;1\n1;2;3"),
            Err(DataError::MalformedTable { line: 3, .. })
        ));
    }

    #[test]
    fn test_file_reader_skips_bad_rows() {
        let path = std::env::temp_dir().join(format!("fire_data_fuels_{}.csv", std::process::id()));
        std::fs::write(&path, "Index;h1\n0;1\n1;2;3\n2;5\n").unwrap();
        let table = FuelTable::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(2, "h1"), Some(5.0));
        assert!(FuelTable::from_file("/nonexistent/fuels.csv").is_err());
    }

    #[test]
    fn test_build_matrix_and_update() {
        let mut table = FuelTable::parse("Index;h1;h10\n0;1.0;2.0\n7;3.0;4.0").unwrap();
        let names = vec!["h10".to_string(), "missing".to_string()];
        let matrix = table.build_matrix(&names);
        assert_eq!(matrix.row(7), &[4.0, 0.0]);
        assert_eq!(table.set_all("h10", 9.0), 2);
        assert_eq!(table.build_matrix(&names).row(0), &[9.0, 0.0]);
    }

    #[test]
    fn test_default_table_parses() {
        let table = FuelTable::parse(DEFAULT_FUELS_TABLE).unwrap();
        assert!(table.has_column(INDEX_COLUMN));
        assert!(table.len() > 10);
    }
}
