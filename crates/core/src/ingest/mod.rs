//! Self-describing scientific datasets consumed by the ingestion driver.
//!
//! A dataset is a flat set of named variables, each with typed attributes, a
//! list of dimension lengths (slowest first) and a payload in that same
//! column-major order, `x` varying fastest. [`ScientificDataset`] is the
//! read-only view the broker ingests from; [`MemoryDataset`] builds one in
//! memory and, with the `netcdf` feature, [`NetcdfDataset`] reads a file.

mod memory;
#[cfg(feature = "netcdf")]
mod netcdf;

pub use memory::MemoryDataset;
#[cfg(feature = "netcdf")]
pub use self::netcdf::NetcdfDataset;

use crate::error::Result;

/// Name of the variable carrying domain-level attributes
pub const DOMAIN_VARIABLE: &str = "domain";

/// Attribute tagging a variable with the layer kind it builds
pub const TYPE_ATTRIBUTE: &str = "type";

/// Attribute value as stored in a dataset
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Float(f32),
    Double(f64),
    Ints(Vec<i64>),
    Doubles(Vec<f64>),
}

impl AttrValue {
    /// Numeric value; lists yield their first element, text is parsed.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Text(text) => text.trim().parse().ok(),
            AttrValue::Int(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(f64::from(*v)),
            AttrValue::Double(v) => Some(*v),
            AttrValue::Ints(values) => values.first().map(|&v| v as f64),
            AttrValue::Doubles(values) => values.first().copied(),
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            AttrValue::Ints(values) => values.first().copied(),
            AttrValue::Text(text) => text.trim().parse().ok(),
            AttrValue::Float(_) | AttrValue::Double(_) | AttrValue::Doubles(_) => {
                self.as_f64().map(|v| v.round() as i64)
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// All numeric values of the attribute.
    #[must_use]
    pub fn as_f64_list(&self) -> Vec<f64> {
        match self {
            AttrValue::Ints(values) => values.iter().map(|&v| v as f64).collect(),
            AttrValue::Doubles(values) => values.clone(),
            AttrValue::Text(text) => text.split(',').filter_map(|s| s.trim().parse().ok()).collect(),
            _ => self.as_f64().into_iter().collect(),
        }
    }

    /// Rendering used when the attribute is copied into the parameter bag.
    #[must_use]
    pub fn to_parameter(&self) -> String {
        fn join<T: ToString>(values: &[T]) -> String {
            values.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
        }
        match self {
            AttrValue::Text(text) => text.clone(),
            AttrValue::Int(v) => v.to_string(),
            AttrValue::Float(v) => v.to_string(),
            AttrValue::Double(v) => v.to_string(),
            AttrValue::Ints(values) => join(values),
            AttrValue::Doubles(values) => join(values),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Double(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        AttrValue::Int(value)
    }
}

/// Read-only access to a variable/attribute container
pub trait ScientificDataset {
    /// Variable names in a stable order.
    fn variable_names(&self) -> Vec<String>;

    fn attribute(&self, variable: &str, name: &str) -> Option<AttrValue>;

    /// Every attribute of `variable`, sorted by name.
    fn attributes(&self, variable: &str) -> Vec<(String, AttrValue)>;

    /// Dimension lengths of `variable`, slowest first.
    ///
    /// # Errors
    ///
    /// Fails when the variable does not exist or the backend cannot read it.
    fn dimensions(&self, variable: &str) -> Result<Vec<usize>>;

    /// Whole payload as doubles in column-major order.
    ///
    /// # Errors
    ///
    /// Fails when the variable does not exist or the backend cannot read it.
    fn read_f64(&self, variable: &str) -> Result<Vec<f64>>;

    /// Whole payload as integers in column-major order.
    ///
    /// # Errors
    ///
    /// Fails when the variable does not exist or the backend cannot read it.
    fn read_i32(&self, variable: &str) -> Result<Vec<i32>>;
}
