//! NetCDF backend, enabled with the `netcdf` feature.

use super::{AttrValue, ScientificDataset};
use crate::error::{DataError, Result};
use netcdf::AttributeValue;
use std::path::Path;
use tracing::debug;

/// NetCDF file opened read-only
pub struct NetcdfDataset {
    file: netcdf::File,
}

fn dataset_error(err: &netcdf::Error) -> DataError {
    DataError::Dataset(err.to_string())
}

fn convert(value: AttributeValue) -> Option<AttrValue> {
    Some(match value {
        AttributeValue::Str(text) => AttrValue::Text(text),
        AttributeValue::Schar(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Uchar(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Short(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Ushort(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Int(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Uint(v) => AttrValue::Int(i64::from(v)),
        AttributeValue::Longlong(v) => AttrValue::Int(v),
        AttributeValue::Float(v) => AttrValue::Float(v),
        AttributeValue::Double(v) => AttrValue::Double(v),
        AttributeValue::Shorts(values) => AttrValue::Ints(values.into_iter().map(i64::from).collect()),
        AttributeValue::Ints(values) => AttrValue::Ints(values.into_iter().map(i64::from).collect()),
        AttributeValue::Longlongs(values) => AttrValue::Ints(values),
        AttributeValue::Floats(values) => AttrValue::Doubles(values.into_iter().map(f64::from).collect()),
        AttributeValue::Doubles(values) => AttrValue::Doubles(values),
        AttributeValue::Strs(values) => AttrValue::Text(values.join(",")),
        _ => return None,
    })
}

impl NetcdfDataset {
    /// Open `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Dataset`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = netcdf::open(path.as_ref()).map_err(|e| dataset_error(&e))?;
        debug!("Opened NetCDF file {}", path.as_ref().display());
        Ok(Self { file })
    }

    fn variable(&self, name: &str) -> Result<netcdf::Variable<'_>> {
        self.file
            .variable(name)
            .ok_or_else(|| DataError::Dataset(format!("no variable '{name}'")))
    }
}

impl ScientificDataset for NetcdfDataset {
    fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.file.variables().map(|var| var.name()).collect();
        names.sort();
        names
    }

    fn attribute(&self, variable: &str, name: &str) -> Option<AttrValue> {
        let var = self.file.variable(variable)?;
        let attribute = var.attribute(name)?;
        attribute.value().ok().and_then(convert)
    }

    fn attributes(&self, variable: &str) -> Vec<(String, AttrValue)> {
        let Some(var) = self.file.variable(variable) else {
            return Vec::new();
        };
        let mut attributes: Vec<(String, AttrValue)> = var
            .attributes()
            .filter_map(|attribute| {
                let value = attribute.value().ok().and_then(convert)?;
                Some((attribute.name().to_string(), value))
            })
            .collect();
        attributes.sort_by(|a, b| a.0.cmp(&b.0));
        attributes
    }

    fn dimensions(&self, variable: &str) -> Result<Vec<usize>> {
        Ok(self
            .variable(variable)?
            .dimensions()
            .iter()
            .map(netcdf::Dimension::len)
            .collect())
    }

    fn read_f64(&self, variable: &str) -> Result<Vec<f64>> {
        self.variable(variable)?
            .get_values::<f64, _>(..)
            .map_err(|e| dataset_error(&e))
    }

    fn read_i32(&self, variable: &str) -> Result<Vec<i32>> {
        self.variable(variable)?
            .get_values::<i32, _>(..)
            .map_err(|e| dataset_error(&e))
    }
}
