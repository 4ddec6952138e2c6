//! In-memory dataset.

use super::{AttrValue, ScientificDataset};
use crate::error::{DataError, Result};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Payload {
    Float(Vec<f64>),
    Int(Vec<i32>),
}

#[derive(Debug, Clone)]
struct Variable {
    dimensions: Vec<usize>,
    payload: Payload,
    attributes: BTreeMap<String, AttrValue>,
}

/// Dataset held in memory, built variable by variable
///
/// Used by hosts that already have their fields in memory and by tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    variables: BTreeMap<String, Variable>,
}

impl MemoryDataset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a floating-point variable.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] when `values` does not hold the
    /// product of `dimensions`.
    pub fn add_f64(&mut self, name: &str, dimensions: &[usize], values: Vec<f64>) -> Result<&mut Self> {
        check_len(dimensions, values.len())?;
        self.insert(name, dimensions, Payload::Float(values));
        Ok(self)
    }

    /// Add (or replace) an integer variable.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] when `values` does not hold the
    /// product of `dimensions`.
    pub fn add_i32(&mut self, name: &str, dimensions: &[usize], values: Vec<i32>) -> Result<&mut Self> {
        check_len(dimensions, values.len())?;
        self.insert(name, dimensions, Payload::Int(values));
        Ok(self)
    }

    /// Add a payload-less variable, such as `domain`.
    pub fn add_scalar(&mut self, name: &str) -> &mut Self {
        self.insert(name, &[], Payload::Float(vec![0.0]));
        self
    }

    /// Set an attribute, creating a payload-less variable if needed.
    pub fn set_attribute(&mut self, variable: &str, name: &str, value: impl Into<AttrValue>) -> &mut Self {
        if !self.variables.contains_key(variable) {
            self.add_scalar(variable);
        }
        if let Some(var) = self.variables.get_mut(variable) {
            var.attributes.insert(name.to_string(), value.into());
        }
        self
    }

    fn insert(&mut self, name: &str, dimensions: &[usize], payload: Payload) {
        let attributes = self
            .variables
            .remove(name)
            .map(|old| old.attributes)
            .unwrap_or_default();
        self.variables.insert(
            name.to_string(),
            Variable {
                dimensions: dimensions.to_vec(),
                payload,
                attributes,
            },
        );
    }

    fn variable(&self, name: &str) -> Result<&Variable> {
        self.variables
            .get(name)
            .ok_or_else(|| DataError::Dataset(format!("no variable '{name}'")))
    }
}

fn check_len(dimensions: &[usize], actual: usize) -> Result<()> {
    let expected: usize = dimensions.iter().product();
    if expected == actual {
        Ok(())
    } else {
        Err(DataError::SizeMismatch { expected, actual })
    }
}

impl ScientificDataset for MemoryDataset {
    fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }

    fn attribute(&self, variable: &str, name: &str) -> Option<AttrValue> {
        self.variables.get(variable)?.attributes.get(name).cloned()
    }

    fn attributes(&self, variable: &str) -> Vec<(String, AttrValue)> {
        self.variables
            .get(variable)
            .map(|var| {
                var.attributes
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn dimensions(&self, variable: &str) -> Result<Vec<usize>> {
        Ok(self.variable(variable)?.dimensions.clone())
    }

    fn read_f64(&self, variable: &str) -> Result<Vec<f64>> {
        Ok(match &self.variable(variable)?.payload {
            Payload::Float(values) => values.clone(),
            Payload::Int(values) => values.iter().map(|&v| f64::from(v)).collect(),
        })
    }

    fn read_i32(&self, variable: &str) -> Result<Vec<i32>> {
        Ok(match &self.variable(variable)?.payload {
            Payload::Float(values) => values.iter().map(|&v| v.round() as i32).collect(),
            Payload::Int(values) => values.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_reads() {
        let mut dataset = MemoryDataset::new();
        dataset
            .add_i32("fuel", &[2, 3], vec![1, 2, 3, 4, 5, 6])
            .unwrap()
            .set_attribute("fuel", "type", "fuel");
        dataset.set_attribute("domain", "Lx", 1000.0);

        assert_eq!(dataset.variable_names(), vec!["domain".to_string(), "fuel".to_string()]);
        assert_eq!(dataset.dimensions("fuel").unwrap(), vec![2, 3]);
        assert_eq!(dataset.read_f64("fuel").unwrap()[5], 6.0);
        assert_eq!(dataset.attribute("fuel", "type"), Some(AttrValue::from("fuel")));
        assert_eq!(dataset.attribute("domain", "Lx").unwrap().as_f64(), Some(1000.0));
        assert!(dataset.read_f64("wind").is_err());
    }

    #[test]
    fn test_wrong_payload_size_rejected() {
        let mut dataset = MemoryDataset::new();
        assert!(matches!(
            dataset.add_f64("altitude", &[2, 2], vec![0.0; 3]),
            Err(DataError::SizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_replacing_payload_keeps_attributes() {
        let mut dataset = MemoryDataset::new();
        dataset.set_attribute("altitude", "type", "data");
        dataset.add_f64("altitude", &[1, 2], vec![1.0, 2.0]).unwrap();
        assert_eq!(dataset.attributes("altitude").len(), 1);
    }
}
