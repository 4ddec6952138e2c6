//! Broadcast layer returning one value everywhere.

use super::geometry::Geometry;
use crate::error::{DataError, Result};
use crate::field::{BoundsMode, FieldArray};

/// Single-cell field broadcast over its footprint and all times
#[derive(Debug, Clone)]
pub struct ConstantLayer {
    key: String,
    value: FieldArray<f64>,
    geometry: Geometry,
}

impl ConstantLayer {
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64, geometry: Geometry) -> Self {
        let key = key.into();
        Self {
            value: FieldArray::new(key.clone(), value, [1, 1, 1, 1]),
            key,
            geometry,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        self.value.data()[0]
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[must_use]
    pub fn array(&self) -> &FieldArray<f64> {
        &self.value
    }

    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        self.value.set_bounds_mode(mode);
    }

    /// Replace the broadcast value from a one-element buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] unless `data` holds exactly one value.
    pub fn inject(&mut self, data: &[f64]) -> Result<()> {
        if data.len() != 1 {
            return Err(DataError::SizeMismatch {
                expected: 1,
                actual: data.len(),
            });
        }
        self.value.copy_from(data)
    }
}
