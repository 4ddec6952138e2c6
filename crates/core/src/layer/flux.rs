//! Raster of flux-model indices.
//!
//! Each cell carries the index of the flux model active there. The binding
//! from index to model name comes from the `indices` / `model<N>name`
//! attributes of the ingested variable.

use super::geometry::Geometry;
use crate::core_types::Vec3;
use crate::error::Result;
use crate::field::{BoundsMode, FieldArray};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct FluxLayer {
    key: String,
    indices: FieldArray<i32>,
    geometry: Geometry,
    models: BTreeMap<i32, String>,
}

impl FluxLayer {
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        indices: FieldArray<i32>,
        origin: Vec3,
        extent: Vec3,
        t0: f64,
        span: f64,
        models: BTreeMap<i32, String>,
    ) -> Self {
        let geometry = Geometry::regular(origin, extent, t0, span, indices.extents());
        Self {
            key: key.into(),
            indices,
            geometry,
            models,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    #[must_use]
    pub fn indices(&self) -> &FieldArray<i32> {
        &self.indices
    }

    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        self.indices.set_bounds_mode(mode);
    }

    /// Model name bound to flux index `index`
    #[must_use]
    pub fn model_name(&self, index: i32) -> Option<&str> {
        self.models.get(&index).map(String::as_str)
    }

    #[must_use]
    pub fn models(&self) -> &BTreeMap<i32, String> {
        &self.models
    }

    /// Flux model index at `(loc, time)`, 0 outside the raster.
    #[must_use]
    pub fn index_at(&self, loc: &Vec3, time: f64) -> i32 {
        self.geometry
            .locate(loc, time, self.indices.extents())
            .map_or(0, |[i, j, k, l]| self.indices.get(i, j, k, l))
    }

    #[must_use]
    pub fn value_at(&self, loc: &Vec3, time: f64) -> f64 {
        f64::from(self.index_at(loc, time))
    }

    #[must_use]
    pub fn snapshot(&self) -> FieldArray<f64> {
        let data = self.indices.data().iter().map(|&index| f64::from(index)).collect();
        FieldArray::from_vec(self.key.clone(), self.indices.extents(), data)
            .unwrap_or_else(|_| FieldArray::new(self.key.clone(), 0.0, self.indices.extents()))
    }

    /// Replace the indices from a column-major buffer, values rounded.
    ///
    /// # Errors
    ///
    /// Returns a size mismatch when the buffer does not match the raster.
    pub fn inject(&mut self, data: &[f64]) -> Result<()> {
        let indices: Vec<i32> = data.iter().map(|v| v.round() as i32).collect();
        self.indices.from_foreign_layout(&indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_lookup_and_binding() {
        let mut indices = FieldArray::new_2d("heatFlux", 0, 2, 1);
        indices.set_2d(1, 0, 2);
        let models = BTreeMap::from([(2, "HeatFluxBasic".to_string())]);
        let layer = FluxLayer::new("heatFlux", indices, Vec3::zeros(), Vec3::new(20.0, 10.0, 0.0), 0.0, 0.0, models);
        assert_eq!(layer.index_at(&Vec3::new(15.0, 5.0, 0.0), 0.0), 2);
        assert_eq!(layer.index_at(&Vec3::new(25.0, 5.0, 0.0), 0.0), 0);
        assert_eq!(layer.model_name(2), Some("HeatFluxBasic"));
        assert_eq!(layer.model_name(1), None);
        assert_eq!(layer.snapshot().get_2d(1, 0), 2.0);
    }
}
