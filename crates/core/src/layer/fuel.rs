//! Fuel-class lookup layer.
//!
//! Maps a location to an integer fuel index. Fuel properties live in the
//! broker's fuel table; models read them through their own dense
//! [`FuelMatrix`], which this layer indexes but never copies or owns.

use super::geometry::Geometry;
use crate::core_types::Vec3;
use crate::error::{DataError, Result};
use crate::field::{BoundsMode, FieldArray};
use crate::model::FuelMatrix;
use tracing::warn;

/// Horizontal resolution (m) of the fuel snapshot
pub const SNAPSHOT_RESOLUTION: f64 = 10.0;

/// Where the fuel index comes from
#[derive(Debug, Clone)]
pub enum FuelSource {
    /// Same index everywhere
    Uniform(i32),
    /// One index per raster cell
    Raster(FieldArray<i32>),
}

#[derive(Debug, Clone)]
pub struct FuelLayer {
    key: String,
    source: FuelSource,
    geometry: Geometry,
}

impl FuelLayer {
    #[must_use]
    pub fn uniform(key: impl Into<String>, index: i32, geometry: Geometry) -> Self {
        Self {
            key: key.into(),
            source: FuelSource::Uniform(index),
            geometry,
        }
    }

    /// Raster layer; spacing follows from `geometry.extent / raster extents`.
    #[must_use]
    pub fn raster(key: impl Into<String>, raster: FieldArray<i32>, origin: Vec3, extent: Vec3, t0: f64, span: f64) -> Self {
        let geometry = Geometry::regular(origin, extent, t0, span, raster.extents());
        Self {
            key: key.into(),
            source: FuelSource::Raster(raster),
            geometry,
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
    pub fn source(&self) -> &FuelSource {
        &self.source
    }

    /// Applies to the raster; a uniform source has no array.
    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        if let FuelSource::Raster(raster) = &mut self.source {
            raster.set_bounds_mode(mode);
        }
    }

    /// Fuel index at `(loc, time)`; 0 outside the raster on any axis.
    #[must_use]
    pub fn index_at(&self, loc: &Vec3, time: f64) -> usize {
        match &self.source {
            FuelSource::Uniform(index) => usize::try_from(*index).unwrap_or(0),
            FuelSource::Raster(raster) => self
                .geometry
                .locate(loc, time, raster.extents())
                .map_or(0, |[i, j, k, l]| usize::try_from(raster.get(i, j, k, l)).unwrap_or(0)),
        }
    }

    #[must_use]
    pub fn value_at(&self, loc: &Vec3, time: f64) -> f64 {
        self.index_at(loc, time) as f64
    }

    /// Copy the fuel parameters of the indexed fuel into `out[offset..]`.
    ///
    /// Returns the number of values written, the matrix width.
    pub fn extract(&self, loc: &Vec3, time: f64, fuel: &FuelMatrix, out: &mut [f64], offset: usize) -> usize {
        let row = fuel.row(self.index_at(loc, time));
        let Some(slots) = out.get_mut(offset..offset + row.len()) else {
            warn!(
                "Output buffer of {} values too short for {} fuel parameters at {}",
                out.len(),
                row.len(),
                offset
            );
            return 0;
        };
        slots.copy_from_slice(row);
        row.len()
    }

    /// Fuel indices sampled at [`SNAPSHOT_RESOLUTION`] cell centres over the
    /// layer's footprint.
    #[must_use]
    pub fn snapshot(&self, time: f64) -> FieldArray<f64> {
        let cells = |length: f64| ((length / SNAPSHOT_RESOLUTION).ceil() as usize).max(1);
        let (nx, ny) = (cells(self.geometry.extent.x), cells(self.geometry.extent.y));
        let mut array = FieldArray::new_2d(self.key.clone(), 0.0, nx, ny);
        for i in 0..nx {
            for j in 0..ny {
                let center = Vec3::new(
                    self.geometry.origin.x + (i as f64 + 0.5) * SNAPSHOT_RESOLUTION,
                    self.geometry.origin.y + (j as f64 + 0.5) * SNAPSHOT_RESOLUTION,
                    self.geometry.origin.z,
                );
                array.set_2d(i, j, self.value_at(&center, time));
            }
        }
        array
    }

    /// Fuel indices at the raster's own cell centres, for diagnostic dumps.
    #[must_use]
    pub fn raster_samples(&self, time: f64) -> FieldArray<f64> {
        let (nx, ny) = match &self.source {
            FuelSource::Uniform(_) => (1, 1),
            FuelSource::Raster(raster) => (raster.nx(), raster.ny()),
        };
        let mut array = FieldArray::new_2d(self.key.clone(), 0.0, nx, ny);
        for i in 0..nx {
            for j in 0..ny {
                array.set_2d(i, j, self.value_at(&self.geometry.cell_center(i, j), time));
            }
        }
        array
    }

    /// Replace the fuel indices from a column-major buffer.
    ///
    /// Values are rounded to the nearest index.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] if the buffer does not match the
    /// raster (or is not a single value for a uniform layer).
    pub fn inject(&mut self, data: &[f64]) -> Result<()> {
        match &mut self.source {
            FuelSource::Uniform(index) => {
                if data.len() != 1 {
                    return Err(DataError::SizeMismatch {
                        expected: 1,
                        actual: data.len(),
                    });
                }
                *index = data[0].round() as i32;
                Ok(())
            }
            FuelSource::Raster(raster) => {
                let indices: Vec<i32> = data.iter().map(|v| v.round() as i32).collect();
                raster.from_foreign_layout(&indices)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_layer() -> FuelLayer {
        let mut raster = FieldArray::new_2d("fuel", 0, 2, 2);
        raster.set_2d(0, 0, 3);
        raster.set_2d(1, 0, 5);
        raster.set_2d(0, 1, 7);
        raster.set_2d(1, 1, 9);
        FuelLayer::raster("fuel", raster, Vec3::new(100.0, 100.0, 0.0), Vec3::new(20.0, 20.0, 0.0), 0.0, 0.0)
    }

    #[test]
    fn test_uniform_everywhere() {
        let layer = FuelLayer::uniform("fuel", 4, Geometry::default());
        for (x, t) in [(-1e6, 0.0), (0.0, 1e9), (37.5, -3.0)] {
            assert_eq!(layer.value_at(&Vec3::new(x, x, x), t), 4.0);
        }
    }

    #[test]
    fn test_raster_lookup_and_outside() {
        let layer = raster_layer();
        assert_eq!(layer.index_at(&Vec3::new(101.0, 101.0, 0.0), 0.0), 3);
        assert_eq!(layer.index_at(&Vec3::new(115.0, 119.0, 0.0), 0.0), 9);
        assert_eq!(layer.index_at(&Vec3::new(99.0, 101.0, 0.0), 0.0), 0);
        assert_eq!(layer.index_at(&Vec3::new(101.0, 120.0, 0.0), 0.0), 0);
    }

    #[test]
    fn test_extract_copies_matrix_row() {
        let layer = raster_layer();
        let mut matrix = FuelMatrix::new(vec!["h1".into(), "h10".into()]);
        matrix.set(5, 0, 1.5);
        matrix.set(5, 1, 2.5);
        let mut out = [9.0; 4];
        let written = layer.extract(&Vec3::new(112.0, 105.0, 0.0), 0.0, &matrix, &mut out, 1);
        assert_eq!(written, 2);
        assert_eq!(out, [9.0, 1.5, 2.5, 9.0]);
        assert_eq!(layer.extract(&Vec3::new(112.0, 105.0, 0.0), 0.0, &matrix, &mut out, 3), 0);
    }

    #[test]
    fn test_snapshot_at_ten_metres() {
        let snapshot = raster_layer().snapshot(0.0);
        assert_eq!(snapshot.extents(), [2, 2, 1, 1]);
        assert_eq!(snapshot.get_2d(1, 1), 9.0);
    }
}
