//! Regular cell-centred XYZT field, the layer built from ingested variables.

use super::geometry::Geometry;
use super::interp::bilinear;
use crate::core_types::Vec3;
use crate::error::{DataError, Result};
use crate::field::{BoundsMode, FieldArray};

/// Gridded field sampled at cell centres
///
/// Bilinear in x/y, nearest level in z, linear between neighbouring time
/// slices. Coordinates beyond the outermost centres take the edge value.
#[derive(Debug, Clone)]
pub struct GriddedLayer {
    key: String,
    array: FieldArray<f64>,
    geometry: Geometry,
}

impl GriddedLayer {
    #[must_use]
    pub fn new(key: impl Into<String>, array: FieldArray<f64>, geometry: Geometry) -> Self {
        Self {
            key: key.into(),
            array,
            geometry,
        }
    }

    /// Layer over `origin..origin+extent` and `t0..t0+span`, spacing derived
    /// from the array's extents.
    #[must_use]
    pub fn spanning(key: impl Into<String>, array: FieldArray<f64>, origin: Vec3, extent: Vec3, t0: f64, span: f64) -> Self {
        let geometry = Geometry::regular(origin, extent, t0, span, array.extents());
        Self::new(key, array, geometry)
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
    pub fn array(&self) -> &FieldArray<f64> {
        &self.array
    }

    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        self.array.set_bounds_mode(mode);
    }

    #[must_use]
    pub fn value_at(&self, loc: &Vec3, time: f64) -> f64 {
        let [nx, ny, nz, nt] = self.array.extents();
        let g = &self.geometry;
        let u = centred(loc.x, g.origin.x, g.spacing.x, nx);
        let v = centred(loc.y, g.origin.y, g.spacing.y, ny);
        let k = centred(loc.z, g.origin.z, g.spacing.z, nz).round() as usize;
        if nt < 2 {
            return bilinear(&self.array, u, v, k, 0);
        }
        let w = centred(time, g.time_origin, g.time_step(nt), nt);
        let l0 = (w.floor() as usize).min(nt - 2);
        let alpha = w - l0 as f64;
        let before = bilinear(&self.array, u, v, k, l0);
        let after = bilinear(&self.array, u, v, k, l0 + 1);
        (1.0 - alpha) * before + alpha * after
    }

    /// Overwrite the field from a column-major buffer of the same size.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] on a wrong element count.
    pub fn inject(&mut self, data: &[f64]) -> Result<()> {
        if data.len() != self.array.len() {
            return Err(DataError::SizeMismatch {
                expected: self.array.len(),
                actual: data.len(),
            });
        }
        self.array.from_foreign_layout(data)
    }
}

/// Fractional cell-centre coordinate of `coord` on an axis of `n` cells,
/// clamped to `[0, n-1]`.
fn centred(coord: f64, origin: f64, step: f64, n: usize) -> f64 {
    if n < 2 || step <= 0.0 {
        return 0.0;
    }
    ((coord - origin) / step - 0.5).clamp(0.0, (n - 1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bilinear_between_centres() {
        let mut array = FieldArray::new_2d("altitude", 0.0, 3, 2);
        for i in 0..3 {
            for j in 0..2 {
                array.set_2d(i, j, 10.0 * i as f64 + j as f64);
            }
        }
        let layer = GriddedLayer::spanning("altitude", array, Vec3::zeros(), Vec3::new(30.0, 20.0, 0.0), 0.0, 0.0);
        // Centres at x = 5, 15, 25 and y = 5, 15.
        assert_abs_diff_eq!(layer.value_at(&Vec3::new(10.0, 5.0, 0.0), 0.0), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.value_at(&Vec3::new(25.0, 10.0, 0.0), 0.0), 20.5, epsilon = 1e-12);
        // Edge clamp outside the centres.
        assert_abs_diff_eq!(layer.value_at(&Vec3::new(-50.0, 100.0, 0.0), 0.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_between_time_slices() {
        let mut array = FieldArray::new("temperature", 0.0, [1, 1, 1, 2]);
        array.set(0, 0, 0, 0, 280.0);
        array.set(0, 0, 0, 1, 290.0);
        let layer = GriddedLayer::spanning("temperature", array, Vec3::zeros(), Vec3::new(10.0, 10.0, 0.0), 0.0, 200.0);
        // Slice centres at t = 50 and t = 150.
        let p = Vec3::new(5.0, 5.0, 0.0);
        assert_abs_diff_eq!(layer.value_at(&p, 100.0), 285.0, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.value_at(&p, 0.0), 280.0, epsilon = 1e-12);
        assert_abs_diff_eq!(layer.value_at(&p, 1e6), 290.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inject_validates_count() {
        let mut layer = GriddedLayer::spanning("moisture", FieldArray::new_2d("m", 0.1, 2, 2), Vec3::zeros(), Vec3::new(2.0, 2.0, 0.0), 0.0, 0.0);
        assert!(layer.inject(&[0.2; 3]).is_err());
        layer.inject(&[0.1, 0.2, 0.3, 0.4]).unwrap();
        // Column-major: x varies fastest.
        assert_eq!(layer.array().get_2d(1, 0), 0.2);
        assert_eq!(layer.array().get_2d(0, 1), 0.3);
    }
}
