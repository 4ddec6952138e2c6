//! Dense four-axis numeric array backing every gridded data layer.
//!
//! Storage is a flat `Vec<T>` in native `(x, y, z, t)`-major order:
//! `index = i*ny*nz*nt + j*nz*nt + k*nt + l`. Unused trailing axes have
//! extent 1, so a 2D field is simply `(nx, ny, 1, 1)`.
//!
//! Element access never fails. An out-of-range coordinate is clamped to the
//! last valid index on its axis and a warning is logged, so a read or write
//! always lands on *some* cell. Callers that want a hard failure use the
//! `try_*` accessors with [`BoundsMode::Strict`].

use super::element::Element;
use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::warn;

/// Out-of-range policy of the `try_*` accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BoundsMode {
    /// Clamp each axis to its last valid index and log a warning
    #[default]
    ClampAndWarn,
    /// Reject the access with [`DataError::OutOfBounds`]
    Strict,
}

/// Dense array with up to four axes
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArray<T: Element> {
    name: String,
    extents: [usize; 4],
    data: Vec<T>,
    bounds: BoundsMode,
}

impl<T: Element> FieldArray<T> {
    /// Create an array filled with `value`.
    ///
    /// # Arguments
    ///
    /// * `name` - Diagnostic name used in log messages
    /// * `value` - Initial value of every cell
    /// * `extents` - `[nx, ny, nz, nt]`; a zero extent is raised to 1
    #[must_use]
    pub fn new(name: impl Into<String>, value: T, extents: [usize; 4]) -> Self {
        let name = name.into();
        let extents = sanitize_extents(&name, extents);
        let len = extents.iter().product();
        Self {
            name,
            extents,
            data: vec![value; len],
            bounds: BoundsMode::ClampAndWarn,
        }
    }

    /// 2D convenience constructor, `(nx, ny, 1, 1)`.
    #[must_use]
    pub fn new_2d(name: impl Into<String>, value: T, nx: usize, ny: usize) -> Self {
        Self::new(name, value, [nx, ny, 1, 1])
    }

    /// Wrap an existing native-order buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] if `data.len()` differs from the
    /// product of the extents.
    pub fn from_vec(name: impl Into<String>, extents: [usize; 4], data: Vec<T>) -> Result<Self> {
        let name = name.into();
        let extents = sanitize_extents(&name, extents);
        let expected: usize = extents.iter().product();
        if data.len() != expected {
            return Err(DataError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            name,
            extents,
            data,
            bounds: BoundsMode::ClampAndWarn,
        })
    }

    /// Select the out-of-range policy of the `try_*` accessors.
    #[must_use]
    pub fn with_bounds_mode(mut self, mode: BoundsMode) -> Self {
        self.bounds = mode;
        self
    }

    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        self.bounds = mode;
    }

    #[must_use]
    pub fn bounds_mode(&self) -> BoundsMode {
        self.bounds
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `[nx, ny, nz, nt]`
    #[must_use]
    pub fn extents(&self) -> [usize; 4] {
        self.extents
    }

    #[must_use]
    pub fn nx(&self) -> usize {
        self.extents[0]
    }

    #[must_use]
    pub fn ny(&self) -> usize {
        self.extents[1]
    }

    #[must_use]
    pub fn nz(&self) -> usize {
        self.extents[2]
    }

    #[must_use]
    pub fn nt(&self) -> usize {
        self.extents[3]
    }

    /// Total number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat storage in native order
    #[must_use]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Flat index of `(i, j, k, l)` with every axis clamped into range.
    ///
    /// Logs a warning when any coordinate had to be clamped.
    #[inline]
    #[must_use]
    pub fn index(&self, i: usize, j: usize, k: usize, l: usize) -> usize {
        let [nx, ny, nz, nt] = self.extents;
        if i >= nx || j >= ny || k >= nz || l >= nt {
            warn!(
                "Array {}({},{},{},{}) out of bounds, size {}:{}:{}:{}",
                self.name, i, j, k, l, nx, ny, nz, nt
            );
        }
        let (i, j, k, l) = (
            i.min(nx - 1),
            j.min(ny - 1),
            k.min(nz - 1),
            l.min(nt - 1),
        );
        i * ny * nz * nt + j * nz * nt + k * nt + l
    }

    /// Flat index of `(i, j, k, l)` under the array's [`BoundsMode`].
    ///
    /// # Errors
    ///
    /// In [`BoundsMode::Strict`], returns [`DataError::OutOfBounds`] naming
    /// the first offending axis.
    pub fn try_index(&self, i: usize, j: usize, k: usize, l: usize) -> Result<usize> {
        if self.bounds == BoundsMode::Strict {
            for (axis, (&index, &extent)) in [i, j, k, l].iter().zip(&self.extents).enumerate() {
                if index >= extent {
                    return Err(DataError::OutOfBounds {
                        array: self.name.clone(),
                        axis,
                        index,
                        extent,
                    });
                }
            }
        }
        Ok(self.index(i, j, k, l))
    }

    /// Value at `(i, j, k, l)`, clamped into range.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize, j: usize, k: usize, l: usize) -> T {
        self.data[self.index(i, j, k, l)]
    }

    /// Value at `(i, j)` of the first z/t slice.
    #[inline]
    #[must_use]
    pub fn get_2d(&self, i: usize, j: usize) -> T {
        self.get(i, j, 0, 0)
    }

    /// Store `value` at `(i, j, k, l)`, clamped into range.
    #[inline]
    pub fn set(&mut self, i: usize, j: usize, k: usize, l: usize, value: T) {
        let idx = self.index(i, j, k, l);
        self.data[idx] = value;
    }

    #[inline]
    pub fn set_2d(&mut self, i: usize, j: usize, value: T) {
        self.set(i, j, 0, 0, value);
    }

    /// Mutable reference to the (clamped) cell at `(i, j, k, l)`.
    pub fn at_mut(&mut self, i: usize, j: usize, k: usize, l: usize) -> &mut T {
        let idx = self.index(i, j, k, l);
        &mut self.data[idx]
    }

    /// # Errors
    ///
    /// See [`FieldArray::try_index`].
    pub fn try_get(&self, i: usize, j: usize, k: usize, l: usize) -> Result<T> {
        Ok(self.data[self.try_index(i, j, k, l)?])
    }

    /// # Errors
    ///
    /// See [`FieldArray::try_index`].
    pub fn try_set(&mut self, i: usize, j: usize, k: usize, l: usize, value: T) -> Result<()> {
        let idx = self.try_index(i, j, k, l)?;
        self.data[idx] = value;
        Ok(())
    }

    /// Reallocate to new extents, discarding contents and zero-filling.
    pub fn resize(&mut self, extents: [usize; 4]) {
        self.extents = sanitize_extents(&self.name, extents);
        self.data = vec![T::default(); self.extents.iter().product()];
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Overwrite all values from a native-order slice of equal length.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] when the lengths differ; the array
    /// is left unchanged.
    pub fn copy_from(&mut self, src: &[T]) -> Result<()> {
        if src.len() != self.data.len() {
            return Err(DataError::SizeMismatch {
                expected: self.data.len(),
                actual: src.len(),
            });
        }
        self.data.copy_from_slice(src);
        Ok(())
    }

    #[must_use]
    pub fn sum(&self) -> T {
        self.data.iter().fold(T::default(), |acc, &v| acc + v)
    }

    /// Smallest element, `T::default()` for an empty array.
    #[must_use]
    pub fn min(&self) -> T {
        self.data
            .iter()
            .copied()
            .reduce(|a, b| if b < a { b } else { a })
            .unwrap_or_default()
    }

    /// Largest element, `T::default()` for an empty array.
    #[must_use]
    pub fn max(&self) -> T {
        self.data
            .iter()
            .copied()
            .reduce(|a, b| if b > a { b } else { a })
            .unwrap_or_default()
    }

    /// Flat index of `(i, j, k, l)` in the foreign column-major layout,
    /// where `i` varies fastest.
    #[inline]
    fn foreign_index(&self, i: usize, j: usize, k: usize, l: usize) -> usize {
        let [nx, ny, nz, _] = self.extents;
        l * nx * ny * nz + k * nx * ny + j * nx + i
    }

    /// Copy into a column-major `(t, z, y, x)` buffer, `x` fastest.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] if `out` is not exactly `len()` long.
    pub fn to_foreign_layout(&self, out: &mut [T]) -> Result<()> {
        if out.len() != self.data.len() {
            return Err(DataError::SizeMismatch {
                expected: self.data.len(),
                actual: out.len(),
            });
        }
        self.write_foreign(out);
        Ok(())
    }

    /// Column-major copy as a new vector.
    #[must_use]
    pub fn to_foreign_vec(&self) -> Vec<T> {
        let mut out = vec![T::default(); self.data.len()];
        self.write_foreign(&mut out);
        out
    }

    /// `out` must be `len()` long.
    fn write_foreign(&self, out: &mut [T]) {
        let [nx, ny, nz, nt] = self.extents;
        let mut native = 0;
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    for l in 0..nt {
                        out[self.foreign_index(i, j, k, l)] = self.data[native];
                        native += 1;
                    }
                }
            }
        }
    }

    /// Overwrite contents from a column-major `(t, z, y, x)` buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] if `src` is not exactly `len()`
    /// long; the array is left unchanged.
    pub fn from_foreign_layout(&mut self, src: &[T]) -> Result<()> {
        if src.len() != self.data.len() {
            return Err(DataError::SizeMismatch {
                expected: self.data.len(),
                actual: src.len(),
            });
        }
        let [nx, ny, nz, nt] = self.extents;
        let mut native = 0;
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    for l in 0..nt {
                        self.data[native] = src[self.foreign_index(i, j, k, l)];
                        native += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Build an array from a column-major buffer with the given extents.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] if `src` does not hold exactly
    /// `nx*ny*nz*nt` elements.
    pub fn from_foreign(name: impl Into<String>, extents: [usize; 4], src: &[T]) -> Result<Self> {
        let mut array = Self::new(name, T::default(), extents);
        array.from_foreign_layout(src)?;
        Ok(array)
    }

    /// Text rendering of the x/y plane at `(k, l)`, rows from north to south.
    #[must_use]
    pub fn print_2d(&self, k: usize, l: usize) -> String {
        let [nx, ny, _, _] = self.extents;
        let mut out = String::new();
        for j in (0..ny).rev() {
            for i in 0..nx {
                let _ = write!(out, "{} ", self.get(i, j, k, l));
            }
            out.push('\n');
        }
        out
    }
}

fn sanitize_extents(name: &str, extents: [usize; 4]) -> [usize; 4] {
    if extents.contains(&0) {
        warn!("Array {name} requested with a zero extent {extents:?}, using 1");
    }
    extents.map(|n| n.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_native_index_order() {
        let mut array = FieldArray::new("a", 0.0_f64, [3, 4, 2, 5]);
        array.set(2, 1, 1, 3, 7.5);
        let idx = 2 * 4 * 2 * 5 + 4 * 5 + 5 + 3;
        assert_eq!(array.data()[idx], 7.5);
        assert_eq!(array.get(2, 1, 1, 3), 7.5);
    }

    #[test]
    fn test_in_range_round_trip() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut array = FieldArray::new("rt", 0.0_f64, [6, 5, 3, 2]);
        for _ in 0..200 {
            let (i, j, k, l) = (
                rng.random_range(0..6),
                rng.random_range(0..5),
                rng.random_range(0..3),
                rng.random_range(0..2),
            );
            let v: f64 = rng.random_range(-100.0..100.0);
            array.set(i, j, k, l, v);
            assert_eq!(array.get(i, j, k, l), v);
        }
    }

    #[test]
    fn test_out_of_range_write_lands_on_clamped_cell() {
        let mut array = FieldArray::new_2d("clamp", 0.0_f64, 4, 3);
        array.set_2d(10, 1, 42.0);
        assert_eq!(array.get_2d(3, 1), 42.0);
        array.set(1, 99, 7, 3, -1.0);
        assert_eq!(array.get_2d(1, 2), -1.0);
        assert_eq!(array.get(100, 100, 100, 100), array.get_2d(3, 2));
    }

    #[test]
    fn test_strict_mode_rejects() {
        let array = FieldArray::new_2d("strict", 1.0_f64, 2, 2).with_bounds_mode(BoundsMode::Strict);
        assert!(array.try_get(1, 1, 0, 0).is_ok());
        match array.try_get(0, 2, 0, 0) {
            Err(DataError::OutOfBounds { axis, index, extent, .. }) => {
                assert_eq!((axis, index, extent), (1, 2, 2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_clamp_mode_try_get_clamps() {
        let mut array = FieldArray::new_2d("lenient", 0.0_f64, 2, 2);
        array.set_2d(1, 1, 3.0);
        assert_eq!(array.try_get(5, 5, 0, 0).ok(), Some(3.0));
    }

    #[test]
    fn test_resize_zero_fills() {
        let mut array = FieldArray::new_2d("r", 9.0_f64, 2, 2);
        array.resize([3, 3, 1, 1]);
        assert_eq!(array.len(), 9);
        assert!(array.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zero_extent_raised_to_one() {
        let array = FieldArray::new("z", 1_i32, [0, 3, 0, 0]);
        assert_eq!(array.extents(), [1, 3, 1, 1]);
    }

    #[test]
    fn test_reductions() {
        let array = FieldArray::from_vec("v", [2, 2, 1, 1], vec![3.0, -1.0, 5.0, 2.0]).unwrap();
        assert_eq!(array.sum(), 9.0);
        assert_eq!(array.min(), -1.0);
        assert_eq!(array.max(), 5.0);
    }

    #[test]
    fn test_foreign_layout_transpose() {
        // Column-major: x fastest. For nx=3, ny=2 the foreign buffer is rows of x.
        let foreign = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let array = FieldArray::from_foreign("f", [3, 2, 1, 1], &foreign).unwrap();
        assert_eq!(array.get_2d(0, 0), 1.0);
        assert_eq!(array.get_2d(2, 0), 3.0);
        assert_eq!(array.get_2d(0, 1), 4.0);
        assert_eq!(array.get_2d(2, 1), 6.0);
        assert_eq!(array.data(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(array.to_foreign_vec(), foreign.to_vec());
    }

    #[test]
    fn test_foreign_layout_four_axes() {
        let extents = [2, 3, 2, 2];
        let foreign: Vec<f64> = (0..24).map(f64::from).collect();
        let array = FieldArray::from_foreign("f4", extents, &foreign).unwrap();
        // foreign index of (1, 2, 1, 1) = 1*12 + 1*6 + 2*2 + 1
        assert_eq!(array.get(1, 2, 1, 1), 23.0);
        assert_eq!(array.get(1, 0, 0, 1), 13.0);
        assert_eq!(array.to_foreign_vec(), foreign);
    }

    #[test]
    fn test_foreign_size_mismatch_leaves_array() {
        let mut array = FieldArray::new_2d("m", 5.0_f64, 2, 2);
        assert!(array.from_foreign_layout(&[1.0, 2.0]).is_err());
        assert!(array.data().iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_foreign_copy_checks_length() {
        let mut array = FieldArray::new_2d("c", 0.0_f64, 3, 2);
        array.set_2d(2, 0, 1.0);
        array.set_2d(0, 1, 2.0);
        let mut short = vec![0.0; 5];
        assert!(array.to_foreign_layout(&mut short).is_err());
        let mut out = vec![-1.0; 6];
        array.to_foreign_layout(&mut out).unwrap();
        assert_eq!(out, array.to_foreign_vec());
        assert_eq!(out, vec![0.0, 0.0, 1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_print_2d_rows() {
        let array = FieldArray::from_vec("p", [2, 2, 1, 1], vec![1_i32, 2, 3, 4]).unwrap();
        assert_eq!(array.print_2d(0, 0), "2 4 \n1 3 \n");
    }
}
