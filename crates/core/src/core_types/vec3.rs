//! Vector type alias for 3D positions and directions.

use nalgebra::Vector3;

/// 3D vector type for positions, outward normals, and layer extents.
///
/// Alias for `nalgebra::Vector3<f64>`. Coordinates are projected metres
/// (x east, y north, z up); field values are double precision throughout.
pub type Vec3 = Vector3<f64>;

/// Horizontal dot product, ignoring the vertical component.
///
/// Wind layers are two-dimensional, so the normal wind is computed in the
/// x/y plane only.
#[inline]
#[must_use]
pub fn dot_xy(a: &Vec3, b: &Vec3) -> f64 {
    a.x * b.x + a.y * b.y
}
