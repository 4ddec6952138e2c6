//! Interpolation kernels shared by the gridded layer kinds.

use crate::field::FieldArray;

/// Bilinear interpolation at fractional node coordinates `(u, v)`.
///
/// Node `(i, j)` sits at integer coordinates. The lower corner is clamped to
/// `[0, n-2]` on each axis so the four neighbours always exist; an axis with a
/// single node contributes that node only.
#[must_use]
pub(crate) fn bilinear(array: &FieldArray<f64>, u: f64, v: f64, k: usize, l: usize) -> f64 {
    let (i0, fu) = lower_node(u, array.nx());
    let (j0, fv) = lower_node(v, array.ny());
    let i1 = (i0 + 1).min(array.nx() - 1);
    let j1 = (j0 + 1).min(array.ny() - 1);

    let sw = array.get(i0, j0, k, l);
    let se = array.get(i1, j0, k, l);
    let nw = array.get(i0, j1, k, l);
    let ne = array.get(i1, j1, k, l);

    (1.0 - fu) * (1.0 - fv) * sw + fu * (1.0 - fv) * se + (1.0 - fu) * fv * nw + fu * fv * ne
}

/// Lower node index and fractional weight of `coord` on an axis of `n` nodes.
fn lower_node(coord: f64, n: usize) -> (usize, f64) {
    if n < 2 {
        return (0, 0.0);
    }
    let lower = (coord.ceil() - 1.0).clamp(0.0, (n - 2) as f64);
    (lower as usize, coord - lower)
}

/// Linear blend of two samples taken at `t1` and `t2`.
///
/// The weight of the `t1` sample is `(t2 - t) / (t2 - t1)`. Equal times
/// return the `t2` sample unchanged.
#[inline]
#[must_use]
pub(crate) fn blend_in_time(at_t1: f64, at_t2: f64, t1: f64, t2: f64, t: f64) -> f64 {
    if t1 == t2 {
        return at_t2;
    }
    let alpha = (t2 - t) / (t2 - t1);
    alpha * at_t1 + (1.0 - alpha) * at_t2
}
