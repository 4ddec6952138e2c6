//! Spatial and temporal footprint shared by all layer kinds.

use crate::core_types::Vec3;
use serde::{Deserialize, Serialize};

/// Origin, per-axis spacing and extent of a layer, plus its time window.
///
/// Fixed when the layer is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// South-west-bottom corner
    pub origin: Vec3,
    /// Cell size per axis; 0 on an axis the layer does not resolve
    pub spacing: Vec3,
    /// Width, height, depth
    pub extent: Vec3,
    pub time_origin: f64,
    pub time_span: f64,
}

impl Geometry {
    /// Footprint split into `extents = [nx, ny, nz, nt]` regular cells.
    #[must_use]
    pub fn regular(origin: Vec3, extent: Vec3, time_origin: f64, time_span: f64, extents: [usize; 4]) -> Self {
        let step = |length: f64, n: usize| if n > 0 { length / n as f64 } else { length };
        Self {
            origin,
            spacing: Vec3::new(
                step(extent.x, extents[0]),
                step(extent.y, extents[1]),
                step(extent.z, extents[2]),
            ),
            extent,
            time_origin,
            time_span,
        }
    }

    /// Footprint between two corners with a single cell.
    #[must_use]
    pub fn spanning(sw: Vec3, ne: Vec3) -> Self {
        let extent = ne - sw;
        Self {
            origin: sw,
            spacing: extent,
            extent,
            time_origin: 0.0,
            time_span: 0.0,
        }
    }

    #[must_use]
    pub fn ne_corner(&self) -> Vec3 {
        self.origin + self.extent
    }

    /// Time step of a layer with `nt` time slices.
    #[must_use]
    pub fn time_step(&self, nt: usize) -> f64 {
        if nt > 0 {
            self.time_span / nt as f64
        } else {
            self.time_span
        }
    }

    /// Cell containing `(loc, time)` on a grid of `extents` cells.
    ///
    /// An axis with a single cell accepts any coordinate. Returns `None`
    /// when the coordinate lies outside the footprint on any other axis.
    #[must_use]
    pub fn locate(&self, loc: &Vec3, time: f64, extents: [usize; 4]) -> Option<[usize; 4]> {
        let axis = |coord: f64, origin: f64, step: f64, n: usize| -> Option<usize> {
            if n <= 1 {
                return Some(0);
            }
            if step <= 0.0 {
                return None;
            }
            let cell = ((coord - origin) / step).floor();
            (cell >= 0.0 && cell < n as f64).then_some(cell as usize)
        };
        Some([
            axis(loc.x, self.origin.x, self.spacing.x, extents[0])?,
            axis(loc.y, self.origin.y, self.spacing.y, extents[1])?,
            axis(loc.z, self.origin.z, self.spacing.z, extents[2])?,
            axis(time, self.time_origin, self.time_step(extents[3]), extents[3])?,
        ])
    }

    /// Centre of horizontal cell `(i, j)`.
    #[must_use]
    pub fn cell_center(&self, i: usize, j: usize) -> Vec3 {
        Vec3::new(
            self.origin.x + (i as f64 + 0.5) * self.spacing.x,
            self.origin.y + (j as f64 + 0.5) * self.spacing.y,
            self.origin.z,
        )
    }

    /// Whether this footprint overlaps the horizontal box `sw..ne` at all.
    #[must_use]
    pub fn overlaps(&self, sw: &Vec3, ne: &Vec3) -> bool {
        let own_ne = self.ne_corner();
        !(self.origin.x > ne.x || own_ne.x < sw.x || self.origin.y > ne.y || own_ne.y < sw.y)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::spanning(Vec3::zeros(), Vec3::zeros())
    }
}
