//! Per-cell reductions of the arrival-time grid.
//!
//! Each snapshot evaluates one value per [`CellGrid`](crate::cell::CellGrid)
//! cell. The result is cached with the time it was computed for; a request at
//! the same time reuses it, any other time (earlier included) recomputes.

use super::geometry::Geometry;
use super::{LayerContext, Snapshot};
use crate::error::{DataError, Result};
use crate::field::{BoundsMode, FieldArray};
use std::cell::{Ref, RefCell};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionKind {
    /// Burnt fraction of each cell
    BurningRatio,
    /// Fastest front speed found in each cell
    MaxSpeed,
}

#[derive(Debug, Clone)]
struct ReductionCache {
    array: FieldArray<f64>,
    latest: Option<f64>,
    passes: usize,
}

#[derive(Debug, Clone)]
pub struct ReductionLayer {
    key: String,
    kind: ReductionKind,
    geometry: Geometry,
    cache: RefCell<ReductionCache>,
}

impl ReductionLayer {
    /// Reduction onto `nx x ny` cells covering `geometry`.
    #[must_use]
    pub fn new(key: impl Into<String>, kind: ReductionKind, geometry: Geometry, nx: usize, ny: usize) -> Self {
        let key = key.into();
        let cache = ReductionCache {
            array: FieldArray::new_2d(key.clone(), 0.0, nx, ny),
            latest: None,
            passes: 0,
        };
        Self {
            key,
            kind,
            geometry,
            cache: RefCell::new(cache),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn kind(&self) -> ReductionKind {
        self.kind
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        self.cache.get_mut().array.set_bounds_mode(mode);
    }

    /// Number of reductions computed so far
    #[must_use]
    pub fn passes(&self) -> usize {
        self.cache.borrow().passes
    }

    /// Time of the cached reduction, if any
    #[must_use]
    pub fn latest(&self) -> Option<f64> {
        self.cache.borrow().latest
    }

    /// Point lookups are not meaningful for whole-grid reductions.
    #[must_use]
    pub fn value_at(&self) -> f64 {
        warn!("Point lookup on {} should not be called, use its matrix", self.key);
        0.0
    }

    /// Reduced grid at `time`, recomputed unless cached for exactly `time`.
    ///
    /// Without a cell grid in the context the cached values are returned
    /// unchanged.
    pub fn matrix<'s>(&'s self, ctx: &LayerContext<'_>, time: f64) -> Snapshot<'s> {
        let stale = self.cache.borrow().latest != Some(time);
        if stale {
            match ctx.cells {
                Some(cells) => {
                    let mut cache = self.cache.borrow_mut();
                    if cache.array.nx() != cells.nx() || cache.array.ny() != cells.ny() {
                        cache.array.resize([cells.nx(), cells.ny(), 1, 1]);
                    }
                    for i in 0..cells.nx() {
                        for j in 0..cells.ny() {
                            let value = match self.kind {
                                ReductionKind::BurningRatio => cells.cell_burning_ratio(i, j, time),
                                ReductionKind::MaxSpeed => cells.cell_max_speed(i, j, time),
                            };
                            cache.array.set_2d(i, j, value);
                        }
                    }
                    cache.latest = Some(time);
                    cache.passes += 1;
                    debug!("Recomputed {} at t={}", self.key, time);
                }
                None => warn!("No cell grid to reduce {} over", self.key),
            }
        }
        Snapshot::Cached(Ref::map(self.cache.borrow(), |cache| &cache.array))
    }

    /// Overwrite the cached grid from a column-major buffer, stamped `time`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] on a wrong element count.
    pub fn inject(&mut self, data: &[f64], time: f64) -> Result<()> {
        let cache = self.cache.get_mut();
        if data.len() != cache.array.len() {
            return Err(DataError::SizeMismatch {
                expected: cache.array.len(),
                actual: data.len(),
            });
        }
        cache.array.from_foreign_layout(data)?;
        cache.latest = Some(time);
        Ok(())
    }
}
