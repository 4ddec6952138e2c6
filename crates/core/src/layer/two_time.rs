//! Double-buffered gridded field interpolated in space and time.
//!
//! The layer holds the same field at two instants `t1 <= t2`. Each buffer is
//! the physically meaningful `(nx-2) x (ny-2)` interior surrounded by a
//! one-cell halo ring. Lookups interpolate bilinearly at both instants, then
//! linearly between them. Injecting a new snapshot rotates the buffers so the
//! previous `t2` field becomes `t1` and the old `t1` storage is reused for
//! the new `t2`; nothing is reallocated once the layer exists.

use super::geometry::Geometry;
use super::interp::{bilinear, blend_in_time};
use crate::core_types::Vec3;
use crate::error::{DataError, Result};
use crate::field::{BoundsMode, FieldArray, LoadStatus};
use std::fs::File;
use std::io::BufReader;
use std::mem;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Offset added to fractional indices before locating the lower node
const INDEX_EPSILON: f64 = 1e-3;

/// Lookups closer than this many cells to any edge return 0
const GUARD_CELLS: f64 = 3.0;

/// Result of stitching one producer's sub-window into the layer
#[derive(Debug)]
pub enum StitchOutcome {
    /// File found and its interior copied
    Stitched { path: PathBuf },
    /// No file for this sub-window; that part of the buffer is unchanged
    Missing { path: PathBuf },
    /// File found but its header was rejected; nothing copied
    Rejected { path: PathBuf, status: LoadStatus },
    /// File could not be read
    Failed { path: PathBuf, error: DataError },
}

impl StitchOutcome {
    #[must_use]
    pub fn is_stitched(&self) -> bool {
        matches!(self, StitchOutcome::Stitched { .. })
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            StitchOutcome::Stitched { path }
            | StitchOutcome::Missing { path }
            | StitchOutcome::Rejected { path, .. }
            | StitchOutcome::Failed { path, .. } => path,
        }
    }
}

/// Gridded field known at two times
#[derive(Debug, Clone)]
pub struct TwoTimeLayer {
    key: String,
    origin: Vec3,
    dx: f64,
    dy: f64,
    at_t1: FieldArray<f64>,
    at_t2: FieldArray<f64>,
    t1: f64,
    t2: f64,
    interior: FieldArray<f64>,
}

impl TwoTimeLayer {
    /// Create a layer from two halo-padded arrays of identical extents.
    ///
    /// # Arguments
    ///
    /// * `origin` - Location of node `(0, 0)` of the padded arrays
    /// * `spacing` - Node spacing, `x` and `y` used
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] if the two arrays differ in size.
    pub fn new(
        key: impl Into<String>,
        at_t1: FieldArray<f64>,
        t1: f64,
        at_t2: FieldArray<f64>,
        t2: f64,
        origin: Vec3,
        spacing: Vec3,
    ) -> Result<Self> {
        if at_t1.extents() != at_t2.extents() {
            return Err(DataError::SizeMismatch {
                expected: at_t1.len(),
                actual: at_t2.len(),
            });
        }
        let key = key.into();
        let interior = FieldArray::new_2d(
            format!("{key}.interior"),
            0.0,
            at_t1.nx().saturating_sub(2),
            at_t1.ny().saturating_sub(2),
        );
        Ok(Self {
            key,
            origin,
            dx: spacing.x,
            dy: spacing.y,
            at_t1,
            at_t2,
            t1,
            t2,
            interior,
        })
    }

    /// Layer holding `value` everywhere at both times, `nx x ny` padded nodes.
    #[must_use]
    pub fn uniform(key: impl Into<String>, value: f64, nx: usize, ny: usize, time: f64, origin: Vec3, spacing: Vec3) -> Self {
        let key = key.into();
        let array = FieldArray::new_2d(key.clone(), value, nx, ny);
        let interior = FieldArray::new_2d(format!("{key}.interior"), 0.0, nx.saturating_sub(2), ny.saturating_sub(2));
        Self {
            key,
            origin,
            dx: spacing.x,
            dy: spacing.y,
            at_t1: array.clone(),
            at_t2: array,
            t1: time,
            t2: time,
            interior,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// `(t1, t2)`
    #[must_use]
    pub fn times(&self) -> (f64, f64) {
        (self.t1, self.t2)
    }

    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        self.at_t1.set_bounds_mode(mode);
        self.at_t2.set_bounds_mode(mode);
        self.interior.set_bounds_mode(mode);
    }

    #[must_use]
    pub fn array_t1(&self) -> &FieldArray<f64> {
        &self.at_t1
    }

    #[must_use]
    pub fn array_t2(&self) -> &FieldArray<f64> {
        &self.at_t2
    }

    #[must_use]
    pub fn geometry(&self) -> Geometry {
        let (nx, ny) = (self.at_t2.nx() as f64, self.at_t2.ny() as f64);
        Geometry {
            origin: self.origin,
            spacing: Vec3::new(self.dx, self.dy, 0.0),
            extent: Vec3::new(self.dx * nx, self.dy * ny, 0.0),
            time_origin: self.t1,
            time_span: self.t2 - self.t1,
        }
    }

    /// Bilinear in space at `t1` and `t2`, linear in time between them.
    ///
    /// Returns 0 within three cells of any edge of the padded grid.
    #[must_use]
    pub fn value_at(&self, loc: &Vec3, time: f64) -> f64 {
        let u = (loc.x - self.origin.x) / self.dx + INDEX_EPSILON;
        let v = (loc.y - self.origin.y) / self.dy + INDEX_EPSILON;
        let (nx, ny) = (self.at_t2.nx() as f64, self.at_t2.ny() as f64);
        if !(GUARD_CELLS..=nx - GUARD_CELLS).contains(&u) || !(GUARD_CELLS..=ny - GUARD_CELLS).contains(&v) {
            return 0.0;
        }
        let at_t1 = bilinear(&self.at_t1, u, v, 0, 0);
        let at_t2 = bilinear(&self.at_t2, u, v, 0, 0);
        blend_in_time(at_t1, at_t2, self.t1, self.t2, time)
    }

    /// Rotate buffers and load a new `t2` interior from a column-major buffer.
    ///
    /// `data` must hold exactly `(nx-2) * (ny-2)` values. The halo ring of
    /// the new `t2` buffer is zero.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] on a wrong element count; the
    /// buffers are not rotated in that case.
    pub fn inject(&mut self, data: &[f64], time: f64) -> Result<()> {
        if data.len() != self.interior.len() {
            return Err(DataError::SizeMismatch {
                expected: self.interior.len(),
                actual: data.len(),
            });
        }
        self.rotate(time);
        self.interior.from_foreign_layout(data)?;
        self.copy_interior_to_t2();
        Ok(())
    }

    /// Swap buffers so the current `t2` becomes `t1`; `t2` storage is stale.
    fn rotate(&mut self, time: f64) {
        mem::swap(&mut self.at_t1, &mut self.at_t2);
        self.t1 = self.t2;
        self.t2 = time;
    }

    fn copy_interior_to_t2(&mut self) {
        let (nnx, nny) = (self.interior.nx(), self.interior.ny());
        self.at_t2.fill(0.0);
        for i in 0..nnx {
            for j in 0..nny {
                self.at_t2.set_2d(i + 1, j + 1, self.interior.get_2d(i, j));
            }
        }
    }

    /// Stitch per-process partial snapshots into a new `t2` buffer.
    ///
    /// Sub-window `n` (0-based) is read from `<pattern><n+1>.<key>` and
    /// placed at `placements[n] = (start_i, start_j)`. The stitch target is
    /// the current `t1` storage, so cells no file covers keep that buffer's
    /// older contents. Afterwards the previous `t2` becomes `t1` and the
    /// stitched buffer becomes `t2` at `ref_time`.
    pub fn stitch_partials(&mut self, pattern: &str, ref_time: f64, placements: &[(usize, usize)]) -> Vec<StitchOutcome> {
        let mut outcomes = Vec::with_capacity(placements.len());
        for (n, &(start_i, start_j)) in placements.iter().enumerate() {
            let path = PathBuf::from(format!("{pattern}{}.{}", n + 1, self.key));
            let outcome = match File::open(&path) {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => StitchOutcome::Missing { path },
                Err(err) => StitchOutcome::Failed {
                    path,
                    error: err.into(),
                },
                Ok(file) => {
                    let size = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
                    let mut reader = BufReader::new(file);
                    match self.at_t1.load_binary_at(&mut reader, start_i, start_j, size) {
                        Ok(LoadStatus::Loaded) => StitchOutcome::Stitched { path },
                        Ok(status) => StitchOutcome::Rejected { path, status },
                        Err(error) => StitchOutcome::Failed { path, error },
                    }
                }
            };
            match &outcome {
                StitchOutcome::Stitched { path } => debug!("Stitched {} into {}", path.display(), self.key),
                StitchOutcome::Missing { path } => warn!("No partial snapshot {} for {}", path.display(), self.key),
                StitchOutcome::Rejected { path, status } => {
                    warn!("Partial snapshot {} rejected for {}: {:?}", path.display(), self.key, status);
                }
                StitchOutcome::Failed { path, error } => {
                    warn!("Partial snapshot {} unreadable for {}: {}", path.display(), self.key, error);
                }
            }
            outcomes.push(outcome);
        }
        self.rotate(ref_time);
        outcomes
    }
}
