//! Spatio-temporal data layers.
//!
//! A layer is a named source of one physical field that can be queried at a
//! point and time, at a front node, in bulk into a model's output buffer, or
//! as a whole-grid snapshot. [`DataLayer`] is the closed set of layer kinds;
//! every operation dispatches with a `match` so the shared interpolation code
//! stays in [`interp`].
//!
//! Derived kinds (gradients, scaled views, cell reductions) do not own their
//! inputs. They read them through a [`LayerContext`] borrowed from the broker
//! for the duration of a query.

mod constant;
mod flux;
mod fuel;
mod geometry;
mod gradient;
mod gridded;
mod interp;
mod reduction;
mod registry;
mod scaled;
mod two_time;

pub use constant::ConstantLayer;
pub use flux::FluxLayer;
pub use fuel::{FuelLayer, FuelSource, SNAPSHOT_RESOLUTION};
pub use geometry::Geometry;
pub use gradient::{GradientKind, GradientLayer, POINT_PROBE_DISTANCE};
pub use gridded::GriddedLayer;
pub use reduction::{ReductionKind, ReductionLayer};
pub use registry::LayerRegistry;
pub use scaled::ScaledLayer;
pub use two_time::{StitchOutcome, TwoTimeLayer};

use crate::cell::CellGrid;
use crate::core_types::{FrontNode, Vec3};
use crate::error::{DataError, Result};
use crate::field::{encode_payload, BoundsMode, FieldArray};
use crate::model::FuelMatrix;
use std::cell::Ref;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Deref;
use std::path::PathBuf;
use tracing::{debug, warn};

/// What derived layers may read while answering a query
#[derive(Clone, Copy)]
pub struct LayerContext<'a> {
    pub layers: &'a LayerRegistry,
    pub cells: Option<&'a CellGrid>,
}

impl<'a> LayerContext<'a> {
    #[must_use]
    pub fn new(layers: &'a LayerRegistry, cells: Option<&'a CellGrid>) -> Self {
        Self { layers, cells }
    }
}

/// Where a bulk extraction samples
#[derive(Clone, Copy)]
pub enum Query<'a> {
    /// At a front node, at its update time
    Node(&'a dyn FrontNode),
    /// At an arbitrary location and time
    Point { location: Vec3, time: f64 },
}

impl Query<'_> {
    #[must_use]
    pub fn location(&self) -> Vec3 {
        match self {
            Query::Node(node) => node.location(),
            Query::Point { location, .. } => *location,
        }
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        match self {
            Query::Node(node) => node.update_time(),
            Query::Point { time, .. } => *time,
        }
    }
}

/// A layer's backing grid at some time
///
/// Borrowed straight from the layer, borrowed from a recomputation cache, or
/// built for the request.
#[derive(Debug)]
pub enum Snapshot<'a> {
    Borrowed(&'a FieldArray<f64>),
    Cached(Ref<'a, FieldArray<f64>>),
    Owned(FieldArray<f64>),
}

impl Snapshot<'_> {
    #[must_use]
    pub fn into_owned(self) -> FieldArray<f64> {
        match self {
            Snapshot::Borrowed(array) => array.clone(),
            Snapshot::Cached(array) => array.clone(),
            Snapshot::Owned(array) => array,
        }
    }
}

impl Deref for Snapshot<'_> {
    type Target = FieldArray<f64>;

    fn deref(&self) -> &FieldArray<f64> {
        match self {
            Snapshot::Borrowed(array) => array,
            Snapshot::Cached(array) => array,
            Snapshot::Owned(array) => array,
        }
    }
}

/// Closed set of layer kinds
#[derive(Debug, Clone)]
pub enum DataLayer {
    Constant(ConstantLayer),
    TwoTime(TwoTimeLayer),
    Gridded(GriddedLayer),
    Fuel(FuelLayer),
    Flux(FluxLayer),
    Gradient(GradientLayer),
    Reduction(ReductionLayer),
    Scaled(ScaledLayer),
}

impl DataLayer {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            DataLayer::Constant(layer) => layer.key(),
            DataLayer::TwoTime(layer) => layer.key(),
            DataLayer::Gridded(layer) => layer.key(),
            DataLayer::Fuel(layer) => layer.key(),
            DataLayer::Flux(layer) => layer.key(),
            DataLayer::Gradient(layer) => layer.key(),
            DataLayer::Reduction(layer) => layer.key(),
            DataLayer::Scaled(layer) => layer.key(),
        }
    }

    /// Out-of-range policy of every array the layer owns or caches.
    ///
    /// Gradient layers own no storage and are left untouched.
    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        match self {
            DataLayer::Constant(layer) => layer.set_bounds_mode(mode),
            DataLayer::TwoTime(layer) => layer.set_bounds_mode(mode),
            DataLayer::Gridded(layer) => layer.set_bounds_mode(mode),
            DataLayer::Fuel(layer) => layer.set_bounds_mode(mode),
            DataLayer::Flux(layer) => layer.set_bounds_mode(mode),
            DataLayer::Gradient(_) => {}
            DataLayer::Reduction(layer) => layer.set_bounds_mode(mode),
            DataLayer::Scaled(layer) => layer.set_bounds_mode(mode),
        }
    }

    /// Short name of the layer kind, for diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            DataLayer::Constant(_) => "constant",
            DataLayer::TwoTime(_) => "two-time array",
            DataLayer::Gridded(_) => "gridded",
            DataLayer::Fuel(_) => "fuel",
            DataLayer::Flux(_) => "flux",
            DataLayer::Gradient(layer) => match layer.kind() {
                GradientKind::Spatial => "gradient",
                GradientKind::Temporal => "time gradient",
            },
            DataLayer::Reduction(layer) => match layer.kind() {
                ReductionKind::BurningRatio => "burning ratio",
                ReductionKind::MaxSpeed => "rate of spread",
            },
            DataLayer::Scaled(_) => "scaled",
        }
    }

    /// Footprint of the layer; derived layers report their parent's.
    #[must_use]
    pub fn geometry(&self, ctx: &LayerContext<'_>) -> Geometry {
        match self {
            DataLayer::Constant(layer) => layer.geometry(),
            DataLayer::TwoTime(layer) => layer.geometry(),
            DataLayer::Gridded(layer) => layer.geometry(),
            DataLayer::Fuel(layer) => layer.geometry(),
            DataLayer::Flux(layer) => layer.geometry(),
            DataLayer::Gradient(layer) => layer
                .parent_layer(ctx)
                .map(|parent| parent.geometry(ctx))
                .unwrap_or_default(),
            DataLayer::Reduction(layer) => layer.geometry(),
            DataLayer::Scaled(layer) => layer
                .base_layer(ctx)
                .map(|base| base.geometry(ctx))
                .unwrap_or_default(),
        }
    }

    /// Value at `loc` and `time`.
    #[must_use]
    pub fn value_at(&self, ctx: &LayerContext<'_>, loc: &Vec3, time: f64) -> f64 {
        match self {
            DataLayer::Constant(layer) => layer.value(),
            DataLayer::TwoTime(layer) => layer.value_at(loc, time),
            DataLayer::Gridded(layer) => layer.value_at(loc, time),
            DataLayer::Fuel(layer) => layer.value_at(loc, time),
            DataLayer::Flux(layer) => layer.value_at(loc, time),
            DataLayer::Gradient(layer) => layer.value_at(ctx, loc, time),
            DataLayer::Reduction(layer) => layer.value_at(),
            DataLayer::Scaled(layer) => layer.value_at(ctx, loc, time),
        }
    }

    /// Value at a front node: its location at its update time, except for
    /// gradients which probe along the node's normal.
    #[must_use]
    pub fn value_at_node(&self, ctx: &LayerContext<'_>, node: &dyn FrontNode) -> f64 {
        match self {
            DataLayer::Gradient(layer) => layer.value_at_node(ctx, node),
            _ => self.value_at(ctx, &node.location(), node.update_time()),
        }
    }

    /// Write this layer's values for `query` into `out[offset..]`.
    ///
    /// Fuel layers write the whole parameter row of the resolved fuel from
    /// `fuel`; every other kind writes one value. Returns the number of values
    /// written.
    pub fn extract(&self, ctx: &LayerContext<'_>, query: &Query<'_>, fuel: &FuelMatrix, out: &mut [f64], offset: usize) -> usize {
        if let DataLayer::Fuel(layer) = self {
            return layer.extract(&query.location(), query.time(), fuel, out, offset);
        }
        let value = match query {
            Query::Node(node) => self.value_at_node(ctx, *node),
            Query::Point { location, time } => self.value_at(ctx, location, *time),
        };
        match out.get_mut(offset) {
            Some(slot) => {
                *slot = value;
                1
            }
            None => {
                warn!(
                    "Output buffer of {} values has no slot {} for {}",
                    out.len(),
                    offset,
                    self.key()
                );
                0
            }
        }
    }

    /// Backing grid of the layer at `time`, recomputed first when stale.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Unsupported`] for gradient layers, which have no
    /// grid, or the base layer's error for scaled views.
    pub fn matrix<'s>(&'s self, ctx: &LayerContext<'_>, time: f64) -> Result<Snapshot<'s>> {
        match self {
            DataLayer::Constant(layer) => Ok(Snapshot::Borrowed(layer.array())),
            DataLayer::TwoTime(layer) => Ok(Snapshot::Borrowed(layer.array_t2())),
            DataLayer::Gridded(layer) => Ok(Snapshot::Borrowed(layer.array())),
            DataLayer::Fuel(layer) => Ok(Snapshot::Owned(layer.snapshot(time))),
            DataLayer::Flux(layer) => Ok(Snapshot::Owned(layer.snapshot())),
            DataLayer::Gradient(layer) => Err(DataError::Unsupported {
                layer: layer.key().to_string(),
                operation: "matrix snapshot",
            }),
            DataLayer::Reduction(layer) => Ok(layer.matrix(ctx, time)),
            DataLayer::Scaled(layer) => layer.matrix(ctx, time),
        }
    }

    /// Overwrite the layer's storage from a column-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::SizeMismatch`] when the buffer does not match the
    /// storage, or [`DataError::Unsupported`] for derived views.
    pub fn inject(&mut self, data: &[f64], time: f64) -> Result<()> {
        match self {
            DataLayer::Constant(layer) => layer.inject(data),
            DataLayer::TwoTime(layer) => layer.inject(data, time),
            DataLayer::Gridded(layer) => layer.inject(data),
            DataLayer::Fuel(layer) => layer.inject(data),
            DataLayer::Flux(layer) => layer.inject(data),
            DataLayer::Reduction(layer) => layer.inject(data, time),
            DataLayer::Gradient(_) | DataLayer::Scaled(_) => Err(DataError::Unsupported {
                layer: self.key().to_string(),
                operation: "matrix injection",
            }),
        }
    }

    /// Write `[nx][ny][payload]` of the layer's grid at `time` to
    /// `<prefix>.<key>` and return the path.
    ///
    /// Fuel layers dump their indices sampled at the raster's cell centres.
    ///
    /// # Errors
    ///
    /// Propagates snapshot and file errors.
    pub fn dump_binary(&self, ctx: &LayerContext<'_>, prefix: &str, time: f64) -> Result<PathBuf> {
        let array = match self {
            DataLayer::Fuel(layer) => Snapshot::Owned(layer.raster_samples(time)),
            _ => self.matrix(ctx, time)?,
        };
        let path = PathBuf::from(format!("{prefix}.{}", self.key()));
        let mut writer = BufWriter::new(File::create(&path)?);
        writer.write_all(&(array.nx() as u64).to_ne_bytes())?;
        writer.write_all(&(array.ny() as u64).to_ne_bytes())?;
        writer.write_all(&encode_payload(array.data()))?;
        writer.flush()?;
        debug!("Dumped {} ({}x{}) to {}", self.key(), array.nx(), array.ny(), path.display());
        Ok(path)
    }

    /// One-line description: key, kind, origin and extent.
    #[must_use]
    pub fn describe(&self, ctx: &LayerContext<'_>) -> String {
        let geometry = self.geometry(ctx);
        let o = geometry.origin;
        let e = geometry.extent;
        format!(
            "{}: {} origin ({}, {}, {}) extent ({}, {}, {}) t0 {} span {}",
            self.key(),
            self.kind_name(),
            o.x,
            o.y,
            o.z,
            e.x,
            e.y,
            e.z,
            geometry.time_origin,
            geometry.time_span
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::NodeSnapshot;
    use approx::assert_abs_diff_eq;

    fn plane_x(key: &str, rate: f64) -> DataLayer {
        let mut array = FieldArray::new_2d(key, 0.0, 50, 50);
        for i in 0..50 {
            for j in 0..50 {
                array.set_2d(i, j, rate * (i as f64 + 0.5) * 10.0);
            }
        }
        DataLayer::Gridded(GriddedLayer::spanning(
            key,
            array,
            Vec3::zeros(),
            Vec3::new(500.0, 500.0, 0.0),
            0.0,
            0.0,
        ))
    }

    fn registry_with(layers: Vec<DataLayer>) -> LayerRegistry {
        let mut registry = LayerRegistry::new();
        for layer in layers {
            registry.insert(layer);
        }
        registry
    }

    #[test]
    fn test_spatial_gradient_of_linear_field() {
        let rate = 0.3;
        let registry = registry_with(vec![
            plane_x("altitude", rate),
            DataLayer::Gradient(GradientLayer::new("slope", "altitude", GradientKind::Spatial, 2.0)),
        ]);
        let ctx = LayerContext::new(&registry, None);
        let slope = registry.get("slope").unwrap();
        for (x, y) in [(100.0, 100.0), (250.0, 320.0), (400.0, 60.0)] {
            let value = slope.value_at(&ctx, &Vec3::new(x, y, 0.0), 0.0);
            assert_abs_diff_eq!(value, rate, epsilon = 1e-9);
        }

        let node = NodeSnapshot::new(Vec3::new(200.0, 200.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 0.0);
        assert_abs_diff_eq!(slope.value_at_node(&ctx, &node), -rate, epsilon = 1e-9);
    }

    #[test]
    fn test_time_gradient_only_at_nodes() {
        let registry = registry_with(vec![
            DataLayer::Constant(ConstantLayer::new("forced_arrival_time_of_front", 100.0, Geometry::default())),
            DataLayer::Gradient(GradientLayer::new(
                "arrival_time_gradient",
                "forced_arrival_time_of_front",
                GradientKind::Temporal,
                40.0,
            )),
        ]);
        let ctx = LayerContext::new(&registry, None);
        let layer = registry.get("arrival_time_gradient").unwrap();
        assert_eq!(layer.value_at(&ctx, &Vec3::zeros(), 0.0), 0.0);
        let node = NodeSnapshot::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 0.0), 20.0);
        assert_abs_diff_eq!(layer.value_at_node(&ctx, &node), 2.0, epsilon = 1e-12);
        assert!(layer.matrix(&ctx, 0.0).is_err());
    }

    #[test]
    fn test_gradient_without_parent_is_zero() {
        let registry = registry_with(vec![DataLayer::Gradient(GradientLayer::new(
            "slope",
            "altitude",
            GradientKind::Spatial,
            2.0,
        ))]);
        let ctx = LayerContext::new(&registry, None);
        assert_eq!(registry.get("slope").unwrap().value_at(&ctx, &Vec3::zeros(), 0.0), 0.0);
    }

    #[test]
    fn test_scaled_view_and_cache() {
        let registry = registry_with(vec![
            DataLayer::Constant(ConstantLayer::new("heatFlux", 4.0, Geometry::default())),
            DataLayer::Scaled(ScaledLayer::new("vaporFlux", "heatFlux", 0.25)),
        ]);
        let ctx = LayerContext::new(&registry, None);
        let scaled = registry.get("vaporFlux").unwrap();
        assert_eq!(scaled.value_at(&ctx, &Vec3::zeros(), 3.0), 1.0);
        assert_eq!(scaled.matrix(&ctx, 3.0).unwrap().data(), &[1.0]);
        assert_eq!(scaled.matrix(&ctx, 3.0).unwrap().data(), &[1.0]);
    }

    #[test]
    fn test_extract_single_value_and_short_buffer() {
        let registry = registry_with(vec![DataLayer::Constant(ConstantLayer::new(
            "temperature",
            290.0,
            Geometry::default(),
        ))]);
        let ctx = LayerContext::new(&registry, None);
        let layer = registry.get("temperature").unwrap();
        let query = Query::Point {
            location: Vec3::zeros(),
            time: 0.0,
        };
        let mut out = [0.0; 2];
        assert_eq!(layer.extract(&ctx, &query, &FuelMatrix::default(), &mut out, 1), 1);
        assert_eq!(out, [0.0, 290.0]);
        assert_eq!(layer.extract(&ctx, &query, &FuelMatrix::default(), &mut out, 2), 0);
    }

    #[test]
    fn test_inject_unsupported_on_views() {
        let mut layer = DataLayer::Scaled(ScaledLayer::new("a", "b", 2.0));
        assert!(matches!(
            layer.inject(&[1.0], 0.0),
            Err(DataError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_dump_binary_writes_header_and_payload() {
        let registry = registry_with(vec![DataLayer::Constant(ConstantLayer::new(
            "windU",
            2.5,
            Geometry::default(),
        ))]);
        let ctx = LayerContext::new(&registry, None);
        let prefix = std::env::temp_dir().join(format!("fire_data_dump_{}", std::process::id()));
        let path = registry
            .get("windU")
            .unwrap()
            .dump_binary(&ctx, prefix.to_str().unwrap(), 0.0)
            .unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 8 + 8 + 8);
        assert_eq!(u64::from_ne_bytes(bytes[0..8].try_into().unwrap()), 1);
        assert_eq!(f64::from_ne_bytes(bytes[16..24].try_into().unwrap()), 2.5);
        std::fs::remove_file(path).unwrap();
    }
}
