//! Layers derived from the gradient of a parent layer.
//!
//! Gradient layers hold no storage. They name their parent by key and read it
//! through the [`LayerContext`] at query time, so replacing the parent in the
//! registry is picked up by the next query.

use super::{DataLayer, LayerContext};
use crate::core_types::{FrontNode, Vec3};
use std::f64::consts::FRAC_1_SQRT_2;
use tracing::warn;

/// Probe distance (m) of the point form of the spatial gradient
pub const POINT_PROBE_DISTANCE: f64 = 10.0;

/// Unit vectors of the eight compass directions
const COMPASS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (0.0, 1.0),
    (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (-1.0, 0.0),
    (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    (0.0, -1.0),
    (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradientKind {
    /// Difference of the parent's value along the front normal
    Spatial,
    /// Difference between the parent's value ahead of a node and the node's time
    Temporal,
}

#[derive(Debug, Clone)]
pub struct GradientLayer {
    key: String,
    parent: String,
    kind: GradientKind,
    increment: f64,
}

impl GradientLayer {
    /// Gradient of `parent` probed `increment` metres along the front normal.
    #[must_use]
    pub fn new(key: impl Into<String>, parent: impl Into<String>, kind: GradientKind, increment: f64) -> Self {
        Self {
            key: key.into(),
            parent: parent.into(),
            kind,
            increment,
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }

    #[must_use]
    pub fn kind(&self) -> GradientKind {
        self.kind
    }

    #[must_use]
    pub fn increment(&self) -> f64 {
        self.increment
    }

    pub(super) fn parent_layer<'c>(&self, ctx: &LayerContext<'c>) -> Option<&'c DataLayer> {
        if self.parent == self.key {
            warn!("Gradient layer {} is its own parent", self.key);
            return None;
        }
        let parent = ctx.layers.get(&self.parent);
        if parent.is_none() {
            warn!("Parent layer {} of {} is not registered", self.parent, self.key);
        }
        parent
    }

    /// Largest forward difference over the eight compass directions,
    /// never negative. The temporal kind has no point form and returns 0.
    #[must_use]
    pub fn value_at(&self, ctx: &LayerContext<'_>, loc: &Vec3, time: f64) -> f64 {
        if self.kind == GradientKind::Temporal {
            warn!("Time gradient {} is only defined at front nodes", self.key);
            return 0.0;
        }
        let Some(parent) = self.parent_layer(ctx) else {
            return 0.0;
        };
        let here = parent.value_at(ctx, loc, time);
        let steepest = COMPASS
            .iter()
            .map(|&(dx, dy)| {
                let probe = loc + Vec3::new(dx, dy, 0.0) * POINT_PROBE_DISTANCE;
                parent.value_at(ctx, &probe, time) - here
            })
            .fold(0.0, f64::max);
        steepest / POINT_PROBE_DISTANCE
    }

    /// Forward difference one increment ahead of `node` along its normal.
    #[must_use]
    pub fn value_at_node(&self, ctx: &LayerContext<'_>, node: &dyn FrontNode) -> f64 {
        let Some(parent) = self.parent_layer(ctx) else {
            return 0.0;
        };
        let ahead = node.location() + node.normal() * self.increment;
        let value_ahead = parent.value_at(ctx, &ahead, node.update_time());
        let here = match self.kind {
            GradientKind::Spatial => parent.value_at_node(ctx, node),
            GradientKind::Temporal => node.time(),
        };
        (value_ahead - here) / self.increment
    }
}
