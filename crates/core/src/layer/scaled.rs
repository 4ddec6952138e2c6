//! Coefficient-scaled view of another layer.

use super::{LayerContext, Snapshot};
use crate::core_types::Vec3;
use crate::error::{DataError, Result};
use crate::field::{BoundsMode, FieldArray};
use std::cell::{Ref, RefCell};
use tracing::warn;

#[derive(Debug, Clone, Default)]
struct ScaledCache {
    array: Option<FieldArray<f64>>,
    latest: Option<f64>,
    bounds: BoundsMode,
}

/// `coefficient x base` at every point, with the base named by key
#[derive(Debug, Clone)]
pub struct ScaledLayer {
    key: String,
    base: String,
    coefficient: f64,
    cache: RefCell<ScaledCache>,
}

impl ScaledLayer {
    #[must_use]
    pub fn new(key: impl Into<String>, base: impl Into<String>, coefficient: f64) -> Self {
        Self {
            key: key.into(),
            base: base.into(),
            coefficient,
            cache: RefCell::default(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    #[must_use]
    pub fn coefficient(&self) -> f64 {
        self.coefficient
    }

    /// Policy of the cached grid, kept across recomputations.
    pub fn set_bounds_mode(&mut self, mode: BoundsMode) {
        let cache = self.cache.get_mut();
        cache.bounds = mode;
        if let Some(array) = &mut cache.array {
            array.set_bounds_mode(mode);
        }
    }

    pub(super) fn base_layer<'c>(&self, ctx: &LayerContext<'c>) -> Option<&'c super::DataLayer> {
        if self.base == self.key {
            warn!("Scaled layer {} is its own base", self.key);
            return None;
        }
        ctx.layers.get(&self.base)
    }

    #[must_use]
    pub fn value_at(&self, ctx: &LayerContext<'_>, loc: &Vec3, time: f64) -> f64 {
        match self.base_layer(ctx) {
            Some(base) => self.coefficient * base.value_at(ctx, loc, time),
            None => {
                warn!("Base layer {} of {} is not registered", self.base, self.key);
                0.0
            }
        }
    }

    /// Base snapshot scaled by the coefficient, cached by time.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownLayer`] if the base is not registered, or
    /// the base's own snapshot error.
    pub fn matrix<'s>(&'s self, ctx: &LayerContext<'_>, time: f64) -> Result<Snapshot<'s>> {
        let stale = {
            let cache = self.cache.borrow();
            cache.array.is_none() || cache.latest != Some(time)
        };
        if stale {
            let base = self
                .base_layer(ctx)
                .ok_or_else(|| DataError::UnknownLayer(self.base.clone()))?;
            let mut scaled = (*base.matrix(ctx, time)?).clone();
            for value in scaled.data_mut() {
                *value *= self.coefficient;
            }
            let mut cache = self.cache.borrow_mut();
            scaled.set_bounds_mode(cache.bounds);
            cache.array = Some(scaled);
            cache.latest = Some(time);
        }
        let cache = self.cache.borrow();
        match Ref::filter_map(cache, |cache| cache.array.as_ref()) {
            Ok(array) => Ok(Snapshot::Cached(array)),
            Err(_) => Err(DataError::UnknownLayer(self.base.clone())),
        }
    }
}
