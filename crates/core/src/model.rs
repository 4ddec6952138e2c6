//! Numerical models as seen by the broker.
//!
//! A model is opaque here: it declares the property names it wants and reads
//! them back from a flat output buffer the broker fills per query. The broker
//! keeps one [`ModelBinding`] per registered model holding that buffer, the
//! compiled accessor chain, and the dense fuel-parameter matrix.

use crate::broker::accessor::Accessor;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Number of fuel-index rows in every fuel matrix
pub const MAX_FUEL_INDEX: usize = 1024;

/// Prefix of wanted names that select a fuel parameter
pub const FUEL_PREFIX: &str = "fuel.";

/// Which family of numerical model a binding serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    /// Rate-of-spread model queried per front node
    Propagation,
    /// Surface-flux model queried per cell at a point and time
    Flux,
}

/// Declaration of a model: its name and wanted properties in buffer order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub kind: ModelKind,
    pub wanted: Vec<String>,
}

impl ModelSpec {
    #[must_use]
    pub fn propagation<S: AsRef<str>>(name: impl Into<String>, wanted: &[S]) -> Self {
        Self {
            name: name.into(),
            kind: ModelKind::Propagation,
            wanted: wanted.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    #[must_use]
    pub fn flux<S: AsRef<str>>(name: impl Into<String>, wanted: &[S]) -> Self {
        Self {
            name: name.into(),
            kind: ModelKind::Flux,
            wanted: wanted.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// Fuel parameter names wanted by the model, prefix stripped, in order.
    #[must_use]
    pub fn fuel_parameters(&self) -> Vec<String> {
        self.wanted
            .iter()
            .filter_map(|name| name.strip_prefix(FUEL_PREFIX))
            .map(str::to_string)
            .collect()
    }
}

/// Dense `[MAX_FUEL_INDEX x n]` table of the fuel parameters one model wants
#[derive(Debug, Clone, Default)]
pub struct FuelMatrix {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FuelMatrix {
    /// Zero-filled matrix with one column per parameter name.
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let values = vec![0.0; MAX_FUEL_INDEX * names.len()];
        Self { names, values }
    }

    /// Number of parameter columns
    #[must_use]
    pub fn width(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Parameter values of fuel `index`; indices past the table map to row 0.
    #[must_use]
    pub fn row(&self, index: usize) -> &[f64] {
        let width = self.width();
        let index = if index < MAX_FUEL_INDEX {
            index
        } else {
            warn!("Fuel index {} beyond table of {} fuels, using 0", index, MAX_FUEL_INDEX);
            0
        };
        &self.values[index * width..(index + 1) * width]
    }

    pub fn set(&mut self, index: usize, column: usize, value: f64) {
        if index >= MAX_FUEL_INDEX || column >= self.width() {
            warn!("Fuel matrix write ({}, {}) out of range", index, column);
            return;
        }
        let width = self.width();
        self.values[index * width + column] = value;
    }
}

/// Broker-side state of one registered model
#[derive(Debug, Clone)]
pub struct ModelBinding {
    index: usize,
    spec: ModelSpec,
    fuel_parameters: Vec<String>,
    pub(crate) accessors: Vec<Accessor>,
    pub(crate) fuel: FuelMatrix,
    pub(crate) optimized: bool,
    properties: Vec<f64>,
}

impl ModelBinding {
    pub(crate) fn new(index: usize, spec: ModelSpec) -> Self {
        let fuel_parameters = spec.fuel_parameters();
        Self {
            index,
            fuel: FuelMatrix::new(fuel_parameters.clone()),
            fuel_parameters,
            spec,
            accessors: Vec::new(),
            optimized: true,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.spec.kind
    }

    #[must_use]
    pub fn wanted(&self) -> &[String] {
        &self.spec.wanted
    }

    /// Wanted fuel parameters without their `fuel.` prefix.
    #[must_use]
    pub fn fuel_parameters(&self) -> &[String] {
        &self.fuel_parameters
    }

    #[must_use]
    pub fn fuel_matrix(&self) -> &FuelMatrix {
        &self.fuel
    }

    /// Whether queries run the compiled accessor chain rather than the
    /// per-name fallback.
    #[must_use]
    pub fn is_optimized(&self) -> bool {
        self.optimized
    }

    /// Values written by the latest fetch, in accessor order.
    #[must_use]
    pub fn properties(&self) -> &[f64] {
        &self.properties
    }

    /// Size the output buffer to the compiled chain's total width.
    pub(crate) fn size_buffer(&mut self) {
        let width: usize = self
            .accessors
            .iter()
            .map(|accessor| accessor.width(self.fuel.width()))
            .sum();
        self.properties = vec![0.0; width];
    }

    /// Output buffer alongside the pieces the accessors read.
    pub(crate) fn buffers_mut(&mut self) -> (&[Accessor], &FuelMatrix, &mut [f64]) {
        (&self.accessors, &self.fuel, &mut self.properties)
    }
}
