//! Fire Data Core Library
//!
//! Environmental data plumbing for front-tracking wildfire propagation.
//! Every field a fire-spread or flux model reads (topography, wind, fuel
//! classes, moisture, arrival-time gradients, burning ratios) sits behind a
//! named data layer that answers point and front-node queries in
//! space-time.
//!
//! ## Data Broker
//!
//! The [`DataBroker`] owns the layers and the registered models:
//! - Registers constant, gridded, two-time, fuel, flux and derived layers
//! - Compiles each model's property list into an accessor chain and fills
//!   its input buffer per query
//! - Creates missing layers from configuration parameters
//! - Ingests scientific datasets and refreshes atmospheric wind from
//!   coupled-model snapshots

// Core types and utilities
pub mod config;
pub mod core_types;
pub mod error;
pub mod field;
pub mod geo;

// Layers and the broker that serves them
pub mod broker;
pub mod cell;
pub mod ingest;
pub mod layer;
pub mod model;

// Re-export core types
pub use config::{MoistureBundle, SimulationConfig};
pub use core_types::{FrontNode, NodeSnapshot, NodeState, Vec3};
pub use error::{DataError, Result};
pub use field::{BoundsMode, FieldArray, LoadStatus};

// Re-export broker types
pub use broker::{DataBroker, FuelTable};
pub use cell::{BurningMap, CellGrid};
pub use ingest::{AttrValue, MemoryDataset, ScientificDataset};
pub use layer::{DataLayer, Geometry, LayerRegistry, Query, Snapshot, StitchOutcome};
pub use model::{FuelMatrix, ModelKind, ModelSpec};
