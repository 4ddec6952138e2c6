//! The data broker: layer registry, model bindings and property resolution.
//!
//! Models register the property names they want; the broker compiles each
//! model's names into an accessor chain once, then fills the model's flat
//! output buffer on every query. Layers are registered by name. A few names
//! carry a role (altitude, wind components, fuel, moisture, temperature)
//! that the compiled chains read directly, and registering an altitude or a
//! forced arrival-time field also registers the layer derived from it.

pub mod accessor;
mod atmosphere;
mod fuel_table;
mod ingestion;

pub use fuel_table::{FuelTable, INDEX_COLUMN};
pub use ingestion::{DomainAttributes, FOOTPRINT_FALLBACK_DEPTH, FOOTPRINT_FALLBACK_SPAN};

use crate::cell::CellGrid;
use crate::config::SimulationConfig;
use crate::core_types::{FrontNode, Vec3};
use crate::error::{DataError, Result};
use crate::geo::format_iso_date;
use crate::layer::{
    ConstantLayer, DataLayer, FuelLayer, Geometry, GradientKind, GradientLayer, LayerContext, LayerRegistry, Query,
    ReductionKind, ReductionLayer, Snapshot,
};
use crate::model::{ModelBinding, ModelSpec};
use accessor::{Evaluator, Property, Roles};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Key of the slope layer derived from any altitude layer
pub const SLOPE_LAYER: &str = "slope";

/// Key of the temporal gradient derived from a forced arrival-time field
pub const ARRIVAL_TIME_GRADIENT_LAYER: &str = "arrival_time_gradient";

/// Name pattern of forced arrival-time fields
pub const FORCED_ARRIVAL_PATTERN: &str = "forced_arrival_time_of_front";

/// Parameter naming a fuel table file, read when no table is loaded
pub const FUEL_TABLE_FILE_PARAMETER: &str = "fuelsTableFile";

/// Registry of layers and models for one simulation domain
#[derive(Debug, Default)]
pub struct DataBroker {
    config: SimulationConfig,
    layers: LayerRegistry,
    flux_layers: LayerRegistry,
    roles: Roles,
    models: Vec<ModelBinding>,
    needed: Vec<String>,
    fuel_table: Option<FuelTable>,
    cells: Option<CellGrid>,
}

impl DataBroker {
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    /// Date reached at simulation time `time`, `YYYY-MM-DDThh:mm:ssZ`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDate`] if the configured `ISOdate` is
    /// malformed.
    pub fn date_at(&self, time: f64) -> Result<String> {
        let origin = self.config.reference_date()?;
        Ok(format_iso_date(origin.seconds + time, origin.year, origin.day_of_year))
    }

    fn context(&self) -> LayerContext<'_> {
        LayerContext::new(&self.layers, self.cells.as_ref())
    }

    /// Footprint of the whole simulation domain.
    #[must_use]
    pub fn domain_geometry(&self) -> Geometry {
        Geometry::spanning(self.config.domain_sw, self.config.domain_ne)
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    /// Register `layer` under its key, replacing any layer of that name.
    ///
    /// Altitude layers bring a derived `slope` layer along, forced
    /// arrival-time fields an `arrival_time_gradient` layer. Returns the slot
    /// of `layer`.
    pub fn register_layer(&mut self, layer: DataLayer) -> usize {
        let name = layer.key().to_string();
        let slot = self.insert_layer(layer);
        if name.contains("altitude") {
            let slope = GradientLayer::new(SLOPE_LAYER, &name, GradientKind::Spatial, self.config.spatial_increment);
            self.insert_layer(DataLayer::Gradient(slope));
        }
        if name.contains(FORCED_ARRIVAL_PATTERN) {
            let gradient = GradientLayer::new(
                ARRIVAL_TIME_GRADIENT_LAYER,
                &name,
                GradientKind::Temporal,
                self.config.time_gradient_look_ahead,
            );
            self.insert_layer(DataLayer::Gradient(gradient));
        }
        slot
    }

    fn insert_layer(&mut self, mut layer: DataLayer) -> usize {
        layer.set_bounds_mode(self.config.bounds_mode);
        let name = layer.key().to_string();
        let kind = layer.kind_name();
        let (slot, replaced) = self.layers.insert(layer);
        if replaced {
            debug!("Redefined layer {} as {} in slot {}", name, kind, slot);
        } else {
            debug!("Registered {} layer {} in slot {}", kind, name, slot);
        }
        self.roles.assign(&name, slot);
        slot
    }

    /// Register a flux layer in the flux registry and the main registry.
    pub fn register_flux_layer(&mut self, mut layer: DataLayer) -> usize {
        layer.set_bounds_mode(self.config.bounds_mode);
        self.flux_layers.insert(layer.clone());
        self.register_layer(layer)
    }

    /// Register a constant layer holding `value`.
    pub fn add_constant_layer(&mut self, name: &str, value: f64) -> usize {
        let layer = ConstantLayer::new(name, value, self.domain_geometry());
        self.register_layer(DataLayer::Constant(layer))
    }

    #[must_use]
    pub fn layer(&self, name: &str) -> Option<&DataLayer> {
        self.layers.get(name)
    }

    #[must_use]
    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains(name)
    }

    #[must_use]
    pub fn flux_layer(&self, name: &str) -> Option<&DataLayer> {
        self.flux_layers.get(name)
    }

    /// Names of all layers, main registry first, then flux layers.
    #[must_use]
    pub fn layer_names(&self) -> Vec<String> {
        self.layers
            .names()
            .into_iter()
            .chain(self.flux_layers.names())
            .map(str::to_string)
            .collect()
    }

    /// One line per registered layer, then the flux layers.
    #[must_use]
    pub fn describe_layers(&self) -> String {
        let ctx = self.context();
        let mut out = String::new();
        for layer in self.layers.iter() {
            let _ = writeln!(out, "\t{}", layer.describe(&ctx));
        }
        for layer in self.flux_layers.iter() {
            let _ = writeln!(out, "\tflux {}", layer.describe(&ctx));
        }
        out
    }

    /// Value of layer `name` at `loc` and `time`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownLayer`] if no layer has that name.
    pub fn value_at(&self, name: &str, loc: &Vec3, time: f64) -> Result<f64> {
        let layer = self.require(name)?;
        Ok(layer.value_at(&self.context(), loc, time))
    }

    /// Whole-grid snapshot of layer `name` at `time`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownLayer`] if no layer has that name, or the
    /// layer's own snapshot error.
    pub fn matrix(&self, name: &str, time: f64) -> Result<Snapshot<'_>> {
        let layer = self.require(name)?;
        layer.matrix(&self.context(), time)
    }

    /// Overwrite layer `name` from a column-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownLayer`] if no layer has that name, or the
    /// layer's size or support error.
    pub fn inject_matrix(&mut self, name: &str, data: &[f64], time: f64) -> Result<()> {
        self.layers
            .get_mut(name)
            .ok_or_else(|| DataError::UnknownLayer(name.to_string()))?
            .inject(data, time)
    }

    /// Dump layer `name` to `<prefix>.<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownLayer`] if no layer has that name, or the
    /// snapshot or file error.
    pub fn dump_layer(&self, name: &str, prefix: &str, time: f64) -> Result<PathBuf> {
        self.require(name)?.dump_binary(&self.context(), prefix, time)
    }

    fn require(&self, name: &str) -> Result<&DataLayer> {
        self.layers
            .get(name)
            .ok_or_else(|| DataError::UnknownLayer(name.to_string()))
    }

    /// Create the layers `names` need but nobody registered.
    ///
    /// `normalWind` needs both wind components, fuel names need a fuel
    /// layer, `slope` needs an altitude to derive from; front depth,
    /// curvature and other node-computed names need nothing. Any other name
    /// gets a constant layer from the same-named parameter, 0 if unset. An
    /// altitude layer always exists afterwards.
    pub fn ensure_layers<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if self.layers.contains(name) {
                continue;
            }
            if name.contains("normalWind") {
                for wind in ["windU", "windV"] {
                    if !self.layers.contains(wind) {
                        let value = self.config.get_f64_or(wind, 0.0);
                        self.add_constant_layer(wind, value);
                    }
                }
            } else if name.contains("uel") {
                if !self.layers.contains("fuel") {
                    let index = self.config.get_f64_or("fuel", 0.0) as i32;
                    info!("No fuel layer registered, using uniform fuel {}", index);
                    let layer = FuelLayer::uniform("fuel", index, self.domain_geometry());
                    self.register_layer(DataLayer::Fuel(layer));
                }
            } else if name.contains(SLOPE_LAYER) {
                info!("Slope needs an altitude layer, creating a constant one");
                let value = self.config.get_f64_or("altitude", 0.0);
                self.add_constant_layer("altitude", value);
            } else if name.contains("epth")
                || name.contains("urvature")
                || Property::for_propagation(name).is_some_and(Property::is_node_computed)
            {
                debug!("{} is computed at the front nodes", name);
            } else {
                let value = self.config.get_f64_or(name, 0.0);
                debug!("No layer for {}, using constant {}", name, value);
                self.add_constant_layer(name, value);
            }
        }
        if self.roles.altitude.is_none() {
            let value = self.config.get_f64_or("altitude", 0.0);
            self.add_constant_layer("altitude", value);
        }
    }

    /// [`ensure_layers`](Self::ensure_layers) over every name the
    /// registered models need.
    pub fn ensure_needed_layers(&mut self) {
        let needed = self.needed.clone();
        self.ensure_layers(&needed);
    }

    /// Property names some registered model needs a layer for.
    #[must_use]
    pub fn needed_properties(&self) -> &[String] {
        &self.needed
    }

    // ------------------------------------------------------------------
    // Cells
    // ------------------------------------------------------------------

    /// Install the cell grid read by burning-ratio and rate-of-spread layers.
    pub fn set_cells(&mut self, cells: CellGrid) {
        self.cells = Some(cells);
    }

    #[must_use]
    pub fn cells(&self) -> Option<&CellGrid> {
        self.cells.as_ref()
    }

    pub fn cells_mut(&mut self) -> Option<&mut CellGrid> {
        self.cells.as_mut()
    }

    /// Register a per-cell reduction layer covering the domain.
    ///
    /// Sized on the cell grid when one is installed, on the atmospheric grid
    /// otherwise.
    pub fn add_reduction_layer(&mut self, name: &str, kind: ReductionKind) -> usize {
        let (nx, ny) = match &self.cells {
            Some(cells) => (cells.nx(), cells.ny()),
            None => {
                warn!("Reduction layer {} registered before the cell grid", name);
                (self.config.atmo_nx, self.config.atmo_ny)
            }
        };
        let layer = ReductionLayer::new(name, kind, self.domain_geometry(), nx, ny);
        self.register_layer(DataLayer::Reduction(layer))
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    /// Register a model and compile its accessor chain; returns its index.
    pub fn register_model(&mut self, spec: ModelSpec) -> usize {
        let index = self.models.len();
        info!("Registering {:?} model {} as {}", spec.kind, spec.name, index);
        self.models.push(ModelBinding::new(index, spec));
        self.compile_model(index);
        index
    }

    pub fn register_propagation_model<S: AsRef<str>>(&mut self, name: &str, wanted: &[S]) -> usize {
        self.register_model(ModelSpec::propagation(name, wanted))
    }

    pub fn register_flux_model<S: AsRef<str>>(&mut self, name: &str, wanted: &[S]) -> usize {
        self.register_model(ModelSpec::flux(name, wanted))
    }

    #[must_use]
    pub fn model(&self, index: usize) -> Option<&ModelBinding> {
        self.models.get(index)
    }

    #[must_use]
    pub fn models(&self) -> &[ModelBinding] {
        &self.models
    }

    fn compile_model(&mut self, index: usize) {
        self.ensure_fuel_table();
        let columns = self
            .fuel_table
            .as_ref()
            .map(|table| table.columns().to_vec())
            .unwrap_or_default();
        let Some(binding) = self.models.get_mut(index) else {
            return;
        };
        let compiled = accessor::compile(
            binding.kind(),
            binding.name(),
            binding.wanted(),
            self.config.moisture.as_array(),
            &columns,
        );
        if let Some(table) = &self.fuel_table {
            binding.fuel = table.build_matrix(binding.fuel_parameters());
        }
        binding.accessors = compiled.accessors;
        binding.optimized = compiled.optimized;
        binding.size_buffer();
        debug!(
            "Model {} compiled to {} accessors, {} values, optimized: {}",
            binding.name(),
            binding.accessors.len(),
            binding.properties().len(),
            binding.optimized
        );
        for name in compiled.needed {
            if !self.needed.contains(&name) {
                self.needed.push(name);
            }
        }
    }

    /// Fill model `model`'s buffer for a front node and return it.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownModel`] if no model has that index.
    pub fn fetch_for_node(&mut self, model: usize, node: &dyn FrontNode) -> Result<&[f64]> {
        self.fetch(model, &Query::Node(node))
    }

    /// Fill model `model`'s buffer at a point and time and return it.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownModel`] if no model has that index.
    pub fn fetch_at_point(&mut self, model: usize, location: &Vec3, time: f64) -> Result<&[f64]> {
        self.fetch(
            model,
            &Query::Point {
                location: *location,
                time,
            },
        )
    }

    fn fetch(&mut self, model: usize, query: &Query<'_>) -> Result<&[f64]> {
        let binding = self.models.get_mut(model).ok_or(DataError::UnknownModel(model))?;
        let evaluator = Evaluator {
            ctx: LayerContext::new(&self.layers, self.cells.as_ref()),
            roles: &self.roles,
            front_scan_distance: self.config.front_scan_distance,
        };
        let (accessors, fuel, out) = binding.buffers_mut();
        evaluator.fill(accessors, fuel, query, out);
        Ok(binding.properties())
    }

    // ------------------------------------------------------------------
    // Fuel table
    // ------------------------------------------------------------------

    fn ensure_fuel_table(&mut self) {
        if self.fuel_table.is_some() {
            return;
        }
        let loaded = match self.config.get_str(FUEL_TABLE_FILE_PARAMETER) {
            Some(path) => FuelTable::from_file(path),
            None => FuelTable::parse(&self.config.fuels_table),
        };
        self.fuel_table = Some(loaded.unwrap_or_else(|err| {
            warn!("Could not load the fuel table: {}", err);
            FuelTable::default()
        }));
    }

    #[must_use]
    pub fn fuel_table(&self) -> Option<&FuelTable> {
        self.fuel_table.as_ref()
    }

    /// Replace the fuel table from text and recompile every model.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::MalformedTable`] on a bad table; the previous
    /// table stays in place.
    pub fn load_fuel_table_from_str(&mut self, text: &str) -> Result<()> {
        let table = FuelTable::parse(text)?;
        self.install_fuel_table(table);
        Ok(())
    }

    /// Replace the fuel table from a file and recompile every model.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Io`] or [`DataError::MalformedTable`]; the
    /// previous table stays in place.
    pub fn load_fuel_table_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let table = FuelTable::from_file(path)?;
        self.install_fuel_table(table);
        Ok(())
    }

    fn install_fuel_table(&mut self, table: FuelTable) {
        info!("Fuel table with {} fuels and {} columns", table.len(), table.columns().len());
        self.fuel_table = Some(table);
        for index in 0..self.models.len() {
            self.compile_model(index);
        }
    }

    /// Overwrite `key` on every fuel and rebuild the fuel matrices.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::UnknownModel`] if no model has index `model`.
    pub fn update_fuel_values(&mut self, model: usize, key: &str, value: f64) -> Result<()> {
        if model >= self.models.len() {
            return Err(DataError::UnknownModel(model));
        }
        self.ensure_fuel_table();
        let Some(table) = self.fuel_table.as_mut() else {
            return Ok(());
        };
        let updated = table.set_all(key, value);
        debug!("Set {} = {} on {} fuels", key, value, updated);
        for binding in &mut self.models {
            binding.fuel = table.build_matrix(binding.fuel_parameters());
        }
        Ok(())
    }
}
