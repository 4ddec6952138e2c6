//! Building layers from a scientific dataset.
//!
//! The `domain` variable carries the footprint shared by every field in the
//! dataset. Each other variable is dispatched on its `type` attribute:
//!
//! | variable / type | result |
//! |---|---|
//! | `wind` | `windU` (time slice 0) and `windV` (slice 1) |
//! | `altitude`, `windU`, `windV`, `temperature`, `moisture`, `fieldSpeed` | gridded layer |
//! | `fuel` | fuel raster layer |
//! | type contains `data` | gridded layer, only if a model needs it |
//! | type contains `flux` | flux layer bound to `model<N>name` |
//! | type contains `parameter` | attributes copied into the configuration |
//! | type contains `propagative` | not supported, skipped |
//!
//! Payloads are column-major with `x` fastest and are transposed on load.

use super::DataBroker;
use crate::config::SimulationConfig;
use crate::core_types::Vec3;
use crate::error::Result;
use crate::field::FieldArray;
use crate::geo::{seconds_between, LonLatBox};
use crate::ingest::{ScientificDataset, DOMAIN_VARIABLE, TYPE_ATTRIBUTE};
use crate::layer::{DataLayer, FluxLayer, FuelLayer, GriddedLayer};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Vertical extent given to a field re-projected onto the domain
pub const FOOTPRINT_FALLBACK_DEPTH: f64 = 10000.0;

/// Time span given to a field re-projected onto the domain
pub const FOOTPRINT_FALLBACK_SPAN: f64 = 1.0e7;

/// Fields ingested whether or not a model asked for them
const KNOWN_FIELDS: [&str; 7] = ["altitude", "windU", "windV", "temperature", "moisture", "fuel", "fieldSpeed"];

/// Footprint attributes of a dataset's `domain` variable
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainAttributes {
    pub version: f64,
    /// South-west-bottom corner (`SWx`, `SWy`, `SWz`)
    pub sw: Vec3,
    /// `Lx`, `Ly`, `Lz`
    pub extent: Vec3,
    /// Start of the data in simulation seconds
    pub t0: f64,
    /// `Lt`, `t0` when absent
    pub span: f64,
}

impl DomainAttributes {
    /// Read the domain attributes; absent ones are 0.
    ///
    /// A `refYear`/`refDay` pair dates the dataset's own `t0`; it is then
    /// shifted onto simulation time, which starts at the configured
    /// `ISOdate`. Without the pair `t0` is taken as simulation time.
    ///
    /// In coupled runs a `BBoxWSEN` longitude/latitude box replaces the
    /// horizontal footprint, projected relative to the configured reference
    /// longitude and latitude.
    #[must_use]
    pub fn read(dataset: &dyn ScientificDataset, config: &SimulationConfig) -> Self {
        let get = |name: &str| dataset.attribute(DOMAIN_VARIABLE, name).and_then(|v| v.as_f64());
        let t0 = get("t0").unwrap_or(0.0);
        let mut attributes = Self {
            version: get("version").unwrap_or(1.0),
            sw: Vec3::new(
                get("SWx").unwrap_or(0.0),
                get("SWy").unwrap_or(0.0),
                get("SWz").unwrap_or(0.0),
            ),
            extent: Vec3::new(
                get("Lx").unwrap_or(0.0),
                get("Ly").unwrap_or(0.0),
                get("Lz").unwrap_or(0.0),
            ),
            t0,
            span: get("Lt").unwrap_or(t0),
        };
        if let (Some(year), Some(day)) = (get("refYear"), get("refDay")) {
            if day >= 1.0 {
                match config.reference_date() {
                    Ok(origin) => {
                        attributes.t0 = seconds_between(
                            origin.seconds,
                            origin.year,
                            origin.day_of_year,
                            t0,
                            year as i32,
                            day as u32,
                        );
                        debug!("Dataset t0 {} on {}/{} is simulation time {}", t0, year, day, attributes.t0);
                    }
                    Err(err) => warn!("Keeping dataset t0 {} unshifted: {}", t0, err),
                }
            }
        }
        if config.coupled {
            if let Some(bbox) = dataset.attribute(DOMAIN_VARIABLE, "BBoxWSEN") {
                match bbox.as_f64_list()[..] {
                    [west, south, east, north] => {
                        let lonlat = LonLatBox {
                            west,
                            south,
                            east,
                            north,
                        };
                        let (sw, extent) = lonlat.projected_from(config.ref_longitude, config.ref_latitude);
                        attributes.sw.x = sw.x;
                        attributes.sw.y = sw.y;
                        attributes.extent.x = extent.x;
                        attributes.extent.y = extent.y;
                        debug!("Bounding box {:?} projected to {:?} + {:?}", lonlat, sw, extent);
                    }
                    _ => warn!("BBoxWSEN needs four values, got '{}'", bbox.to_parameter()),
                }
            }
        }
        attributes
    }
}

/// Footprint a layer is built with
#[derive(Debug, Clone, Copy)]
struct Footprint {
    origin: Vec3,
    extent: Vec3,
    t0: f64,
    span: f64,
}

/// `[nx, ny, nz, nt]` of a variable with dimensions listed slowest first.
fn grid_extents(dimensions: &[usize]) -> [usize; 4] {
    let extents = match *dimensions {
        [nx] => [nx, 1, 1, 1],
        [ny, nx] => [nx, ny, 1, 1],
        [nz, ny, nx] => [nx, ny, nz, 1],
        [nt, nz, ny, nx] => [nx, ny, nz, nt],
        _ => {
            warn!("Unsupported variable rank {}, reading a single value", dimensions.len());
            [1, 1, 1, 1]
        }
    };
    extents.map(|n| n.max(1))
}

impl DataBroker {
    /// Whether a footprint overlaps the simulation domain at all.
    #[must_use]
    pub fn is_relevant_footprint(&self, sw: &Vec3, extent: &Vec3) -> bool {
        let (dsw, dne) = (self.config.domain_sw, self.config.domain_ne);
        !(sw.x > dne.x || sw.x + extent.x < dsw.x || sw.y > dne.y || sw.y + extent.y < dsw.y)
    }

    /// The dataset footprint if it touches the domain, else the whole
    /// domain with a very long time span.
    fn footprint(&self, name: &str, domain: &DomainAttributes) -> Footprint {
        if self.is_relevant_footprint(&domain.sw, &domain.extent) {
            return Footprint {
                origin: domain.sw,
                extent: domain.extent,
                t0: domain.t0,
                span: domain.span,
            };
        }
        warn!(
            "Variable {} is not in the domain, re-projecting it onto the whole domain",
            name
        );
        let extent = self.config.domain_extent();
        Footprint {
            origin: Vec3::new(self.config.domain_sw.x, self.config.domain_sw.y, 0.0),
            extent: Vec3::new(extent.x, extent.y, FOOTPRINT_FALLBACK_DEPTH),
            t0: 0.0,
            span: FOOTPRINT_FALLBACK_SPAN,
        }
    }

    /// Register layers for every usable variable of `dataset`.
    ///
    /// A failure stops the pass and is logged; layers registered before it
    /// stay. Returns the number of layers registered.
    pub fn ingest(&mut self, dataset: &dyn ScientificDataset) -> usize {
        let mut registered = 0;
        if let Err(err) = self.ingest_variables(dataset, &mut registered) {
            error!("Dataset ingestion stopped after {} layers: {}", registered, err);
        }
        registered
    }

    /// Open a NetCDF file and [`ingest`](Self::ingest) it.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Dataset`](crate::error::DataError::Dataset) if the
    /// file cannot be opened.
    #[cfg(feature = "netcdf")]
    pub fn load_netcdf(&mut self, path: impl AsRef<std::path::Path>) -> Result<usize> {
        let dataset = crate::ingest::NetcdfDataset::open(path)?;
        Ok(self.ingest(&dataset))
    }

    fn ingest_variables(&mut self, dataset: &dyn ScientificDataset, registered: &mut usize) -> Result<()> {
        let domain = DomainAttributes::read(dataset, &self.config);
        info!(
            "Ingesting dataset version {} at ({}, {}) extent ({}, {})",
            domain.version, domain.sw.x, domain.sw.y, domain.extent.x, domain.extent.y
        );

        for name in dataset.variable_names() {
            if name == DOMAIN_VARIABLE {
                continue;
            }
            let Some(kind) = dataset
                .attribute(&name, TYPE_ATTRIBUTE)
                .and_then(|value| value.as_str().map(str::to_string))
                .filter(|kind| !kind.is_empty())
            else {
                warn!("Skipping variable {} because it has no type attribute", name);
                continue;
            };

            if name == "wind" {
                *registered += self.ingest_wind(dataset, &domain)?;
            } else if name == "fuel" {
                let footprint = self.footprint(&name, &domain);
                let extents = grid_extents(&dataset.dimensions(&name)?);
                let raster = FieldArray::from_foreign(name.as_str(), extents, &dataset.read_i32(&name)?)?;
                let layer = FuelLayer::raster(name.as_str(), raster, footprint.origin, footprint.extent, footprint.t0, footprint.span);
                self.register_layer(DataLayer::Fuel(layer));
                *registered += 1;
            } else if KNOWN_FIELDS.contains(&name.as_str()) {
                self.ingest_gridded(dataset, &name, &domain)?;
                *registered += 1;
            } else if kind.contains("data") {
                if self.needed.contains(&name) {
                    self.ingest_gridded(dataset, &name, &domain)?;
                    *registered += 1;
                } else {
                    debug!("No model needs {}, not ingested", name);
                }
            } else if kind.contains("flux") {
                self.ingest_flux(dataset, &name, &domain)?;
                *registered += 1;
            } else if kind.contains("parameter") {
                for (key, value) in dataset.attributes(&name) {
                    if key != TYPE_ATTRIBUTE {
                        self.config.set(&key, value.to_parameter());
                    }
                }
            } else if kind.contains("propagative") {
                warn!("Propagative layer {} cannot be built from a dataset, skipped", name);
            } else {
                debug!("Variable {} of type {} has no layer kind", name, kind);
            }
        }
        Ok(())
    }

    fn ingest_gridded(&mut self, dataset: &dyn ScientificDataset, name: &str, domain: &DomainAttributes) -> Result<()> {
        let footprint = self.footprint(name, domain);
        let extents = grid_extents(&dataset.dimensions(name)?);
        let array = FieldArray::from_foreign(name, extents, &dataset.read_f64(name)?)?;
        let layer = GriddedLayer::spanning(name, array, footprint.origin, footprint.extent, footprint.t0, footprint.span);
        self.register_layer(DataLayer::Gridded(layer));
        Ok(())
    }

    /// Split the two time slices of `wind` into `windU` and `windV`.
    fn ingest_wind(&mut self, dataset: &dyn ScientificDataset, domain: &DomainAttributes) -> Result<usize> {
        let footprint = self.footprint("wind", domain);
        let [nx, ny, nz, nt] = grid_extents(&dataset.dimensions("wind")?);
        if nt < 2 {
            warn!("wind needs two time slices for its components, found {}", nt);
            return Ok(0);
        }
        let data = dataset.read_f64("wind")?;
        let slab = nx * ny * nz;
        for (slice, key) in ["windU", "windV"].into_iter().enumerate() {
            let component = data.get(slice * slab..(slice + 1) * slab).unwrap_or_default();
            let array = FieldArray::from_foreign(key, [nx, ny, nz, 1], component)?;
            let layer = GriddedLayer::spanning(key, array, footprint.origin, footprint.extent, footprint.t0, footprint.span);
            self.register_layer(DataLayer::Gridded(layer));
        }
        Ok(2)
    }

    fn ingest_flux(&mut self, dataset: &dyn ScientificDataset, name: &str, domain: &DomainAttributes) -> Result<()> {
        let index = dataset
            .attribute(name, "indices")
            .and_then(|value| value.as_i64())
            .unwrap_or_else(|| {
                warn!("Flux variable {} has no indices attribute, using model 0", name);
                0
            });
        let mut models = BTreeMap::new();
        match dataset
            .attribute(name, &format!("model{index}name"))
            .and_then(|value| value.as_str().map(str::to_string))
        {
            Some(model) => {
                info!("Flux layer {} carries model {} as {}", name, model, index);
                models.insert(index as i32, model);
            }
            None => warn!("Flux variable {} names no model{}name", name, index),
        }
        let footprint = self.footprint(name, domain);
        let extents = grid_extents(&dataset.dimensions(name)?);
        let indices = FieldArray::from_foreign(name, extents, &dataset.read_i32(name)?)?;
        let layer = FluxLayer::new(name, indices, footprint.origin, footprint.extent, footprint.t0, footprint.span, models);
        self.register_flux_layer(DataLayer::Flux(layer));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::Vec3;
    use crate::ingest::MemoryDataset;
    use crate::layer::LayerContext;

    fn dataset_over(sw: (f64, f64), extent: (f64, f64)) -> MemoryDataset {
        let mut dataset = MemoryDataset::new();
        dataset
            .set_attribute("domain", "SWx", sw.0)
            .set_attribute("domain", "SWy", sw.1)
            .set_attribute("domain", "Lx", extent.0)
            .set_attribute("domain", "Ly", extent.1)
            .set_attribute("domain", "t0", 0.0)
            .set_attribute("domain", "Lt", 100.0);
        dataset
    }

    fn broker() -> DataBroker {
        DataBroker::new(SimulationConfig::with_domain(Vec3::zeros(), Vec3::new(1000.0, 1000.0, 0.0)))
    }

    #[test]
    fn test_dated_t0_shifted_onto_simulation_time() {
        let mut dataset = dataset_over((0.0, 0.0), (1000.0, 1000.0));
        dataset.set_attribute("domain", "t0", 3600.0);
        let config = SimulationConfig::default();
        assert_eq!(DomainAttributes::read(&dataset, &config).t0, 3600.0);

        dataset
            .set_attribute("domain", "refYear", 2012.0)
            .set_attribute("domain", "refDay", 2.0);
        let attributes = DomainAttributes::read(&dataset, &config);
        assert_eq!(attributes.t0, 86400.0 + 3600.0);
        assert_eq!(attributes.span, 100.0);

        let mut late_start = config.clone();
        late_start.set("ISOdate", "2012-01-02T06:00:00Z");
        assert_eq!(DomainAttributes::read(&dataset, &late_start).t0, -18000.0);

        let mut broken = config;
        broken.set("ISOdate", "soon");
        assert_eq!(DomainAttributes::read(&dataset, &broken).t0, 3600.0);
    }

    #[test]
    fn test_relevant_footprint() {
        let broker = broker();
        assert!(broker.is_relevant_footprint(&Vec3::new(-50.0, -50.0, 0.0), &Vec3::new(100.0, 100.0, 0.0)));
        assert!(!broker.is_relevant_footprint(&Vec3::new(2000.0, 0.0, 0.0), &Vec3::new(100.0, 100.0, 0.0)));
        assert!(!broker.is_relevant_footprint(&Vec3::new(0.0, -500.0, 0.0), &Vec3::new(100.0, 100.0, 0.0)));
    }

    #[test]
    fn test_wind_split_into_components() {
        let mut dataset = dataset_over((0.0, 0.0), (1000.0, 1000.0));
        let mut values = vec![2.0; 4];
        values.extend([-1.0; 4]);
        dataset.add_f64("wind", &[2, 1, 2, 2], values).unwrap().set_attribute("wind", "type", "data");
        let mut broker = broker();
        assert_eq!(broker.ingest(&dataset), 2);
        let center = Vec3::new(500.0, 500.0, 0.0);
        assert_eq!(broker.value_at("windU", &center, 50.0).unwrap(), 2.0);
        assert_eq!(broker.value_at("windV", &center, 50.0).unwrap(), -1.0);
    }

    #[test]
    fn test_data_variables_need_a_model() {
        let mut dataset = dataset_over((0.0, 0.0), (1000.0, 1000.0));
        dataset.add_f64("heatFlux", &[1, 1], vec![5.0]).unwrap().set_attribute("heatFlux", "type", "data");
        dataset.add_f64("smoke", &[1, 1], vec![1.0]).unwrap().set_attribute("smoke", "type", "data");
        let mut broker = broker();
        broker.register_flux_model("heat", &["heatFlux"]);
        broker.ingest(&dataset);
        assert!(broker.has_layer("heatFlux"));
        assert!(!broker.has_layer("smoke"));
    }

    #[test]
    fn test_parameters_and_untyped_variables() {
        let mut dataset = dataset_over((0.0, 0.0), (1000.0, 1000.0));
        dataset
            .set_attribute("parameters", "type", "parameter")
            .set_attribute("parameters", "frontScanDistance", 250.0)
            .set_attribute("parameters", "propagationModel", "Rothermel");
        dataset.add_f64("altitude", &[1, 1], vec![10.0]).unwrap();
        let mut broker = broker();
        assert_eq!(broker.ingest(&dataset), 0);
        assert_eq!(broker.config().front_scan_distance, 250.0);
        assert_eq!(broker.config().get_str("propagationModel"), Some("Rothermel"));
        assert!(!broker.has_layer("altitude"));
    }

    #[test]
    fn test_flux_layer_binds_model() {
        let mut dataset = dataset_over((0.0, 0.0), (1000.0, 1000.0));
        dataset
            .add_i32("heatFlux", &[2, 2], vec![0, 1, 1, 0])
            .unwrap()
            .set_attribute("heatFlux", "type", "flux")
            .set_attribute("heatFlux", "indices", 1_i64)
            .set_attribute("heatFlux", "model1name", "HeatFluxBasic");
        let mut broker = broker();
        assert_eq!(broker.ingest(&dataset), 1);
        match broker.flux_layer("heatFlux") {
            Some(DataLayer::Flux(layer)) => assert_eq!(layer.model_name(1), Some("HeatFluxBasic")),
            other => panic!("unexpected layer {other:?}"),
        }
        assert_eq!(broker.value_at("heatFlux", &Vec3::new(750.0, 250.0, 0.0), 0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_fuel_raster_and_reprojection() {
        let mut dataset = dataset_over((50000.0, 50000.0), (100.0, 100.0));
        dataset
            .add_i32("fuel", &[2, 2], vec![1, 2, 3, 4])
            .unwrap()
            .set_attribute("fuel", "type", "fuel");
        let mut broker = broker();
        assert_eq!(broker.ingest(&dataset), 1);
        let layer = broker.layer("fuel").unwrap();
        let geometry = layer.geometry(&LayerContext::new(&broker.layers, None));
        assert_eq!(geometry.origin, Vec3::zeros());
        assert_eq!(geometry.extent, Vec3::new(1000.0, 1000.0, FOOTPRINT_FALLBACK_DEPTH));
        assert_eq!(broker.value_at("fuel", &Vec3::new(750.0, 750.0, 0.0), 10.0).unwrap(), 4.0);
        assert_eq!(broker.value_at("fuel", &Vec3::new(750.0, 250.0, 0.0), 10.0).unwrap(), 2.0);
    }

    #[test]
    fn test_grid_extents_by_rank() {
        assert_eq!(grid_extents(&[3, 4]), [4, 3, 1, 1]);
        assert_eq!(grid_extents(&[2, 3, 4]), [4, 3, 2, 1]);
        assert_eq!(grid_extents(&[5, 2, 3, 4]), [4, 3, 2, 5]);
    }
}
