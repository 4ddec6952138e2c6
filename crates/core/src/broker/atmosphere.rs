//! Layers shared with a coupled atmospheric model.
//!
//! The atmospheric grid covers the simulation domain with `atmo_nx x atmo_ny`
//! cells. Wind components live on its staggered faces: `windU` half a cell
//! south of the cell corners, `windV` half a cell west, each with a one-cell
//! halo around the interior.

use super::DataBroker;
use crate::core_types::Vec3;
use crate::field::FieldArray;
use crate::layer::{DataLayer, GriddedLayer, ScaledLayer, StitchOutcome, TwoTimeLayer};
use tracing::{info, warn};

/// Wind components refreshed from the atmospheric model
pub const WIND_COMPONENTS: [&str; 2] = ["windU", "windV"];

impl DataBroker {
    /// Atmospheric cell size `(dx, dy)`.
    #[must_use]
    pub fn atmospheric_resolution(&self) -> (f64, f64) {
        let extent = self.config.domain_extent();
        (
            extent.x / self.config.atmo_nx.max(1) as f64,
            extent.y / self.config.atmo_ny.max(1) as f64,
        )
    }

    /// Register the wind and topography layers of the atmospheric grid.
    ///
    /// Both wind components start at 0 with `t1 = t2 = time`; `outerWindU`
    /// and `outerWindV` alias them. An altitude grid of the configured
    /// `altitude` value is registered unless a gridded altitude is already
    /// present.
    pub fn initialize_atmospheric_layers(&mut self, time: f64) {
        let (nx, ny) = (self.config.atmo_nx.max(1), self.config.atmo_ny.max(1));
        let (dx, dy) = self.atmospheric_resolution();
        let sw = self.config.domain_sw;
        let spacing = Vec3::new(dx, dy, 0.0);
        info!("Atmospheric grid {}x{} cells of {}x{} m", nx, ny, dx, dy);

        let origins = [
            Vec3::new(sw.x - dx, sw.y - 0.5 * dy, 0.0),
            Vec3::new(sw.x - 0.5 * dx, sw.y - dy, 0.0),
        ];
        for (key, origin) in WIND_COMPONENTS.into_iter().zip(origins) {
            let layer = TwoTimeLayer::uniform(key, 0.0, nx + 2, ny + 2, time, origin, spacing);
            self.register_layer(DataLayer::TwoTime(layer));
            let outer = format!("outer{}{}", key[..1].to_uppercase(), &key[1..]);
            self.register_layer(DataLayer::Scaled(ScaledLayer::new(outer, key, 1.0)));
        }

        if matches!(self.layers.get("altitude"), Some(DataLayer::Gridded(_))) {
            return;
        }
        let altitude = self.config.get_f64_or("altitude", 0.0);
        let topography = FieldArray::new_2d("altitude", altitude, nx, ny);
        let layer = GriddedLayer::spanning("altitude", topography, sw, self.config.domain_extent(), time, 0.0);
        self.register_layer(DataLayer::Gridded(layer));
    }

    /// Stitch per-process wind snapshots `<pattern><n>.windU|windV` into the
    /// wind layers, making `ref_time` their new `t2`.
    ///
    /// Returns the outcome of every sub-window, `windU` first.
    pub fn load_multi_wind(&mut self, pattern: &str, ref_time: f64, placements: &[(usize, usize)]) -> Vec<StitchOutcome> {
        let mut outcomes = Vec::with_capacity(2 * placements.len());
        for key in WIND_COMPONENTS {
            match self.layers.get_mut(key) {
                Some(DataLayer::TwoTime(layer)) => outcomes.extend(layer.stitch_partials(pattern, ref_time, placements)),
                Some(other) => warn!("{} is a {} layer, cannot stitch wind into it", key, other.kind_name()),
                None => warn!("No {} layer to stitch wind into", key),
            }
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use approx::assert_abs_diff_eq;

    fn coupled() -> DataBroker {
        let mut config = SimulationConfig::with_domain(Vec3::new(100.0, 200.0, 0.0), Vec3::new(1100.0, 1200.0, 0.0));
        config.atmo_nx = 10;
        config.atmo_ny = 20;
        DataBroker::new(config)
    }

    #[test]
    fn test_staggered_wind_origins() {
        let mut broker = coupled();
        broker.initialize_atmospheric_layers(0.0);
        let ctx = broker.context();
        let u = broker.layer("windU").unwrap().geometry(&ctx);
        let v = broker.layer("windV").unwrap().geometry(&ctx);
        assert_eq!(u.origin, Vec3::new(0.0, 175.0, 0.0));
        assert_eq!(v.origin, Vec3::new(50.0, 150.0, 0.0));
        assert_eq!(broker.matrix("windU", 0.0).unwrap().extents(), [12, 22, 1, 1]);
        assert!(broker.has_layer("outerWindU"));
        assert!(broker.has_layer("outerWindV"));
        assert!(broker.has_layer("slope"));
    }

    #[test]
    fn test_outer_wind_follows_injection() {
        let mut broker = coupled();
        broker.initialize_atmospheric_layers(0.0);
        broker.inject_matrix("windU", &[3.0; 10 * 20], 10.0).unwrap();
        let center = Vec3::new(600.0, 700.0, 0.0);
        assert_abs_diff_eq!(broker.value_at("windU", &center, 10.0).unwrap(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(broker.value_at("outerWindU", &center, 10.0).unwrap(), 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(broker.value_at("windU", &center, 5.0).unwrap(), 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_missing_partials_reported_and_times_rotate() {
        let mut broker = coupled();
        broker.initialize_atmospheric_layers(0.0);
        let pattern = std::env::temp_dir()
            .join(format!("fire_data_missing_{}_", std::process::id()))
            .to_string_lossy()
            .into_owned();
        let outcomes = broker.load_multi_wind(&pattern, 30.0, &[(0, 0), (5, 0)]);
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| matches!(o, StitchOutcome::Missing { .. })));
        match broker.layer("windV") {
            Some(DataLayer::TwoTime(layer)) => assert_eq!(layer.times(), (0.0, 30.0)),
            other => panic!("unexpected layer {other:?}"),
        }
    }
}
