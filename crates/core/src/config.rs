//! Simulation configuration passed explicitly to the broker and layers.
//!
//! Typed fields cover every setting the data-layer framework reads itself.
//! Everything else (model coefficients, ingested `parameter` variables, host
//! settings) lives in a free-form string bag with typed getters. Setting a
//! known key through [`SimulationConfig::set`] updates the typed field so the
//! two views never disagree.

use crate::core_types::Vec3;
use crate::error::Result;
use crate::field::BoundsMode;
use crate::geo::IsoDate;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Semicolon-delimited Anderson 13 fuel models, row 0 reserved for "no data".
pub const DEFAULT_FUELS_TABLE: &str = "\
Index;code;h1;h10;h100;lh;lw;dynamic;sav1;savlh;savlw;depth;xmext;heatd;heatl;desc
0;NB0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;NO DATA MODEL
1;FM1;0.74;0.0;0.0;0.0;0.0;0;3500;1800;1500;1.0;0.12;8000.0;8000.0;Short Grass
2;FM2;2.0;1.0;0.5;0.0;0.5;0;3000;1800;1500;1.0;0.15;8000.0;8000.0;Timber Grass/Understory
3;FM3;3.01;0.0;0.0;0.0;0.0;0;1500;1800;1500;2.5;0.25;8000.0;8000.0;Tall Grass
4;FM4;5.01;4.01;2.0;0.0;5.01;0;2000;1800;1500;6.0;0.2;8000.0;8000.0;Chaparral
5;FM5;1.0;0.5;0.0;0.0;2.0;0;2000;1800;1500;2.0;0.2;8000.0;8000.0;Short Brush
6;FM6;1.5;2.5;2.0;0.0;0.0;0;1750;1800;1500;2.5;0.25;8000.0;8000.0;Dormant Brush
7;FM7;1.13;1.87;1.5;0.0;0.37;0;1550;1800;1500;2.5;0.4;8000.0;8000.0;Southern Rough
8;FM8;1.5;1.0;2.5;0.0;0.0;0;2000;1800;1500;0.2;0.3;8000.0;8000.0;Closed Timber Litter
9;FM9;2.92;0.41;0.15;0.0;0.0;0;2500;1800;1500;0.2;0.25;8000.0;8000.0;Hardwood Litter
10;FM10;3.01;2.0;5.01;0.0;2.0;0;2000;1800;1500;1.0;0.25;8000.0;8000.0;Timber Litter/Understory
11;FM11;1.5;4.51;5.51;0.0;0.0;0;1500;1800;1500;1.0;0.15;8000.0;8000.0;Light Slash
12;FM12;4.01;14.03;16.53;0.0;0.0;0;1500;1800;1500;2.3;0.2;8000.0;8000.0;Medium Slash
13;FM13;7.01;23.04;28.05;0.0;0.0;0;1500;1800;1500;3.0;0.25;8000.0;8000.0;Heavy Slash
98;NB8;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;Open Water
99;NB9;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;0.0;Bare Ground";

/// Dead and live fuel moisture fractions served as one five-value bundle.
///
/// Order in model buffers: ones, live herb, tens, live wood, hundreds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoistureBundle {
    /// 1-hour dead fuel moisture
    pub ones: f64,
    /// Live herbaceous moisture
    pub live_herb: f64,
    /// 10-hour dead fuel moisture
    pub tens: f64,
    /// Live woody moisture
    pub live_wood: f64,
    /// 100-hour dead fuel moisture
    pub hundreds: f64,
}

impl MoistureBundle {
    /// Configuration keys for each bundle slot, in buffer order.
    pub const KEYS: [&'static str; 5] = [
        "moist.ones",
        "moist.liveh",
        "moist.tens",
        "moist.livew",
        "moist.hundreds",
    ];

    #[must_use]
    pub fn as_array(&self) -> [f64; 5] {
        [
            self.ones,
            self.live_herb,
            self.tens,
            self.live_wood,
            self.hundreds,
        ]
    }
}

impl Default for MoistureBundle {
    fn default() -> Self {
        Self {
            ones: 0.06,
            live_herb: 0.90,
            tens: 0.07,
            live_wood: 0.60,
            hundreds: 0.08,
        }
    }
}

/// Configuration for a data broker and the layers it creates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Probe distance (m) of the slope layer derived from altitude
    pub spatial_increment: f64,
    /// Probe distance (m) of the arrival-time gradient layer
    pub time_gradient_look_ahead: f64,
    /// Search radius (m) for the fastest-node-in-section property
    pub front_scan_distance: f64,
    /// Coupled with an atmospheric model rather than standalone
    pub coupled: bool,
    /// Atmospheric grid interior size
    pub atmo_nx: usize,
    pub atmo_ny: usize,
    /// Longitude/latitude of the projected origin, used in coupled mode
    pub ref_longitude: f64,
    pub ref_latitude: f64,
    /// South-west corner of the simulation domain (projected metres)
    pub domain_sw: Vec3,
    /// North-east corner of the simulation domain (projected metres)
    pub domain_ne: Vec3,
    /// Inline fuel table used when no table file is loaded
    pub fuels_table: String,
    /// Date of simulation time zero, `YYYY-MM-DDThh:mm:ssZ`
    pub iso_date: String,
    /// Out-of-range policy applied to every layer the broker registers
    /// (`boundsMode` = `strict` or `clamp`). Layers registered earlier keep
    /// the policy they were registered with.
    pub bounds_mode: BoundsMode,
    /// Moisture values served to models that want a `moist.*` property.
    ///
    /// Read when a model is registered; changing it afterwards only affects
    /// models registered later.
    pub moisture: MoistureBundle,
    /// Free-form parameters keyed by name
    parameters: FxHashMap<String, String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            spatial_increment: 2.0,
            time_gradient_look_ahead: 40.0,
            front_scan_distance: 1000.0,
            coupled: false,
            atmo_nx: 100,
            atmo_ny: 100,
            ref_longitude: 0.0,
            ref_latitude: 0.0,
            domain_sw: Vec3::zeros(),
            domain_ne: Vec3::new(1000.0, 1000.0, 0.0),
            fuels_table: DEFAULT_FUELS_TABLE.to_string(),
            iso_date: "2012-01-01T00:00:00Z".to_string(),
            bounds_mode: BoundsMode::ClampAndWarn,
            moisture: MoistureBundle::default(),
            parameters: FxHashMap::default(),
        }
    }
}

impl SimulationConfig {
    /// Configuration for a domain spanning `sw` to `ne`, defaults elsewhere.
    #[must_use]
    pub fn with_domain(sw: Vec3, ne: Vec3) -> Self {
        Self {
            domain_sw: sw,
            domain_ne: ne,
            ..Self::default()
        }
    }

    /// Set a parameter by name.
    ///
    /// Known keys (`spatialIncrement`, `frontScanDistance`, `atmoNX`,
    /// `moist.ones`, ...) update their typed field when the value parses;
    /// every key is also stored in the parameter bag.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        let value = value.to_string();
        let number = value.trim().parse::<f64>().ok();
        match (key, number) {
            ("spatialIncrement", Some(v)) => self.spatial_increment = v,
            ("LookAheadDistanceForeTimeGradientDataLayer", Some(v)) => {
                self.time_gradient_look_ahead = v;
            }
            ("frontScanDistance", Some(v)) => self.front_scan_distance = v,
            ("atmoNX", Some(v)) if v >= 0.0 => self.atmo_nx = v as usize,
            ("atmoNY", Some(v)) if v >= 0.0 => self.atmo_ny = v as usize,
            ("refLongitude", Some(v)) => self.ref_longitude = v,
            ("refLatitude", Some(v)) => self.ref_latitude = v,
            ("moist.ones", Some(v)) => self.moisture.ones = v,
            ("moist.liveh", Some(v)) => self.moisture.live_herb = v,
            ("moist.tens", Some(v)) => self.moisture.tens = v,
            ("moist.livew", Some(v)) => self.moisture.live_wood = v,
            ("moist.hundreds", Some(v)) => self.moisture.hundreds = v,
            ("runmode", _) => self.coupled = value == "coupled",
            ("ISOdate", _) => self.iso_date.clone_from(&value),
            ("fuelsTable", _) => self.fuels_table.clone_from(&value),
            ("boundsMode", _) => match value.trim() {
                "strict" => self.bounds_mode = BoundsMode::Strict,
                "clamp" => self.bounds_mode = BoundsMode::ClampAndWarn,
                other => warn!("Unknown bounds mode '{other}', expected 'strict' or 'clamp'"),
            },
            (
                "spatialIncrement"
                | "LookAheadDistanceForeTimeGradientDataLayer"
                | "frontScanDistance"
                | "atmoNX"
                | "atmoNY"
                | "refLongitude"
                | "refLatitude",
                _,
            ) => warn!("Parameter {key} expects a number, got '{value}'"),
            _ => {}
        }
        self.parameters.insert(key.to_string(), value);
    }

    /// Whether a parameter has been set in the bag.
    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// Parameter parsed as a float, `None` when unset or not numeric.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get_str(key).and_then(|v| v.trim().parse().ok())
    }

    #[must_use]
    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    /// Parameter parsed as an integer, `None` when unset or not integral.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_str(key).and_then(|v| v.trim().parse().ok())
    }

    /// Parameter split on commas and parsed as floats; unparsable items are dropped.
    #[must_use]
    pub fn get_f64_list(&self, key: &str) -> Vec<f64> {
        self.get_str(key)
            .map(|v| v.split(',').filter_map(|s| s.trim().parse().ok()).collect())
            .unwrap_or_default()
    }

    /// All parameter keys currently in the bag, sorted.
    #[must_use]
    pub fn parameter_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.parameters.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Simulation time zero as a date.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::InvalidDate`](crate::error::DataError::InvalidDate)
    /// if `ISOdate` is malformed.
    pub fn reference_date(&self) -> Result<IsoDate> {
        IsoDate::parse(&self.iso_date)
    }

    /// Domain extent (NE - SW).
    #[must_use]
    pub fn domain_extent(&self) -> Vec3 {
        self.domain_ne - self.domain_sw
    }
}
