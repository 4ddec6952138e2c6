//! Property resolution: compiling a model's wanted names into accessors.
//!
//! Every wanted name is resolved once, at model registration. Names found in
//! the property table become direct accessors that read a role slot of the
//! registry or a field of the front node. A model whose names all resolve
//! runs that compiled chain on every query. One unresolved name switches the
//! whole model to the fallback chain, which looks each layer up by name at
//! query time and asks it to extract its own values.

use crate::core_types::{dot_xy, FrontNode, Vec3};
use crate::layer::{DataLayer, LayerContext, Query};
use crate::model::{FuelMatrix, ModelKind, FUEL_PREFIX};
use tracing::warn;

/// Prefix of wanted names served by the moisture bundle
pub const MOISTURE_PREFIX: &str = "moist";

/// Number of values in the moisture bundle
pub const MOISTURE_BUNDLE_WIDTH: usize = 5;

/// Single-value properties with a direct accessor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Altitude,
    Slope,
    WindU,
    WindV,
    NormalWind,
    FrontDepth,
    FrontCurvature,
    FrontFastestInSection,
    NodeLocationX,
    NodeLocationY,
    NodeId,
    NodeState,
    NodeTime,
    ArrivalTimeGradient,
    Temperature,
    Moisture,
    FieldSpeed,
    FuelIndex,
}

impl Property {
    /// Property table of front-node (propagation) models
    #[must_use]
    pub fn for_propagation(name: &str) -> Option<Self> {
        Some(match name {
            "altitude" => Property::Altitude,
            "slope" => Property::Slope,
            "windU" => Property::WindU,
            "windV" => Property::WindV,
            "normalWind" => Property::NormalWind,
            "frontDepth" => Property::FrontDepth,
            "frontCurvature" => Property::FrontCurvature,
            "frontFastestInSection" => Property::FrontFastestInSection,
            "nodeLocationX" => Property::NodeLocationX,
            "nodeLocationY" => Property::NodeLocationY,
            "nodeID" => Property::NodeId,
            "nodeState" => Property::NodeState,
            "nodeTime" => Property::NodeTime,
            "arrival_time_gradient" => Property::ArrivalTimeGradient,
            "temperature" => Property::Temperature,
            "moisture" => Property::Moisture,
            "fieldSpeed" => Property::FieldSpeed,
            "fuel" => Property::FuelIndex,
            _ => return None,
        })
    }

    /// Property table of point (flux) models
    #[must_use]
    pub fn for_flux(name: &str) -> Option<Self> {
        Some(match name {
            "fuel" => Property::FuelIndex,
            "moisture" => Property::Moisture,
            "altitude" => Property::Altitude,
            "windU" => Property::WindU,
            "windV" => Property::WindV,
            _ => return None,
        })
    }

    /// Resolve `name` in the table of `kind`.
    #[must_use]
    pub fn lookup(kind: ModelKind, name: &str) -> Option<Self> {
        match kind {
            ModelKind::Propagation => Self::for_propagation(name),
            ModelKind::Flux => Self::for_flux(name),
        }
    }

    /// Whether the value comes from the front node rather than a layer
    #[must_use]
    pub fn is_node_computed(self) -> bool {
        matches!(
            self,
            Property::NormalWind
                | Property::FrontDepth
                | Property::FrontCurvature
                | Property::FrontFastestInSection
                | Property::NodeLocationX
                | Property::NodeLocationY
                | Property::NodeId
                | Property::NodeState
                | Property::NodeTime
        )
    }
}

/// Registry slots of the layers filling well-known roles
#[derive(Debug, Clone, Copy, Default)]
pub struct Roles {
    pub altitude: Option<usize>,
    pub slope: Option<usize>,
    pub wind_u: Option<usize>,
    pub wind_v: Option<usize>,
    pub temperature: Option<usize>,
    pub moisture: Option<usize>,
    pub fuel: Option<usize>,
    pub arrival_time_gradient: Option<usize>,
    pub field_speed: Option<usize>,
}

impl Roles {
    /// Record `slot` for every role whose pattern `name` matches.
    ///
    /// Patterns match anywhere in the name and the last registration wins,
    /// so `fuelMoisture` takes both the fuel and the moisture role.
    pub fn assign(&mut self, name: &str, slot: usize) {
        let patterns: [(&str, &mut Option<usize>); 6] = [
            ("altitude", &mut self.altitude),
            ("moisture", &mut self.moisture),
            ("temperature", &mut self.temperature),
            ("windU", &mut self.wind_u),
            ("windV", &mut self.wind_v),
            ("fuel", &mut self.fuel),
        ];
        for (pattern, role) in patterns {
            if name.contains(pattern) {
                *role = Some(slot);
            }
        }
        match name {
            "slope" => self.slope = Some(slot),
            "arrival_time_gradient" => self.arrival_time_gradient = Some(slot),
            "fieldSpeed" => self.field_speed = Some(slot),
            _ => {}
        }
    }

    fn slot_for(&self, property: Property) -> Option<usize> {
        match property {
            Property::Altitude => self.altitude,
            Property::Slope => self.slope,
            Property::WindU => self.wind_u,
            Property::WindV => self.wind_v,
            Property::Temperature => self.temperature,
            Property::Moisture => self.moisture,
            Property::FuelIndex => self.fuel,
            Property::ArrivalTimeGradient => self.arrival_time_gradient,
            Property::FieldSpeed => self.field_speed,
            _ => None,
        }
    }
}

/// One step of a compiled chain
#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    /// Direct single-value accessor
    Single(Property),
    /// Parameter row of the fuel at the query location, via the fuel role
    Fuel,
    /// Constant moisture bundle
    Moisture([f64; MOISTURE_BUNDLE_WIDTH]),
    /// Fallback: layer looked up by name per query
    ByName {
        name: String,
        computed: Option<Property>,
    },
    /// Fallback: fuel parameters via the layer registered as `fuel`
    FuelByName,
}

impl Accessor {
    /// Number of output slots the accessor fills.
    #[must_use]
    pub fn width(&self, fuel_width: usize) -> usize {
        match self {
            Accessor::Fuel | Accessor::FuelByName => fuel_width,
            Accessor::Moisture(_) => MOISTURE_BUNDLE_WIDTH,
            Accessor::Single(_) | Accessor::ByName { .. } => 1,
        }
    }
}

/// Result of compiling a model's wanted names
#[derive(Debug)]
pub struct Compiled {
    pub accessors: Vec<Accessor>,
    pub optimized: bool,
    /// Names the model needs a layer for
    pub needed: Vec<String>,
}

/// Compile `wanted` into an accessor chain.
///
/// `fuel_columns` lists the fuel parameters the fuel table provides; a
/// wanted fuel parameter it lacks also disables the compiled chain.
#[must_use]
pub fn compile(kind: ModelKind, model: &str, wanted: &[String], moisture: [f64; MOISTURE_BUNDLE_WIDTH], fuel_columns: &[String]) -> Compiled {
    let mut optimized = true;
    let mut fast = Vec::new();
    let mut slow = Vec::new();
    let mut needed: Vec<String> = Vec::new();
    let mut fuel_bound = false;
    let mut moisture_bound = false;

    let mut need = |name: &str| {
        if !needed.iter().any(|n| n == name) {
            needed.push(name.to_string());
        }
    };

    for name in wanted {
        if let Some(parameter) = name.strip_prefix(FUEL_PREFIX) {
            if !fuel_columns.iter().any(|column| column == parameter) {
                warn!(
                    "Fuel parameter {} wanted by {} is not in the fuel table, using the fallback path",
                    parameter, model
                );
                optimized = false;
            }
            if !fuel_bound {
                fast.push(Accessor::Fuel);
                slow.push(Accessor::FuelByName);
                need("fuel");
                fuel_bound = true;
            }
            continue;
        }
        if let Some(property) = Property::lookup(kind, name) {
            fast.push(Accessor::Single(property));
            slow.push(Accessor::ByName {
                name: name.clone(),
                computed: property.is_node_computed().then_some(property),
            });
            need(name);
            continue;
        }
        if name.starts_with(MOISTURE_PREFIX) {
            if !moisture_bound {
                fast.push(Accessor::Moisture(moisture));
                slow.push(Accessor::Moisture(moisture));
                moisture_bound = true;
            }
            continue;
        }
        warn!(
            "Could not find an optimized property getter for {} wanted by {}, switching to the fallback path",
            name, model
        );
        optimized = false;
        slow.push(Accessor::ByName {
            name: name.clone(),
            computed: None,
        });
        need(name);
    }

    Compiled {
        accessors: if optimized { fast } else { slow },
        optimized,
        needed,
    }
}

/// Runs a compiled chain against the registry
pub struct Evaluator<'a> {
    pub ctx: LayerContext<'a>,
    pub roles: &'a Roles,
    pub front_scan_distance: f64,
}

impl Evaluator<'_> {
    /// Execute `accessors` for `query`, writing sequentially into `out`.
    ///
    /// Returns the number of values written.
    pub fn fill(&self, accessors: &[Accessor], fuel: &FuelMatrix, query: &Query<'_>, out: &mut [f64]) -> usize {
        let mut filled = 0;
        for accessor in accessors {
            filled += match accessor {
                Accessor::Single(property) => write_value(out, filled, self.property(*property, query)),
                Accessor::Fuel => match self.role_layer(self.roles.fuel) {
                    Some(layer) => layer.extract(&self.ctx, query, fuel, out, filled),
                    None => zero_fill(out, filled, fuel.width()),
                },
                Accessor::Moisture(values) => {
                    let mut written = 0;
                    for &value in values {
                        written += write_value(out, filled + written, value);
                    }
                    written
                }
                Accessor::ByName { name, computed } => match self.ctx.layers.get(name) {
                    Some(layer) => layer.extract(&self.ctx, query, fuel, out, filled),
                    None => {
                        let value = computed.map_or_else(
                            || {
                                warn!("No layer registered for {}, using 0", name);
                                0.0
                            },
                            |property| self.property(property, query),
                        );
                        write_value(out, filled, value)
                    }
                },
                Accessor::FuelByName => match self.ctx.layers.get("fuel") {
                    Some(layer) => layer.extract(&self.ctx, query, fuel, out, filled),
                    None => {
                        warn!("No fuel layer registered, using 0 for fuel parameters");
                        zero_fill(out, filled, fuel.width())
                    }
                },
            };
        }
        filled
    }

    fn role_layer(&self, slot: Option<usize>) -> Option<&DataLayer> {
        slot.and_then(|slot| self.ctx.layers.slot(slot))
    }

    fn layer_value(&self, property: Property, query: &Query<'_>) -> f64 {
        let Some(layer) = self.role_layer(self.roles.slot_for(property)) else {
            return 0.0;
        };
        match query {
            Query::Node(node) => layer.value_at_node(&self.ctx, *node),
            Query::Point { location, time } => layer.value_at(&self.ctx, location, *time),
        }
    }

    /// Value of a single property for `query`.
    ///
    /// Node-computed properties are 0 for point queries.
    pub fn property(&self, property: Property, query: &Query<'_>) -> f64 {
        if !property.is_node_computed() {
            return self.layer_value(property, query);
        }
        let Query::Node(node) = query else {
            return 0.0;
        };
        if property == Property::NormalWind {
            let wind = Vec3::new(
                self.layer_value(Property::WindU, query),
                self.layer_value(Property::WindV, query),
                0.0,
            );
            return dot_xy(&wind, &node.normal());
        }
        node_property(property, *node, self.front_scan_distance)
    }
}

fn write_value(out: &mut [f64], offset: usize, value: f64) -> usize {
    match out.get_mut(offset) {
        Some(slot) => {
            *slot = value;
            1
        }
        None => 0,
    }
}

fn zero_fill(out: &mut [f64], offset: usize, count: usize) -> usize {
    let end = (offset + count).min(out.len());
    if let Some(slots) = out.get_mut(offset..end) {
        slots.fill(0.0);
    }
    end.saturating_sub(offset)
}

fn node_property(property: Property, node: &dyn FrontNode, scan_distance: f64) -> f64 {
    match property {
        Property::FrontDepth => node.front_depth(),
        Property::FrontCurvature => node.curvature(),
        Property::FrontFastestInSection => node.lowest_nearby(scan_distance),
        Property::NodeLocationX => node.location().x,
        Property::NodeLocationY => node.location().y,
        Property::NodeId => node.id() as f64,
        Property::NodeState => node.state().code(),
        Property::NodeTime => node.time(),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    const MOISTURE: [f64; 5] = [0.06, 0.9, 0.07, 0.6, 0.08];

    #[test]
    fn test_known_names_compile_to_fast_chain() {
        let compiled = compile(
            ModelKind::Propagation,
            "test",
            &names(&["windU", "fuel.h1", "normalWind", "fuel.h10", "moist.ones", "moisture.tens"]),
            MOISTURE,
            &names(&["h1", "h10"]),
        );
        assert!(compiled.optimized);
        assert_eq!(
            compiled.accessors,
            vec![
                Accessor::Single(Property::WindU),
                Accessor::Fuel,
                Accessor::Single(Property::NormalWind),
                Accessor::Moisture(MOISTURE),
            ]
        );
        assert_eq!(compiled.needed, names(&["windU", "fuel", "normalWind"]));
    }

    #[test]
    fn test_unknown_name_switches_to_fallback() {
        let compiled = compile(ModelKind::Propagation, "test", &names(&["windU", "heatFlux"]), MOISTURE, &[]);
        assert!(!compiled.optimized);
        assert_eq!(compiled.accessors.len(), 2);
        assert!(matches!(&compiled.accessors[1], Accessor::ByName { name, computed: None } if name == "heatFlux"));
    }

    #[test]
    fn test_missing_fuel_column_switches_to_fallback() {
        let compiled = compile(ModelKind::Propagation, "test", &names(&["fuel.nonexistentParam"]), MOISTURE, &names(&["h1"]));
        assert!(!compiled.optimized);
        assert_eq!(compiled.accessors, vec![Accessor::FuelByName]);
    }

    #[test]
    fn test_flux_table_is_restricted() {
        assert_eq!(Property::lookup(ModelKind::Flux, "windV"), Some(Property::WindV));
        assert_eq!(Property::lookup(ModelKind::Flux, "slope"), None);
        assert_eq!(Property::lookup(ModelKind::Propagation, "slope"), Some(Property::Slope));
    }

    #[test]
    fn test_roles_follow_name_patterns() {
        let mut roles = Roles::default();
        roles.assign("altitude", 0);
        roles.assign("windU", 1);
        roles.assign("outerWindU", 2);
        roles.assign("slope", 3);
        assert_eq!(roles.altitude, Some(0));
        assert_eq!(roles.wind_u, Some(1));
        assert_eq!(roles.slope, Some(3));
        assert_eq!(roles.fuel, None);
    }

    #[test]
    fn test_roles_match_anywhere_in_name() {
        let mut roles = Roles::default();
        roles.assign("fuel", 0);
        roles.assign("moisture", 1);
        roles.assign("fuelMoisture", 2);
        roles.assign("groundAltitudeMeters", 3);
        assert_eq!(roles.fuel, Some(2));
        assert_eq!(roles.moisture, Some(2));
        assert_eq!(roles.altitude, None);
        roles.assign("altitudeGround", 4);
        assert_eq!(roles.altitude, Some(4));
    }
}
