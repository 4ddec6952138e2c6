//! End-to-end broker scenarios: model registration and fetching, lazy layer
//! creation, fuel tables and dataset ingestion.
use approx::assert_abs_diff_eq;
use fire_data_core::{BoundsMode, DataBroker, DataError, DataLayer, MemoryDataset, NodeSnapshot, SimulationConfig, Vec3};
use tracing_subscriber::EnvFilter;

/// Route broker warnings to the test output, filtered by `RUST_LOG`.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn broker() -> DataBroker {
    init_logging();
    DataBroker::new(SimulationConfig::with_domain(Vec3::zeros(), Vec3::new(1000.0, 1000.0, 0.0)))
}

#[test]
fn test_fast_and_fallback_models_agree() {
    let mut broker = broker();
    broker.add_constant_layer("windU", 3.0);
    broker.add_constant_layer("windV", 4.0);

    let fallback = broker.register_propagation_model("Fallback", &["windU", "windV", "normalWind", "fuel.nonexistentParam"]);
    let fast = broker.register_propagation_model("Fast", &["windU", "altitude"]);
    broker.ensure_needed_layers();

    assert!(!broker.model(fallback).unwrap().is_optimized());
    assert!(broker.model(fast).unwrap().is_optimized());

    let here = Vec3::new(200.0, 300.0, 0.0);
    let slow_wind = broker.fetch_at_point(fallback, &here, 0.0).unwrap()[0];
    let fast_wind = broker.fetch_at_point(fast, &here, 0.0).unwrap()[0];
    assert_eq!(slow_wind, 3.0);
    assert_eq!(fast_wind, slow_wind);

    // Normal wind is only meaningful at a front node
    let node = NodeSnapshot::new(here, Vec3::new(0.6, 0.8, 0.0), 0.0);
    let values = broker.fetch_for_node(fallback, &node).unwrap();
    assert_abs_diff_eq!(values[2], 3.0 * 0.6 + 4.0 * 0.8, epsilon = 1e-12);
    assert_eq!(broker.fetch_at_point(fallback, &here, 0.0).unwrap()[2], 0.0);
}

#[test]
fn test_missing_layers_created_from_parameters() {
    let mut broker = broker();
    broker.config_mut().set("temperature", "301.5");
    broker.register_flux_model("Heat", &["temperature", "moisture", "frontDepth"]);
    broker.ensure_needed_layers();

    let here = Vec3::new(500.0, 500.0, 0.0);
    assert_eq!(broker.value_at("temperature", &here, 0.0).unwrap(), 301.5);
    assert_eq!(broker.value_at("moisture", &here, 0.0).unwrap(), 0.0);
    assert!(broker.has_layer("altitude"));
    assert!(!broker.has_layer("frontDepth"));
}

#[test]
fn test_fuel_table_values_reach_models() {
    let mut broker = broker();
    broker.load_fuel_table_from_str("Index;h1;h10\n0;1.0;2.0\n1;3.0;4.0").unwrap();
    let model = broker.register_propagation_model("Fuels", &["fuel.h10"]);
    broker.config_mut().set("fuel", 1);
    broker.ensure_needed_layers();

    let here = Vec3::new(10.0, 10.0, 0.0);
    assert_eq!(broker.fetch_at_point(model, &here, 0.0).unwrap(), &[4.0]);

    broker.update_fuel_values(model, "h10", 8.0).unwrap();
    assert_eq!(broker.fetch_at_point(model, &here, 0.0).unwrap(), &[8.0]);
    assert!(broker.update_fuel_values(7, "h10", 1.0).is_err());
}

#[test]
fn test_out_of_domain_dataset_reprojected() {
    let mut dataset = MemoryDataset::new();
    dataset
        .set_attribute("domain", "SWx", 1.0e6)
        .set_attribute("domain", "SWy", 1.0e6)
        .set_attribute("domain", "Lx", 100.0)
        .set_attribute("domain", "Ly", 100.0);
    dataset
        .add_f64("altitude", &[1, 2], vec![10.0, 30.0])
        .unwrap()
        .set_attribute("altitude", "type", "data");

    let mut broker = broker();
    assert_eq!(broker.ingest(&dataset), 1);

    // Stretched over the whole domain, west half 10 and east half 30
    assert_abs_diff_eq!(broker.value_at("altitude", &Vec3::new(250.0, 500.0, 0.0), 1.0e5).unwrap(), 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(broker.value_at("altitude", &Vec3::new(750.0, 500.0, 0.0), 1.0e5).unwrap(), 30.0, epsilon = 1e-9);
    assert!(broker.has_layer("slope"));
}

#[test]
fn test_strict_bounds_reach_ingested_arrays() {
    let mut dataset = MemoryDataset::new();
    dataset
        .set_attribute("domain", "Lx", 1000.0)
        .set_attribute("domain", "Ly", 1000.0);
    dataset
        .add_f64("altitude", &[2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        .unwrap()
        .set_attribute("altitude", "type", "data");

    let mut lenient = broker();
    assert_eq!(lenient.ingest(&dataset), 1);
    let Some(DataLayer::Gridded(altitude)) = lenient.layer("altitude") else {
        panic!("altitude should be a gridded layer");
    };
    assert_eq!(altitude.array().bounds_mode(), BoundsMode::ClampAndWarn);
    assert_eq!(altitude.array().try_index(9, 0, 0, 0).unwrap(), altitude.array().index(2, 0, 0, 0));

    let mut strict = broker();
    strict.config_mut().set("boundsMode", "strict");
    assert_eq!(strict.ingest(&dataset), 1);
    let Some(DataLayer::Gridded(altitude)) = strict.layer("altitude") else {
        panic!("altitude should be a gridded layer");
    };
    assert!(matches!(
        altitude.array().try_index(9, 0, 0, 0),
        Err(DataError::OutOfBounds { axis: 0, index: 9, extent: 3, .. })
    ));
    assert!(altitude.array().try_index(2, 1, 0, 0).is_ok());
    // Lookups stay lenient whatever the policy
    assert_eq!(strict.value_at("altitude", &Vec3::new(5000.0, 0.0, 0.0), 0.0).unwrap(), 3.0);
}

#[test]
fn test_described_layers_and_dumps() {
    let mut broker = broker();
    broker.add_constant_layer("windU", 2.5);
    let description = broker.describe_layers();
    assert!(description.lines().any(|line| line.starts_with('\t') && line.contains("windU")));

    let prefix = std::env::temp_dir()
        .join(format!("fire_data_dump_{}_", std::process::id()))
        .to_string_lossy()
        .into_owned();
    let path = broker.dump_layer("windU", &prefix, 0.0).unwrap();
    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert!(bytes.len() > fire_data_core::field::HEADER_BYTES);
    assert!(broker.dump_layer("nothing", &prefix, 0.0).is_err());
}
