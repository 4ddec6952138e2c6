//! Layer behaviour observed through the broker: interpolation in space and
//! time, fuel lookups, derived gradients and per-cell reductions.
use approx::assert_abs_diff_eq;
use fire_data_core::layer::{FuelLayer, GriddedLayer, ReductionKind, TwoTimeLayer};
use fire_data_core::{BoundsMode, CellGrid, DataBroker, DataError, DataLayer, FieldArray, Geometry, NodeSnapshot, SimulationConfig, Vec3};

fn broker() -> DataBroker {
    DataBroker::new(SimulationConfig::with_domain(Vec3::zeros(), Vec3::new(1000.0, 1000.0, 0.0)))
}

#[test]
fn test_field_array_bounds_policies() {
    let mut array = FieldArray::new_2d("h", 0.0, 3, 2);
    array.set_2d(2, 1, 7.0);

    // Clamping reads the last valid cell
    assert_eq!(array.get_2d(10, 10), 7.0);
    assert_eq!(array.try_get(10, 10, 0, 0).unwrap(), 7.0);

    let strict = array.clone().with_bounds_mode(BoundsMode::Strict);
    match strict.try_get(3, 0, 0, 0) {
        Err(DataError::OutOfBounds { axis, index, extent, .. }) => {
            assert_eq!((axis, index, extent), (0, 3, 3));
        }
        other => panic!("expected an out-of-bounds error, got {other:?}"),
    }
    assert_eq!(strict.try_get(2, 1, 0, 0).unwrap(), 7.0);
}

#[test]
fn test_binary_snapshot_round_trip() {
    let mut array = FieldArray::new("t", 0.0, [4, 3, 1, 2]);
    for (n, value) in array.data_mut().iter_mut().enumerate() {
        *value = n as f64 * 0.5;
    }
    let mut bytes = Vec::new();
    array.dump_binary(&mut bytes).unwrap();

    let mut restored = FieldArray::new("t", 0.0, [4, 3, 1, 1]);
    let status = restored.load_binary(&mut bytes.as_slice()).unwrap();
    assert!(status.is_loaded());
    assert_eq!(restored, array);

    // A different horizontal size is rejected and leaves the target alone
    let mut other = FieldArray::new_2d("t", -1.0, 5, 3);
    let status = other.load_binary(&mut bytes.as_slice()).unwrap();
    assert!(!status.is_loaded());
    assert!(other.data().iter().all(|&v| v == -1.0));
}

#[test]
fn test_two_time_layer_blends_between_snapshots() {
    let spacing = Vec3::new(10.0, 10.0, 0.0);
    let earlier = FieldArray::new_2d("windU", 2.0, 10, 10);
    let later = FieldArray::new_2d("windU", 4.0, 10, 10);
    let layer = TwoTimeLayer::new("windU", earlier, 0.0, later, 10.0, Vec3::zeros(), spacing).unwrap();

    let mut broker = broker();
    broker.register_layer(DataLayer::TwoTime(layer));
    let centre = Vec3::new(50.0, 50.0, 0.0);
    assert_abs_diff_eq!(broker.value_at("windU", &centre, 0.0).unwrap(), 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(broker.value_at("windU", &centre, 5.0).unwrap(), 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(broker.value_at("windU", &centre, 10.0).unwrap(), 4.0, epsilon = 1e-12);

    // Too close to the padded edge
    assert_eq!(broker.value_at("windU", &Vec3::new(5.0, 50.0, 0.0), 5.0).unwrap(), 0.0);
}

#[test]
fn test_fuel_layers_inside_and_outside() {
    let mut broker = broker();
    let footprint = Geometry::spanning(Vec3::zeros(), Vec3::new(1000.0, 1000.0, 0.0));
    broker.register_layer(DataLayer::Fuel(FuelLayer::uniform("fuel", 3, footprint)));
    assert_eq!(broker.value_at("fuel", &Vec3::new(10.0, 10.0, 0.0), 0.0).unwrap(), 3.0);

    let raster = FieldArray::from_foreign("fuel", [2, 1, 1, 1], &[5, 6]).unwrap();
    let layer = FuelLayer::raster("fuel", raster, Vec3::zeros(), Vec3::new(200.0, 100.0, 0.0), 0.0, 0.0);
    broker.register_layer(DataLayer::Fuel(layer));
    assert_eq!(broker.value_at("fuel", &Vec3::new(150.0, 50.0, 0.0), 0.0).unwrap(), 6.0);
    assert_eq!(broker.value_at("fuel", &Vec3::new(500.0, 50.0, 0.0), 0.0).unwrap(), 0.0);
}

#[test]
fn test_slope_of_linear_altitude() {
    // altitude = 0.1 x at the cell centres
    let mut topography = FieldArray::new_2d("altitude", 0.0, 10, 10);
    for i in 0..10 {
        for j in 0..10 {
            topography.set_2d(i, j, 5.0 + 10.0 * i as f64);
        }
    }
    let mut broker = broker();
    let extent = Vec3::new(1000.0, 1000.0, 0.0);
    broker.register_layer(DataLayer::Gridded(GriddedLayer::spanning("altitude", topography, Vec3::zeros(), extent, 0.0, 0.0)));

    let centre = Vec3::new(500.0, 500.0, 0.0);
    assert_abs_diff_eq!(broker.value_at("altitude", &centre, 0.0).unwrap(), 50.0, epsilon = 1e-9);
    assert_abs_diff_eq!(broker.value_at("slope", &centre, 0.0).unwrap(), 0.1, epsilon = 1e-9);

    let model = broker.register_propagation_model("Slope", &["slope"]);
    let east = NodeSnapshot::new(centre, Vec3::new(1.0, 0.0, 0.0), 0.0);
    assert_abs_diff_eq!(broker.fetch_for_node(model, &east).unwrap()[0], 0.1, epsilon = 1e-9);
    let west = NodeSnapshot::new(centre, Vec3::new(-1.0, 0.0, 0.0), 0.0);
    assert_abs_diff_eq!(broker.fetch_for_node(model, &west).unwrap()[0], -0.1, epsilon = 1e-9);
}

#[test]
fn test_burning_ratio_cached_per_time() {
    let mut broker = broker();
    broker.set_cells(CellGrid::new(Vec3::zeros(), Vec3::new(1000.0, 1000.0, 0.0), 2, 2, 5, 5));
    broker.add_reduction_layer("burningRatio", ReductionKind::BurningRatio);

    let cells = broker.cells_mut().unwrap();
    cells.set_burning(&Vec3::new(50.0, 50.0, 0.0), 10.0);
    cells.set_burning(&Vec3::new(150.0, 50.0, 0.0), 12.0);
    cells.set_burning(&Vec3::new(750.0, 750.0, 0.0), 30.0);

    let passes = |broker: &DataBroker| match broker.layer("burningRatio") {
        Some(DataLayer::Reduction(layer)) => layer.passes(),
        other => panic!("unexpected layer {other:?}"),
    };

    {
        let ratios = broker.matrix("burningRatio", 20.0).unwrap();
        assert_abs_diff_eq!(ratios.get_2d(0, 0), 2.0 / 25.0, epsilon = 1e-12);
        assert_eq!(ratios.get_2d(1, 1), 0.0);
    }
    assert_eq!(passes(&broker), 1);

    // Same time served from the cache
    {
        let ratios = broker.matrix("burningRatio", 20.0).unwrap();
        assert_abs_diff_eq!(ratios.get_2d(0, 0), 2.0 / 25.0, epsilon = 1e-12);
    }
    assert_eq!(passes(&broker), 1);

    // Any other time recomputes, going back included
    {
        let ratios = broker.matrix("burningRatio", 5.0).unwrap();
        assert_eq!(ratios.get_2d(0, 0), 0.0);
    }
    assert_eq!(passes(&broker), 2);
    {
        let ratios = broker.matrix("burningRatio", 40.0).unwrap();
        assert_abs_diff_eq!(ratios.get_2d(1, 1), 1.0 / 25.0, epsilon = 1e-12);
    }
    assert_eq!(passes(&broker), 3);
}
