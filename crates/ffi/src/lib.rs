//! C interface to the fire data broker.
//!
//! Every function returns a [`FireDataErrorCode`]; on failure the message is
//! available from [`fire_data_get_last_error`] on the same thread. Grids
//! cross the boundary column-major with x fastest.

mod error;
mod helpers;
mod instance;
mod layers;
mod parameters;

pub use error::{fire_data_get_last_error, fire_data_get_last_error_code, FireDataErrorCode};
pub use instance::{fire_data_broker_destroy, fire_data_broker_new, FireDataBroker};
#[cfg(feature = "netcdf")]
pub use layers::fire_data_load_netcdf;
pub use layers::{
    fire_data_add_constant_layer, fire_data_get_matrix, fire_data_initialize_atmospheric_layers, fire_data_put_matrix,
    fire_data_value_at,
};
pub use parameters::{fire_data_get_double, fire_data_load_fuel_table, fire_data_set_double, fire_data_set_parameter};
