use fire_data_core::{DataError, Vec3};
use std::os::raw::c_char;
use std::slice;

use crate::error::{DefaultFireDataError, FireDataErrorCode};
use crate::helpers::{handle_ffi_result, instance_from_ptr, str_from_ptr, with_broker, with_broker_mut};
use crate::instance::FireDataBroker;

/// Register (or replace) a constant layer.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `name` must be null or a null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fire_data_add_constant_layer(ptr: *const FireDataBroker, name: *const c_char, value: f64) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let name = unsafe { str_from_ptr(name, "name") }?;
        with_broker_mut(instance, |broker| {
            broker.add_constant_layer(name, value);
        })
    })
}

/// Register the atmospheric wind and topography layers, starting at `time`.
///
/// # Safety
/// `ptr` must be null or a live broker handle.
#[no_mangle]
pub unsafe extern "C" fn fire_data_initialize_atmospheric_layers(ptr: *const FireDataBroker, time: f64) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        with_broker_mut(instance, |broker| broker.initialize_atmospheric_layers(time))
    })
}

/// Value of layer `name` at `(x, y, z)` and `time`.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `name` must be null or a null-terminated string.
/// - `out_value` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn fire_data_value_at(
    ptr: *const FireDataBroker,
    name: *const c_char,
    x: f64,
    y: f64,
    z: f64,
    time: f64,
    out_value: *mut f64,
) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let name = unsafe { str_from_ptr(name, "name") }?;
        if out_value.is_null() {
            return Err(DefaultFireDataError::null_pointer("out_value"));
        }
        let value = with_broker(instance, |broker| broker.value_at(name, &Vec3::new(x, y, z), time))??;
        unsafe {
            *out_value = value;
        }
        Ok(())
    })
}

/// Inject `len` column-major values (x fastest) into layer `name` at `time`.
///
/// Two-time layers expect their interior without halo and rotate their
/// snapshots; other layers expect their full grid.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `name` must be null or a null-terminated string.
/// - `data` must be null or point to `len` readable values.
#[no_mangle]
pub unsafe extern "C" fn fire_data_put_matrix(
    ptr: *const FireDataBroker,
    name: *const c_char,
    data: *const f64,
    len: usize,
    time: f64,
) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let name = unsafe { str_from_ptr(name, "name") }?;
        if data.is_null() {
            return Err(DefaultFireDataError::null_pointer("data"));
        }
        // SAFETY: non-null and `len` elements long per the contract above
        let values = unsafe { slice::from_raw_parts(data, len) };
        with_broker_mut(instance, |broker| broker.inject_matrix(name, values, time))??;
        Ok(())
    })
}

/// Copy the grid of layer `name` at `time` into `out`, column-major with x
/// fastest.
///
/// `out_len` always receives the grid size. If `capacity` is smaller,
/// nothing is copied and `SizeMismatch` is returned, so callers can query
/// the size with a zero capacity first.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `name` must be null or a null-terminated string.
/// - `out` must point to `capacity` writable values (may be null when
///   `capacity` is 0).
/// - `out_len` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn fire_data_get_matrix(
    ptr: *const FireDataBroker,
    name: *const c_char,
    time: f64,
    out: *mut f64,
    capacity: usize,
    out_len: *mut usize,
) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let name = unsafe { str_from_ptr(name, "name") }?;
        if out_len.is_null() {
            return Err(DefaultFireDataError::null_pointer("out_len"));
        }
        let values = with_broker(instance, |broker| broker.matrix(name, time).map(|snapshot| snapshot.to_foreign_vec()))??;
        unsafe {
            *out_len = values.len();
        }
        if capacity < values.len() {
            return Err(DataError::SizeMismatch {
                expected: values.len(),
                actual: capacity,
            }
            .into());
        }
        if out.is_null() {
            return Err(DefaultFireDataError::null_pointer("out"));
        }
        // SAFETY: `out` holds at least `capacity >= values.len()` values
        let destination = unsafe { slice::from_raw_parts_mut(out, values.len()) };
        destination.copy_from_slice(&values);
        Ok(())
    })
}

/// Open a NetCDF file and register layers for its variables.
///
/// `out_count` receives the number of layers registered.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `path` must be null or a null-terminated string.
/// - `out_count` must be null or writable.
#[cfg(feature = "netcdf")]
#[no_mangle]
pub unsafe extern "C" fn fire_data_load_netcdf(ptr: *const FireDataBroker, path: *const c_char, out_count: *mut usize) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let path = unsafe { str_from_ptr(path, "path") }?;
        let count = with_broker_mut(instance, |broker| broker.load_netcdf(path))??;
        if !out_count.is_null() {
            unsafe {
                *out_count = count;
            }
        }
        Ok(())
    })
}
