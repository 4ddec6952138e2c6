use std::os::raw::c_char;

use crate::error::{DefaultFireDataError, FireDataErrorCode};
use crate::helpers::{handle_ffi_result, instance_from_ptr, str_from_ptr, with_broker, with_broker_mut};
use crate::instance::FireDataBroker;

/// Set a configuration parameter from its text form.
///
/// Known keys (`spatialIncrement`, `atmoNX`, `fuelsTableFile`, ...) update
/// the typed configuration too.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `key` and `value` must be null or null-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn fire_data_set_parameter(
    ptr: *const FireDataBroker,
    key: *const c_char,
    value: *const c_char,
) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let key = unsafe { str_from_ptr(key, "key") }?;
        let value = unsafe { str_from_ptr(value, "value") }?;
        with_broker_mut(instance, |broker| broker.config_mut().set(key, value))
    })
}

/// Set a numeric configuration parameter.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `key` must be null or a null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fire_data_set_double(ptr: *const FireDataBroker, key: *const c_char, value: f64) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let key = unsafe { str_from_ptr(key, "key") }?;
        with_broker_mut(instance, |broker| broker.config_mut().set(key, value))
    })
}

/// Read a numeric configuration parameter into `out_value`.
///
/// Returns `InvalidParameter` if the key is unset or not a number;
/// `out_value` is left untouched then.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `key` must be null or a null-terminated string.
/// - `out_value` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn fire_data_get_double(
    ptr: *const FireDataBroker,
    key: *const c_char,
    out_value: *mut f64,
) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let key = unsafe { str_from_ptr(key, "key") }?;
        if out_value.is_null() {
            return Err(DefaultFireDataError::null_pointer("out_value"));
        }
        let value = with_broker(instance, |broker| broker.config().get_f64(key))?
            .ok_or_else(|| DefaultFireDataError::invalid_parameter(format!("Parameter '{key}' is not a number")))?;
        unsafe {
            *out_value = value;
        }
        Ok(())
    })
}

/// Load the fuel table file at `path` and recompile every model against it.
///
/// # Safety
/// - `ptr` must be null or a live broker handle.
/// - `path` must be null or a null-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fire_data_load_fuel_table(ptr: *const FireDataBroker, path: *const c_char) -> FireDataErrorCode {
    handle_ffi_result(|| {
        let instance = unsafe { instance_from_ptr(ptr) }?;
        let path = unsafe { str_from_ptr(path, "path") }?;
        with_broker_mut(instance, |broker| broker.load_fuel_table_from_file(path))??;
        Ok(())
    })
}
