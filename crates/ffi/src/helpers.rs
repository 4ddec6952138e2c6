use crate::error::{with_last_error_mut, DefaultFireDataError, FireDataError, FireDataErrorCode};
use crate::instance::FireDataBroker;
use fire_data_core::DataBroker;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

/// Record `error` in the thread-local error slot.
pub(crate) fn set_last_error(error: &impl FireDataError) {
    with_last_error_mut(|(cstring, code)| {
        *cstring = CString::new(error.msg()).ok();
        *code = error.code();
    });
}

/// Record `error` and return its code.
#[inline]
pub(crate) fn track_error(error: &impl FireDataError) -> FireDataErrorCode {
    set_last_error(error);
    error.code()
}

pub(crate) fn clear_last_error() {
    with_last_error_mut(|(cstring, code)| {
        *cstring = None;
        *code = FireDataErrorCode::Ok;
    });
}

/// Run an FFI body, turning its outcome into a code and the error slot.
pub(crate) fn handle_ffi_result<F>(body: F) -> FireDataErrorCode
where
    F: FnOnce() -> Result<(), DefaultFireDataError>,
{
    match body() {
        Ok(()) => {
            clear_last_error();
            FireDataErrorCode::Ok
        }
        Err(error) => track_error(&error),
    }
}

/// # Safety
/// `ptr` must be null or a live pointer returned by `fire_data_broker_new`.
pub(crate) unsafe fn instance_from_ptr<'a>(ptr: *const FireDataBroker) -> Result<&'a FireDataBroker, DefaultFireDataError> {
    // SAFETY: null or valid per the contract above
    unsafe { ptr.as_ref() }.ok_or_else(|| DefaultFireDataError::null_pointer("instance"))
}

/// Borrow a C string argument as UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a null-terminated string that outlives
/// the returned borrow.
pub(crate) unsafe fn str_from_ptr<'a>(ptr: *const c_char, param_name: &str) -> Result<&'a str, DefaultFireDataError> {
    if ptr.is_null() {
        return Err(DefaultFireDataError::null_pointer(param_name));
    }
    // SAFETY: non-null and null-terminated per the contract above
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| DefaultFireDataError::invalid_parameter(format!("Parameter '{param_name}' is not valid UTF-8")))
}

pub(crate) fn with_broker<F, T>(instance: &FireDataBroker, func: F) -> Result<T, DefaultFireDataError>
where
    F: FnOnce(&DataBroker) -> T,
{
    let broker = instance
        .broker
        .read()
        .map_err(|_| DefaultFireDataError::lock_poisoned("RwLock"))?;
    Ok(func(&broker))
}

pub(crate) fn with_broker_mut<F, T>(instance: &FireDataBroker, func: F) -> Result<T, DefaultFireDataError>
where
    F: FnOnce(&mut DataBroker) -> T,
{
    let mut broker = instance
        .broker
        .write()
        .map_err(|_| DefaultFireDataError::lock_poisoned("RwLock"))?;
    Ok(func(&mut broker))
}
