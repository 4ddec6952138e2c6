use fire_data_core::{DataBroker, SimulationConfig, Vec3};
use std::ptr;
use std::sync::RwLock;

use crate::error::{DefaultFireDataError, FireDataErrorCode};
use crate::helpers::{clear_last_error, track_error};

/// Opaque broker handle shared with the host simulation.
///
/// # Thread Safety
/// The broker sits behind an `RwLock`: value lookups and matrix reads take
/// the read lock, parameter updates and injections the write lock.
/// Reduction layers cache their last grid without locking, so a handle must
/// only be used from one thread at a time.
pub struct FireDataBroker {
    pub(crate) broker: RwLock<DataBroker>,
}

impl FireDataBroker {
    /// Broker over the rectangle `sw..ne`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` unless both corners are finite and `ne`
    /// lies strictly north-east of `sw`.
    pub(crate) fn new(sw: Vec3, ne: Vec3) -> Result<Box<Self>, DefaultFireDataError> {
        let finite = [sw.x, sw.y, ne.x, ne.y].iter().all(|v| v.is_finite());
        if !finite || ne.x <= sw.x || ne.y <= sw.y {
            return Err(DefaultFireDataError::invalid_parameter(format!(
                "Domain ({}, {}) - ({}, {}) must be finite and non-empty",
                sw.x, sw.y, ne.x, ne.y
            )));
        }
        let broker = DataBroker::new(SimulationConfig::with_domain(sw, ne));
        Ok(Box::new(Self {
            broker: RwLock::new(broker),
        }))
    }
}

/// Create a broker for the domain `(sw_x, sw_y) - (ne_x, ne_y)`.
///
/// Returns
/// - `Ok` with `out_instance` set to the new handle
/// - `NullPointer` if `out_instance` is null
/// - `InvalidParameter` for a non-finite or empty domain, `out_instance`
///   set to null
///
/// # Safety
///
/// - `out_instance` must be a valid, non-null pointer to writable memory.
/// - The caller owns the handle and MUST call `fire_data_broker_destroy`
///   exactly once.
///
/// Example (C++)
/// ```cpp
/// FireDataBroker* broker = nullptr;
/// if (fire_data_broker_new(0.0, 0.0, 1000.0, 1000.0, &broker) != Ok) {
///     fprintf(stderr, "%s\n", fire_data_get_last_error());
/// }
/// // ... use broker ...
/// fire_data_broker_destroy(broker);
/// ```
#[no_mangle]
pub unsafe extern "C" fn fire_data_broker_new(
    sw_x: f64,
    sw_y: f64,
    ne_x: f64,
    ne_y: f64,
    out_instance: *mut *mut FireDataBroker,
) -> FireDataErrorCode {
    if out_instance.is_null() {
        return track_error(&DefaultFireDataError::null_pointer("out_instance"));
    }

    match FireDataBroker::new(Vec3::new(sw_x, sw_y, 0.0), Vec3::new(ne_x, ne_y, 0.0)) {
        Ok(instance) => {
            unsafe {
                *out_instance = Box::into_raw(instance);
            }
            clear_last_error();
            FireDataErrorCode::Ok
        }
        Err(error) => {
            unsafe {
                *out_instance = ptr::null_mut();
            }
            track_error(&error)
        }
    }
}

/// Destroy a broker created by `fire_data_broker_new`. Null is a no-op.
///
/// # Safety
/// - The pointer MUST have been created by `fire_data_broker_new` and not
///   freed already.
/// - The caller must not use the pointer afterwards.
#[no_mangle]
pub unsafe extern "C" fn fire_data_broker_destroy(ptr: *mut FireDataBroker) {
    if ptr.is_null() {
        return;
    }

    // SAFETY: `ptr` came from `Box::into_raw` in `fire_data_broker_new`
    unsafe {
        drop(Box::from_raw(ptr));
    }
}
