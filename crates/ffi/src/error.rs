use fire_data_core::DataError;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Common interface for errors crossing the FFI boundary.
///
/// `code()` is what the C caller receives; `msg()` is kept for
/// [`fire_data_get_last_error`].
pub(crate) trait FireDataError {
    fn code(&self) -> FireDataErrorCode;

    fn msg(&self) -> &str;
}

/// Error code plus message, built for the usual FFI failure cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DefaultFireDataError {
    code: FireDataErrorCode,
    msg: String,
}

impl DefaultFireDataError {
    /// Null pointer passed where non-null is required.
    pub fn null_pointer(param_name: &str) -> Self {
        Self {
            code: FireDataErrorCode::NullPointer,
            msg: format!("Parameter '{param_name}' cannot be null"),
        }
    }

    /// A lock was poisoned by a panic on another thread.
    pub fn lock_poisoned(lock_name: &str) -> Self {
        Self {
            code: FireDataErrorCode::LockPoisoned,
            msg: format!("Lock '{lock_name}' was poisoned by a panic in another thread"),
        }
    }

    pub fn invalid_parameter(message: String) -> Self {
        Self {
            code: FireDataErrorCode::InvalidParameter,
            msg: message,
        }
    }
}

impl FireDataError for DefaultFireDataError {
    fn code(&self) -> FireDataErrorCode {
        self.code
    }

    fn msg(&self) -> &str {
        &self.msg
    }
}

impl From<DataError> for DefaultFireDataError {
    fn from(error: DataError) -> Self {
        let code = match &error {
            DataError::UnknownLayer(_) => FireDataErrorCode::UnknownLayer,
            DataError::UnknownModel(_) => FireDataErrorCode::UnknownModel,
            DataError::SizeMismatch { .. } | DataError::OutOfBounds { .. } => FireDataErrorCode::SizeMismatch,
            DataError::Io(_) | DataError::Dataset(_) => FireDataErrorCode::Io,
            DataError::MalformedTable { .. }
            | DataError::MissingAttribute { .. }
            | DataError::InvalidDate(_)
            | DataError::Unsupported { .. } => FireDataErrorCode::InvalidData,
        };
        Self {
            code,
            msg: error.to_string(),
        }
    }
}

/// FFI error codes returned by broker functions.
/// Follows standard C convention: 0 = success, non-zero = error.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDataErrorCode {
    /// Operation completed successfully.
    Ok = 0,

    /// Null pointer passed where non-null required.
    NullPointer = 1,

    /// Internal lock poisoned by a panic.
    LockPoisoned = 2,

    /// Argument out of range or not valid UTF-8.
    InvalidParameter = 3,

    /// No layer is registered under the given name.
    UnknownLayer = 4,

    /// No model is registered at the given index.
    UnknownModel = 5,

    /// Buffer size does not match the layer grid.
    SizeMismatch = 6,

    /// File or dataset could not be read or written.
    Io = 7,

    /// Input data was malformed or unsupported by the layer.
    InvalidData = 8,
}

thread_local! {
    /// Most recent FFI error on this thread (C string, code). The `CString`
    /// is owned here so the pointer handed to C stays valid.
    static LAST_ERROR: RefCell<(Option<CString>, FireDataErrorCode)> = const { RefCell::new((None, FireDataErrorCode::Ok)) };
}

pub(crate) fn with_last_error<F, R>(f: F) -> R
where
    F: FnOnce(&(Option<CString>, FireDataErrorCode)) -> R,
{
    LAST_ERROR.with_borrow(f)
}

pub(crate) fn with_last_error_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut (Option<CString>, FireDataErrorCode)) -> R,
{
    LAST_ERROR.with_borrow_mut(f)
}

/// Retrieve the most recent FFI error message as a null-terminated C string.
///
/// Returns null if no error occurred since the last successful call.
///
/// # Lifetime
/// The pointer is valid until the next FFI call on this thread.
/// **DO NOT FREE THIS POINTER** - it is managed internally.
///
/// Example:
/// ```cpp
/// double value = 0.0;
/// if (fire_data_value_at(broker, "windU", 10.0, 20.0, 0.0, 0.0, &value) != Ok) {
///     printf("lookup failed: %s\n", fire_data_get_last_error());
/// }
/// ```
#[no_mangle]
pub extern "C" fn fire_data_get_last_error() -> *const c_char {
    with_last_error(|(cstring, _code)| cstring.as_ref().map_or(ptr::null(), |cs| cs.as_ptr()))
}

/// Retrieve the most recent FFI error code, `Ok` if none.
#[no_mangle]
pub extern "C" fn fire_data_get_last_error_code() -> FireDataErrorCode {
    with_last_error(|(_cstring, code)| *code)
}
