//! Error type shared by the field, layer, broker, and ingestion modules.
//!
//! Most failures in this crate are reported through `tracing` and resolved by
//! a fallback (zero value, clamped index, synthesized layer). `DataError` is
//! reserved for the cases where the caller is expected to react: malformed
//! input tables, file I/O, size-validated injections, and operations a layer
//! kind does not support.

/// Errors returned by data-layer operations
#[derive(Debug)]
pub enum DataError {
    /// Underlying file or stream failure
    Io(std::io::Error),
    /// Fuel table text could not be parsed
    MalformedTable {
        /// 1-based line number in the table text
        line: usize,
        reason: String,
    },
    /// A buffer or stored extent does not match the destination
    SizeMismatch { expected: usize, actual: usize },
    /// No layer is registered under this key
    UnknownLayer(String),
    /// No model is registered under this index
    UnknownModel(usize),
    /// The layer kind cannot perform the requested operation
    Unsupported {
        layer: String,
        operation: &'static str,
    },
    /// A dataset variable lacks a required attribute
    MissingAttribute { variable: String, attribute: String },
    /// The scientific dataset backend reported a failure
    Dataset(String),
    /// An index fell outside its axis in strict bounds mode
    OutOfBounds {
        array: String,
        axis: usize,
        index: usize,
        extent: usize,
    },
    /// A date string did not follow `YYYY-MM-DDThh:mm:ssZ`
    InvalidDate(String),
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::Io(err) => write!(f, "I/O failure: {err}"),
            DataError::MalformedTable { line, reason } => {
                write!(f, "Malformed table at line {line}: {reason}")
            }
            DataError::SizeMismatch { expected, actual } => {
                write!(f, "Size mismatch: expected {expected} elements, got {actual}")
            }
            DataError::UnknownLayer(name) => write!(f, "No layer registered as '{name}'"),
            DataError::UnknownModel(index) => write!(f, "No model registered at index {index}"),
            DataError::Unsupported { layer, operation } => {
                write!(f, "Layer '{layer}' does not support {operation}")
            }
            DataError::MissingAttribute {
                variable,
                attribute,
            } => write!(f, "Variable '{variable}' has no attribute '{attribute}'"),
            DataError::Dataset(msg) => write!(f, "Dataset failure: {msg}"),
            DataError::OutOfBounds {
                array,
                axis,
                index,
                extent,
            } => write!(
                f,
                "Index {index} out of bounds on axis {axis} of '{array}' (extent {extent})"
            ),
            DataError::InvalidDate(date) => write!(f, "Invalid ISO date '{date}'"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DataError {
    fn from(err: std::io::Error) -> Self {
        DataError::Io(err)
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_layer() {
        let err = DataError::Unsupported {
            layer: "slope".to_string(),
            operation: "matrix injection",
        };
        assert_eq!(err.to_string(), "Layer 'slope' does not support matrix injection");
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error;
        let err: DataError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("gone"));
    }
}
