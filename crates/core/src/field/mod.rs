//! Dense numeric arrays and their binary snapshot format.

mod array;
mod binary;
mod element;

pub use array::{BoundsMode, FieldArray};
pub use binary::{LoadStatus, HEADER_BYTES};
pub(crate) use binary::encode_payload;
pub use element::Element;
