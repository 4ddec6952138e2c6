//! Core types and utilities

pub mod node;
pub mod vec3;

pub use node::{FrontNode, NodeSnapshot, NodeState};
pub use vec3::{dot_xy, Vec3};
