//! Core data structures for the meshtiler pipeline
//!
//! This crate provides the shared vocabulary of every pipeline stage:
//! indexed triangle meshes, bounding boxes, PBR materials with texture
//! payloads, the tile hierarchy node, and the common error type.

pub mod bounds;
pub mod error;
pub mod georef;
pub mod material;
pub mod mesh;
pub mod tile;

pub use bounds::*;
pub use error::*;
pub use georef::*;
pub use material::*;
pub use mesh::*;
pub use tile::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix4, Point3, Vector2, Vector3};

/// Common result type for meshtiler operations
pub type Result<T> = std::result::Result<T, Error>;
