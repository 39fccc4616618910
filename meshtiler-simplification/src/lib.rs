//! Mesh simplification for LOD generation
//!
//! Quadric edge-collapse decimation delegated to meshoptimizer, with
//! border locking for clipped tile boundaries, optional UV/normal attribute
//! weighting, and a vertex compaction pass that drops unreferenced vertices
//! after the index buffer shrinks.

pub mod compact;
pub mod decimate;

pub use compact::*;
pub use decimate::*;
