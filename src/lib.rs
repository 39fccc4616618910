//! meshtiler: photogrammetry meshes to OGC 3D Tiles 1.1
//!
//! Converts large textured surface meshes (OBJ, glTF/GLB, PLY) into a
//! streamable tile hierarchy: per-tile GLBs with repacked texture atlases
//! plus a `tileset.json` descriptor.
//!
//! The workspace crates:
//! - `meshtiler-core`: shared data model and error type
//! - `meshtiler-io`: input loading and georeference detection
//! - `meshtiler-transform`: units, axis conventions, ECEF placement
//! - `meshtiler-simplification`: meshopt-backed LOD decimation
//! - `meshtiler-tiling`: the tiling core (clipping, octree, atlases,
//!   GLB + tileset emission, validation)

pub mod config;
pub mod pipeline;

pub use config::{CliArgs, PipelineConfig};
pub use pipeline::{Pipeline, ProcessingResult};

pub use meshtiler_io as io;
pub use meshtiler_simplification as simplification;
pub use meshtiler_tiling as tiling;
pub use meshtiler_transform as transform;

pub use meshtiler_core::{
    BoundingBox, Error, Georeference, IndexedMesh, MaterialLibrary, PbrMaterial, Result,
    TextureImage, TileNode,
};
pub use meshtiler_tiling::{CancelToken, TextureFormat, TilingConfig};
