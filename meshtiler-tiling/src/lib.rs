//! The tiling core: spatial-plus-LOD tile hierarchy construction
//!
//! Takes one indexed mesh plus a material library and produces an OGC
//! 3D Tiles 1.1 tree on disk — per-tile GLBs with repacked atlases, and a
//! `tileset.json` describing the hierarchy. The pieces:
//! - [`clip`]: Sutherland-Hodgman half-space clipping with attribute
//!   interpolation and boundary vertex dedup
//! - [`octree`]: midplane mesh splitting into 8 owned child meshes
//! - [`atlas`] / [`packer`] / [`texture`]: per-tile UV-island atlas
//!   repacking and encoding
//! - [`glb`]: binary glTF emission
//! - [`builder`] / [`tileset`]: the parallel recursive descent and the
//!   tileset.json serializer
//! - [`validate`]: post-run structural validation

pub mod atlas;
pub mod builder;
pub mod clip;
pub mod glb;
pub mod octree;
pub mod packer;
pub mod texture;
pub mod tileset;
pub mod validate;

pub use atlas::{repack_atlas, AtlasOutput, UvIsland};
pub use builder::{
    build_tileset, CancelToken, SimplifyStep, TileFailure, TilesetBuild, TilingConfig,
};
pub use clip::{clip_polygon, Axis, ClipVertex, DedupKey, KeepSide, MeshBuilder};
pub use glb::write_glb;
pub use octree::{octant_bounds, octant_of, split_mesh};
pub use texture::{TextureFormat, TextureOptions};
pub use tileset::{write_tileset_json, IDENTITY_TRANSFORM};
pub use validate::{validate_tileset, ValidationReport};
