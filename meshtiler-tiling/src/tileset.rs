//! tileset.json serialization (3D Tiles 1.1)

use std::fs;
use std::path::Path;

use serde::Serialize;

use meshtiler_core::{BoundingBox, Error, Result, TileNode};

/// Column-major 4x4 identity, the root transform for non-georeferenced runs.
pub const IDENTITY_TRANSFORM: [f64; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

#[derive(Debug, Serialize)]
pub struct Tileset {
    pub asset: Asset,
    #[serde(rename = "geometricError")]
    pub geometric_error: f64,
    pub root: Tile,
}

#[derive(Debug, Serialize)]
pub struct Asset {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Tile {
    #[serde(rename = "boundingVolume")]
    pub bounding_volume: BoundingVolume,
    #[serde(rename = "geometricError")]
    pub geometric_error: f64,
    pub refine: &'static str,
    /// Only ever present on the root; children inherit it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<[f64; 16]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Tile>,
}

#[derive(Debug, Serialize)]
pub struct BoundingVolume {
    #[serde(rename = "box")]
    pub oriented_box: [f64; 12],
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub uri: String,
}

/// The 12-number oriented box: center followed by the three half-axis
/// column vectors. Our boxes are axis-aligned, so the half-axes are the
/// scaled coordinate axes.
pub fn oriented_box(bounds: &BoundingBox) -> [f64; 12] {
    let c = bounds.center();
    let h = bounds.half_extents();
    [
        c[0], c[1], c[2], //
        h[0], 0.0, 0.0, //
        0.0, h[1], 0.0, //
        0.0, 0.0, h[2],
    ]
}

/// Build the serializable tileset from a finished tile tree.
///
/// An identity root transform is a default and therefore omitted.
pub fn tileset_from_tree(root: &TileNode, transform: &[f64; 16]) -> Tileset {
    let root_transform = (*transform != IDENTITY_TRANSFORM).then_some(*transform);
    Tileset {
        asset: Asset {
            version: "1.1".into(),
            generator: Some("meshtiler".into()),
        },
        geometric_error: root.geometric_error,
        root: tile_from_node(root, root_transform),
    }
}

fn tile_from_node(node: &TileNode, transform: Option<[f64; 16]>) -> Tile {
    Tile {
        bounding_volume: BoundingVolume {
            oriented_box: oriented_box(&node.bounds),
        },
        geometric_error: node.geometric_error,
        refine: "REPLACE",
        transform,
        content: node.content_uri.clone().map(|uri| Content { uri }),
        children: node
            .children
            .iter()
            .map(|child| tile_from_node(child, None))
            .collect(),
    }
}

/// Serialize the tileset to `<out_dir>/tileset.json`.
pub fn write_tileset_json(root: &TileNode, transform: &[f64; 16], out_dir: &Path) -> Result<()> {
    let tileset = tileset_from_tree(root, transform);
    let json = serde_json::to_string_pretty(&tileset)
        .map_err(|e| Error::Output(format!("tileset.json serialization failed: {e}")))?;
    let path = out_dir.join("tileset.json");
    fs::write(&path, json)
        .map_err(|e| Error::Output(format!("writing {} failed: {e}", path.display())))?;
    Ok(())
}
