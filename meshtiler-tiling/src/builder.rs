//! Recursive tile tree construction
//!
//! `build_tileset` drives the whole tiling core: at every node it
//! simplifies the region's mesh to that level's detail, repacks the atlas,
//! writes the GLB, splits the original mesh into 8 octants and recurses
//! into the non-empty ones on the rayon pool. The 8 subtrees are
//! independent; the only synchronization point is the parent waiting for
//! its children.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use meshtiler_core::{
    address_to_uri, child_address, BoundingBox, Error, IndexedMesh, MaterialLibrary, Result,
    TileNode,
};
use meshtiler_simplification::{simplify_mesh, SimplifyParams, COMPACTION_VERTEX_FLOOR};

use crate::atlas::repack_atlas;
use crate::glb::write_glb;
use crate::octree::{octant_bounds, split_mesh};
use crate::texture::{TextureFormat, TextureOptions};

/// Depth from which the relaxed default schedule applies: coarse LODs are
/// viewed from far away, border fidelity is not worth the CPU there.
const RELAXED_DEPTH: u32 = 3;

/// Tiles between progress log lines.
const PROGRESS_INTERVAL: usize = 512;

/// One level of the simplification schedule.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyStep {
    pub ratio: f32,
    pub lock_border: bool,
}

/// Tiling parameters, initialized once and read across all worker threads.
#[derive(Debug, Clone)]
pub struct TilingConfig {
    /// Hard cap on tree depth.
    pub max_depth: u32,
    /// Leaf stop condition on the region's triangle count.
    pub max_triangles_per_tile: usize,
    /// Stop splitting below this box diagonal, in meters.
    pub min_tile_size_m: f64,
    /// Per-level `(ratio, lock_border)` pairs. An empty schedule uses the
    /// built-in defaults; a short one repeats its last entry.
    pub simplify_schedule: Vec<SimplifyStep>,
    pub texture: TextureOptions,
    /// Emit EXT_meshopt_compression GLBs.
    pub compress: bool,
    /// Worker pool size; `None` uses all cores.
    pub threads: Option<usize>,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            max_triangles_per_tile: 65_000,
            min_tile_size_m: 0.01,
            simplify_schedule: Vec::new(),
            texture: TextureOptions::default(),
            compress: true,
            threads: None,
        }
    }
}

impl TilingConfig {
    /// Simplification step for a tree depth.
    pub fn step_for_depth(&self, depth: u32) -> SimplifyStep {
        if !self.simplify_schedule.is_empty() {
            let index = (depth as usize).min(self.simplify_schedule.len() - 1);
            return self.simplify_schedule[index];
        }
        if depth >= RELAXED_DEPTH {
            SimplifyStep {
                ratio: 0.5,
                lock_border: false,
            }
        } else {
            SimplifyStep {
                ratio: 0.25,
                lock_border: true,
            }
        }
    }
}

/// A recorded per-subtree failure: the rest of the tree kept going.
#[derive(Debug, Clone)]
pub struct TileFailure {
    pub address: String,
    pub operation: &'static str,
    pub message: String,
}

impl std::fmt::Display for TileFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tile {}: {} failed: {}",
            self.address, self.operation, self.message
        )
    }
}

/// Cooperative cancellation flag, polled between nodes. Cancelling leaves
/// already-written GLBs on disk; cleanup is the caller's job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Finished build: the tree, everything that went wrong, and how many
/// GLBs reached the disk.
#[derive(Debug)]
pub struct TilesetBuild {
    pub root: TileNode,
    pub failures: Vec<TileFailure>,
    pub tile_count: usize,
}

struct BuildContext<'a> {
    config: &'a TilingConfig,
    materials: &'a MaterialLibrary,
    out_dir: &'a Path,
    cancel: &'a CancelToken,
    failures: Mutex<Vec<TileFailure>>,
    written: AtomicUsize,
}

/// Build the tile tree for one mesh, writing GLBs eagerly.
///
/// Fails only when the root tile itself cannot be produced or the run was
/// cancelled; all other failures abort their subtree, land in
/// [`TilesetBuild::failures`] and leave the remaining subtrees intact.
pub fn build_tileset(
    mesh: IndexedMesh,
    bounds: &BoundingBox,
    materials: &MaterialLibrary,
    config: &TilingConfig,
    out_dir: &Path,
    cancel: &CancelToken,
) -> Result<TilesetBuild> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| Error::Output(format!("creating {} failed: {e}", out_dir.display())))?;

    let ctx = BuildContext {
        config,
        materials,
        out_dir,
        cancel,
        failures: Mutex::new(Vec::new()),
        written: AtomicUsize::new(0),
    };

    let root = build_tile(&ctx, mesh, bounds, 0, "root".to_string())?;

    if cancel.is_cancelled() {
        return Err(Error::Tiling("run cancelled".into()));
    }

    let tile_count = ctx.written.into_inner();
    let failures = ctx.failures.into_inner().expect("no poisoned workers");
    info!(tiles = tile_count, failures = failures.len(), "tile tree complete");

    Ok(TilesetBuild {
        root,
        failures,
        tile_count,
    })
}

fn build_tile(
    ctx: &BuildContext<'_>,
    mesh: IndexedMesh,
    bounds: &BoundingBox,
    depth: u32,
    address: String,
) -> Result<TileNode> {
    if ctx.cancel.is_cancelled() {
        return Err(Error::Tiling(format!(
            "tile {address}: build cancelled before start"
        )));
    }

    // a region without geometry is a bare leaf
    if mesh.is_empty() {
        return Ok(TileNode {
            address,
            level: depth,
            bounds: *bounds,
            geometric_error: 0.0,
            content_uri: None,
            children: vec![],
        });
    }

    let is_leaf = depth >= ctx.config.max_depth
        || mesh.triangle_count() <= ctx.config.max_triangles_per_tile
        || bounds.diagonal() < ctx.config.min_tile_size_m;

    let step = ctx.config.step_for_depth(depth);

    // simplify for this level's detail
    let params = SimplifyParams {
        target_ratio: step.ratio,
        lock_border: step.lock_border,
        compact: !(depth >= RELAXED_DEPTH && mesh.vertex_count() < COMPACTION_VERTEX_FLOOR),
        ..Default::default()
    };
    let simplified = simplify_mesh(&mesh, &params);
    let content_mesh = if simplified.mesh.is_empty() {
        warn!(
            address = %address,
            "simplifier returned nothing, keeping the unsimplified mesh"
        );
        mesh.clone()
    } else {
        simplified.mesh
    };

    let content_uri = write_content(ctx, &content_mesh, &address)?;
    drop(content_mesh);

    let geometric_error = if is_leaf {
        0.0
    } else {
        bounds.diagonal() * (1.0 - step.ratio as f64) * 0.5
    };

    if is_leaf {
        return Ok(TileNode {
            address,
            level: depth,
            bounds: *bounds,
            geometric_error,
            content_uri: Some(content_uri),
            children: vec![],
        });
    }

    // split the original (pre-simplification) mesh into octants
    let octant_meshes = split_mesh(&mesh, bounds);
    drop(mesh);

    let tasks: Vec<(usize, IndexedMesh)> = octant_meshes
        .into_iter()
        .enumerate()
        .filter(|(_, sub)| !sub.is_empty())
        .collect();

    let results: Vec<(String, Result<TileNode>)> = tasks
        .into_par_iter()
        .map(|(octant, sub)| {
            let child_addr = child_address(&address, octant);
            let child_bounds = octant_bounds(bounds, octant);
            let result = build_tile(ctx, sub, &child_bounds, depth + 1, child_addr.clone());
            (child_addr, result)
        })
        .collect();

    let mut children = Vec::with_capacity(results.len());
    for (child_addr, result) in results {
        match result {
            Ok(child) => children.push(child),
            Err(e) => {
                let failure = TileFailure {
                    address: child_addr,
                    operation: "subtree build",
                    message: e.to_string(),
                };
                warn!(%failure, "dropping failed subtree");
                ctx.failures.lock().expect("no poisoned workers").push(failure);
            }
        }
    }

    Ok(TileNode {
        address,
        level: depth,
        bounds: *bounds,
        geometric_error,
        content_uri: Some(content_uri),
        children,
    })
}

/// Atlas, encode and write one tile's GLB; returns the content URI.
fn write_content(ctx: &BuildContext<'_>, mesh: &IndexedMesh, address: &str) -> Result<String> {
    // vertex-cache order improves both GPU reuse and meshopt codec ratios
    let mesh = {
        let indices = meshopt::optimize_vertex_cache(&mesh.indices, mesh.vertex_count());
        IndexedMesh {
            positions: mesh.positions.clone(),
            normals: mesh.normals.clone(),
            uvs: mesh.uvs.clone(),
            colors: mesh.colors.clone(),
            indices,
            material_index: mesh.material_index,
        }
    };

    let want_textures = ctx.config.texture.format != TextureFormat::None;
    let glb = if want_textures && mesh.has_uvs() {
        match repack_atlas(&mesh, ctx.materials, &ctx.config.texture) {
            Some(atlas) => write_glb(
                &atlas.mesh,
                ctx.materials,
                Some(&atlas.texture),
                ctx.config.compress,
            ),
            None => write_glb(&mesh, ctx.materials, None, ctx.config.compress),
        }
    } else {
        write_glb(&mesh, ctx.materials, None, ctx.config.compress)
    };

    let uri = address_to_uri(address);
    let path: PathBuf = ctx.out_dir.join(&uri);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::Output(format!(
                "tile {address}: creating {} failed: {e}",
                parent.display()
            ))
        })?;
    }
    std::fs::write(&path, &glb)
        .map_err(|e| Error::Output(format!("tile {address}: GLB write failed: {e}")))?;

    let written = ctx.written.fetch_add(1, Ordering::Relaxed) + 1;
    debug!(address = %address, bytes = glb.len(), "wrote tile");
    if written % PROGRESS_INTERVAL == 0 {
        info!(tiles = written, "tiling progress");
    }

    Ok(uri)
}
