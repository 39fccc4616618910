//! meshopt-backed edge-collapse decimation

use meshopt::{SimplifyOptions, VertexDataAdapter};
use tracing::warn;

use meshtiler_core::IndexedMesh;

use crate::compact::compact_vertices;

/// Meshes below this triangle count are returned unchanged; collapsing them
/// further only produces degenerate geometry.
const MIN_SIMPLIFY_TRIANGLES: usize = 64;

/// Parameters for one simplification pass.
#[derive(Debug, Clone, Copy)]
pub struct SimplifyParams {
    /// Fraction of the input triangle count to keep, in `(0, 1]`.
    pub target_ratio: f32,
    /// Forbid collapsing open (boundary) edges and moving their endpoints.
    /// Required wherever the mesh was clipped at a tile boundary.
    pub lock_border: bool,
    /// Error budget, relative to the mesh extent. The simplifier stops
    /// early rather than exceed it.
    pub target_error: f32,
    /// Penalty weight for UV distortion during collapse; 0 disables the
    /// attribute-aware cost path.
    pub uv_weight: f32,
    /// Penalty weight for normal distortion during collapse.
    pub normal_weight: f32,
    /// Run the vertex compaction pass on the result. Skippable at coarse
    /// depths where the mesh is already small.
    pub compact: bool,
}

impl Default for SimplifyParams {
    fn default() -> Self {
        Self {
            target_ratio: 0.5,
            lock_border: false,
            target_error: 0.01,
            uv_weight: 0.5,
            normal_weight: 0.5,
            compact: true,
        }
    }
}

/// Result of a simplification pass.
#[derive(Debug, Clone)]
pub struct SimplifiedMesh {
    pub mesh: IndexedMesh,
    /// Relative error reported by the simplifier.
    pub achieved_error: f32,
    /// False when the simplifier stopped above the target count to stay
    /// within the error budget.
    pub reached_target: bool,
}

/// Simplify a mesh toward `params.target_ratio` of its triangle count.
///
/// Never fails: a mesh too small to simplify comes back as an unchanged
/// copy, and an unreachable target comes back as the best effort with
/// `reached_target == false`.
pub fn simplify_mesh(mesh: &IndexedMesh, params: &SimplifyParams) -> SimplifiedMesh {
    if mesh.is_empty() {
        return SimplifiedMesh {
            mesh: IndexedMesh {
                material_index: mesh.material_index,
                ..Default::default()
            },
            achieved_error: 0.0,
            reached_target: true,
        };
    }
    if mesh.triangle_count() < MIN_SIMPLIFY_TRIANGLES || params.target_ratio >= 1.0 {
        return SimplifiedMesh {
            mesh: mesh.clone(),
            achieved_error: 0.0,
            reached_target: true,
        };
    }

    let positions = meshopt::typed_to_bytes(&mesh.positions);
    let adapter = VertexDataAdapter::new(positions, 12, 0)
        .expect("position buffer is tightly packed f32x3");

    let target_triangles = (mesh.triangle_count() as f64 * params.target_ratio as f64).round();
    let target_count = (target_triangles as usize) * 3;

    let options = if params.lock_border {
        SimplifyOptions::LockBorder
    } else {
        SimplifyOptions::None
    };

    let mut achieved_error = 0.0f32;
    let new_indices = match attribute_stream(mesh, params) {
        Some((attributes, weights)) => {
            let locks = vec![false; mesh.vertex_count()];
            meshopt::simplify_with_attributes_and_locks(
                &mesh.indices,
                &adapter,
                &attributes,
                &weights,
                weights.len() * std::mem::size_of::<f32>(),
                &locks,
                target_count,
                params.target_error,
                options,
                Some(&mut achieved_error),
            )
        }
        None => meshopt::simplify(
            &mesh.indices,
            &adapter,
            target_count,
            params.target_error,
            options,
            Some(&mut achieved_error),
        ),
    };

    let reached_target = new_indices.len() <= target_count;
    if !reached_target {
        warn!(
            target = target_count / 3,
            achieved = new_indices.len() / 3,
            error = achieved_error,
            "simplifier stopped above target to stay within error budget"
        );
    }

    let new_indices = meshopt::optimize_vertex_cache(&new_indices, mesh.vertex_count());

    let out = if params.compact {
        compact_vertices(new_indices, mesh)
    } else {
        IndexedMesh {
            positions: mesh.positions.clone(),
            normals: mesh.normals.clone(),
            uvs: mesh.uvs.clone(),
            colors: mesh.colors.clone(),
            indices: new_indices,
            material_index: mesh.material_index,
        }
    };

    SimplifiedMesh {
        mesh: out,
        achieved_error,
        reached_target,
    }
}

/// Interleave the weighted attributes into one stream per vertex.
///
/// Layout is `[u, v]` then `[nx, ny, nz]` for whichever attributes are both
/// present and weighted; returns `None` when the plain positional path
/// suffices.
fn attribute_stream(mesh: &IndexedMesh, params: &SimplifyParams) -> Option<(Vec<f32>, Vec<f32>)> {
    let use_uvs = params.uv_weight > 0.0 && mesh.has_uvs();
    let use_normals = params.normal_weight > 0.0 && mesh.has_normals();
    if !use_uvs && !use_normals {
        return None;
    }

    let mut weights = Vec::with_capacity(5);
    if use_uvs {
        weights.extend_from_slice(&[params.uv_weight; 2]);
    }
    if use_normals {
        weights.extend_from_slice(&[params.normal_weight; 3]);
    }

    let stride = weights.len();
    let vertices = mesh.vertex_count();
    let mut attributes = Vec::with_capacity(vertices * stride);
    for v in 0..vertices {
        if use_uvs {
            attributes.extend_from_slice(&mesh.uvs[v * 2..v * 2 + 2]);
        }
        if use_normals {
            attributes.extend_from_slice(&mesh.normals[v * 3..v * 3 + 3]);
        }
    }

    Some((attributes, weights))
}
