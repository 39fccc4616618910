//! Indexed triangle mesh with flat attribute buffers
//!
//! Buffers are contiguous `Vec<f32>` / `Vec<u32>` so they can be handed to
//! meshoptimizer and the glTF writer without conversion.

use crate::error::{Error, Result};

/// The unit of work for every tiling stage.
///
/// Attribute presence is signalled by a non-empty buffer; present buffers
/// must agree with `positions` on vertex count.
#[derive(Debug, Clone, Default)]
pub struct IndexedMesh {
    /// Interleaved positions: `[x, y, z, x, y, z, ...]`
    pub positions: Vec<f32>,
    /// Interleaved unit normals, 3 per vertex, or empty
    pub normals: Vec<f32>,
    /// Interleaved texture coordinates, 2 per vertex, or empty
    pub uvs: Vec<f32>,
    /// Interleaved RGBA vertex colors, 4 per vertex, or empty
    pub colors: Vec<f32>,
    /// Triangle indices, 3 per triangle
    pub indices: Vec<u32>,
    /// Index into the associated [`MaterialLibrary`](crate::MaterialLibrary)
    pub material_index: Option<usize>,
}

impl IndexedMesh {
    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty()
    }

    pub fn has_colors(&self) -> bool {
        !self.colors.is_empty()
    }

    /// Whether the mesh carries no geometry at all.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() || self.indices.is_empty()
    }

    /// Position of vertex `i` as f64 (splits and plane tests run in f64).
    pub fn position(&self, i: usize) -> [f64; 3] {
        [
            self.positions[i * 3] as f64,
            self.positions[i * 3 + 1] as f64,
            self.positions[i * 3 + 2] as f64,
        ]
    }

    /// Total surface area of all triangles, accumulated in f64.
    pub fn surface_area(&self) -> f64 {
        let mut area = 0.0;
        for tri in self.indices.chunks_exact(3) {
            let a = self.position(tri[0] as usize);
            let b = self.position(tri[1] as usize);
            let c = self.position(tri[2] as usize);
            let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
            let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
            let cx = u[1] * v[2] - u[2] * v[1];
            let cy = u[2] * v[0] - u[0] * v[2];
            let cz = u[0] * v[1] - u[1] * v[0];
            area += 0.5 * (cx * cx + cy * cy + cz * cz).sqrt();
        }
        area
    }

    /// Check the structural invariants of the buffer layout.
    ///
    /// Every present attribute must agree with `positions` on vertex count,
    /// indices must come in triangles, and every index must be in range.
    pub fn check_invariants(&self) -> Result<()> {
        if self.positions.len() % 3 != 0 {
            return Err(Error::Input(format!(
                "position buffer length {} is not a multiple of 3",
                self.positions.len()
            )));
        }
        let vertices = self.vertex_count();
        if self.has_normals() && self.normals.len() != vertices * 3 {
            return Err(Error::Input(format!(
                "normal buffer holds {} values for {vertices} vertices",
                self.normals.len()
            )));
        }
        if self.has_uvs() && self.uvs.len() != vertices * 2 {
            return Err(Error::Input(format!(
                "uv buffer holds {} values for {vertices} vertices",
                self.uvs.len()
            )));
        }
        if self.has_colors() && self.colors.len() != vertices * 4 {
            return Err(Error::Input(format!(
                "color buffer holds {} values for {vertices} vertices",
                self.colors.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::Input(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if let Some(&max) = self.indices.iter().max() {
            if max as usize >= vertices {
                return Err(Error::Input(format!(
                    "index {max} out of range for {vertices} vertices"
                )));
            }
        }
        Ok(())
    }

    /// Append another mesh, offsetting its indices.
    ///
    /// An attribute survives the merge only if both sides carry it.
    pub fn append(&mut self, other: &IndexedMesh) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            *self = other.clone();
            return;
        }

        let base = self.vertex_count() as u32;
        self.positions.extend_from_slice(&other.positions);

        if self.has_normals() && other.has_normals() {
            self.normals.extend_from_slice(&other.normals);
        } else {
            self.normals.clear();
        }
        if self.has_uvs() && other.has_uvs() {
            self.uvs.extend_from_slice(&other.uvs);
        } else {
            self.uvs.clear();
        }
        if self.has_colors() && other.has_colors() {
            self.colors.extend_from_slice(&other.colors);
        } else {
            self.colors.clear();
        }

        self.indices.extend(other.indices.iter().map(|&i| i + base));

        if self.material_index.is_none() {
            self.material_index = other.material_index;
        }
    }
}
