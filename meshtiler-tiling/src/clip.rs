//! Axis-aligned half-space clipping with attribute interpolation
//!
//! Implements Sutherland-Hodgman clipping of triangles (and the convex
//! polygons they become) against planes perpendicular to a coordinate
//! axis. All math runs in f64; vertices are cast back to f32 only when a
//! clipped mesh is rebuilt.
//!
//! Boundary vertices created by clipping are deduplicated through
//! [`DedupKey`], a quantized (position, uv, normal) triple. Including the
//! UV in the key keeps vertices on either side of a UV seam distinct, so
//! seams survive tile splits; sharing the key across adjacent triangles
//! collapses the intersection points along a shared edge into one output
//! vertex, which is what keeps tile boundaries crack-free.

use std::collections::HashMap;

use nalgebra::{Vector2, Vector3, Vector4};

use meshtiler_core::IndexedMesh;

/// A coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Which half-space survives a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepSide {
    /// Keep vertices with `position[axis] <= value`.
    Below,
    /// Keep vertices with `position[axis] >= value`.
    Above,
}

/// Working vertex for clipping: a position plus whichever attributes the
/// source mesh carries. Attribute presence is uniform across one mesh, so
/// the options either all match or the vertex came from different meshes.
#[derive(Debug, Clone)]
pub struct ClipVertex {
    pub position: Vector3<f64>,
    pub normal: Option<Vector3<f64>>,
    pub uv: Option<Vector2<f64>>,
    pub color: Option<Vector4<f64>>,
}

impl ClipVertex {
    /// Read vertex `index` out of a mesh, promoting f32 to f64.
    pub fn from_mesh(mesh: &IndexedMesh, index: usize) -> Self {
        let p = &mesh.positions[index * 3..index * 3 + 3];
        let normal = mesh.has_normals().then(|| {
            let n = &mesh.normals[index * 3..index * 3 + 3];
            Vector3::new(n[0] as f64, n[1] as f64, n[2] as f64)
        });
        let uv = mesh.has_uvs().then(|| {
            let t = &mesh.uvs[index * 2..index * 2 + 2];
            Vector2::new(t[0] as f64, t[1] as f64)
        });
        let color = mesh.has_colors().then(|| {
            let c = &mesh.colors[index * 4..index * 4 + 4];
            Vector4::new(c[0] as f64, c[1] as f64, c[2] as f64, c[3] as f64)
        });

        Self {
            position: Vector3::new(p[0] as f64, p[1] as f64, p[2] as f64),
            normal,
            uv,
            color,
        }
    }

    /// Linear interpolation of every attribute at parameter `t` along
    /// `a -> b`. Normals are re-normalized afterwards.
    fn lerp(a: &ClipVertex, b: &ClipVertex, t: f64) -> ClipVertex {
        let normal = match (&a.normal, &b.normal) {
            (Some(na), Some(nb)) => {
                let n = na + (nb - na) * t;
                Some(n.try_normalize(1e-12).unwrap_or(n))
            }
            _ => None,
        };
        let uv = match (&a.uv, &b.uv) {
            (Some(ua), Some(ub)) => Some(ua + (ub - ua) * t),
            _ => None,
        };
        let color = match (&a.color, &b.color) {
            (Some(ca), Some(cb)) => Some(ca + (cb - ca) * t),
            _ => None,
        };

        ClipVertex {
            position: a.position + (b.position - a.position) * t,
            normal,
            uv,
            color,
        }
    }
}

const POSITION_QUANTUM: f64 = 1e6; // micrometers when units are meters
const UV_QUANTUM: f64 = 1e5;
const NORMAL_QUANTUM: f64 = 1e3;
const ABSENT: i64 = i64::MIN;

/// Quantized vertex identity: two vertices with equal keys collapse to one
/// output vertex, two with different keys stay distinct.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct DedupKey {
    position: [i64; 3],
    uv: [i64; 2],
    normal: [i64; 3],
}

impl DedupKey {
    pub fn of(v: &ClipVertex) -> Self {
        let q = |x: f64, s: f64| (x * s).round() as i64;
        Self {
            position: [
                q(v.position.x, POSITION_QUANTUM),
                q(v.position.y, POSITION_QUANTUM),
                q(v.position.z, POSITION_QUANTUM),
            ],
            uv: v
                .uv
                .map(|t| [q(t.x, UV_QUANTUM), q(t.y, UV_QUANTUM)])
                .unwrap_or([ABSENT; 2]),
            normal: v
                .normal
                .map(|n| {
                    [
                        q(n.x, NORMAL_QUANTUM),
                        q(n.y, NORMAL_QUANTUM),
                        q(n.z, NORMAL_QUANTUM),
                    ]
                })
                .unwrap_or([ABSENT; 3]),
        }
    }

    /// Key for a mesh vertex without constructing the clip vertex twice.
    pub fn of_mesh_vertex(mesh: &IndexedMesh, index: usize) -> Self {
        Self::of(&ClipVertex::from_mesh(mesh, index))
    }
}

/// Clip a convex polygon against an axis-aligned half-space.
///
/// Vertices exactly on the plane count as inside for either keep side; the
/// degenerate fragments this produces on the far side are dropped when the
/// polygon is triangulated, so a triangle touching the plane ends up on
/// exactly one side.
pub fn clip_polygon(polygon: &[ClipVertex], axis: Axis, value: f64, keep: KeepSide) -> Vec<ClipVertex> {
    if polygon.is_empty() {
        return Vec::new();
    }

    let axis = axis.index();
    let inside = |v: &ClipVertex| match keep {
        KeepSide::Below => v.position[axis] <= value,
        KeepSide::Above => v.position[axis] >= value,
    };

    let mut out = Vec::with_capacity(polygon.len() + 1);
    for i in 0..polygon.len() {
        let current = &polygon[i];
        let next = &polygon[(i + 1) % polygon.len()];

        match (inside(current), inside(next)) {
            (true, true) => out.push(next.clone()),
            (true, false) => out.push(intersect(current, next, axis, value)),
            (false, true) => {
                out.push(intersect(current, next, axis, value));
                out.push(next.clone());
            }
            (false, false) => {}
        }
    }
    out
}

/// Intersection of edge `a -> b` with the plane `position[axis] == value`.
fn intersect(a: &ClipVertex, b: &ClipVertex, axis: usize, value: f64) -> ClipVertex {
    let da = a.position[axis] - value;
    let db = b.position[axis] - value;
    let denom = da - db;
    let t = if denom.abs() < 1e-15 {
        0.5
    } else {
        (da / denom).clamp(0.0, 1.0)
    };
    ClipVertex::lerp(a, b, t)
}

/// Accumulates clipped geometry into a new `IndexedMesh`, deduplicating
/// vertices by [`DedupKey`]. The dedup map lives for one builder, i.e. one
/// clip or split invocation; sharing it across tiles would serialize the
/// parallel descent.
pub struct MeshBuilder {
    positions: Vec<f32>,
    normals: Vec<f32>,
    uvs: Vec<f32>,
    colors: Vec<f32>,
    indices: Vec<u32>,
    dedup: HashMap<DedupKey, u32>,
    has_normals: bool,
    has_uvs: bool,
    has_colors: bool,
}

impl MeshBuilder {
    /// New builder adopting the attribute presence of `like`.
    pub fn for_mesh(like: &IndexedMesh) -> Self {
        Self {
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            colors: Vec::new(),
            indices: Vec::new(),
            dedup: HashMap::new(),
            has_normals: like.has_normals(),
            has_uvs: like.has_uvs(),
            has_colors: like.has_colors(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Insert a vertex, reusing the index of any earlier vertex with the
    /// same dedup key.
    pub fn add_vertex(&mut self, v: &ClipVertex) -> u32 {
        let key = DedupKey::of(v);
        if let Some(&index) = self.dedup.get(&key) {
            return index;
        }

        let index = (self.positions.len() / 3) as u32;
        self.positions.extend_from_slice(&[
            v.position.x as f32,
            v.position.y as f32,
            v.position.z as f32,
        ]);
        if self.has_normals {
            let n = v.normal.unwrap_or_else(Vector3::zeros);
            self.normals
                .extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
        }
        if self.has_uvs {
            let t = v.uv.unwrap_or_else(Vector2::zeros);
            self.uvs.extend_from_slice(&[t.x as f32, t.y as f32]);
        }
        if self.has_colors {
            let c = v.color.unwrap_or_else(Vector4::zeros);
            self.colors
                .extend_from_slice(&[c.x as f32, c.y as f32, c.z as f32, c.w as f32]);
        }

        self.dedup.insert(key, index);
        index
    }

    /// Add one triangle. Zero-area output (collapsed indices or collinear
    /// edges) is dropped silently.
    pub fn add_triangle(&mut self, a: &ClipVertex, b: &ClipVertex, c: &ClipVertex) {
        if degenerate(a, b, c) {
            return;
        }
        let ia = self.add_vertex(a);
        let ib = self.add_vertex(b);
        let ic = self.add_vertex(c);
        if ia != ib && ib != ic && ia != ic {
            self.indices.extend_from_slice(&[ia, ib, ic]);
        }
    }

    /// Fan-triangulate a convex polygon from its first vertex and add the
    /// resulting triangles.
    pub fn add_polygon(&mut self, polygon: &[ClipVertex]) {
        for i in 1..polygon.len().saturating_sub(1) {
            self.add_triangle(&polygon[0], &polygon[i], &polygon[i + 1]);
        }
    }

    pub fn build(self, material_index: Option<usize>) -> IndexedMesh {
        IndexedMesh {
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            colors: self.colors,
            indices: self.indices,
            material_index,
        }
    }
}

fn degenerate(a: &ClipVertex, b: &ClipVertex, c: &ClipVertex) -> bool {
    let cross = (b.position - a.position).cross(&(c.position - a.position));
    cross.norm_squared() < 1e-24
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f64, y: f64, z: f64) -> ClipVertex {
        ClipVertex {
            position: Vector3::new(x, y, z),
            normal: None,
            uv: None,
            color: None,
        }
    }

    fn full_vertex(x: f64, uv: [f64; 2], n: [f64; 3]) -> ClipVertex {
        ClipVertex {
            position: Vector3::new(x, 0.0, 0.0),
            normal: Some(Vector3::new(n[0], n[1], n[2])),
            uv: Some(Vector2::new(uv[0], uv[1])),
            color: None,
        }
    }

    #[test]
    fn polygon_fully_inside_is_unchanged() {
        let tri = vec![
            vertex(0.1, 0.0, 0.0),
            vertex(0.4, 0.0, 0.0),
            vertex(0.2, 0.3, 0.0),
        ];
        let out = clip_polygon(&tri, Axis::X, 0.5, KeepSide::Below);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn polygon_fully_outside_is_empty() {
        let tri = vec![
            vertex(0.6, 0.0, 0.0),
            vertex(0.9, 0.0, 0.0),
            vertex(0.7, 0.3, 0.0),
        ];
        let out = clip_polygon(&tri, Axis::X, 0.5, KeepSide::Below);
        assert!(out.is_empty());
    }

    #[test]
    fn one_vertex_out_yields_quad() {
        let tri = vec![
            vertex(0.0, 0.0, 0.0),
            vertex(0.0, 1.0, 0.0),
            vertex(1.0, 0.5, 0.0),
        ];
        let out = clip_polygon(&tri, Axis::X, 0.5, KeepSide::Below);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn two_vertices_out_yields_triangle() {
        let tri = vec![
            vertex(1.0, 0.5, 0.0),
            vertex(0.0, 0.0, 0.0),
            vertex(0.0, 1.0, 0.0),
        ];
        let out = clip_polygon(&tri, Axis::X, 0.5, KeepSide::Above);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn clipping_twice_is_idempotent() {
        let tri = vec![
            vertex(0.0, 0.0, 0.0),
            vertex(1.0, 0.0, 0.0),
            vertex(0.5, 1.0, 0.0),
        ];
        let once = clip_polygon(&tri, Axis::X, 0.5, KeepSide::Below);
        let twice = clip_polygon(&once, Axis::X, 0.5, KeepSide::Below);
        assert_eq!(once.len(), twice.len());
        for (a, b) in once.iter().zip(&twice) {
            assert!((a.position - b.position).norm() < 1e-12);
        }
    }

    #[test]
    fn non_intersecting_plane_keeps_triangle() {
        let tri = vec![
            vertex(0.1, 0.1, 0.0),
            vertex(0.2, 0.1, 0.0),
            vertex(0.15, 0.2, 0.0),
        ];
        let out = clip_polygon(&tri, Axis::Z, 5.0, KeepSide::Below);
        assert_eq!(out.len(), 3);
        for (a, b) in tri.iter().zip(&out) {
            assert!((a.position - b.position).norm() < 1e-15);
        }
    }

    #[test]
    fn attributes_interpolate_at_midpoint() {
        let a = full_vertex(0.0, [0.0, 0.0], [0.0, 0.0, 1.0]);
        let b = full_vertex(1.0, [1.0, 0.5], [1.0, 0.0, 0.0]);
        let v = intersect(&a, &b, 0, 0.5);

        assert!((v.position.x - 0.5).abs() < 1e-12);
        let uv = v.uv.unwrap();
        assert!((uv.x - 0.5).abs() < 1e-12);
        assert!((uv.y - 0.25).abs() < 1e-12);
        // normal is renormalized after the lerp
        assert!((v.normal.unwrap().norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn dedup_key_separates_uv_seams() {
        let a = full_vertex(0.25, [0.0, 0.0], [0.0, 0.0, 1.0]);
        let b = full_vertex(0.25, [0.75, 0.0], [0.0, 0.0, 1.0]);
        assert_ne!(DedupKey::of(&a), DedupKey::of(&b));

        let c = full_vertex(0.25, [0.0, 0.0], [0.0, 0.0, 1.0]);
        assert_eq!(DedupKey::of(&a), DedupKey::of(&c));
    }

    #[test]
    fn builder_dedups_shared_vertices() {
        let mesh = IndexedMesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        let mut builder = MeshBuilder::for_mesh(&mesh);
        let a = vertex(0.0, 0.0, 0.0);
        let b = vertex(1.0, 0.0, 0.0);
        let c = vertex(0.0, 1.0, 0.0);
        let d = vertex(1.0, 1.0, 0.0);
        builder.add_triangle(&a, &b, &c);
        builder.add_triangle(&b, &d, &c);

        let out = builder.build(None);
        assert_eq!(out.triangle_count(), 2);
        assert_eq!(out.vertex_count(), 4, "shared edge vertices must dedup");
    }

    #[test]
    fn builder_drops_zero_area_triangles() {
        let mesh = IndexedMesh::default();
        let mut builder = MeshBuilder::for_mesh(&mesh);
        builder.add_triangle(
            &vertex(0.0, 0.0, 0.0),
            &vertex(0.5, 0.0, 0.0),
            &vertex(1.0, 0.0, 0.0),
        );
        assert!(builder.is_empty());
    }

    #[test]
    fn fan_triangulation_of_pentagon() {
        let pentagon: Vec<ClipVertex> = (0..5)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::TAU / 5.0;
                vertex(angle.cos(), angle.sin(), 0.0)
            })
            .collect();

        let mesh = IndexedMesh::default();
        let mut builder = MeshBuilder::for_mesh(&mesh);
        builder.add_polygon(&pentagon);
        assert_eq!(builder.triangle_count(), 3);
    }
}
