//! Octree spatial subdivision
//!
//! Splits a mesh into 8 children by clipping against the three midplanes of
//! the parent bounding box. Triangles whose AABB sits entirely inside one
//! octant skip clipping; on photogrammetry surfaces that is the vast
//! majority, and the fast path is what keeps splitting cheap.

use meshtiler_core::{BoundingBox, IndexedMesh};

use crate::clip::{clip_polygon, Axis, ClipVertex, KeepSide, MeshBuilder};

/// Octant index of a point relative to `center`.
///
/// Bit layout `z << 2 | y << 1 | x`, where a bit is set when the coordinate
/// is at or above the center:
///   0 = (lo, lo, lo), 1 = (hi, lo, lo), 2 = (lo, hi, lo), 3 = (hi, hi, lo),
///   4 = (lo, lo, hi), 5 = (hi, lo, hi), 6 = (lo, hi, hi), 7 = (hi, hi, hi)
pub fn octant_of(center: [f64; 3], p: [f64; 3]) -> usize {
    let mut octant = 0;
    if p[0] >= center[0] {
        octant |= 1;
    }
    if p[1] >= center[1] {
        octant |= 2;
    }
    if p[2] >= center[2] {
        octant |= 4;
    }
    octant
}

/// Bounding box of one octant of `parent`.
pub fn octant_bounds(parent: &BoundingBox, octant: usize) -> BoundingBox {
    let c = parent.center();
    let pick = |bit: usize, lo: f64, mid: f64, hi: f64| -> (f64, f64) {
        if octant & bit != 0 {
            (mid, hi)
        } else {
            (lo, mid)
        }
    };
    let (min_x, max_x) = pick(1, parent.min[0], c[0], parent.max[0]);
    let (min_y, max_y) = pick(2, parent.min[1], c[1], parent.max[1]);
    let (min_z, max_z) = pick(4, parent.min[2], c[2], parent.max[2]);

    BoundingBox {
        min: [min_x, min_y, min_z],
        max: [max_x, max_y, max_z],
    }
}

/// Split a mesh into up to 8 octant meshes; slots without geometry come
/// back empty.
///
/// Each child owns disjoint copies of its vertex and index data. Dedup
/// keys are scoped to this invocation, so the two sides of a shared clipped
/// edge emit bit-identical boundary vertices.
pub fn split_mesh(mesh: &IndexedMesh, bounds: &BoundingBox) -> [IndexedMesh; 8] {
    let center = bounds.center();
    let mut builders: [MeshBuilder; 8] = std::array::from_fn(|_| MeshBuilder::for_mesh(mesh));

    for tri in mesh.indices.chunks_exact(3) {
        let p0 = mesh.position(tri[0] as usize);
        let p1 = mesh.position(tri[1] as usize);
        let p2 = mesh.position(tri[2] as usize);

        // Triangle AABB: when its min and max corners land in the same
        // octant, every vertex does too, and no midplane crosses it.
        let aabb_min = [
            p0[0].min(p1[0]).min(p2[0]),
            p0[1].min(p1[1]).min(p2[1]),
            p0[2].min(p1[2]).min(p2[2]),
        ];
        let aabb_max = [
            p0[0].max(p1[0]).max(p2[0]),
            p0[1].max(p1[1]).max(p2[1]),
            p0[2].max(p1[2]).max(p2[2]),
        ];

        let lo = octant_of(center, aabb_min);
        let hi = octant_of(center, aabb_max);

        let v0 = ClipVertex::from_mesh(mesh, tri[0] as usize);
        let v1 = ClipVertex::from_mesh(mesh, tri[1] as usize);
        let v2 = ClipVertex::from_mesh(mesh, tri[2] as usize);

        if lo == hi {
            builders[lo].add_triangle(&v0, &v1, &v2);
        } else {
            for (octant, fragment) in split_by_midplanes(vec![v0, v1, v2], center) {
                builders[octant].add_polygon(&fragment);
            }
        }
    }

    let material_index = mesh.material_index;
    builders.map(|b| b.build(material_index))
}

/// Clip a polygon against the three midplanes, yielding up to 8 fragments
/// tagged with their octant index.
///
/// A fragment lying entirely inside a midplane is assigned to the low side
/// of that plane, so plane-resident geometry never lands in two octants.
fn split_by_midplanes(
    polygon: Vec<ClipVertex>,
    center: [f64; 3],
) -> Vec<(usize, Vec<ClipVertex>)> {
    let mut fragments = vec![(0usize, polygon)];

    for (axis, bit) in [(Axis::X, 1usize), (Axis::Y, 2), (Axis::Z, 4)] {
        let value = center[axis.index()];
        let mut next = Vec::with_capacity(fragments.len() * 2);

        for (octant, fragment) in fragments {
            if fragment.iter().all(|v| v.position[axis.index()] == value) {
                next.push((octant, fragment));
                continue;
            }

            let below = clip_polygon(&fragment, axis, value, KeepSide::Below);
            let above = clip_polygon(&fragment, axis, value, KeepSide::Above);
            if below.len() >= 3 {
                next.push((octant, below));
            }
            if above.len() >= 3 {
                next.push((octant | bit, above));
            }
        }

        fragments = next;
    }

    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::DedupKey;
    use std::collections::BTreeSet;

    fn unit_bounds() -> BoundingBox {
        BoundingBox {
            min: [0.0; 3],
            max: [1.0; 3],
        }
    }

    /// Flat grid at `z` spanning the unit square, n x n quads.
    fn flat_grid(n: usize, z: f32) -> IndexedMesh {
        let side = n + 1;
        let mut positions = Vec::new();
        let mut uvs = Vec::new();
        for y in 0..side {
            for x in 0..side {
                let fx = x as f32 / n as f32;
                let fy = y as f32 / n as f32;
                positions.extend_from_slice(&[fx, fy, z]);
                uvs.extend_from_slice(&[fx, fy]);
            }
        }
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let tl = (y * side + x) as u32;
                let bl = tl + side as u32;
                indices.extend_from_slice(&[tl, bl, tl + 1, tl + 1, bl, bl + 1]);
            }
        }
        IndexedMesh {
            positions,
            uvs,
            indices,
            ..Default::default()
        }
    }

    #[test]
    fn octant_layout() {
        let c = [0.5; 3];
        assert_eq!(octant_of(c, [0.1, 0.1, 0.1]), 0);
        assert_eq!(octant_of(c, [0.9, 0.1, 0.1]), 1);
        assert_eq!(octant_of(c, [0.1, 0.9, 0.1]), 2);
        assert_eq!(octant_of(c, [0.9, 0.9, 0.9]), 7);
        // points at the center belong to the high side of every axis
        assert_eq!(octant_of(c, c), 7);
    }

    #[test]
    fn octant_bounds_cover_parent() {
        let parent = BoundingBox {
            min: [0.0, 0.0, 0.0],
            max: [2.0, 4.0, 6.0],
        };
        let b0 = octant_bounds(&parent, 0);
        assert_eq!(b0.min, [0.0, 0.0, 0.0]);
        assert_eq!(b0.max, [1.0, 2.0, 3.0]);

        let b7 = octant_bounds(&parent, 7);
        assert_eq!(b7.min, [1.0, 2.0, 3.0]);
        assert_eq!(b7.max, [2.0, 4.0, 6.0]);

        let b5 = octant_bounds(&parent, 5);
        assert_eq!(b5.min, [1.0, 0.0, 3.0]);
        assert_eq!(b5.max, [2.0, 2.0, 6.0]);

        for octant in 0..8 {
            assert!(parent.contains_box(&octant_bounds(&parent, octant)));
        }
    }

    #[test]
    fn interior_triangle_takes_fast_path() {
        let mesh = IndexedMesh {
            positions: vec![0.1, 0.1, 0.1, 0.3, 0.1, 0.1, 0.1, 0.3, 0.1],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        let children = split_mesh(&mesh, &unit_bounds());
        assert_eq!(children[0].triangle_count(), 1);
        let total: usize = children.iter().map(|m| m.triangle_count()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn triangle_split_at_x_midplane() {
        // triangle (0,0,0) (1,0,0) (0.5,1,0) with UVs matching positions;
        // the box is chosen so only the x midplane (at 0.5) cuts it
        let mesh = IndexedMesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.5, 1.0, 0.0],
            uvs: vec![0.0, 0.0, 1.0, 0.0, 0.5, 1.0],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        let bounds = BoundingBox {
            min: [0.0, -1.0, -1.0],
            max: [1.0, 1.0, 1.0],
        };
        let children = split_mesh(&mesh, &bounds);

        // the triangle sits on the y and z midplanes' high/low boundary:
        // the surviving pieces land in the y-high, z-low octants 2 and 3
        let occupied: Vec<usize> = children
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_empty())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(occupied, vec![2, 3]);

        // -x side: exactly one triangle (0,0,0) (0.5,0,0) (0.5,1,0)
        let left = &children[2];
        assert_eq!(left.triangle_count(), 1);
        let quantize = |v: &[f32]| -> BTreeSet<[i64; 2]> {
            v.chunks_exact(2)
                .map(|c| {
                    [
                        (c[0] * 1e6_f32).round() as i64,
                        (c[1] * 1e6_f32).round() as i64,
                    ]
                })
                .collect()
        };
        let left_xy: BTreeSet<[i64; 2]> = left
            .positions
            .chunks_exact(3)
            .map(|p| {
                [
                    (p[0] * 1e6_f32).round() as i64,
                    (p[1] * 1e6_f32).round() as i64,
                ]
            })
            .collect();
        let expected: BTreeSet<[i64; 2]> = [[0, 0], [500_000, 0], [500_000, 1_000_000]]
            .into_iter()
            .collect();
        assert_eq!(left_xy, expected);

        // UVs interpolate identically: (0,0) (0.5,0) (0.5,1)
        assert_eq!(quantize(&left.uvs), expected);

        // +x side: the rest of the triangle; the fan's zero-area sliver at
        // the on-plane apex is dropped
        let right = &children[3];
        assert!(right.triangle_count() >= 1);

        let original = mesh.surface_area();
        let total: f64 = children.iter().map(|m| m.surface_area()).sum();
        assert!((total - original).abs() <= 1e-6 * original);
        assert!((left.surface_area() - original * 0.5).abs() <= 1e-6);
    }

    #[test]
    fn area_is_conserved_across_children() {
        let mesh = flat_grid(7, 0.4); // straddles x and y midplanes
        let parent_area = mesh.surface_area();

        let children = split_mesh(&mesh, &unit_bounds());
        let child_area: f64 = children.iter().map(|m| m.surface_area()).sum();

        assert!(
            (child_area - parent_area).abs() <= 1e-4 * parent_area,
            "area {child_area} diverged from {parent_area}"
        );
    }

    #[test]
    fn boundary_dedup_keys_match_across_children() {
        let mesh = flat_grid(5, 0.25);
        let bounds = unit_bounds();
        let children = split_mesh(&mesh, &bounds);

        // collect keys of vertices on the x midplane for both x-side groups
        let keys_of = |octants: &[usize]| -> BTreeSet<DedupKey> {
            let mut keys = BTreeSet::new();
            for &o in octants {
                let child = &children[o];
                for v in 0..child.vertex_count() {
                    if (child.positions[v * 3] - 0.5).abs() < 1e-6 {
                        keys.insert(DedupKey::of_mesh_vertex(child, v));
                    }
                }
            }
            keys
        };

        let low = keys_of(&[0, 2, 4, 6]);
        let high = keys_of(&[1, 3, 5, 7]);
        assert!(!low.is_empty());
        assert_eq!(low, high, "midplane vertices must agree on both sides");
    }

    #[test]
    fn no_octant_leaks_outside_its_bounds() {
        let mesh = flat_grid(6, 0.51);
        let bounds = unit_bounds();
        let children = split_mesh(&mesh, &bounds);

        for (octant, child) in children.iter().enumerate() {
            let ob = octant_bounds(&bounds, octant);
            for v in 0..child.vertex_count() {
                let p = child.position(v);
                let eps = 1e-6;
                for axis in 0..3 {
                    assert!(
                        p[axis] >= ob.min[axis] - eps && p[axis] <= ob.max[axis] + eps,
                        "octant {octant} vertex {p:?} escapes {ob:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn one_vertex_on_plane_lands_on_one_side() {
        let mesh = IndexedMesh {
            positions: vec![0.5, 0.1, 0.1, 0.2, 0.2, 0.1, 0.3, 0.1, 0.1],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        let children = split_mesh(&mesh, &unit_bounds());
        let non_empty = children.iter().filter(|m| !m.is_empty()).count();
        assert_eq!(non_empty, 1, "touching the plane must not duplicate");
        let total: usize = children.iter().map(|m| m.triangle_count()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn plane_resident_triangle_lands_on_one_side() {
        // entire triangle inside the x midplane, straddling the y midplane
        let mesh = IndexedMesh {
            positions: vec![0.5, 0.1, 0.1, 0.5, 0.9, 0.1, 0.5, 0.5, 0.3],
            indices: vec![0, 1, 2],
            ..Default::default()
        };
        let children = split_mesh(&mesh, &unit_bounds());
        let total_area: f64 = children.iter().map(|m| m.surface_area()).sum();
        let original = mesh.surface_area();
        assert!(
            (total_area - original).abs() <= 1e-4 * original,
            "coplanar triangle duplicated or lost: {total_area} vs {original}"
        );
    }

    #[test]
    fn empty_mesh_splits_into_empties() {
        let children = split_mesh(&IndexedMesh::default(), &unit_bounds());
        assert!(children.iter().all(|m| m.is_empty()));
    }

    #[test]
    fn attributes_survive_the_split() {
        let mut mesh = flat_grid(4, 0.5);
        mesh.normals = vec![0.0, 0.0, 1.0]
            .into_iter()
            .cycle()
            .take(mesh.vertex_count() * 3)
            .collect();
        mesh.material_index = Some(3);

        let children = split_mesh(&mesh, &unit_bounds());
        for child in children.iter().filter(|m| !m.is_empty()) {
            assert!(child.has_normals());
            assert!(child.has_uvs());
            assert_eq!(child.material_index, Some(3));
            child.check_invariants().unwrap();
        }
    }
}
