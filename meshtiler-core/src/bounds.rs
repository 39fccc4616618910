//! Axis-aligned bounding boxes
//!
//! Boxes are kept in f64 throughout the pipeline: octree splits and plane
//! tests must not drift even when the vertices themselves are f32.

use crate::mesh::IndexedMesh;

/// Axis-aligned bounding box. Invariant: `min[i] <= max[i]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    /// Zero-size box at the origin.
    pub fn empty() -> Self {
        Self {
            min: [0.0; 3],
            max: [0.0; 3],
        }
    }

    /// Tight box around every vertex of the given meshes.
    pub fn from_meshes<'a, I>(meshes: I) -> Self
    where
        I: IntoIterator<Item = &'a IndexedMesh>,
    {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];

        for mesh in meshes {
            for v in mesh.positions.chunks_exact(3) {
                for axis in 0..3 {
                    let c = v[axis] as f64;
                    min[axis] = min[axis].min(c);
                    max[axis] = max[axis].max(c);
                }
            }
        }

        if min[0] == f64::INFINITY {
            return Self::empty();
        }
        Self { min, max }
    }

    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn half_extents(&self) -> [f64; 3] {
        [
            (self.max[0] - self.min[0]) * 0.5,
            (self.max[1] - self.min[1]) * 0.5,
            (self.max[2] - self.min[2]) * 0.5,
        ]
    }

    /// Length of the space diagonal.
    pub fn diagonal(&self) -> f64 {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Whether `p` lies inside or on the boundary.
    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Whether `other` lies entirely inside this box (boundaries included).
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        (0..3).all(|i| other.min[i] >= self.min[i] && other.max[i] <= self.max[i])
    }

    /// Smallest box covering both inputs.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> BoundingBox {
        BoundingBox {
            min: [0.0; 3],
            max: [1.0; 3],
        }
    }

    #[test]
    fn center_and_extents() {
        let bb = unit();
        assert_eq!(bb.center(), [0.5, 0.5, 0.5]);
        assert_eq!(bb.half_extents(), [0.5, 0.5, 0.5]);
    }

    #[test]
    fn diagonal_of_unit_cube() {
        assert!((unit().diagonal() - 3.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn containment_includes_boundary() {
        let bb = unit();
        assert!(bb.contains([0.0, 0.0, 0.0]));
        assert!(bb.contains([1.0, 1.0, 1.0]));
        assert!(!bb.contains([1.0, 1.0, 1.0001]));
    }

    #[test]
    fn box_containment() {
        let outer = unit();
        let inner = BoundingBox {
            min: [0.25; 3],
            max: [0.75; 3],
        };
        assert!(outer.contains_box(&inner));
        assert!(!inner.contains_box(&outer));
    }

    #[test]
    fn union_covers_both() {
        let a = unit();
        let b = BoundingBox {
            min: [-1.0; 3],
            max: [0.5; 3],
        };
        let u = a.union(&b);
        assert_eq!(u.min, [-1.0; 3]);
        assert_eq!(u.max, [1.0; 3]);
    }

    #[test]
    fn from_meshes_scans_all_vertices() {
        let meshes = [
            IndexedMesh {
                positions: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
                ..Default::default()
            },
            IndexedMesh {
                positions: vec![-1.0, -2.0, -3.0],
                ..Default::default()
            },
        ];
        let bb = BoundingBox::from_meshes(&meshes);
        assert_eq!(bb.min, [-1.0, -2.0, -3.0]);
        assert_eq!(bb.max, [4.0, 5.0, 6.0]);
    }

    #[test]
    fn from_no_meshes_is_empty() {
        let bb = BoundingBox::from_meshes(std::iter::empty::<&IndexedMesh>());
        assert_eq!(bb, BoundingBox::empty());
    }
}
