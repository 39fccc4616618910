//! Vertex compaction
//!
//! After simplification the index buffer references only a subset of the
//! input vertices. Renumber the reachable vertices densely and rebuild the
//! attribute arrays so downstream stages never carry dead data.

use meshtiler_core::IndexedMesh;

/// Vertex count under which compaction is not worth the allocations at
/// coarse tree depths; callers may skip the pass below this.
pub const COMPACTION_VERTEX_FLOOR: usize = 4096;

/// Rebuild `source`'s attribute buffers keeping only vertices referenced by
/// `indices`, and rewrite the indices against the dense numbering.
pub fn compact_vertices(indices: Vec<u32>, source: &IndexedMesh) -> IndexedMesh {
    if indices.is_empty() {
        return IndexedMesh {
            material_index: source.material_index,
            ..Default::default()
        };
    }

    const UNMAPPED: u32 = u32::MAX;
    let mut remap = vec![UNMAPPED; source.vertex_count()];
    let mut next = 0u32;
    for &i in &indices {
        let slot = &mut remap[i as usize];
        if *slot == UNMAPPED {
            *slot = next;
            next += 1;
        }
    }
    let kept = next as usize;

    let mut out = IndexedMesh {
        positions: vec![0.0; kept * 3],
        normals: if source.has_normals() {
            vec![0.0; kept * 3]
        } else {
            Vec::new()
        },
        uvs: if source.has_uvs() {
            vec![0.0; kept * 2]
        } else {
            Vec::new()
        },
        colors: if source.has_colors() {
            vec![0.0; kept * 4]
        } else {
            Vec::new()
        },
        indices: indices.iter().map(|&i| remap[i as usize]).collect(),
        material_index: source.material_index,
    };

    for (old, &new) in remap.iter().enumerate() {
        if new == UNMAPPED {
            continue;
        }
        let new = new as usize;
        out.positions[new * 3..new * 3 + 3]
            .copy_from_slice(&source.positions[old * 3..old * 3 + 3]);
        if source.has_normals() {
            out.normals[new * 3..new * 3 + 3]
                .copy_from_slice(&source.normals[old * 3..old * 3 + 3]);
        }
        if source.has_uvs() {
            out.uvs[new * 2..new * 2 + 2].copy_from_slice(&source.uvs[old * 2..old * 2 + 2]);
        }
        if source.has_colors() {
            out.colors[new * 4..new * 4 + 4]
                .copy_from_slice(&source.colors[old * 4..old * 4 + 4]);
        }
    }

    out
}
