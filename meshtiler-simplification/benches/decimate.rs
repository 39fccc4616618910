use criterion::{criterion_group, criterion_main, Criterion};

use meshtiler_core::IndexedMesh;
use meshtiler_simplification::{simplify_mesh, SimplifyParams};

/// Flat grid with `n x n` quads, two triangles each.
fn make_grid(n: usize) -> IndexedMesh {
    let side = n + 1;
    let mut positions = Vec::with_capacity(side * side * 3);
    let mut uvs = Vec::with_capacity(side * side * 2);
    for y in 0..side {
        for x in 0..side {
            let fx = x as f32 / n as f32;
            let fy = y as f32 / n as f32;
            positions.extend_from_slice(&[fx, fy, 0.0]);
            uvs.extend_from_slice(&[fx, fy]);
        }
    }

    let mut indices = Vec::with_capacity(n * n * 6);
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

fn bench_decimate(c: &mut Criterion) {
    // ~100k triangles
    let mesh = make_grid(224);

    c.bench_function("simplify_half_100k", |b| {
        b.iter(|| {
            simplify_mesh(
                &mesh,
                &SimplifyParams {
                    target_ratio: 0.5,
                    uv_weight: 0.0,
                    normal_weight: 0.0,
                    ..Default::default()
                },
            )
        })
    });

    c.bench_function("simplify_quarter_locked_100k", |b| {
        b.iter(|| {
            simplify_mesh(
                &mesh,
                &SimplifyParams {
                    target_ratio: 0.25,
                    lock_border: true,
                    uv_weight: 0.0,
                    normal_weight: 0.0,
                    ..Default::default()
                },
            )
        })
    });

    c.bench_function("simplify_quarter_uv_weighted_100k", |b| {
        b.iter(|| {
            simplify_mesh(
                &mesh,
                &SimplifyParams {
                    target_ratio: 0.25,
                    ..Default::default()
                },
            )
        })
    });
}

criterion_group!(benches, bench_decimate);
criterion_main!(benches);
