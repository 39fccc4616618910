//! Per-tile atlas repacking
//!
//! A tile references only a small window of the source atlas. This module
//! finds the UV islands the tile actually uses, packs them into a compact
//! per-tile atlas with bleed padding, rewrites the UVs, and re-encodes the
//! texture.
//!
//! Island detection keys edge adjacency by the [`DedupKey`] identity of the
//! edge endpoints. Because the key includes UV, triangles that touch in 3D
//! but diverge in texture space fall into different islands, and each
//! island gets its own copy of any shared vertex with that island's UVs.

use std::collections::{HashMap, VecDeque};

use image::RgbaImage;
use tracing::warn;

use meshtiler_core::{IndexedMesh, MaterialLibrary, TextureImage};

use crate::clip::DedupKey;
use crate::packer::{pack_rects, PackRequest, PackedRect};
use crate::texture::{encode_atlas, TextureOptions};

/// Result of repacking one tile.
pub struct AtlasOutput {
    /// Mesh with UVs rewritten into atlas space; vertices used by several
    /// islands are duplicated, so the vertex count may grow.
    pub mesh: IndexedMesh,
    /// The composited, encoded per-tile atlas.
    pub texture: TextureImage,
}

/// A connected component of triangles under UV-aware edge adjacency.
#[derive(Debug)]
pub struct UvIsland {
    pub faces: Vec<usize>,
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

/// Pixel-space footprint of an island inside the source texture.
#[derive(Debug, Clone, Copy)]
struct IslandRect {
    /// Content size in pixels (excludes padding).
    inner_w: u32,
    inner_h: u32,
    /// Bleed padding on every side.
    pad: u32,
    /// Unscaled content size; equal to `inner_*` unless the island was
    /// clamped or globally downscaled to fit the canvas.
    native_w: u32,
    native_h: u32,
    /// Whole-number UV wrap offset (`floor` of the island minimum).
    u_offset: f32,
    v_offset: f32,
}

/// Bleed width for an island of the given maximum pixel dimension.
fn bleed_padding(max_dim: u32) -> u32 {
    match max_dim {
        0..=100 => 2,
        101..=200 => 4,
        _ => 5,
    }
}

/// Build a compact atlas for one tile mesh.
///
/// Returns `None` when there is nothing to do: the mesh has no UVs or no
/// material, the material has no texture, or no triangle references it —
/// in that case the tile simply drops the texture.
pub fn repack_atlas(
    mesh: &IndexedMesh,
    materials: &MaterialLibrary,
    options: &TextureOptions,
) -> Option<AtlasOutput> {
    if !mesh.has_uvs() || mesh.is_empty() {
        return None;
    }
    let source_tex = materials.base_color_texture(mesh.material_index?)?;
    let source = decode_source(source_tex)?;
    let (src_w, src_h) = source.dimensions();

    let islands = detect_islands(mesh);
    if islands.is_empty() {
        return None;
    }

    // Size each island in pixels, then pack. If the canvas cannot fit even
    // at the configured maximum, halve the islands and retry.
    let mut scale = 1.0f32;
    let (rects, placements, atlas_w, atlas_h) = loop {
        let rects: Vec<IslandRect> = islands
            .iter()
            .map(|island| island_rect(island, src_w, src_h, options.max_size, scale))
            .collect();

        let requests: Vec<PackRequest> = rects
            .iter()
            .enumerate()
            .map(|(id, r)| PackRequest {
                id,
                width: r.inner_w + 2 * r.pad,
                height: r.inner_h + 2 * r.pad,
            })
            .collect();

        match pack_rects(&requests, options.max_size) {
            Some(result) => {
                let mut placements = vec![
                    PackedRect {
                        id: 0,
                        x: 0,
                        y: 0,
                        width: 0,
                        height: 0
                    };
                    islands.len()
                ];
                for rect in result.rects {
                    placements[rect.id] = rect;
                }
                break (rects, placements, result.width, result.height);
            }
            None => {
                scale *= 0.5;
                warn!(
                    islands = islands.len(),
                    max_size = options.max_size,
                    scale,
                    "atlas did not fit, downscaling islands"
                );
                if scale < 1.0 / 64.0 {
                    return None;
                }
            }
        }
    };

    let atlas = composite(&source, &islands, &rects, &placements, atlas_w, atlas_h);
    let mesh = remap_mesh(mesh, &islands, &rects, &placements, atlas_w, atlas_h);
    let texture = encode_atlas(&atlas, options);

    Some(AtlasOutput { mesh, texture })
}

/// Decode the source texture: try the encoded container first, then fall
/// back to raw RGBA / RGB pixel data.
fn decode_source(tex: &TextureImage) -> Option<RgbaImage> {
    if let Ok(img) = image::load_from_memory(&tex.data) {
        return Some(img.to_rgba8());
    }

    let pixels = (tex.width * tex.height) as usize;
    if tex.data.len() == pixels * 4 {
        return RgbaImage::from_raw(tex.width, tex.height, tex.data.clone());
    }
    if tex.data.len() == pixels * 3 {
        let mut rgba = Vec::with_capacity(pixels * 4);
        for rgb in tex.data.chunks_exact(3) {
            rgba.extend_from_slice(rgb);
            rgba.push(255);
        }
        return RgbaImage::from_raw(tex.width, tex.height, rgba);
    }

    warn!(
        width = tex.width,
        height = tex.height,
        bytes = tex.data.len(),
        mime = %tex.mime_type,
        "undecodable source texture"
    );
    None
}

/// Partition the triangles into UV islands.
///
/// Two triangles are adjacent iff they share an edge whose endpoint
/// identities (position + UV + normal) match; BFS over that relation
/// yields the islands.
pub fn detect_islands(mesh: &IndexedMesh) -> Vec<UvIsland> {
    let face_count = mesh.triangle_count();
    let keys: Vec<DedupKey> = (0..mesh.vertex_count())
        .map(|v| DedupKey::of_mesh_vertex(mesh, v))
        .collect();

    let mut edges: HashMap<(DedupKey, DedupKey), Vec<usize>> = HashMap::new();
    for face in 0..face_count {
        let corners = &mesh.indices[face * 3..face * 3 + 3];
        for e in 0..3 {
            let a = keys[corners[e] as usize];
            let b = keys[corners[(e + 1) % 3] as usize];
            let key = if a <= b { (a, b) } else { (b, a) };
            edges.entry(key).or_default().push(face);
        }
    }

    let mut face_adjacent: Vec<Vec<usize>> = vec![Vec::new(); face_count];
    for faces in edges.values() {
        for i in 0..faces.len() {
            for j in i + 1..faces.len() {
                face_adjacent[faces[i]].push(faces[j]);
                face_adjacent[faces[j]].push(faces[i]);
            }
        }
    }

    let mut visited = vec![false; face_count];
    let mut islands = Vec::new();

    for start in 0..face_count {
        if visited[start] {
            continue;
        }
        visited[start] = true;

        let mut queue = VecDeque::from([start]);
        let mut faces = Vec::new();
        let mut uv_min = [f32::INFINITY; 2];
        let mut uv_max = [f32::NEG_INFINITY; 2];

        while let Some(face) = queue.pop_front() {
            faces.push(face);
            for &vi in &mesh.indices[face * 3..face * 3 + 3] {
                let u = mesh.uvs[vi as usize * 2];
                let v = mesh.uvs[vi as usize * 2 + 1];
                uv_min[0] = uv_min[0].min(u);
                uv_min[1] = uv_min[1].min(v);
                uv_max[0] = uv_max[0].max(u);
                uv_max[1] = uv_max[1].max(v);
            }
            for &next in &face_adjacent[face] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        islands.push(UvIsland {
            faces,
            uv_min,
            uv_max,
        });
    }

    islands
}

fn island_rect(island: &UvIsland, src_w: u32, src_h: u32, max_size: u32, scale: f32) -> IslandRect {
    let u_offset = island.uv_min[0].floor();
    let v_offset = island.uv_min[1].floor();
    let u_range = island.uv_max[0] - island.uv_min[0];
    let v_range = island.uv_max[1] - island.uv_min[1];

    let native_w = (u_range * src_w as f32).ceil().max(1.0) as u32;
    let native_h = (v_range * src_h as f32).ceil().max(1.0) as u32;

    let inner_w = (((native_w as f32 * scale).round() as u32).max(1)).min(max_size);
    let inner_h = (((native_h as f32 * scale).round() as u32).max(1)).min(max_size);

    IslandRect {
        inner_w,
        inner_h,
        pad: bleed_padding(inner_w.max(inner_h)),
        native_w,
        native_h,
        u_offset,
        v_offset,
    }
}

/// Copy every island's pixels into the atlas and fill its bleed border.
fn composite(
    source: &RgbaImage,
    islands: &[UvIsland],
    rects: &[IslandRect],
    placements: &[PackedRect],
    atlas_w: u32,
    atlas_h: u32,
) -> RgbaImage {
    let mut atlas = RgbaImage::new(atlas_w, atlas_h);
    let (src_w, src_h) = source.dimensions();

    for (island, (rect, placement)) in islands.iter().zip(rects.iter().zip(placements)) {
        let x0 = placement.x + rect.pad;
        let y0 = placement.y + rect.pad;
        let wu_min = island.uv_min[0] - rect.u_offset;
        let wv_min = island.uv_min[1] - rect.v_offset;
        let u_range = island.uv_max[0] - island.uv_min[0];
        let v_range = island.uv_max[1] - island.uv_min[1];

        if rect.inner_w == rect.native_w && rect.inner_h == rect.native_h {
            // 1:1 copy, one scanline at a time
            let src_x0 = (wu_min * src_w as f32).floor() as i64;
            let src_y0 = (wv_min * src_h as f32).floor() as i64;
            for py in 0..rect.inner_h {
                let sy = (src_y0 + py as i64).rem_euclid(src_h as i64) as u32;
                copy_row(&mut atlas, source, src_x0, sy, x0, y0 + py, rect.inner_w);
            }
        } else {
            // island was clamped or downscaled: nearest-neighbor resample
            for py in 0..rect.inner_h {
                let v = wv_min + (py as f32 + 0.5) / rect.inner_h as f32 * v_range;
                let sy = ((v * src_h as f32) as i64).rem_euclid(src_h as i64) as u32;
                for px in 0..rect.inner_w {
                    let u = wu_min + (px as f32 + 0.5) / rect.inner_w as f32 * u_range;
                    let sx = ((u * src_w as f32) as i64).rem_euclid(src_w as i64) as u32;
                    atlas.put_pixel(x0 + px, y0 + py, *source.get_pixel(sx, sy));
                }
            }
        }

        fill_bleed(&mut atlas, x0, y0, rect.inner_w, rect.inner_h, rect.pad);
    }

    atlas
}

/// Copy `width` pixels of source row `sy` starting at column `src_x0`
/// (wrapping) to atlas position `(dst_x, dst_y)`. Contiguous spans go
/// through one bulk `copy_from_slice`.
fn copy_row(
    atlas: &mut RgbaImage,
    source: &RgbaImage,
    src_x0: i64,
    sy: u32,
    dst_x: u32,
    dst_y: u32,
    width: u32,
) {
    let (src_w, _) = source.dimensions();
    let atlas_w = atlas.width();

    if src_x0 >= 0 && src_x0 as u32 + width <= src_w {
        let src_off = ((sy * src_w + src_x0 as u32) * 4) as usize;
        let dst_off = ((dst_y * atlas_w + dst_x) * 4) as usize;
        let len = (width * 4) as usize;
        let src_raw: &[u8] = source.as_raw();
        let dst_raw: &mut [u8] = &mut *atlas;
        dst_raw[dst_off..dst_off + len].copy_from_slice(&src_raw[src_off..src_off + len]);
    } else {
        for px in 0..width {
            let sx = (src_x0 + px as i64).rem_euclid(src_w as i64) as u32;
            atlas.put_pixel(dst_x + px, dst_y, *source.get_pixel(sx, sy));
        }
    }
}

/// Replicate the content edges outward by `pad` pixels and extend the four
/// corner pixels into the `pad x pad` corners. GPUs sample slightly outside
/// the content rectangle under bilinear filtering; the border hides that.
fn fill_bleed(atlas: &mut RgbaImage, x0: u32, y0: u32, width: u32, height: u32, pad: u32) {
    if width == 0 || height == 0 {
        return;
    }
    let (aw, ah) = atlas.dimensions();

    for px in 0..width {
        let top = *atlas.get_pixel(x0 + px, y0);
        let bottom = *atlas.get_pixel(x0 + px, y0 + height - 1);
        for p in 1..=pad {
            if y0 >= p {
                atlas.put_pixel(x0 + px, y0 - p, top);
            }
            if y0 + height - 1 + p < ah {
                atlas.put_pixel(x0 + px, y0 + height - 1 + p, bottom);
            }
        }
    }

    for py in 0..height {
        let left = *atlas.get_pixel(x0, y0 + py);
        let right = *atlas.get_pixel(x0 + width - 1, y0 + py);
        for p in 1..=pad {
            if x0 >= p {
                atlas.put_pixel(x0 - p, y0 + py, left);
            }
            if x0 + width - 1 + p < aw {
                atlas.put_pixel(x0 + width - 1 + p, y0 + py, right);
            }
        }
    }

    // corners extend the corner pixel diagonally
    let corners = [
        (x0, y0, -1i64, -1i64),
        (x0 + width - 1, y0, 1, -1),
        (x0, y0 + height - 1, -1, 1),
        (x0 + width - 1, y0 + height - 1, 1, 1),
    ];
    for (cx, cy, dx, dy) in corners {
        let pixel = *atlas.get_pixel(cx, cy);
        for oy in 1..=pad as i64 {
            for ox in 1..=pad as i64 {
                let px = cx as i64 + ox * dx;
                let py = cy as i64 + oy * dy;
                if px >= 0 && py >= 0 && (px as u32) < aw && (py as u32) < ah {
                    atlas.put_pixel(px as u32, py as u32, pixel);
                }
            }
        }
    }
}

/// Rewrite UVs into atlas space, duplicating any vertex whose triangles
/// were split across islands so every island samples its own rectangle.
fn remap_mesh(
    mesh: &IndexedMesh,
    islands: &[UvIsland],
    rects: &[IslandRect],
    placements: &[PackedRect],
    atlas_w: u32,
    atlas_h: u32,
) -> IndexedMesh {
    let mut out = mesh.clone();
    let mut owner: Vec<Option<usize>> = vec![None; mesh.vertex_count()];
    let mut duplicates: HashMap<(usize, usize), u32> = HashMap::new();

    for (i, island) in islands.iter().enumerate() {
        let rect = &rects[i];
        let placement = &placements[i];

        for &face in &island.faces {
            for corner in 0..3 {
                let slot = face * 3 + corner;
                let vi = mesh.indices[slot] as usize;
                let (u, v) = remap_uv(
                    mesh.uvs[vi * 2],
                    mesh.uvs[vi * 2 + 1],
                    island,
                    rect,
                    placement,
                    atlas_w,
                    atlas_h,
                );

                match owner[vi] {
                    None => {
                        owner[vi] = Some(i);
                        out.uvs[vi * 2] = u;
                        out.uvs[vi * 2 + 1] = v;
                    }
                    Some(o) if o == i => {}
                    Some(_) => {
                        let new_index = match duplicates.get(&(vi, i)) {
                            Some(&n) => n,
                            None => {
                                let n = (out.positions.len() / 3) as u32;
                                out.positions
                                    .extend_from_slice(&mesh.positions[vi * 3..vi * 3 + 3]);
                                if mesh.has_normals() {
                                    out.normals
                                        .extend_from_slice(&mesh.normals[vi * 3..vi * 3 + 3]);
                                }
                                if mesh.has_colors() {
                                    out.colors
                                        .extend_from_slice(&mesh.colors[vi * 4..vi * 4 + 4]);
                                }
                                out.uvs.extend_from_slice(&[u, v]);
                                duplicates.insert((vi, i), n);
                                n
                            }
                        };
                        out.indices[slot] = new_index;
                    }
                }
            }
        }
    }

    out
}

/// Map one source UV into the packed atlas.
///
/// The half-texel inset (`+ 0.5` against a `size - 1` span) keeps bilinear
/// samples strictly inside the island's opaque pixels.
fn remap_uv(
    u: f32,
    v: f32,
    island: &UvIsland,
    rect: &IslandRect,
    placement: &PackedRect,
    atlas_w: u32,
    atlas_h: u32,
) -> (f32, f32) {
    let u_range = island.uv_max[0] - island.uv_min[0];
    let v_range = island.uv_max[1] - island.uv_min[1];
    let nu = if u_range > 1e-8 {
        (u - island.uv_min[0]) / u_range
    } else {
        0.0
    };
    let nv = if v_range > 1e-8 {
        (v - island.uv_min[1]) / v_range
    } else {
        0.0
    };

    let x0 = (placement.x + rect.pad) as f32;
    let y0 = (placement.y + rect.pad) as f32;
    let new_u = (x0 + 0.5 + nu * (rect.inner_w - 1) as f32) / atlas_w as f32;
    let new_v = (y0 + 0.5 + nv * (rect.inner_h - 1) as f32) / atlas_h as f32;
    (new_u, new_v)
}
