//! Binary glTF (GLB 2.0) emission
//!
//! One self-contained GLB per tile: a single binary buffer holding the
//! vertex attributes, indices and (optionally) the embedded atlas image,
//! one mesh with one `TRIANGLES` primitive, one node, one scene.
//!
//! With compression enabled every attribute and index buffer view is
//! meshopt-encoded and the file declares `EXT_meshopt_compression` in both
//! `extensionsUsed` and `extensionsRequired`. A KTX2 atlas additionally
//! declares `KHR_texture_basisu`.

use std::borrow::Cow;
use std::collections::BTreeMap;

use gltf::binary::Glb;
use gltf_json::accessor::{ComponentType, GenericComponentType, Type as AccessorType};
use gltf_json::buffer::Target;
use gltf_json::mesh::{Mode, Primitive, Semantic};
use gltf_json::validation::{Checked, USize64};
use gltf_json::Index;

use meshtiler_core::{AlphaMode, IndexedMesh, MaterialLibrary, TextureImage, WrapMode};

const GENERATOR: &str = "meshtiler";

/// Serialize a mesh into a GLB byte buffer.
///
/// Indices are u16 when the vertex count allows it. Vertex colors are
/// stored u8-normalized. An empty mesh produces a minimal valid GLB with
/// an empty scene.
pub fn write_glb(
    mesh: &IndexedMesh,
    materials: &MaterialLibrary,
    atlas: Option<&TextureImage>,
    compress: bool,
) -> Vec<u8> {
    if mesh.is_empty() {
        return write_empty_glb();
    }

    let mut root = gltf_json::Root {
        asset: gltf_json::Asset {
            version: "2.0".into(),
            generator: Some(GENERATOR.into()),
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bin: Vec<u8> = Vec::new();
    let mut attributes = BTreeMap::new();
    let buffer = Index::new(0); // the single buffer, pushed last

    // positions
    let (pos_min, pos_max) = position_bounds(&mesh.positions);
    let view = push_attribute_view(
        &mut root,
        &mut bin,
        buffer,
        bytemuck::cast_slice(&mesh.positions),
        12,
        mesh.vertex_count(),
        compress.then(|| encode_f32x3(&mesh.positions)).flatten(),
    );
    let accessor = root.push(gltf_json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(mesh.vertex_count()),
        component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
        type_: Checked::Valid(AccessorType::Vec3),
        min: Some(serde_json::json!(pos_min)),
        max: Some(serde_json::json!(pos_max)),
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    attributes.insert(Checked::Valid(Semantic::Positions), accessor);

    if mesh.has_normals() {
        let view = push_attribute_view(
            &mut root,
            &mut bin,
            buffer,
            bytemuck::cast_slice(&mesh.normals),
            12,
            mesh.vertex_count(),
            compress.then(|| encode_f32x3(&mesh.normals)).flatten(),
        );
        let accessor = root.push(plain_accessor(
            view,
            mesh.vertex_count(),
            ComponentType::F32,
            AccessorType::Vec3,
            false,
        ));
        attributes.insert(Checked::Valid(Semantic::Normals), accessor);
    }

    if mesh.has_uvs() {
        let view = push_attribute_view(
            &mut root,
            &mut bin,
            buffer,
            bytemuck::cast_slice(&mesh.uvs),
            8,
            mesh.vertex_count(),
            compress.then(|| encode_f32x2(&mesh.uvs)).flatten(),
        );
        let accessor = root.push(plain_accessor(
            view,
            mesh.vertex_count(),
            ComponentType::F32,
            AccessorType::Vec2,
            false,
        ));
        attributes.insert(Checked::Valid(Semantic::TexCoords(0)), accessor);
    }

    if mesh.has_colors() {
        // u8 normalized: 4 bytes per vertex instead of 16
        let color_u8: Vec<u8> = mesh
            .colors
            .iter()
            .map(|&c| (c * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        let view = push_attribute_view(
            &mut root,
            &mut bin,
            buffer,
            &color_u8,
            4,
            mesh.vertex_count(),
            compress.then(|| encode_u8x4(&color_u8)).flatten(),
        );
        let accessor = root.push(plain_accessor(
            view,
            mesh.vertex_count(),
            ComponentType::U8,
            AccessorType::Vec4,
            true,
        ));
        attributes.insert(Checked::Valid(Semantic::Colors(0)), accessor);
    }

    // indices
    let use_u16 = mesh.vertex_count() <= 65535;
    let idx_encoded = if compress {
        meshopt::encode_index_buffer(&mesh.indices, mesh.vertex_count()).ok()
    } else {
        None
    };
    let idx_view = push_index_view(&mut root, &mut bin, buffer, &mesh.indices, use_u16, idx_encoded);
    let idx_accessor = root.push(gltf_json::Accessor {
        buffer_view: Some(idx_view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(mesh.indices.len()),
        component_type: Checked::Valid(GenericComponentType(if use_u16 {
            ComponentType::U16
        } else {
            ComponentType::U32
        })),
        type_: Checked::Valid(AccessorType::Scalar),
        min: None,
        max: None,
        name: None,
        normalized: false,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    // embedded atlas image
    let texture = atlas.map(|tex| {
        pad_to_4(&mut bin, 0x00);
        let offset = bin.len();
        bin.extend_from_slice(&tex.data);

        let view = root.push(gltf_json::buffer::View {
            buffer,
            byte_length: USize64::from(tex.data.len()),
            byte_offset: Some(USize64::from(offset)),
            byte_stride: None,
            name: None,
            target: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        let image = root.push(gltf_json::Image {
            buffer_view: Some(view),
            mime_type: Some(gltf_json::image::MimeType(tex.mime_type.clone())),
            uri: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        let sampler = root.push(gltf_json::texture::Sampler {
            mag_filter: Some(Checked::Valid(gltf_json::texture::MagFilter::Linear)),
            min_filter: Some(Checked::Valid(
                gltf_json::texture::MinFilter::LinearMipmapLinear,
            )),
            wrap_s: Checked::Valid(wrap_mode(tex.wrap_s)),
            wrap_t: Checked::Valid(wrap_mode(tex.wrap_t)),
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        root.push(gltf_json::Texture {
            sampler: Some(sampler),
            source: image,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        })
    });

    let material = push_material(&mut root, mesh.material_index, materials, texture);

    let mesh_index = root.push(gltf_json::Mesh {
        primitives: vec![Primitive {
            attributes,
            indices: Some(idx_accessor),
            material,
            mode: Checked::Valid(Mode::Triangles),
            targets: None,
            extensions: Default::default(),
            extras: Default::default(),
        }],
        weights: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let node = root.push(gltf_json::Node {
        mesh: Some(mesh_index),
        ..Default::default()
    });
    let scene = root.push(gltf_json::Scene {
        nodes: vec![node],
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(scene);

    if compress {
        let ext = "EXT_meshopt_compression".to_string();
        root.extensions_used.push(ext.clone());
        root.extensions_required.push(ext);
    }
    if atlas.is_some_and(|tex| tex.mime_type == "image/ktx2") {
        let ext = "KHR_texture_basisu".to_string();
        root.extensions_used.push(ext.clone());
        root.extensions_required.push(ext);
    }

    pad_to_4(&mut bin, 0x00);
    root.push(gltf_json::Buffer {
        byte_length: USize64::from(bin.len()),
        uri: None,
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });

    assemble_glb(&root, Some(bin))
}

/// Minimal valid GLB carrying an empty scene.
fn write_empty_glb() -> Vec<u8> {
    let mut root = gltf_json::Root {
        asset: gltf_json::Asset {
            version: "2.0".into(),
            generator: Some(GENERATOR.into()),
            ..Default::default()
        },
        ..Default::default()
    };
    let node = root.push(gltf_json::Node::default());
    let scene = root.push(gltf_json::Scene {
        nodes: vec![node],
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    });
    root.scene = Some(scene);

    assemble_glb(&root, None)
}

fn assemble_glb(root: &gltf_json::Root, bin: Option<Vec<u8>>) -> Vec<u8> {
    let json = gltf_json::serialize::to_string(root).expect("glTF JSON serialization");
    let mut json_bytes = json.into_bytes();
    // JSON chunk pads with spaces, BIN chunk with zeros, per the GLB spec
    pad_to_4(&mut json_bytes, b' ');

    let bin_len = bin.as_ref().map_or(0, |b| b.len() + 8);
    let glb = Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: (12 + 8 + json_bytes.len() + bin_len) as u32,
        },
        json: Cow::Owned(json_bytes),
        bin: bin.map(Cow::Owned),
    };
    glb.to_vec().expect("GLB container serialization")
}

fn pad_to_4(buf: &mut Vec<u8>, filler: u8) {
    while buf.len() % 4 != 0 {
        buf.push(filler);
    }
}

fn plain_accessor(
    view: Index<gltf_json::buffer::View>,
    count: usize,
    component: ComponentType,
    type_: AccessorType,
    normalized: bool,
) -> gltf_json::Accessor {
    gltf_json::Accessor {
        buffer_view: Some(view),
        byte_offset: Some(USize64(0)),
        count: USize64::from(count),
        component_type: Checked::Valid(GenericComponentType(component)),
        type_: Checked::Valid(type_),
        min: None,
        max: None,
        name: None,
        normalized,
        sparse: None,
        extensions: Default::default(),
        extras: Default::default(),
    }
}

/// Append a vertex attribute as a buffer view; when `encoded` is given the
/// view carries the `EXT_meshopt_compression` extension instead of raw data.
fn push_attribute_view(
    root: &mut gltf_json::Root,
    bin: &mut Vec<u8>,
    buffer: Index<gltf_json::Buffer>,
    raw: &[u8],
    stride: usize,
    count: usize,
    encoded: Option<Vec<u8>>,
) -> Index<gltf_json::buffer::View> {
    pad_to_4(bin, 0x00);

    match encoded {
        Some(encoded) => {
            let offset = bin.len();
            bin.extend_from_slice(&encoded);

            let mut ext = serde_json::Map::new();
            ext.insert(
                "EXT_meshopt_compression".into(),
                serde_json::json!({
                    "buffer": 0,
                    "byteOffset": offset,
                    "byteLength": encoded.len(),
                    "byteStride": stride,
                    "count": count,
                    "mode": "ATTRIBUTES"
                }),
            );

            root.push(gltf_json::buffer::View {
                buffer,
                byte_length: USize64::from(encoded.len()),
                byte_offset: Some(USize64::from(offset)),
                byte_stride: None,
                name: None,
                target: None,
                extensions: Some(gltf_json::extensions::buffer::View { others: ext }),
                extras: Default::default(),
            })
        }
        None => {
            let offset = bin.len();
            bin.extend_from_slice(raw);
            root.push(gltf_json::buffer::View {
                buffer,
                byte_length: USize64::from(raw.len()),
                byte_offset: Some(USize64::from(offset)),
                byte_stride: None,
                name: None,
                target: Some(Checked::Valid(Target::ArrayBuffer)),
                extensions: Default::default(),
                extras: Default::default(),
            })
        }
    }
}

fn push_index_view(
    root: &mut gltf_json::Root,
    bin: &mut Vec<u8>,
    buffer: Index<gltf_json::Buffer>,
    indices: &[u32],
    use_u16: bool,
    encoded: Option<Vec<u8>>,
) -> Index<gltf_json::buffer::View> {
    pad_to_4(bin, 0x00);

    match encoded {
        Some(encoded) => {
            let offset = bin.len();
            bin.extend_from_slice(&encoded);

            let mut ext = serde_json::Map::new();
            ext.insert(
                "EXT_meshopt_compression".into(),
                serde_json::json!({
                    "buffer": 0,
                    "byteOffset": offset,
                    "byteLength": encoded.len(),
                    "byteStride": if use_u16 { 2 } else { 4 },
                    "count": indices.len(),
                    "mode": "TRIANGLES"
                }),
            );

            root.push(gltf_json::buffer::View {
                buffer,
                byte_length: USize64::from(encoded.len()),
                byte_offset: Some(USize64::from(offset)),
                byte_stride: None,
                name: None,
                target: None,
                extensions: Some(gltf_json::extensions::buffer::View { others: ext }),
                extras: Default::default(),
            })
        }
        None => {
            let offset = bin.len();
            let byte_length = if use_u16 {
                let small: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                bin.extend_from_slice(bytemuck::cast_slice(&small));
                indices.len() * 2
            } else {
                bin.extend_from_slice(bytemuck::cast_slice(indices));
                indices.len() * 4
            };

            root.push(gltf_json::buffer::View {
                buffer,
                byte_length: USize64::from(byte_length),
                byte_offset: Some(USize64::from(offset)),
                byte_stride: None,
                name: None,
                target: Some(Checked::Valid(Target::ElementArrayBuffer)),
                extensions: Default::default(),
                extras: Default::default(),
            })
        }
    }
}

fn push_material(
    root: &mut gltf_json::Root,
    material_index: Option<usize>,
    materials: &MaterialLibrary,
    texture: Option<Index<gltf_json::Texture>>,
) -> Option<Index<gltf_json::Material>> {
    let mat = materials.materials.get(material_index?)?;

    let base_color_texture = texture.map(|index| gltf_json::texture::Info {
        index,
        tex_coord: 0,
        extensions: Default::default(),
        extras: Default::default(),
    });

    let alpha_mode = match mat.alpha_mode {
        AlphaMode::Opaque => gltf_json::material::AlphaMode::Opaque,
        AlphaMode::Mask => gltf_json::material::AlphaMode::Mask,
        AlphaMode::Blend => gltf_json::material::AlphaMode::Blend,
    };

    Some(root.push(gltf_json::Material {
        pbr_metallic_roughness: gltf_json::material::PbrMetallicRoughness {
            base_color_factor: gltf_json::material::PbrBaseColorFactor(mat.base_color),
            metallic_factor: gltf_json::material::StrengthFactor(mat.metallic),
            roughness_factor: gltf_json::material::StrengthFactor(mat.roughness),
            base_color_texture,
            metallic_roughness_texture: None,
            extensions: Default::default(),
            extras: Default::default(),
        },
        alpha_mode: Checked::Valid(alpha_mode),
        alpha_cutoff: None,
        double_sided: mat.double_sided,
        normal_texture: None,
        occlusion_texture: None,
        emissive_texture: None,
        emissive_factor: gltf_json::material::EmissiveFactor([0.0, 0.0, 0.0]),
        name: None,
        extensions: Default::default(),
        extras: Default::default(),
    }))
}

fn wrap_mode(mode: WrapMode) -> gltf_json::texture::WrappingMode {
    match mode {
        WrapMode::ClampToEdge => gltf_json::texture::WrappingMode::ClampToEdge,
        WrapMode::Repeat => gltf_json::texture::WrappingMode::Repeat,
        WrapMode::MirroredRepeat => gltf_json::texture::WrappingMode::MirroredRepeat,
    }
}

fn position_bounds(positions: &[f32]) -> ([f32; 3], [f32; 3]) {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for p in positions.chunks_exact(3) {
        for axis in 0..3 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    (min, max)
}

fn encode_f32x3(data: &[f32]) -> Option<Vec<u8>> {
    let vertices: &[[f32; 3]] = bytemuck::cast_slice(data);
    meshopt::encode_vertex_buffer(vertices).ok()
}

fn encode_f32x2(data: &[f32]) -> Option<Vec<u8>> {
    let vertices: &[[f32; 2]] = bytemuck::cast_slice(data);
    meshopt::encode_vertex_buffer(vertices).ok()
}

fn encode_u8x4(data: &[u8]) -> Option<Vec<u8>> {
    let vertices: &[[u8; 4]] = bytemuck::cast_slice(data);
    meshopt::encode_vertex_buffer(vertices).ok()
}
