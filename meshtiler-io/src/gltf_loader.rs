//! glTF / GLB ingestion

use std::path::Path;

use tracing::{debug, warn};

use meshtiler_core::{
    AlphaMode, Error, IndexedMesh, MaterialLibrary, PbrMaterial, Result, TextureImage,
};

/// Load a glTF or GLB file with its materials and images.
pub fn load_gltf(path: &Path) -> Result<(Vec<IndexedMesh>, MaterialLibrary)> {
    let (document, buffers, images) =
        gltf::import(path).map_err(|e| Error::Input(format!("glTF load failed: {e}")))?;

    debug!(
        meshes = document.meshes().len(),
        materials = document.materials().len(),
        images = images.len(),
        "parsed glTF"
    );

    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            match read_primitive(&primitive, &buffers) {
                Ok(mut indexed) => {
                    indexed.material_index = primitive.material().index();
                    meshes.push(indexed);
                }
                Err(e) => warn!(mesh = ?mesh.name(), "skipping primitive: {e}"),
            }
        }
    }

    let mut library = MaterialLibrary::default();
    for material in document.materials() {
        library.materials.push(convert_material(&material));
    }
    for image in &images {
        library.textures.push(convert_image(image));
    }

    Ok((meshes, library))
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
) -> Result<IndexedMesh> {
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<f32> = reader
        .read_positions()
        .ok_or_else(|| Error::Input("primitive has no POSITION attribute".into()))?
        .flatten()
        .collect();

    let normals: Vec<f32> = reader
        .read_normals()
        .map(|iter| iter.flatten().collect())
        .unwrap_or_default();

    // glTF UVs already use a top-left origin
    let uvs: Vec<f32> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().flatten().collect())
        .unwrap_or_default();

    let colors: Vec<f32> = reader
        .read_colors(0)
        .map(|iter| iter.into_rgba_f32().flatten().collect())
        .unwrap_or_default();

    let indices: Vec<u32> = reader
        .read_indices()
        .ok_or_else(|| Error::Input("primitive has no index buffer".into()))?
        .into_u32()
        .collect();

    Ok(IndexedMesh {
        positions,
        normals,
        uvs,
        colors,
        indices,
        material_index: None,
    })
}

fn convert_material(material: &gltf::Material<'_>) -> PbrMaterial {
    let pbr = material.pbr_metallic_roughness();

    PbrMaterial {
        name: material.name().unwrap_or_default().to_string(),
        base_color: pbr.base_color_factor(),
        metallic: pbr.metallic_factor(),
        roughness: pbr.roughness_factor(),
        base_color_texture: pbr
            .base_color_texture()
            .map(|info| info.texture().source().index()),
        alpha_mode: match material.alpha_mode() {
            gltf::material::AlphaMode::Opaque => AlphaMode::Opaque,
            gltf::material::AlphaMode::Mask => AlphaMode::Mask,
            gltf::material::AlphaMode::Blend => AlphaMode::Blend,
        },
        double_sided: material.double_sided(),
    }
}

/// The importer hands back decoded pixels; keep them raw and let the atlas
/// stage reinterpret the buffer.
fn convert_image(image: &gltf::image::Data) -> TextureImage {
    TextureImage::new(image.pixels.clone(), "image/png", image.width, image.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_conversion_keeps_dimensions() {
        let data = gltf::image::Data {
            pixels: vec![255, 0, 0, 255, 0, 255, 0, 255],
            format: gltf::image::Format::R8G8B8A8,
            width: 2,
            height: 1,
        };
        let tex = convert_image(&data);
        assert_eq!((tex.width, tex.height), (2, 1));
        assert_eq!(tex.data.len(), 8);
    }

    #[test]
    fn glb_roundtrip_through_writer() {
        // write a GLB with the tiling writer, then read it back here
        let mesh = IndexedMesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            uvs: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
            material_index: Some(0),
            ..Default::default()
        };
        let mut library = MaterialLibrary::default();
        library.materials.push(PbrMaterial {
            name: "painted".into(),
            base_color: [0.2, 0.4, 0.6, 1.0],
            double_sided: true,
            ..Default::default()
        });

        let bytes = meshtiler_tiling::write_glb(&mesh, &library, None, false);
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tile.glb");
        std::fs::write(&path, bytes).unwrap();

        let (meshes, loaded) = load_gltf(&path).unwrap();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].triangle_count(), 1);
        assert!(meshes[0].has_normals());
        assert!(meshes[0].has_uvs());
        assert_eq!(meshes[0].material_index, Some(0));
        assert_eq!(loaded.materials.len(), 1);
        assert!(loaded.materials[0].double_sided);
        assert!((loaded.materials[0].base_color[2] - 0.6).abs() < 1e-5);
    }
}
