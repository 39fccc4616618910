//! OBJ + MTL ingestion via tobj

use std::path::Path;

use tracing::{debug, warn};

use meshtiler_core::{Error, IndexedMesh, MaterialLibrary, PbrMaterial, Result, TextureImage};

/// Load an OBJ file with its MTL materials and referenced textures.
pub fn load_obj(path: &Path, load_textures: bool) -> Result<(Vec<IndexedMesh>, MaterialLibrary)> {
    let (models, materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
        .map_err(|e| Error::Input(format!("OBJ load failed: {e}")))?;

    debug!(models = models.len(), "parsed OBJ");

    let obj_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let materials = match materials {
        Ok(list) => list,
        Err(e) => {
            warn!("MTL load failed ({e}), continuing without materials");
            Vec::new()
        }
    };

    let library = convert_materials(&materials, obj_dir, load_textures);
    let meshes = models
        .into_iter()
        .map(|model| convert_mesh(model.mesh))
        .collect();

    Ok((meshes, library))
}

fn convert_mesh(mesh: tobj::Mesh) -> IndexedMesh {
    // OBJ puts the texture origin bottom-left; glTF samples top-left
    let uvs: Vec<f32> = mesh
        .texcoords
        .chunks_exact(2)
        .flat_map(|uv| [uv[0], 1.0 - uv[1]])
        .collect();

    // OBJ vertex colors are RGB; widen to RGBA
    let colors: Vec<f32> = mesh
        .vertex_color
        .chunks_exact(3)
        .flat_map(|rgb| [rgb[0], rgb[1], rgb[2], 1.0])
        .collect();

    IndexedMesh {
        positions: mesh.positions,
        normals: mesh.normals,
        uvs,
        colors,
        indices: mesh.indices,
        material_index: mesh.material_id,
    }
}

fn convert_materials(
    materials: &[tobj::Material],
    obj_dir: &Path,
    load_textures: bool,
) -> MaterialLibrary {
    let mut library = MaterialLibrary::default();

    for mat in materials {
        let mut pbr = PbrMaterial {
            name: mat.name.clone(),
            ..Default::default()
        };

        if let Some(diffuse) = mat.diffuse {
            pbr.base_color = [
                diffuse[0],
                diffuse[1],
                diffuse[2],
                mat.dissolve.unwrap_or(1.0),
            ];
        }

        if load_textures {
            if let Some(name) = &mat.diffuse_texture {
                match load_texture(&obj_dir.join(name)) {
                    Ok(texture) => {
                        pbr.base_color_texture = Some(library.textures.len());
                        library.textures.push(texture);
                    }
                    Err(e) => warn!(texture = %name, "texture skipped: {e}"),
                }
            }
        }

        library.materials.push(pbr);
    }

    library
}

/// Read a texture file as raw bytes, decoding only the header for
/// dimensions.
fn load_texture(path: &Path) -> Result<TextureImage> {
    let data = std::fs::read(path)
        .map_err(|e| Error::Input(format!("cannot read texture {}: {e}", path.display())))?;
    let img = image::load_from_memory(&data)
        .map_err(|e| Error::Input(format!("cannot decode texture {}: {e}", path.display())))?;

    let mime = match path.extension().and_then(|e| e.to_str()) {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    };

    debug!(path = %path.display(), width = img.width(), height = img.height(), "loaded texture");
    Ok(TextureImage::new(data, mime, img.width(), img.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn convert_basic_mesh() {
        let mesh = tobj::Mesh {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            texcoords: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
            vertex_color: vec![],
            face_arities: vec![],
            texcoord_indices: vec![],
            normal_indices: vec![],
            material_id: Some(0),
        };
        let out = convert_mesh(mesh);
        assert_eq!(out.vertex_count(), 3);
        assert_eq!(out.triangle_count(), 1);
        assert!(out.has_normals() && out.has_uvs() && !out.has_colors());
        assert_eq!(out.material_index, Some(0));
    }

    #[test]
    fn v_axis_is_flipped() {
        let mesh = tobj::Mesh {
            positions: vec![0.0; 9],
            normals: vec![],
            texcoords: vec![0.0, 0.0, 1.0, 0.3, 0.5, 1.0],
            indices: vec![0, 1, 2],
            vertex_color: vec![],
            face_arities: vec![],
            texcoord_indices: vec![],
            normal_indices: vec![],
            material_id: None,
        };
        let out = convert_mesh(mesh);
        assert!((out.uvs[1] - 1.0).abs() < 1e-6);
        assert!((out.uvs[3] - 0.7).abs() < 1e-6);
        assert!((out.uvs[5] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn rgb_colors_widen_to_rgba() {
        let mesh = tobj::Mesh {
            positions: vec![0.0; 9],
            normals: vec![],
            texcoords: vec![],
            indices: vec![0, 1, 2],
            vertex_color: vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            face_arities: vec![],
            texcoord_indices: vec![],
            normal_indices: vec![],
            material_id: None,
        };
        let out = convert_mesh(mesh);
        assert_eq!(out.colors.len(), 12);
        assert_eq!(&out.colors[0..4], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(&out.colors[8..12], &[0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn textured_obj_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let obj = "\
mtllib mat.mtl
usemtl painted
v 0 0 0
v 1 0 0
v 0 1 0
vt 0 0
vt 1 0
vt 0 1
f 1/1 2/2 3/3
";
        fs::write(tmp.path().join("model.obj"), obj).unwrap();
        fs::write(
            tmp.path().join("mat.mtl"),
            "newmtl painted\nKd 0.5 0.25 0.125\nmap_Kd tex.png\n",
        )
        .unwrap();
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([9, 8, 7, 255]));
        img.save(tmp.path().join("tex.png")).unwrap();

        let (meshes, library) = load_obj(&tmp.path().join("model.obj"), true).unwrap();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].triangle_count(), 1);
        assert_eq!(library.materials.len(), 1);
        assert_eq!(library.textures.len(), 1);
        assert_eq!(library.materials[0].base_color_texture, Some(0));
        assert!((library.materials[0].base_color[0] - 0.5).abs() < 1e-6);
        assert_eq!(library.textures[0].width, 2);
    }

    #[test]
    fn textures_skipped_when_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join("model.obj"),
            "mtllib mat.mtl\nusemtl painted\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n",
        )
        .unwrap();
        fs::write(
            tmp.path().join("mat.mtl"),
            "newmtl painted\nmap_Kd missing.png\n",
        )
        .unwrap();

        let (_, library) = load_obj(&tmp.path().join("model.obj"), false).unwrap();
        assert!(library.textures.is_empty());
        assert_eq!(library.materials[0].base_color_texture, None);
    }
}
