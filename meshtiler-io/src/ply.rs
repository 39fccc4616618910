//! PLY ingestion via ply-rs
//!
//! Handles ASCII and binary PLY with positions, optional normals, and
//! optional u8/float colors. Faces with more than 3 vertices are
//! fan-triangulated. PLY carries no texture coordinates.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ply_rs::parser::Parser;
use ply_rs::ply::{DefaultElement, Property};
use tracing::debug;

use meshtiler_core::{Error, IndexedMesh, Result};

/// Load a PLY file into a single mesh.
pub fn load_ply(path: &Path) -> Result<IndexedMesh> {
    let file =
        File::open(path).map_err(|e| Error::Input(format!("cannot open PLY: {e}")))?;
    let mut reader = BufReader::new(file);

    let ply = Parser::<DefaultElement>::new()
        .read_ply(&mut reader)
        .map_err(|e| Error::Input(format!("PLY parse failed: {e}")))?;

    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| Error::Input("PLY has no 'vertex' element".into()))?;
    debug!(vertices = vertices.len(), "reading PLY vertices");

    let has_normals = vertices.first().is_some_and(|v| v.contains_key("nx"));
    let has_colors = vertices
        .first()
        .is_some_and(|v| v.contains_key("red") || v.contains_key("r"));

    let mut positions = Vec::with_capacity(vertices.len() * 3);
    let mut normals = Vec::with_capacity(if has_normals { vertices.len() * 3 } else { 0 });
    let mut colors = Vec::with_capacity(if has_colors { vertices.len() * 4 } else { 0 });

    for vertex in vertices {
        positions.push(scalar(vertex, "x")?);
        positions.push(scalar(vertex, "y")?);
        positions.push(scalar(vertex, "z")?);

        if has_normals {
            normals.push(scalar(vertex, "nx")?);
            normals.push(scalar(vertex, "ny")?);
            normals.push(scalar(vertex, "nz")?);
        }
        if has_colors {
            let (r, g, b) = color(vertex)?;
            colors.extend_from_slice(&[r, g, b, 1.0]);
        }
    }

    let mut indices = Vec::new();
    if let Some(faces) = ply.payload.get("face") {
        debug!(faces = faces.len(), "reading PLY faces");
        for face in faces {
            let corners = index_list(face)?;
            for i in 1..corners.len().saturating_sub(1) {
                indices.push(corners[0]);
                indices.push(corners[i]);
                indices.push(corners[i + 1]);
            }
        }
    }

    Ok(IndexedMesh {
        positions,
        normals,
        uvs: Vec::new(),
        colors,
        indices,
        material_index: None,
    })
}

fn scalar(element: &DefaultElement, key: &str) -> Result<f32> {
    let prop = element
        .get(key)
        .ok_or_else(|| Error::Input(format!("PLY vertex lacks property '{key}'")))?;

    match prop {
        Property::Float(v) => Ok(*v),
        Property::Double(v) => Ok(*v as f32),
        Property::Int(v) => Ok(*v as f32),
        Property::UInt(v) => Ok(*v as f32),
        Property::Short(v) => Ok(*v as f32),
        Property::UShort(v) => Ok(*v as f32),
        Property::Char(v) => Ok(*v as f32),
        Property::UChar(v) => Ok(*v as f32),
        _ => Err(Error::Input(format!(
            "PLY property '{key}' has a non-scalar type"
        ))),
    }
}

/// RGB color, normalizing u8 channels to `0.0..=1.0`.
fn color(element: &DefaultElement) -> Result<(f32, f32, f32)> {
    let channel = |long: &str, short: &str| -> Result<f32> {
        let key = if element.contains_key(long) { long } else { short };
        let prop = element
            .get(key)
            .ok_or_else(|| Error::Input(format!("PLY vertex lacks color channel '{long}'")))?;
        match prop {
            Property::UChar(v) => Ok(*v as f32 / 255.0),
            Property::Float(v) => Ok(*v),
            Property::Double(v) => Ok(*v as f32),
            Property::UShort(v) => Ok(*v as f32 / 65_535.0),
            _ => Err(Error::Input(format!(
                "PLY color channel '{key}' has an unsupported type"
            ))),
        }
    };
    Ok((
        channel("red", "r")?,
        channel("green", "g")?,
        channel("blue", "b")?,
    ))
}

fn index_list(element: &DefaultElement) -> Result<Vec<u32>> {
    let prop = element
        .get("vertex_indices")
        .or_else(|| element.get("vertex_index"))
        .ok_or_else(|| Error::Input("PLY face lacks vertex indices".into()))?;

    match prop {
        Property::ListInt(list) => Ok(list.iter().map(|&i| i as u32).collect()),
        Property::ListUInt(list) => Ok(list.clone()),
        Property::ListShort(list) => Ok(list.iter().map(|&i| i as u32).collect()),
        Property::ListUShort(list) => Ok(list.iter().map(|&i| i as u32).collect()),
        Property::ListChar(list) => Ok(list.iter().map(|&i| i as u32).collect()),
        Property::ListUChar(list) => Ok(list.iter().map(|&i| i as u32).collect()),
        _ => Err(Error::Input("PLY face indices have an unsupported type".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ply(content: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let mut file = File::create(tmp.path().join("cloud.ply")).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn ascii_triangle() {
        let tmp = write_ply(
            "ply\n\
             format ascii 1.0\n\
             element vertex 3\n\
             property float x\n\
             property float y\n\
             property float z\n\
             element face 1\n\
             property list uchar int vertex_indices\n\
             end_header\n\
             0 0 0\n\
             1 0 0\n\
             0 1 0\n\
             3 0 1 2\n",
        );
        let mesh = load_ply(&tmp.path().join("cloud.ply")).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.triangle_count(), 1);
        assert!(!mesh.has_normals());
        assert!(!mesh.has_uvs());
        mesh.check_invariants().unwrap();
    }

    #[test]
    fn quad_is_fan_triangulated() {
        let tmp = write_ply(
            "ply\n\
             format ascii 1.0\n\
             element vertex 4\n\
             property float x\n\
             property float y\n\
             property float z\n\
             element face 1\n\
             property list uchar int vertex_indices\n\
             end_header\n\
             0 0 0\n\
             1 0 0\n\
             1 1 0\n\
             0 1 0\n\
             4 0 1 2 3\n",
        );
        let mesh = load_ply(&tmp.path().join("cloud.ply")).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn normals_and_uchar_colors() {
        let tmp = write_ply(
            "ply\n\
             format ascii 1.0\n\
             element vertex 3\n\
             property float x\n\
             property float y\n\
             property float z\n\
             property float nx\n\
             property float ny\n\
             property float nz\n\
             property uchar red\n\
             property uchar green\n\
             property uchar blue\n\
             element face 1\n\
             property list uchar int vertex_indices\n\
             end_header\n\
             0 0 0 0 0 1 255 0 0\n\
             1 0 0 0 0 1 0 255 0\n\
             0 1 0 0 0 1 0 0 255\n\
             3 0 1 2\n",
        );
        let mesh = load_ply(&tmp.path().join("cloud.ply")).unwrap();
        assert!(mesh.has_normals());
        assert!(mesh.has_colors());
        assert_eq!(&mesh.colors[0..4], &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(&mesh.colors[4..8], &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_vertex_element_is_an_error() {
        let tmp = write_ply("ply\nformat ascii 1.0\nelement face 0\nproperty list uchar int vertex_indices\nend_header\n");
        assert!(load_ply(&tmp.path().join("cloud.ply")).is_err());
    }
}
