//! Input loading for the meshtiler pipeline
//!
//! Detects the input format from the file extension and dispatches to the
//! OBJ, glTF/GLB, or PLY loader, then probes the input's surroundings for
//! georeferencing sidecars.

pub mod georef;
pub mod gltf_loader;
pub mod obj;
pub mod ply;

pub use georef::detect_georeference;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use meshtiler_core::{Error, Georeference, IndexedMesh, MaterialLibrary, Result};

/// Supported input containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Obj,
    Gltf,
    Glb,
    Ply,
}

impl InputFormat {
    /// Detect the format from the file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "obj" => Ok(InputFormat::Obj),
            "gltf" => Ok(InputFormat::Gltf),
            "glb" => Ok(InputFormat::Glb),
            "ply" => Ok(InputFormat::Ply),
            other => Err(Error::Input(format!("unsupported input format '.{other}'"))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::Obj => "OBJ",
            InputFormat::Gltf => "glTF",
            InputFormat::Glb => "GLB",
            InputFormat::Ply => "PLY",
        }
    }
}

impl std::fmt::Display for InputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knobs for the ingestion stage.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// Skip texture files entirely when false.
    pub load_textures: bool,
    /// Georeference supplied on the command line; wins over sidecars.
    pub georeference_override: Option<Georeference>,
    /// Explicit `offset.xyz` path; otherwise probed next to the input.
    pub offset_file: Option<PathBuf>,
    /// Explicit `metadata.xml` path; otherwise probed next to the input.
    pub metadata_xml: Option<PathBuf>,
}

/// Everything the ingestion stage produced.
#[derive(Debug)]
pub struct IngestResult {
    pub meshes: Vec<IndexedMesh>,
    pub materials: MaterialLibrary,
    pub georeference: Option<Georeference>,
    pub stats: IngestStats,
}

/// Summary counters for dry runs and logs.
#[derive(Debug)]
pub struct IngestStats {
    pub format: InputFormat,
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    pub has_normals: bool,
    pub has_uvs: bool,
    pub has_colors: bool,
    pub material_count: usize,
    pub texture_count: usize,
}

/// Load the input file and detect georeferencing.
pub fn ingest(input: &Path, options: &IngestOptions) -> Result<IngestResult> {
    if !input.exists() {
        return Err(Error::Input(format!(
            "input file not found: {}",
            input.display()
        )));
    }

    let format = InputFormat::from_path(input)?;
    info!(%format, path = %input.display(), "loading input");

    let (meshes, materials) = match format {
        InputFormat::Obj => obj::load_obj(input, options.load_textures)?,
        InputFormat::Gltf | InputFormat::Glb => gltf_loader::load_gltf(input)?,
        InputFormat::Ply => (vec![ply::load_ply(input)?], MaterialLibrary::default()),
    };

    for mesh in &meshes {
        mesh.check_invariants()?;
    }

    let stats = compute_stats(format, &meshes, &materials);
    debug!(
        meshes = stats.mesh_count,
        vertices = stats.vertex_count,
        triangles = stats.triangle_count,
        "ingested geometry"
    );

    let georeference = georef::detect_georeference(input, options)?;
    if let Some(geo) = &georeference {
        info!(
            epsg = geo.epsg,
            easting = geo.easting,
            northing = geo.northing,
            elevation = geo.elevation,
            "georeference detected"
        );
    }

    Ok(IngestResult {
        meshes,
        materials,
        georeference,
        stats,
    })
}

fn compute_stats(
    format: InputFormat,
    meshes: &[IndexedMesh],
    materials: &MaterialLibrary,
) -> IngestStats {
    IngestStats {
        format,
        mesh_count: meshes.len(),
        vertex_count: meshes.iter().map(IndexedMesh::vertex_count).sum(),
        triangle_count: meshes.iter().map(IndexedMesh::triangle_count).sum(),
        has_normals: meshes.iter().any(IndexedMesh::has_normals),
        has_uvs: meshes.iter().any(IndexedMesh::has_uvs),
        has_colors: meshes.iter().any(IndexedMesh::has_colors),
        material_count: materials.materials.len(),
        texture_count: materials.textures.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_detection() {
        assert_eq!(
            InputFormat::from_path(Path::new("scan.obj")).unwrap(),
            InputFormat::Obj
        );
        assert_eq!(
            InputFormat::from_path(Path::new("scene.GLTF")).unwrap(),
            InputFormat::Gltf
        );
        assert_eq!(
            InputFormat::from_path(Path::new("scene.glb")).unwrap(),
            InputFormat::Glb
        );
        assert_eq!(
            InputFormat::from_path(Path::new("cloud.Ply")).unwrap(),
            InputFormat::Ply
        );
        assert!(InputFormat::from_path(Path::new("scene.fbx")).is_err());
        assert!(InputFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn missing_input_is_an_input_error() {
        let err = ingest(Path::new("/no/such/file.obj"), &IngestOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }

    #[test]
    fn stats_aggregate_across_meshes() {
        let meshes = vec![
            IndexedMesh {
                positions: vec![0.0; 9],
                normals: vec![0.0; 9],
                uvs: vec![0.0; 6],
                indices: vec![0, 1, 2],
                material_index: Some(0),
                ..Default::default()
            },
            IndexedMesh {
                positions: vec![0.0; 12],
                colors: vec![0.0; 16],
                indices: vec![0, 1, 2, 0, 2, 3],
                ..Default::default()
            },
        ];
        let stats = compute_stats(InputFormat::Obj, &meshes, &MaterialLibrary::default());
        assert_eq!(stats.vertex_count, 7);
        assert_eq!(stats.triangle_count, 3);
        assert!(stats.has_normals && stats.has_uvs && stats.has_colors);
    }
}
