//! The four-stage conversion pipeline: ingest, transform, tile, validate

use std::fs;
use std::time::{Duration, Instant};

use tracing::info;

use meshtiler_core::{Error, IndexedMesh, MaterialLibrary, Result};
use meshtiler_io::{ingest, IngestOptions, IngestResult};
use meshtiler_tiling::{
    build_tileset, validate_tileset, write_tileset_json, CancelToken, TextureFormat, TileFailure,
};
use meshtiler_transform::{transform_meshes, TransformResult};

use crate::config::PipelineConfig;

/// Summary of a completed run.
#[derive(Debug)]
pub struct ProcessingResult {
    pub tile_count: usize,
    /// Subtree failures the run recovered from.
    pub failures: Vec<TileFailure>,
    pub duration: Duration,
}

/// Pipeline driver.
pub struct Pipeline;

impl Pipeline {
    /// Run the full conversion described by `config`.
    pub fn run(config: &PipelineConfig) -> Result<ProcessingResult> {
        Self::run_cancellable(config, &CancelToken::new())
    }

    /// Run with an external cancellation flag.
    pub fn run_cancellable(
        config: &PipelineConfig,
        cancel: &CancelToken,
    ) -> Result<ProcessingResult> {
        let start = Instant::now();
        info!(input = %config.input.display(), "starting pipeline");

        let ingest_options = IngestOptions {
            load_textures: config.tiling.texture.format != TextureFormat::None,
            georeference_override: config.georeference.clone(),
            offset_file: config.offset_file.clone(),
            metadata_xml: config.metadata_xml.clone(),
        };

        if config.show_georef {
            let result = ingest(&config.input, &ingest_options)?;
            print_georef(&result);
            return Ok(ProcessingResult {
                tile_count: 0,
                failures: Vec::new(),
                duration: start.elapsed(),
            });
        }

        info!("stage 1/4: ingest");
        let ingested = ingest(&config.input, &ingest_options)?;
        check_inputs(&ingested, config)?;

        info!("stage 2/4: transform");
        let IngestResult {
            meshes,
            materials,
            georeference,
            stats,
        } = ingested;
        let transformed = transform_meshes(meshes, config.units, georeference.as_ref())?;

        if config.dry_run {
            print_dry_run(&stats, &transformed);
            return Ok(ProcessingResult {
                tile_count: 0,
                failures: Vec::new(),
                duration: start.elapsed(),
            });
        }

        info!("stage 3/4: tiling");
        fs::create_dir_all(&config.output).map_err(|e| {
            Error::Output(format!(
                "cannot create output directory {}: {e}",
                config.output.display()
            ))
        })?;

        let TransformResult {
            meshes,
            root_transform,
            bounds,
        } = transformed;

        // the tiling core works on one mesh; concatenate multi-mesh inputs
        let mut merged = IndexedMesh::default();
        for mesh in &meshes {
            merged.append(mesh);
        }
        drop(meshes);
        info!(
            vertices = merged.vertex_count(),
            triangles = merged.triangle_count(),
            "merged input meshes"
        );

        let build = build_tileset(
            merged,
            &bounds,
            &materials,
            &config.tiling,
            &config.output,
            cancel,
        )?;
        write_tileset_json(&build.root, &root_transform, &config.output)?;

        if config.validate {
            info!("stage 4/4: validate");
            validate_tileset(&config.output)?;
        }

        let duration = start.elapsed();
        info!(
            tiles = build.tile_count,
            failures = build.failures.len(),
            elapsed = ?duration,
            "pipeline finished"
        );

        Ok(ProcessingResult {
            tile_count: build.tile_count,
            failures: build.failures,
            duration,
        })
    }
}

/// Fatal input checks, run before any tiling starts.
fn check_inputs(ingested: &IngestResult, config: &PipelineConfig) -> Result<()> {
    let materials = &ingested.materials;
    if !materials.check_texture_references() {
        return Err(Error::Input(
            "a material references a texture index outside the library".into(),
        ));
    }

    let atlas_requested = config.tiling.texture.format != TextureFormat::None;
    for (index, mesh) in ingested.meshes.iter().enumerate() {
        if let Some(material) = mesh.material_index {
            if material >= materials.materials.len() {
                return Err(Error::Input(format!(
                    "mesh {index} references material {material}, library holds {}",
                    materials.materials.len()
                )));
            }
            let textured = materials.materials[material].base_color_texture.is_some();
            if atlas_requested && textured && !mesh.has_uvs() {
                return Err(Error::Input(format!(
                    "mesh {index} is textured but has no UVs; \
                     rerun with --texture-format none to skip atlasing"
                )));
            }
        }
    }
    Ok(())
}

fn print_georef(result: &IngestResult) {
    println!("=== Georeferencing ===");
    match &result.georeference {
        Some(geo) => {
            println!("  EPSG:       {}", geo.epsg);
            println!("  Easting:    {:.3}", geo.easting);
            println!("  Northing:   {:.3}", geo.northing);
            println!("  Elevation:  {:.3}", geo.elevation);
            println!("  True north: {:.1} deg", geo.true_north);
        }
        None => {
            println!("  none detected");
            println!("  supply --epsg, --offset-file, or --metadata-xml");
        }
    }
}

fn print_dry_run(stats: &meshtiler_io::IngestStats, transformed: &TransformResult) {
    println!("=== Dry Run ===");
    println!("  Format:    {}", stats.format);
    println!("  Meshes:    {}", stats.mesh_count);
    println!("  Vertices:  {}", stats.vertex_count);
    println!("  Triangles: {}", stats.triangle_count);
    println!("  Normals:   {}", if stats.has_normals { "yes" } else { "no" });
    println!("  UVs:       {}", if stats.has_uvs { "yes" } else { "no" });
    println!("  Colors:    {}", if stats.has_colors { "yes" } else { "no" });
    println!("  Materials: {}", stats.material_count);
    println!("  Textures:  {}", stats.texture_count);

    let bb = &transformed.bounds;
    println!(
        "  Bounds:    ({:.3}, {:.3}, {:.3}) .. ({:.3}, {:.3}, {:.3})",
        bb.min[0], bb.min[1], bb.min[2], bb.max[0], bb.max[1], bb.max[2]
    );
    println!("  Diagonal:  {:.3} m", bb.diagonal());

    let rt = &transformed.root_transform;
    if *rt == meshtiler_transform::identity_transform() {
        println!("  Transform: identity (local frame)");
    } else {
        println!(
            "  Transform: ECEF ({:.1}, {:.1}, {:.1})",
            rt[12], rt[13], rt[14]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshtiler_core::PbrMaterial;
    use meshtiler_io::{IngestStats, InputFormat};
    use meshtiler_tiling::{TextureOptions, TilingConfig};

    fn ingested(meshes: Vec<IndexedMesh>, materials: MaterialLibrary) -> IngestResult {
        IngestResult {
            stats: IngestStats {
                format: InputFormat::Obj,
                mesh_count: meshes.len(),
                vertex_count: 0,
                triangle_count: 0,
                has_normals: false,
                has_uvs: false,
                has_colors: false,
                material_count: materials.materials.len(),
                texture_count: materials.textures.len(),
            },
            meshes,
            materials,
            georeference: None,
        }
    }

    fn texture_config(format: TextureFormat) -> PipelineConfig {
        PipelineConfig {
            tiling: TilingConfig {
                texture: TextureOptions {
                    format,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn textured_mesh_without_uvs_is_fatal() {
        let mut materials = MaterialLibrary::default();
        materials
            .textures
            .push(meshtiler_core::TextureImage::new(vec![0; 4], "image/raw", 1, 1));
        materials.materials.push(PbrMaterial {
            base_color_texture: Some(0),
            ..Default::default()
        });
        let mesh = IndexedMesh {
            positions: vec![0.0; 9],
            indices: vec![0, 1, 2],
            material_index: Some(0),
            ..Default::default()
        };

        let err = check_inputs(
            &ingested(vec![mesh.clone()], materials.clone()),
            &texture_config(TextureFormat::WebP),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Input(_)));

        // disabling textures clears the requirement
        check_inputs(
            &ingested(vec![mesh], materials),
            &texture_config(TextureFormat::None),
        )
        .unwrap();
    }

    #[test]
    fn out_of_range_material_is_fatal() {
        let mesh = IndexedMesh {
            positions: vec![0.0; 9],
            indices: vec![0, 1, 2],
            material_index: Some(5),
            ..Default::default()
        };
        let err = check_inputs(
            &ingested(vec![mesh], MaterialLibrary::default()),
            &texture_config(TextureFormat::None),
        )
        .unwrap_err();
        assert!(err.to_string().contains("material 5"));
    }

    #[test]
    fn dangling_texture_reference_is_fatal() {
        let mut materials = MaterialLibrary::default();
        materials.materials.push(PbrMaterial {
            base_color_texture: Some(2),
            ..Default::default()
        });
        let err = check_inputs(
            &ingested(Vec::new(), materials),
            &texture_config(TextureFormat::None),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Input(_)));
    }
}
