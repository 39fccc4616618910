//! Coordinate pipeline: local model space to the 3D Tiles frame
//!
//! Scales input units to meters, swaps Y-up to Z-up, applies true-north
//! rotation, centers the model on its centroid, and assembles the ECEF
//! root transform that places the centered model on the globe.

pub mod coordinates;
pub mod ecef;
pub mod projection;

pub use coordinates::*;
pub use ecef::*;

use tracing::info;

use meshtiler_core::{BoundingBox, Georeference, IndexedMesh, Result};

/// Output of the transform stage.
#[derive(Debug)]
pub struct TransformResult {
    /// Meshes in the centered Z-up meter frame.
    pub meshes: Vec<IndexedMesh>,
    /// Column-major 4x4 placing the local frame in ECEF; identity when
    /// there is no usable georeference.
    pub root_transform: [f64; 16],
    pub bounds: BoundingBox,
}

/// The identity root transform.
pub fn identity_transform() -> [f64; 16] {
    let mut m = [0.0; 16];
    m[0] = 1.0;
    m[5] = 1.0;
    m[10] = 1.0;
    m[15] = 1.0;
    m
}

/// Run the full transform stage. Takes ownership of the meshes and
/// adjusts them in place.
pub fn transform_meshes(
    mut meshes: Vec<IndexedMesh>,
    units: Option<Units>,
    georeference: Option<&Georeference>,
) -> Result<TransformResult> {
    if let Some(units) = units {
        let factor = units.to_meters();
        if (factor - 1.0).abs() > f64::EPSILON {
            info!(%units, factor, "scaling to meters");
            scale_positions(&mut meshes, factor);
        }
    }

    swap_y_up_to_z_up(&mut meshes);

    let true_north = georeference.map(|g| g.true_north).unwrap_or(0.0);
    if true_north.abs() > f64::EPSILON {
        info!(degrees = true_north, "applying true-north rotation");
        rotate_about_z(&mut meshes, true_north);
    }

    let centroid = center_meshes(&mut meshes);
    info!(
        cx = centroid[0],
        cy = centroid[1],
        cz = centroid[2],
        "centered model on centroid"
    );

    let bounds = BoundingBox::from_meshes(&meshes);
    let root_transform = compute_root_transform(georeference, centroid)?;

    Ok(TransformResult {
        meshes,
        root_transform,
        bounds,
    })
}

/// ECEF placement for the centered model, or identity without a CRS.
fn compute_root_transform(
    georeference: Option<&Georeference>,
    centroid: [f64; 3],
) -> Result<[f64; 16]> {
    let Some(geo) = georeference else {
        info!("no georeference, keeping identity root transform");
        return Ok(identity_transform());
    };
    if !geo.has_crs() {
        info!("georeference without an EPSG code, keeping identity root transform");
        return Ok(identity_transform());
    }

    // the centroid shift moved the model origin; the projected origin
    // must move with it
    let easting = geo.easting + centroid[0];
    let northing = geo.northing + centroid[1];
    let elevation = geo.elevation + centroid[2];

    let (lon, lat) = projection::to_wgs84(geo.epsg, easting, northing)?;
    info!(epsg = geo.epsg, lon, lat, elevation, "projected origin to WGS84");

    let origin = geodetic_to_ecef(lon, lat, elevation);
    let enu = enu_rotation(lon, lat);
    Ok(root_transform(origin, &enu))
}
