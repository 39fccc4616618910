//! WGS84 geodetic to ECEF conversion and the tileset root transform

use nalgebra::{Matrix4, Vector4};

/// WGS84 semi-major axis, meters.
const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// First eccentricity squared, `2f - f^2`.
const WGS84_E2: f64 = 2.0 * WGS84_F - WGS84_F * WGS84_F;

/// Geodetic (degrees, meters) to ECEF XYZ in meters.
pub fn geodetic_to_ecef(lon_deg: f64, lat_deg: f64, height_m: f64) -> [f64; 3] {
    let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();

    // prime vertical radius of curvature
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();

    [
        (n + height_m) * cos_lat * cos_lon,
        (n + height_m) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_E2) + height_m) * sin_lat,
    ]
}

/// East-North-Up basis at a geodetic point, as a rotation matrix whose
/// columns are the ENU axes expressed in ECEF.
pub fn enu_rotation(lon_deg: f64, lat_deg: f64) -> Matrix4<f64> {
    let (sin_lon, cos_lon) = lon_deg.to_radians().sin_cos();
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();

    let east = Vector4::new(-sin_lon, cos_lon, 0.0, 0.0);
    let north = Vector4::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat, 0.0);
    let up = Vector4::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat, 0.0);
    let w = Vector4::new(0.0, 0.0, 0.0, 1.0);

    Matrix4::from_columns(&[east, north, up, w])
}

/// Root transform placing a local ENU frame at an ECEF origin, flattened
/// column-major for `tileset.json`.
pub fn root_transform(ecef_origin: [f64; 3], enu: &Matrix4<f64>) -> [f64; 16] {
    let mut m = *enu;
    m[(0, 3)] = ecef_origin[0];
    m[(1, 3)] = ecef_origin[1];
    m[(2, 3)] = ecef_origin[2];

    let mut out = [0.0; 16];
    out.copy_from_slice(m.as_slice()); // nalgebra stores column-major
    out
}
