//! EPSG to WGS84 projection
//!
//! Projection goes through libproj via the `proj` crate, gated behind the
//! `proj` feature so default builds need no native library. Without the
//! feature, georeferenced inputs with a CRS are rejected with a message
//! naming the missing feature.

use meshtiler_core::{Error, Result};

/// Project `(easting, northing)` in the given EPSG CRS to WGS84.
/// Returns `(longitude, latitude)` in degrees.
#[cfg(feature = "proj")]
pub fn to_wgs84(epsg: u32, easting: f64, northing: f64) -> Result<(f64, f64)> {
    let from = format!("EPSG:{epsg}");
    let projection = proj::Proj::new_known_crs(&from, "EPSG:4326", None).map_err(|e| {
        Error::Transform(format!("cannot build projection {from} -> WGS84: {e}"))
    })?;

    projection
        .convert((easting, northing))
        .map_err(|e| Error::Transform(format!("projection from {from} failed: {e}")))
}

#[cfg(not(feature = "proj"))]
pub fn to_wgs84(epsg: u32, _easting: f64, _northing: f64) -> Result<(f64, f64)> {
    Err(Error::Transform(format!(
        "projecting EPSG:{epsg} requires building with the 'proj' feature"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "proj")]
    #[test]
    fn utm_36n_central_meridian() {
        // (500000, 0) in UTM zone 36N sits on the 33E meridian
        let (lon, lat) = to_wgs84(32636, 500_000.0, 0.0).unwrap();
        assert!((lon - 33.0).abs() < 0.01, "lon {lon}");
        assert!(lat.abs() < 0.01, "lat {lat}");
    }

    #[cfg(not(feature = "proj"))]
    #[test]
    fn disabled_feature_reports_itself() {
        let err = to_wgs84(32636, 0.0, 0.0).unwrap_err();
        assert!(err.to_string().contains("proj"));
    }
}
