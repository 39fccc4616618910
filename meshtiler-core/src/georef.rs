//! Georeferencing parameters shared between ingestion and transform

/// Where the local model origin sits in a projected CRS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Georeference {
    /// EPSG code of the projected CRS; 0 means unknown.
    pub epsg: u32,
    pub easting: f64,
    pub northing: f64,
    pub elevation: f64,
    /// Rotation from grid north to true north, degrees.
    pub true_north: f64,
}

impl Georeference {
    /// Whether the reference is complete enough to project to WGS84.
    pub fn has_crs(&self) -> bool {
        self.epsg != 0
    }
}
