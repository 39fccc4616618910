//! Georeference sidecar detection
//!
//! Photogrammetry exports rarely embed their CRS in the mesh itself; it
//! travels in sidecar files. Detection priority: an explicit override,
//! then `metadata.xml`, then `offset.xyz` with a sibling `.prj`.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use meshtiler_core::{Error, Georeference, Result};

use crate::IngestOptions;

/// Detect georeferencing for an input file.
pub fn detect_georeference(input: &Path, options: &IngestOptions) -> Result<Option<Georeference>> {
    if let Some(geo) = &options.georeference_override {
        debug!("using georeference override");
        return Ok(Some(geo.clone()));
    }

    let input_dir = input.parent().unwrap_or_else(|| Path::new("."));

    let metadata = options.metadata_xml.clone().or_else(|| {
        let candidate = input_dir.join("metadata.xml");
        candidate.exists().then_some(candidate)
    });
    if let Some(path) = metadata {
        debug!(path = %path.display(), "probing metadata.xml");
        if let Some(geo) = parse_metadata_xml(&path)? {
            return Ok(Some(geo));
        }
    }

    let offset = options.offset_file.clone().or_else(|| {
        let candidate = input_dir.join("offset.xyz");
        candidate.exists().then_some(candidate)
    });
    if let Some(path) = offset {
        debug!(path = %path.display(), "probing offset.xyz");
        let (easting, northing, elevation) = parse_offset_xyz(&path)?;
        let epsg = prj_epsg_in_dir(input_dir).unwrap_or(0);
        return Ok(Some(Georeference {
            epsg,
            easting,
            northing,
            elevation,
            true_north: 0.0,
        }));
    }

    debug!("no georeference sidecars found");
    Ok(None)
}

/// Parse an `offset.xyz` file: three whitespace-separated numbers.
pub fn parse_offset_xyz(path: &Path) -> Result<(f64, f64, f64)> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Input(format!("cannot read {}: {e}", path.display())))?;

    let values: Vec<f64> = content
        .split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect();
    if values.len() < 3 {
        return Err(Error::Input(format!(
            "{} holds {} numbers, need easting northing elevation",
            path.display(),
            values.len()
        )));
    }
    Ok((values[0], values[1], values[2]))
}

/// Pull an EPSG code out of an Agisoft/DJI metadata.xml, if one is there.
pub fn parse_metadata_xml(path: &Path) -> Result<Option<Georeference>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Input(format!("cannot read {}: {e}", path.display())))?;

    match extract_epsg(&content) {
        Some(epsg) => {
            debug!(epsg, "EPSG found in metadata.xml");
            Ok(Some(Georeference {
                epsg,
                ..Default::default()
            }))
        }
        None => {
            warn!(path = %path.display(), "metadata.xml carries no EPSG code");
            Ok(None)
        }
    }
}

/// Scan a directory for `.prj` files carrying an EPSG code.
fn prj_epsg_in_dir(dir: &Path) -> Option<u32> {
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("prj") {
            continue;
        }
        debug!(path = %path.display(), "probing .prj");
        if let Some(epsg) = fs::read_to_string(&path).ok().and_then(|c| extract_epsg(&c)) {
            return Some(epsg);
        }
    }
    None
}

/// Extract an EPSG code from free text.
///
/// Understands `EPSG:31256`, `EPSG::31256`, and the WKT form
/// `AUTHORITY["EPSG","31256"]`.
pub fn extract_epsg(content: &str) -> Option<u32> {
    if let Some(at) = content.find("EPSG:") {
        let rest = content[at + 5..].trim_start_matches(':');
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if let Ok(epsg) = digits.parse::<u32>() {
            if epsg > 0 {
                return Some(epsg);
            }
        }
    }

    if let Some(at) = content.find("AUTHORITY[\"EPSG\"") {
        let rest = &content[at..];
        let after_comma = rest.find(',').map(|i| &rest[i + 1..])?;
        let digits: String = after_comma
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        if let Ok(epsg) = digits.parse::<u32>() {
            if epsg > 0 {
                return Some(epsg);
            }
        }
    }

    None
}
