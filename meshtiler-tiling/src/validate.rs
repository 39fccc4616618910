//! Post-run tileset validation
//!
//! Walks a written `tileset.json`, re-checking the structural contract:
//! asset version, bounding volumes, geometric-error monotonicity, and that
//! every content URI resolves to a file that parses as a GLB. Used as the
//! CLI's `--validate` pass and as a CI gate.

use std::fs;
use std::path::Path;

use gltf::binary::Glb;
use tracing::{info, warn};

use meshtiler_core::{Error, Result};

/// Counters from a successful validation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub tiles: usize,
    pub glbs: usize,
}

/// Validate the tileset under `out_dir`. Any finding is fatal.
pub fn validate_tileset(out_dir: &Path) -> Result<ValidationReport> {
    let path = out_dir.join("tileset.json");
    let text = fs::read_to_string(&path)
        .map_err(|e| Error::Validation(format!("cannot read {}: {e}", path.display())))?;
    let tileset: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| Error::Validation(format!("tileset.json is not valid JSON: {e}")))?;

    let version = tileset
        .pointer("/asset/version")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if version != "1.1" {
        return Err(Error::Validation(format!(
            "expected asset.version \"1.1\", found \"{version}\""
        )));
    }

    let root = tileset
        .get("root")
        .ok_or_else(|| Error::Validation("tileset has no root tile".into()))?;

    let mut report = ValidationReport { tiles: 0, glbs: 0 };
    let mut findings = Vec::new();
    walk_tile(root, out_dir, None, &mut report, &mut findings);

    if findings.is_empty() {
        info!(tiles = report.tiles, glbs = report.glbs, "tileset validated");
        Ok(report)
    } else {
        for finding in &findings {
            warn!("validation: {finding}");
        }
        Err(Error::Validation(format!(
            "{} findings, first: {}",
            findings.len(),
            findings[0]
        )))
    }
}

fn walk_tile(
    tile: &serde_json::Value,
    out_dir: &Path,
    parent_error: Option<f64>,
    report: &mut ValidationReport,
    findings: &mut Vec<String>,
) {
    report.tiles += 1;
    let id = report.tiles;

    let volume_ok = tile
        .pointer("/boundingVolume/box")
        .and_then(|b| b.as_array())
        .is_some_and(|b| b.len() == 12);
    if !volume_ok {
        findings.push(format!("tile #{id}: missing or malformed boundingVolume.box"));
    }

    let error = tile
        .get("geometricError")
        .and_then(|e| e.as_f64())
        .unwrap_or(-1.0);
    if error < 0.0 {
        findings.push(format!("tile #{id}: missing or negative geometricError"));
    }
    if let Some(parent) = parent_error {
        if error > parent + 1e-9 {
            findings.push(format!(
                "tile #{id}: geometricError {error} exceeds parent {parent}"
            ));
        }
    }

    let has_children = tile
        .get("children")
        .and_then(|c| c.as_array())
        .is_some_and(|c| !c.is_empty());
    let uri = tile.pointer("/content/uri").and_then(|u| u.as_str());

    if has_children && uri.is_none() {
        findings.push(format!("tile #{id}: internal tile without content"));
    }

    if let Some(uri) = uri {
        let path = out_dir.join(uri);
        match fs::read(&path) {
            Ok(data) => {
                if Glb::from_slice(&data).is_ok() {
                    report.glbs += 1;
                } else {
                    findings.push(format!("tile #{id}: {uri} is not a parseable GLB"));
                }
            }
            Err(e) => findings.push(format!("tile #{id}: content {uri} unreadable: {e}")),
        }
    }

    if let Some(children) = tile.get("children").and_then(|c| c.as_array()) {
        for child in children {
            walk_tile(child, out_dir, Some(error), report, findings);
        }
    }
}
