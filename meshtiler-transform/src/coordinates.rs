//! In-place coordinate adjustments
//!
//! Positions stay f32 in the buffers; every adjustment accumulates in f64
//! and writes back f32 to avoid compounding rounding.

use std::str::FromStr;

use meshtiler_core::IndexedMesh;

/// Input coordinate units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Millimeters,
    Centimeters,
    Meters,
    Feet,
    Inches,
}

impl Units {
    /// Multiplier converting these units to meters.
    pub fn to_meters(self) -> f64 {
        match self {
            Units::Millimeters => 0.001,
            Units::Centimeters => 0.01,
            Units::Meters => 1.0,
            Units::Feet => 0.3048,
            Units::Inches => 0.0254,
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mm" => Ok(Units::Millimeters),
            "cm" => Ok(Units::Centimeters),
            "m" => Ok(Units::Meters),
            "ft" => Ok(Units::Feet),
            "in" => Ok(Units::Inches),
            other => Err(format!("unknown units '{other}' (expected mm/cm/m/ft/in)")),
        }
    }
}

impl std::fmt::Display for Units {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Units::Millimeters => "mm",
            Units::Centimeters => "cm",
            Units::Meters => "m",
            Units::Feet => "ft",
            Units::Inches => "in",
        };
        f.write_str(s)
    }
}

/// Scale every position by `factor`.
pub fn scale_positions(meshes: &mut [IndexedMesh], factor: f64) {
    for mesh in meshes {
        for p in &mut mesh.positions {
            *p = ((*p as f64) * factor) as f32;
        }
    }
}

/// Right-handed Y-up (OBJ/glTF convention) to right-handed Z-up (3D Tiles):
/// `(x, y, z) -> (x, z, -y)`, applied to positions and normals.
pub fn swap_y_up_to_z_up(meshes: &mut [IndexedMesh]) {
    let swap = |buffer: &mut [f32]| {
        for v in buffer.chunks_exact_mut(3) {
            let y = v[1];
            v[1] = v[2];
            v[2] = -y;
        }
    };
    for mesh in meshes {
        swap(&mut mesh.positions);
        swap(&mut mesh.normals);
    }
}

/// Rotate positions and normals about the Z axis by `degrees`.
pub fn rotate_about_z(meshes: &mut [IndexedMesh], degrees: f64) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let rotate = |buffer: &mut [f32]| {
        for v in buffer.chunks_exact_mut(3) {
            let x = v[0] as f64;
            let y = v[1] as f64;
            v[0] = (x * cos - y * sin) as f32;
            v[1] = (x * sin + y * cos) as f32;
        }
    };
    for mesh in meshes {
        rotate(&mut mesh.positions);
        rotate(&mut mesh.normals);
    }
}

/// Subtract the vertex centroid from every position; returns the centroid.
pub fn center_meshes(meshes: &mut [IndexedMesh]) -> [f64; 3] {
    let mut sum = [0.0f64; 3];
    let mut count = 0usize;
    for mesh in meshes.iter() {
        for v in mesh.positions.chunks_exact(3) {
            sum[0] += v[0] as f64;
            sum[1] += v[1] as f64;
            sum[2] += v[2] as f64;
            count += 1;
        }
    }
    if count == 0 {
        return [0.0; 3];
    }

    let centroid = [
        sum[0] / count as f64,
        sum[1] / count as f64,
        sum[2] / count as f64,
    ];
    for mesh in meshes {
        for v in mesh.positions.chunks_exact_mut(3) {
            v[0] = ((v[0] as f64) - centroid[0]) as f32;
            v[1] = ((v[1] as f64) - centroid[1]) as f32;
            v[2] = ((v[2] as f64) - centroid[2]) as f32;
        }
    }
    centroid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_vertex(x: f32, y: f32, z: f32) -> Vec<IndexedMesh> {
        vec![IndexedMesh {
            positions: vec![x, y, z],
            ..Default::default()
        }]
    }

    #[test]
    fn unit_factors() {
        assert_eq!(Units::Millimeters.to_meters(), 0.001);
        assert_eq!(Units::Feet.to_meters(), 0.3048);
        assert_eq!("cm".parse::<Units>().unwrap(), Units::Centimeters);
        assert_eq!("in".parse::<Units>().unwrap().to_meters(), 0.0254);
        assert!("furlong".parse::<Units>().is_err());
        assert_eq!(Units::Meters.to_string(), "m");
    }

    #[test]
    fn scaling() {
        let mut meshes = one_vertex(1000.0, 2000.0, 3000.0);
        scale_positions(&mut meshes, 0.001);
        assert_eq!(&meshes[0].positions[..], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn axis_swap_moves_y_to_z() {
        let mut meshes = vec![IndexedMesh {
            positions: vec![1.0, 2.0, 3.0],
            normals: vec![0.0, 1.0, 0.0],
            ..Default::default()
        }];
        swap_y_up_to_z_up(&mut meshes);
        assert_eq!(&meshes[0].positions[..], &[1.0, 3.0, -2.0]);
        assert_eq!(&meshes[0].normals[..], &[0.0, 0.0, -1.0]);
    }

    #[test]
    fn rotation_quarter_turn() {
        let mut meshes = one_vertex(1.0, 0.0, 5.0);
        rotate_about_z(&mut meshes, 90.0);
        let p = &meshes[0].positions;
        assert!(p[0].abs() < 1e-6);
        assert!((p[1] - 1.0).abs() < 1e-6);
        assert_eq!(p[2], 5.0);
    }

    #[test]
    fn centering_subtracts_centroid() {
        let mut meshes = vec![IndexedMesh {
            positions: vec![10.0, 20.0, 30.0, 20.0, 40.0, 60.0],
            ..Default::default()
        }];
        let centroid = center_meshes(&mut meshes);
        assert_eq!(centroid, [15.0, 30.0, 45.0]);
        let p = &meshes[0].positions;
        assert_eq!(&p[0..3], &[-5.0, -10.0, -15.0]);
        assert_eq!(&p[3..6], &[5.0, 10.0, 15.0]);
    }

    #[test]
    fn centering_empty_input() {
        let mut meshes: Vec<IndexedMesh> = Vec::new();
        assert_eq!(center_meshes(&mut meshes), [0.0; 3]);
    }
}
