//! PBR materials and texture payloads
//!
//! The material library is built once during ingestion and shared read-only
//! across the whole tile tree for the lifetime of a run.

/// Texture wrapping behavior, mirroring the glTF sampler modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

/// Alpha handling for a material, mirroring the glTF alpha modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

/// A texture image: encoded bytes plus the metadata needed to embed it.
#[derive(Debug, Clone)]
pub struct TextureImage {
    /// Raw encoded bytes (PNG/JPEG/WebP/KTX2).
    pub data: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
}

impl TextureImage {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            width,
            height,
            wrap_s: WrapMode::default(),
            wrap_t: WrapMode::default(),
        }
    }
}

/// PBR metallic-roughness material.
#[derive(Debug, Clone)]
pub struct PbrMaterial {
    pub name: String,
    /// Base color factor `[r, g, b, a]`.
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Index into [`MaterialLibrary::textures`].
    pub base_color_texture: Option<usize>,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            base_color_texture: None,
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}

/// Materials and the texture images they reference.
#[derive(Debug, Clone, Default)]
pub struct MaterialLibrary {
    pub materials: Vec<PbrMaterial>,
    pub textures: Vec<TextureImage>,
}

impl MaterialLibrary {
    /// Look up the base-color texture of a material, if any.
    pub fn base_color_texture(&self, material_index: usize) -> Option<&TextureImage> {
        let mat = self.materials.get(material_index)?;
        self.textures.get(mat.base_color_texture?)
    }

    /// Verify that every texture reference points into `textures`.
    pub fn check_texture_references(&self) -> bool {
        self.materials
            .iter()
            .filter_map(|m| m.base_color_texture)
            .all(|t| t < self.textures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_defaults() {
        let mat = PbrMaterial::default();
        assert_eq!(mat.base_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(mat.metallic, 0.0);
        assert_eq!(mat.roughness, 1.0);
        assert_eq!(mat.base_color_texture, None);
        assert_eq!(mat.alpha_mode, AlphaMode::Opaque);
        assert!(!mat.double_sided);
    }

    #[test]
    fn texture_lookup() {
        let mut lib = MaterialLibrary::default();
        lib.textures
            .push(TextureImage::new(vec![0xAB; 8], "image/png", 2, 1));
        lib.materials.push(PbrMaterial {
            name: "facade".into(),
            base_color_texture: Some(0),
            ..Default::default()
        });

        let tex = lib.base_color_texture(0).expect("texture resolves");
        assert_eq!(tex.width, 2);
        assert!(lib.base_color_texture(1).is_none());
        assert!(lib.check_texture_references());
    }

    #[test]
    fn dangling_texture_reference_detected() {
        let mut lib = MaterialLibrary::default();
        lib.materials.push(PbrMaterial {
            base_color_texture: Some(3),
            ..Default::default()
        });
        assert!(!lib.check_texture_references());
        assert!(lib.base_color_texture(0).is_none());
    }
}
