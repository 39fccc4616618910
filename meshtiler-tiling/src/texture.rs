//! Per-tile texture encoding

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use tracing::warn;

use meshtiler_core::TextureImage;

/// Output texture codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFormat {
    #[default]
    WebP,
    Ktx2,
    Png,
    /// Strip textures from the output entirely.
    None,
}

impl std::fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureFormat::WebP => write!(f, "webp"),
            TextureFormat::Ktx2 => write!(f, "ktx2"),
            TextureFormat::Png => write!(f, "png"),
            TextureFormat::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for TextureFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webp" => Ok(TextureFormat::WebP),
            "ktx2" => Ok(TextureFormat::Ktx2),
            "png" => Ok(TextureFormat::Png),
            "none" => Ok(TextureFormat::None),
            other => Err(format!(
                "unknown texture format '{other}' (expected webp/ktx2/png/none)"
            )),
        }
    }
}

/// Texture processing options, fixed for the duration of a run.
#[derive(Debug, Clone, Copy)]
pub struct TextureOptions {
    pub format: TextureFormat,
    /// Codec quality, 0-100.
    pub quality: u8,
    /// Longest allowed atlas side in pixels.
    pub max_size: u32,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            format: TextureFormat::WebP,
            quality: 85,
            max_size: 2048,
        }
    }
}

/// Encode a composited atlas according to the configured format.
pub fn encode_atlas(image: &RgbaImage, options: &TextureOptions) -> TextureImage {
    match options.format {
        TextureFormat::WebP => encode_webp(image),
        TextureFormat::Png => encode_png(image),
        TextureFormat::Ktx2 => encode_ktx2(image, options.quality),
        TextureFormat::None => {
            // callers skip atlasing when textures are disabled
            encode_png(image)
        }
    }
}

fn encode_png(image: &RgbaImage) -> TextureImage {
    let (width, height) = image.dimensions();
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("in-memory PNG encode");
    TextureImage::new(buf.into_inner(), "image/png", width, height)
}

fn encode_webp(image: &RgbaImage) -> TextureImage {
    let (width, height) = image.dimensions();
    let mut buf = Cursor::new(Vec::new());
    match image.write_to(&mut buf, ImageFormat::WebP) {
        Ok(()) => TextureImage::new(buf.into_inner(), "image/webp", width, height),
        Err(e) => {
            warn!("WebP encode failed ({e}), falling back to PNG");
            encode_png(image)
        }
    }
}

/// Basis Universal UASTC encoding, available behind the `ktx2` feature.
/// Without the feature, falls back to WebP with a warning.
fn encode_ktx2(image: &RgbaImage, quality: u8) -> TextureImage {
    #[cfg(feature = "ktx2")]
    {
        match encode_basis(image, quality) {
            Ok(tex) => return tex,
            Err(e) => {
                warn!("Basis Universal encode failed ({e}), falling back to WebP");
            }
        }
    }
    #[cfg(not(feature = "ktx2"))]
    {
        let _ = quality;
        warn!("KTX2 output requires the 'ktx2' feature, falling back to WebP");
    }
    encode_webp(image)
}

#[cfg(feature = "ktx2")]
fn encode_basis(image: &RgbaImage, quality: u8) -> Result<TextureImage, String> {
    use basis_universal::encoding::{encoder_init, ColorSpace, Compressor, CompressorParams};
    use basis_universal::{BasisTextureFormat, UASTC_QUALITY_MAX, UASTC_QUALITY_MIN};

    let (width, height) = image.dimensions();

    encoder_init();

    let mut params = CompressorParams::new();
    params.set_basis_format(BasisTextureFormat::UASTC4x4);
    params.set_uastc_quality_level(match quality {
        0..=20 => UASTC_QUALITY_MIN,
        21..=50 => 1,
        51..=75 => 2,
        76..=90 => 3,
        _ => UASTC_QUALITY_MAX,
    });
    params.set_rdo_uastc(Some(1.0));
    params.set_generate_mipmaps(false);
    params.set_color_space(ColorSpace::Srgb);
    params.source_image_mut(0).init(image.as_raw(), width, height, 4);

    let mut compressor = Compressor::new(4);
    // SAFETY: params are fully initialized and encoder_init was called
    unsafe {
        compressor.init(&params);
        compressor
            .process()
            .map_err(|e| format!("compressor failed: {e:?}"))?;
    }

    let data = compressor.basis_file().to_vec();
    if data.is_empty() {
        return Err("encoder produced no output".into());
    }

    Ok(TextureImage::new(data, "image/ktx2", width, height))
}
