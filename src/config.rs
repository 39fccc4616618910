//! CLI arguments and the resolved pipeline configuration

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use meshtiler_core::Georeference;
use meshtiler_tiling::{SimplifyStep, TextureFormat, TextureOptions, TilingConfig};
use meshtiler_transform::Units;

/// Fully resolved configuration for one conversion run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub units: Option<Units>,
    pub georeference: Option<Georeference>,
    pub offset_file: Option<PathBuf>,
    pub metadata_xml: Option<PathBuf>,
    pub tiling: TilingConfig,
    /// Run the tileset validation pass after conversion.
    pub validate: bool,
    /// Scan the input and report statistics without tiling.
    pub dry_run: bool,
    /// Print detected georeferencing and exit.
    pub show_georef: bool,
    pub verbose: bool,
}

/// One schedule entry: `RATIO`, optionally suffixed `:lock` or `:free`.
fn parse_schedule_step(s: &str) -> Result<SimplifyStep, String> {
    let (ratio, lock) = match s.split_once(':') {
        None => (s, true),
        Some((ratio, "lock")) => (ratio, true),
        Some((ratio, "free")) => (ratio, false),
        Some((_, other)) => {
            return Err(format!("expected ':lock' or ':free', found ':{other}'"))
        }
    };
    let ratio: f32 = ratio
        .parse()
        .map_err(|e| format!("bad simplification ratio '{ratio}': {e}"))?;
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(format!("ratio {ratio} outside (0, 1]"));
    }
    Ok(SimplifyStep {
        ratio,
        lock_border: lock,
    })
}

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "meshtiler",
    about = "Convert photogrammetry meshes to OGC 3D Tiles 1.1",
    version
)]
pub struct CliArgs {
    /// Input mesh (OBJ, glTF, GLB, PLY)
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output directory
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Input units: mm, cm, m, ft, in
    #[arg(long, value_parser = Units::from_str)]
    pub units: Option<Units>,

    /// EPSG code of the input CRS (e.g. 32636)
    #[arg(long)]
    pub epsg: Option<u32>,

    /// Model origin easting in meters
    #[arg(long)]
    pub easting: Option<f64>,

    /// Model origin northing in meters
    #[arg(long)]
    pub northing: Option<f64>,

    /// Model origin elevation in meters
    #[arg(long, default_value_t = 0.0)]
    pub elevation: f64,

    /// True-north rotation in degrees
    #[arg(long, default_value_t = 0.0)]
    pub true_north: f64,

    /// Explicit offset.xyz path
    #[arg(long)]
    pub offset_file: Option<PathBuf>,

    /// Explicit metadata.xml path
    #[arg(long)]
    pub metadata_xml: Option<PathBuf>,

    /// Hard cap on tree depth
    #[arg(long, default_value_t = 6)]
    pub max_depth: u32,

    /// Leaf threshold in triangles per tile
    #[arg(long, default_value_t = 65_000)]
    pub max_triangles: usize,

    /// Stop splitting below this box diagonal in meters
    #[arg(long, default_value_t = 0.01)]
    pub min_tile_size: f64,

    /// Per-level simplification schedule, e.g. "0.25:lock,0.25:lock,0.5:free"
    #[arg(long, value_delimiter = ',', value_parser = parse_schedule_step)]
    pub simplify_schedule: Vec<SimplifyStep>,

    /// Texture output format: webp, ktx2, png, none
    #[arg(long, default_value = "webp", value_parser = TextureFormat::from_str)]
    pub texture_format: TextureFormat,

    /// Texture codec quality, 0-100
    #[arg(long, default_value_t = 85)]
    pub texture_quality: u8,

    /// Longest allowed atlas side in pixels
    #[arg(long, default_value_t = 2048)]
    pub texture_max_size: u32,

    /// Disable EXT_meshopt_compression on output GLBs
    #[arg(long)]
    pub no_compression: bool,

    /// Validate the written tileset after conversion
    #[arg(long)]
    pub validate: bool,

    /// Scan the input and report statistics only
    #[arg(long)]
    pub dry_run: bool,

    /// Print detected georeferencing and exit
    #[arg(long)]
    pub show_georef: bool,

    /// Verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Worker thread count (default: all cores)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,
}

impl From<CliArgs> for PipelineConfig {
    fn from(args: CliArgs) -> Self {
        let georeference = args.epsg.map(|epsg| Georeference {
            epsg,
            easting: args.easting.unwrap_or(0.0),
            northing: args.northing.unwrap_or(0.0),
            elevation: args.elevation,
            true_north: args.true_north,
        });

        PipelineConfig {
            input: args.input,
            output: args.output,
            units: args.units,
            georeference,
            offset_file: args.offset_file,
            metadata_xml: args.metadata_xml,
            tiling: TilingConfig {
                max_depth: args.max_depth,
                max_triangles_per_tile: args.max_triangles,
                min_tile_size_m: args.min_tile_size,
                simplify_schedule: args.simplify_schedule,
                texture: TextureOptions {
                    format: args.texture_format,
                    quality: args.texture_quality,
                    max_size: args.texture_max_size,
                },
                compress: !args.no_compression,
                threads: args.threads,
            },
            validate: args.validate,
            dry_run: args.dry_run,
            show_georef: args.show_georef,
            verbose: args.verbose,
        }
    }
}
