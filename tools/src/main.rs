use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::DynamicImage;
use tracing_subscriber::EnvFilter;

mod annotate;
mod config;
mod montage;
mod output;
mod rename;
mod split;

use output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "randland-tools")]
#[command(about = "Offline asset pipeline for the Randland map viewer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stitch a grid of `{prefix}_{row}_{col}` tiles into one image
    Montage {
        /// Directory holding the tiles
        #[arg(long, default_value = "tiles")]
        dir: PathBuf,

        /// Output image; a `.png` extension writes PNG, anything else JPEG
        #[arg(short, long, default_value = "montage.jpg")]
        output: PathBuf,

        /// Grid columns (default: RANDLAND_GRID_COLS or the built-in grid)
        #[arg(long)]
        cols: Option<u32>,

        /// Grid rows (default: RANDLAND_GRID_ROWS or the built-in grid)
        #[arg(long)]
        rows: Option<u32>,

        /// Tile edge in pixels (default: RANDLAND_TILE_SIZE or 256)
        #[arg(long)]
        tile_size: Option<u32>,

        #[arg(long, default_value = config::DEFAULT_TILE_PREFIX)]
        prefix: String,

        #[arg(long, default_value = config::DEFAULT_TILE_EXTENSION)]
        extension: String,

        /// JPEG quality 1-100 (default: RANDLAND_JPEG_QUALITY or 90)
        #[arg(long)]
        quality: Option<u8>,
    },

    /// Copy files to new names listed as `old -> new` lines
    Rename {
        /// Mapping file
        mapping: PathBuf,

        #[arg(long, default_value = ".")]
        source: PathBuf,

        #[arg(long, default_value = "renamed")]
        dest: PathBuf,
    },

    /// Cut one large image into `{prefix}_{row}_{col}.jpg` tiles
    Split {
        image: PathBuf,

        /// Target tile size, e.g. 500x500
        #[arg(long, default_value = "500x500")]
        tile_size: String,

        #[arg(short, long, default_value = "tiles")]
        out_dir: PathBuf,

        #[arg(long, default_value = config::DEFAULT_TILE_PREFIX)]
        prefix: String,
    },

    /// Draw nation borders, POI icons and labels onto the full map
    Annotate {
        /// Directory that relative asset names are resolved against
        #[arg(long, default_value = ".")]
        assets_dir: PathBuf,

        #[arg(long, default_value = "map.jpg")]
        map: PathBuf,

        #[arg(long, default_value = "poi.json")]
        json: PathBuf,

        #[arg(long, default_value = "portal_stone.png")]
        portal_icon: PathBuf,

        #[arg(long, default_value = "stedding.png")]
        stedding_icon: PathBuf,

        /// Label font; labels are skipped when it is missing
        #[arg(long, default_value = "HyliaSerifBeta-Regular.otf")]
        font: PathBuf,

        /// Resolution used to convert label point sizes to pixels
        #[arg(long, default_value_t = config::DEFAULT_DPI)]
        dpi: f64,

        /// Output basename without extension
        #[arg(long, default_value = "map_annotated")]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Jpg)]
        format: OutputFormat,

        /// JPEG quality 1-100 (default: RANDLAND_JPEG_QUALITY or 90)
        #[arg(long)]
        quality: Option<u8>,

        /// Downscale factor for the main output, e.g. 0.5
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Also export square tiles of this size; 0 disables
        #[arg(long, default_value_t = 0)]
        tile_size: u32,

        /// Draw smoothed nation borders
        #[arg(long)]
        nation_borders: bool,

        /// Spline samples per border segment
        #[arg(long, default_value_t = config::DEFAULT_SPLINE_SAMPLES)]
        spline_samples: usize,

        /// Border supersampling factor (1 = off)
        #[arg(long, default_value_t = 1)]
        aa_scale: u32,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Montage {
            dir,
            output,
            cols,
            rows,
            tile_size,
            prefix,
            extension,
            quality,
        } => {
            let spec = montage::MontageSpec {
                cols: cols.unwrap_or_else(config::grid_cols),
                rows: rows.unwrap_or_else(config::grid_rows),
                tile_size: tile_size.unwrap_or_else(config::tile_size),
                prefix,
                extension,
            };
            let (img, report) = montage::build(&dir, &spec)?;
            let quality = quality.unwrap_or_else(config::jpeg_quality);
            output::save_image(&DynamicImage::ImageRgb8(img), &output, format_for(&output), quality)?;
            tracing::info!(
                path = %output.display(),
                missing = report.missing.len(),
                "montage saved"
            );
        }
        Command::Rename {
            mapping,
            source,
            dest,
        } => {
            rename::run(&mapping, &source, &dest)?;
        }
        Command::Split {
            image,
            tile_size,
            out_dir,
            prefix,
        } => {
            let (tw, th) = split::parse_size(&tile_size)?;
            let img = image::open(&image).with_context(|| format!("opening {}", image.display()))?;
            let plan = split::plan(img.width(), img.height(), tw, th);
            split::split(&img, plan, &out_dir, &prefix, config::SPLIT_JPEG_QUALITY)?;
        }
        Command::Annotate {
            assets_dir,
            map,
            json,
            portal_icon,
            stedding_icon,
            font,
            dpi,
            out,
            format,
            quality,
            scale,
            tile_size,
            nation_borders,
            spline_samples,
            aa_scale,
        } => {
            let job = annotate::AnnotateJob {
                map: assets_dir.join(map),
                poi: assets_dir.join(json),
                portal_icon: assets_dir.join(portal_icon),
                stedding_icon: assets_dir.join(stedding_icon),
                font: assets_dir.join(font),
                out,
                format,
                quality: quality.unwrap_or_else(config::jpeg_quality),
                tile_size,
                options: annotate::AnnotateOptions {
                    nation_borders,
                    spline_samples,
                    aa_scale,
                    scale,
                    dpi,
                },
            };
            annotate::run(&job)?;
        }
    }
    Ok(())
}

fn format_for(path: &Path) -> OutputFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => OutputFormat::Png,
        _ => OutputFormat::Jpg,
    }
}
