use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Grid layout and file naming of the tiles to assemble.
#[derive(Debug, Clone)]
pub struct MontageSpec {
    pub cols: u32,
    pub rows: u32,
    pub tile_size: u32,
    pub prefix: String,
    pub extension: String,
}

impl MontageSpec {
    /// `{prefix}_{row}_{col}.{ext}` inside `dir`.
    pub fn tile_path(&self, dir: &Path, row: u32, col: u32) -> PathBuf {
        dir.join(format!("{}_{row}_{col}.{}", self.prefix, self.extension))
    }
}

#[derive(Debug, Default)]
pub struct MontageReport {
    pub placed: usize,
    pub missing: Vec<PathBuf>,
}

/// Assemble the tile grid found in `dir` into one image.
///
/// Missing tiles leave a white square. A tile that exists but can't be decoded
/// aborts the montage.
pub fn build(dir: &Path, spec: &MontageSpec) -> Result<(RgbImage, MontageReport)> {
    if spec.cols == 0 || spec.rows == 0 || spec.tile_size == 0 {
        bail!(
            "grid must be non-empty (got {}x{} tiles of {}px)",
            spec.cols,
            spec.rows,
            spec.tile_size
        );
    }
    let width = spec
        .cols
        .checked_mul(spec.tile_size)
        .context("montage width overflows")?;
    let height = spec
        .rows
        .checked_mul(spec.tile_size)
        .context("montage height overflows")?;

    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut report = MontageReport::default();

    for row in 0..spec.rows {
        for col in 0..spec.cols {
            let path = spec.tile_path(dir, row, col);
            if !path.is_file() {
                tracing::warn!(path = %path.display(), "tile missing, leaving blank");
                report.missing.push(path);
                continue;
            }

            let mut tile = image::open(&path)
                .with_context(|| format!("decoding tile {}", path.display()))?
                .to_rgb8();
            if tile.dimensions() != (spec.tile_size, spec.tile_size) {
                tracing::warn!(
                    path = %path.display(),
                    width = tile.width(),
                    height = tile.height(),
                    "tile has unexpected size, resizing"
                );
                tile = imageops::resize(&tile, spec.tile_size, spec.tile_size, FilterType::Triangle);
            }

            let x = i64::from(col) * i64::from(spec.tile_size);
            let y = i64::from(row) * i64::from(spec.tile_size);
            imageops::replace(&mut canvas, &tile, x, y);
            report.placed += 1;
        }
    }

    tracing::info!(
        placed = report.placed,
        missing = report.missing.len(),
        width,
        height,
        "montage assembled"
    );
    Ok((canvas, report))
}
