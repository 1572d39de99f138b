use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use image::DynamicImage;

use crate::output::{OutputFormat, save_image};

/// Grid chosen to cover an image with tiles close to a target size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPlan {
    pub cols: u32,
    pub rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
}

/// Parse a `WIDTHxHEIGHT` size such as `500x500`.
pub fn parse_size(s: &str) -> Result<(u32, u32)> {
    let lower = s.trim().to_ascii_lowercase();
    let Some((w, h)) = lower.split_once('x') else {
        bail!("tile size must look like 500x500, got {s:?}");
    };
    let w: u32 = w.trim().parse().with_context(|| format!("bad tile width in {s:?}"))?;
    let h: u32 = h.trim().parse().with_context(|| format!("bad tile height in {s:?}"))?;
    if w == 0 || h == 0 {
        bail!("tile size must be positive, got {s:?}");
    }
    Ok((w, h))
}

/// Column/row counts round up so the grid covers the image; the tile size is
/// then stretched so the grid divides the image as evenly as possible.
pub fn plan(image_width: u32, image_height: u32, target_width: u32, target_height: u32) -> SplitPlan {
    let cols = image_width.div_ceil(target_width.max(1)).max(1);
    let rows = image_height.div_ceil(target_height.max(1)).max(1);
    SplitPlan {
        cols,
        rows,
        tile_width: image_width.div_ceil(cols).max(1),
        tile_height: image_height.div_ceil(rows).max(1),
    }
}

/// Write `{prefix}_{row}_{col}.jpg` tiles into `out_dir`. Returns the tile count.
pub fn split(img: &DynamicImage, plan: SplitPlan, out_dir: &Path, prefix: &str, quality: u8) -> Result<usize> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let (width, height) = (img.width(), img.height());
    let mut written = 0;
    for row in 0..plan.rows {
        for col in 0..plan.cols {
            let left = col * plan.tile_width;
            let top = row * plan.tile_height;
            if left >= width || top >= height {
                continue;
            }
            let w = plan.tile_width.min(width - left);
            let h = plan.tile_height.min(height - top);
            let tile = img.crop_imm(left, top, w, h);
            let path = out_dir.join(format!("{prefix}_{row}_{col}.jpg"));
            save_image(&tile, &path, OutputFormat::Jpg, quality)?;
            written += 1;
        }
    }

    tracing::info!(
        cols = plan.cols,
        rows = plan.rows,
        tile_width = plan.tile_width,
        tile_height = plan.tile_height,
        written,
        "split finished"
    );
    Ok(written)
}
