use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Jpg,
    Png,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
        }
    }
}

/// Write `img` as PNG or as RGB JPEG at `quality`.
pub fn save_image(img: &DynamicImage, path: &Path, format: OutputFormat, quality: u8) -> Result<()> {
    match format {
        OutputFormat::Png => img
            .save_with_format(path, ImageFormat::Png)
            .with_context(|| format!("writing {}", path.display())),
        OutputFormat::Jpg => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality.clamp(1, 100));
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .with_context(|| format!("encoding {}", path.display()))
        }
    }
}
