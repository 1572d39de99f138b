use std::fs;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result, anyhow, bail};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_text_mut, text_size};
use randland_shared::poi::{LabeledCoord, PoiDocument};
use randland_shared::{Nation, border::catmull_rom};

use crate::config::{
    BORDER_WIDTH_PX, LABEL_POINTS, LABEL_STROKE_PX, MIN_SPLINE_SAMPLES, RIVER_LABEL_SHIFT_PX,
    STEDDING_LABEL_RISE_PX,
};
use crate::output::{OutputFormat, save_image};

const STEDDING_GREEN: Rgba<u8> = Rgba([0, 100, 0, 255]);
const RIVER_BLUE: Rgba<u8> = Rgba([0, 90, 200, 255]);
const LABEL_STROKE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone)]
pub struct AnnotateOptions {
    pub nation_borders: bool,
    pub spline_samples: usize,
    /// Supersampling factor for the border layer. 1 disables it.
    pub aa_scale: u32,
    /// Downscale factor for the main output only; tiles stay full size.
    pub scale: f64,
    /// Map resolution for point-to-pixel label sizing.
    pub dpi: f64,
}

/// Icons and label font. Anything missing is skipped when drawing.
#[derive(Default)]
pub struct Assets {
    pub portal: Option<RgbaImage>,
    pub stedding: Option<RgbaImage>,
    pub font: Option<FontVec>,
}

/// Everything `run` needs to produce an annotated map on disk.
#[derive(Debug, Clone)]
pub struct AnnotateJob {
    pub map: PathBuf,
    pub poi: PathBuf,
    pub portal_icon: PathBuf,
    pub stedding_icon: PathBuf,
    pub font: PathBuf,
    pub out: PathBuf,
    pub format: OutputFormat,
    pub quality: u8,
    pub tile_size: u32,
    pub options: AnnotateOptions,
}

/// Typographic points (1/72 in) to whole pixels at `dpi`.
pub fn pt_to_px(points: f64, dpi: f64) -> f32 {
    (points * dpi / 72.0).round().max(1.0) as f32
}

/// Draw borders, icons and labels onto a full-resolution copy of `base`.
pub fn annotate(base: &DynamicImage, doc: &PoiDocument, assets: &Assets, opts: &AnnotateOptions) -> RgbaImage {
    let mut canvas = base.to_rgba8();

    if opts.nation_borders {
        draw_borders(&mut canvas, &doc.nations, opts.spline_samples, opts.aa_scale);
    }
    if let Some(icon) = &assets.portal {
        place_all(&mut canvas, icon, &doc.portal_stones);
    }
    if let Some(icon) = &assets.stedding {
        place_all(&mut canvas, icon, &doc.steddings);
    }

    if let Some(font) = &assets.font {
        let scale = PxScale::from(pt_to_px(LABEL_POINTS, opts.dpi));
        let icon_h = assets.stedding.as_ref().map_or(0, |icon| icon.height());
        label_steddings(&mut canvas, font, scale, icon_h, &doc.steddings);
        label_rivers(&mut canvas, font, scale, &doc.rivers);
    }
    canvas
}

/// Lanczos downscale for `0 < scale < 1`; any other factor returns `None`.
pub fn downscale(img: &RgbaImage, scale: f64) -> Option<RgbaImage> {
    if !(scale > 0.0 && scale < 1.0) {
        return None;
    }
    let w = ((f64::from(img.width()) * scale).round() as u32).max(1);
    let h = ((f64::from(img.height()) * scale).round() as u32).max(1);
    Some(imageops::resize(img, w, h, FilterType::Lanczos3))
}

/// Render smoothed nation outlines on a transparent layer and blend it over `canvas`.
pub fn draw_borders(canvas: &mut RgbaImage, nations: &[Nation], spline_samples: usize, aa_scale: u32) {
    let aa = aa_scale.max(1);
    let (width, height) = canvas.dimensions();
    let mut layer = RgbaImage::new(width * aa, height * aa);
    let factor = f64::from(aa);
    let samples = (spline_samples * aa as usize).max(MIN_SPLINE_SAMPLES);

    let mut drawn = 0;
    for nation in nations {
        if nation.border.len() < 2 {
            tracing::debug!(nation = %nation.name, "border has fewer than two points, skipping");
            continue;
        }
        let points: Vec<(f64, f64)> = nation
            .border
            .iter()
            .map(|p| (p[0] * factor, p[1] * factor))
            .collect();
        let smooth = catmull_rom(&points, samples, false);
        let (r, g, b, a) = nation.rgba();
        draw_thick_polyline(&mut layer, &smooth, BORDER_WIDTH_PX * factor, Rgba([r, g, b, a]));
        drawn += 1;
    }

    if aa > 1 {
        layer = imageops::resize(&layer, width, height, FilterType::Lanczos3);
    }
    imageops::overlay(canvas, &layer, 0, 0);
    tracing::info!(nations = drawn, aa, "borders drawn");
}

/// Round-capped stroke through `points`, built from filled circles stepped
/// along each segment. Pixels are overwritten, not blended, so a stroke keeps
/// one alpha where its segments overlap.
pub fn draw_thick_polyline(layer: &mut RgbaImage, points: &[(f64, f64)], width: f64, color: Rgba<u8>) {
    if width <= 1.0 {
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            draw_line_segment_mut(layer, (a.0 as f32, a.1 as f32), (b.0 as f32, b.1 as f32), color);
        }
        return;
    }

    let radius = ((width / 2.0) as i32).max(1);
    match points {
        [] => {}
        [p] => draw_filled_circle_mut(layer, to_pixel(*p), radius, color),
        _ => {
            for pair in points.windows(2) {
                stroke_segment(layer, pair[0], pair[1], radius, color);
            }
        }
    }
}

fn stroke_segment(layer: &mut RgbaImage, a: (f64, f64), b: (f64, f64), radius: i32, color: Rgba<u8>) {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length = dx.hypot(dy);
    let step = (f64::from(radius) * 0.5).max(0.5);
    let steps = (length / step).ceil() as u32;
    for i in 0..=steps {
        let t = if steps == 0 { 0.0 } else { f64::from(i) / f64::from(steps) };
        draw_filled_circle_mut(layer, to_pixel((a.0 + t * dx, a.1 + t * dy)), radius, color);
    }
}

fn to_pixel((x, y): (f64, f64)) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

/// Alpha-composite `icon` so its centre lands on (`cx`, `cy`). Clipped at the edges.
pub fn place_centered(canvas: &mut RgbaImage, icon: &RgbaImage, cx: f64, cy: f64) {
    let x = (cx - f64::from(icon.width()) / 2.0).round() as i64;
    let y = (cy - f64::from(icon.height()) / 2.0).round() as i64;
    imageops::overlay(canvas, icon, x, y);
}

fn place_all(canvas: &mut RgbaImage, icon: &RgbaImage, entries: &[LabeledCoord]) {
    for entry in entries {
        let [x, y] = entry.coord;
        if !x.is_finite() || !y.is_finite() {
            tracing::warn!(label = %entry.label, "non-finite coordinate, skipping icon");
            continue;
        }
        place_centered(canvas, icon, x, y);
    }
}

/// Text with a solid outline: the stroke colour stamped at every offset in
/// the stroke square, then the fill on top.
pub fn draw_outlined_text(
    canvas: &mut RgbaImage,
    font: &FontVec,
    scale: PxScale,
    (x, y): (i32, i32),
    fill: Rgba<u8>,
    text: &str,
) {
    for dy in -LABEL_STROKE_PX..=LABEL_STROKE_PX {
        for dx in -LABEL_STROKE_PX..=LABEL_STROKE_PX {
            if dx != 0 || dy != 0 {
                draw_text_mut(canvas, LABEL_STROKE, x + dx, y + dy, scale, font, text);
            }
        }
    }
    draw_text_mut(canvas, fill, x, y, scale, font, text);
}

/// Stedding names, horizontally centred on the icon, starting just above its bottom edge.
fn label_steddings(canvas: &mut RgbaImage, font: &FontVec, scale: PxScale, icon_h: u32, entries: &[LabeledCoord]) {
    for entry in entries.iter().filter(|e| !e.label.trim().is_empty()) {
        let [cx, cy] = entry.coord;
        let (tw, _) = text_size(scale, font, &entry.label);
        let tx = (cx - f64::from(tw) / 2.0).round() as i32;
        let ty = (cy + f64::from(icon_h) / 2.0).round() as i64 - STEDDING_LABEL_RISE_PX;
        draw_outlined_text(canvas, font, scale, (tx, ty as i32), STEDDING_GREEN, &entry.label);
    }
}

/// River names, centred a fixed distance right of the coordinate.
fn label_rivers(canvas: &mut RgbaImage, font: &FontVec, scale: PxScale, entries: &[LabeledCoord]) {
    for entry in entries.iter().filter(|e| !e.label.trim().is_empty()) {
        let [x, y] = entry.coord;
        let (tw, th) = text_size(scale, font, &entry.label);
        let tx = (x + RIVER_LABEL_SHIFT_PX - f64::from(tw) / 2.0).round() as i32;
        let ty = (y - f64::from(th) / 2.0).round() as i32;
        draw_outlined_text(canvas, font, scale, (tx, ty), RIVER_BLUE, &entry.label);
    }
}

/// Cut `img` into `tile_size` squares named `{base}_x{ix:02}_y{iy:02}.{ext}`.
/// Edge tiles keep whatever is left over.
pub fn export_tiles(
    img: &DynamicImage,
    tile_size: u32,
    out_dir: &Path,
    base_name: &str,
    format: OutputFormat,
    quality: u8,
) -> Result<usize> {
    if tile_size == 0 {
        bail!("tile size must be positive");
    }
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    let (width, height) = (img.width(), img.height());
    let ext = format.extension();
    let mut written = 0;
    for iy in 0..height.div_ceil(tile_size) {
        for ix in 0..width.div_ceil(tile_size) {
            let left = ix * tile_size;
            let top = iy * tile_size;
            let tile = img.crop_imm(left, top, tile_size.min(width - left), tile_size.min(height - top));
            let path = out_dir.join(format!("{base_name}_x{ix:02}_y{iy:02}.{ext}"));
            save_image(&tile, &path, format, quality)?;
            written += 1;
        }
    }
    Ok(written)
}

fn load_icon(path: &Path) -> Result<Option<RgbaImage>> {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "icon not found, markers of this kind are skipped");
        return Ok(None);
    }
    let icon = image::open(path).with_context(|| format!("decoding icon {}", path.display()))?;
    Ok(Some(icon.to_rgba8()))
}

fn load_font(path: &Path) -> Result<Option<FontVec>> {
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "font not found, labels are skipped");
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
    let font = FontVec::try_from_vec(bytes).map_err(|e| anyhow!("parsing font {}: {e}", path.display()))?;
    Ok(Some(font))
}

/// Load inputs, annotate, write the main image and optionally its tiles.
/// Returns the path of the main output.
pub fn run(job: &AnnotateJob) -> Result<PathBuf> {
    let base = image::open(&job.map).with_context(|| format!("opening map {}", job.map.display()))?;
    let json = fs::read_to_string(&job.poi).with_context(|| format!("reading {}", job.poi.display()))?;
    let doc: PoiDocument =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", job.poi.display()))?;
    let assets = Assets {
        portal: load_icon(&job.portal_icon)?,
        stedding: load_icon(&job.stedding_icon)?,
        font: load_font(&job.font)?,
    };

    let full = DynamicImage::ImageRgba8(annotate(&base, &doc, &assets, &job.options));
    let scaled = full
        .as_rgba8()
        .and_then(|img| downscale(img, job.options.scale))
        .map(DynamicImage::ImageRgba8);
    let main = scaled.as_ref().unwrap_or(&full);

    let out_path = job.out.with_extension(job.format.extension());
    save_image(main, &out_path, job.format, job.quality)?;
    tracing::info!(
        path = %out_path.display(),
        width = main.width(),
        height = main.height(),
        "annotated map saved"
    );

    if job.tile_size > 0 {
        let base_name = job
            .out
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "map_annotated".to_string());
        let tiles_dir = job
            .out
            .with_file_name(format!("{base_name}_tiles_{}", job.tile_size));
        let count = export_tiles(&full, job.tile_size, &tiles_dir, &base_name, job.format, job.quality)?;
        tracing::info!(dir = %tiles_dir.display(), count, "tiles exported");
    }
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

    fn opts(nation_borders: bool) -> AnnotateOptions {
        AnnotateOptions {
            nation_borders,
            spline_samples: 10,
            aa_scale: 1,
            scale: 1.0,
            dpi: 96.0,
        }
    }

    fn white(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(w, h, Rgb([255, 255, 255])))
    }

    fn entry(label: &str, x: f64, y: f64) -> LabeledCoord {
        LabeledCoord {
            label: label.to_string(),
            coord: [x, y],
        }
    }

    // Label tests need a real outline font; they return early where DejaVu isn't installed.
    fn system_font() -> Option<FontVec> {
        let bytes = fs::read("/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf").ok()?;
        FontVec::try_from_vec(bytes).ok()
    }

    #[test]
    fn stroke_covers_width_around_line() {
        let mut layer = RgbaImage::new(20, 20);
        let red = Rgba([255, 0, 0, 191]);
        draw_thick_polyline(&mut layer, &[(2.0, 10.0), (18.0, 10.0)], 5.0, red);

        assert_eq!(layer.get_pixel(10, 10), &red);
        assert_eq!(layer.get_pixel(10, 8), &red);
        assert_eq!(layer.get_pixel(10, 11), &red);
        assert_eq!(layer.get_pixel(10, 14), &CLEAR);
        assert_eq!(layer.get_pixel(10, 4), &CLEAR);
    }

    #[test]
    fn hairline_stroke_uses_single_pixel_line() {
        let mut layer = RgbaImage::new(10, 10);
        let blue = Rgba([0, 0, 255, 255]);
        draw_thick_polyline(&mut layer, &[(0.0, 3.0), (9.0, 3.0)], 1.0, blue);
        assert_eq!(layer.get_pixel(5, 3), &blue);
        assert_eq!(layer.get_pixel(5, 4), &CLEAR);
    }

    #[test]
    fn stroke_outside_canvas_is_ignored() {
        let mut layer = RgbaImage::new(4, 4);
        draw_thick_polyline(&mut layer, &[(-50.0, -50.0), (-40.0, -40.0)], 5.0, Rgba([1, 2, 3, 4]));
        assert!(layer.pixels().all(|p| *p == CLEAR));
    }

    #[test]
    fn icon_is_centred_and_clipped() {
        let mut canvas = RgbaImage::from_pixel(10, 10, WHITE);
        let icon = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));

        place_centered(&mut canvas, &icon, 5.0, 5.0);
        assert_eq!(canvas.get_pixel(3, 3), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(6, 6), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 2), &WHITE);
        assert_eq!(canvas.get_pixel(7, 7), &WHITE);

        place_centered(&mut canvas, &icon, 0.0, 0.0);
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn borders_blend_over_map() {
        let doc = PoiDocument {
            nations: vec![Nation {
                name: "Andor".into(),
                color: "rgb(0, 0, 255)".into(),
                border: vec![[0.0, 20.0], [40.0, 20.0]],
            }],
            ..PoiDocument::default()
        };
        let out = annotate(&white(40, 40), &doc, &Assets::default(), &opts(true));
        let on_line = out.get_pixel(20, 20);
        assert!(on_line[2] > 200);
        assert!(on_line[0] < 128);
        assert_eq!(out.get_pixel(20, 2), &WHITE);

        let off = annotate(&white(40, 40), &doc, &Assets::default(), &opts(false));
        assert_eq!(off.get_pixel(20, 20), &WHITE);
    }

    #[test]
    fn supersampled_borders_keep_canvas_size() {
        let doc = PoiDocument {
            nations: vec![Nation {
                name: "Cairhien".into(),
                color: "not a colour".into(),
                border: vec![[0.0, 10.0], [10.0, 12.0], [30.0, 10.0]],
            }],
            ..PoiDocument::default()
        };
        let mut o = opts(true);
        o.aa_scale = 2;
        let out = annotate(&white(30, 20), &doc, &Assets::default(), &o);
        assert_eq!(out.dimensions(), (30, 20));
        // fallback colour is red
        let p = out.get_pixel(15, 11);
        assert!(p[0] > p[2]);
    }

    #[test]
    fn portal_icons_are_composited() {
        let doc = PoiDocument {
            portal_stones: vec![entry("", 10.0, 10.0)],
            ..PoiDocument::default()
        };
        let assets = Assets {
            portal: Some(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]))),
            ..Assets::default()
        };
        let out = annotate(&white(20, 20), &doc, &assets, &opts(false));
        assert_eq!(out.get_pixel(10, 10), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn downscale_only_shrinks() {
        let img = RgbaImage::from_pixel(20, 20, WHITE);
        assert_eq!(downscale(&img, 0.5).map(|i| i.dimensions()), Some((10, 10)));
        assert!(downscale(&img, 1.0).is_none());
        assert!(downscale(&img, 0.0).is_none());
        assert!(downscale(&img, 2.0).is_none());
    }

    #[test]
    fn label_size_follows_dpi() {
        assert_eq!(pt_to_px(14.0, 96.0), 19.0);
        assert_eq!(pt_to_px(14.0, 72.0), 14.0);
        assert_eq!(pt_to_px(14.0, 300.0), 58.0);
    }

    #[test]
    fn stedding_label_is_drawn_under_icon() {
        let Some(font) = system_font() else {
            return;
        };
        let doc = PoiDocument {
            steddings: vec![entry("Shangtai", 60.0, 20.0)],
            ..PoiDocument::default()
        };
        let icon = RgbaImage::from_pixel(6, 6, Rgba([0, 0, 0, 255]));
        let unlabelled = Assets {
            stedding: Some(icon.clone()),
            ..Assets::default()
        };
        let labelled = Assets {
            stedding: Some(icon),
            font: Some(font),
            ..Assets::default()
        };

        let below_icon_is_green = |img: &RgbaImage| {
            (24..45).any(|y| (0..120).any(|x| {
                let p = img.get_pixel(x, y);
                i32::from(p[1]) > i32::from(p[0]) + 30
            }))
        };
        let plain = annotate(&white(120, 60), &doc, &unlabelled, &opts(false));
        assert!(!below_icon_is_green(&plain));
        let out = annotate(&white(120, 60), &doc, &labelled, &opts(false));
        assert!(below_icon_is_green(&out));
    }

    #[test]
    fn river_label_sits_right_of_coordinate() {
        let Some(font) = system_font() else {
            return;
        };
        let doc = PoiDocument {
            rivers: vec![entry("Erinin", 20.0, 30.0)],
            ..PoiDocument::default()
        };
        let assets = Assets {
            font: Some(font),
            ..Assets::default()
        };
        let out = annotate(&white(140, 60), &doc, &assets, &opts(false));
        let blue_in = |xs: std::ops::Range<u32>| {
            (15..45).any(|y| xs.clone().any(|x| {
                let p = out.get_pixel(x, y);
                i32::from(p[2]) > i32::from(p[0]) + 40
            }))
        };
        assert!(blue_in(55..85));
        assert!(!blue_in(0..30));
    }

    #[test]
    fn export_tiles_names_and_edges() {
        let dir = tempfile::tempdir().unwrap();
        let img = white(10, 5);
        let written = export_tiles(&img, 4, dir.path(), "map", OutputFormat::Png, 90).unwrap();
        assert_eq!(written, 6);
        let edge = image::open(dir.path().join("map_x02_y01.png")).unwrap();
        assert_eq!((edge.width(), edge.height()), (2, 1));
    }

    fn job_in(dir: &Path, scale: f64, tile_size: u32) -> AnnotateJob {
        let map = dir.join("map.png");
        white(8, 8).save(&map).unwrap();
        let poi = dir.join("poi.json");
        fs::write(&poi, r#"{"nations":[{"color":"rgb(0,128,0)","border":[[0,4],[8,4]]}]}"#).unwrap();
        let mut options = opts(true);
        options.scale = scale;
        AnnotateJob {
            map,
            poi,
            portal_icon: dir.join("missing_portal.png"),
            stedding_icon: dir.join("missing_stedding.png"),
            font: dir.join("missing_font.otf"),
            out: dir.join("annotated"),
            format: OutputFormat::Png,
            quality: 90,
            tile_size,
            options,
        }
    }

    #[test]
    fn run_writes_output_and_tiles() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&job_in(dir.path(), 1.0, 4)).unwrap();
        assert_eq!(out, dir.path().join("annotated.png"));
        assert!(out.is_file());
        assert!(dir.path().join("annotated_tiles_4/annotated_x01_y01.png").is_file());
    }

    #[test]
    fn tiles_keep_full_resolution_when_output_is_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(&job_in(dir.path(), 0.5, 8)).unwrap();
        let main = image::open(&out).unwrap();
        assert_eq!((main.width(), main.height()), (4, 4));

        let tiles = dir.path().join("annotated_tiles_8");
        let tile = image::open(tiles.join("annotated_x00_y00.png")).unwrap();
        assert_eq!((tile.width(), tile.height()), (8, 8));
        assert!(!tiles.join("annotated_x01_y00.png").exists());
    }
}
