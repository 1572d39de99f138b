use randland_shared::config::{GRID_COLS, GRID_ROWS, TILE_SIZE};

pub const DEFAULT_TILE_PREFIX: &str = "tile";
pub const DEFAULT_TILE_EXTENSION: &str = "jpg";
pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const SPLIT_JPEG_QUALITY: u8 = 95;

// annotate
pub const BORDER_WIDTH_PX: f64 = 5.0;
pub const DEFAULT_SPLINE_SAMPLES: usize = 10;
pub const MIN_SPLINE_SAMPLES: usize = 6;
pub const DEFAULT_DPI: f64 = 96.0;
pub const LABEL_POINTS: f64 = 14.0;
pub const LABEL_STROKE_PX: i32 = 2;
/// Stedding labels start this far above the icon's bottom edge.
pub const STEDDING_LABEL_RISE_PX: i64 = 10;
/// River labels are centred this far right of the river's coordinate.
pub const RIVER_LABEL_SHIFT_PX: f64 = 50.0;

pub fn tile_size() -> u32 {
    env_positive("RANDLAND_TILE_SIZE").unwrap_or(TILE_SIZE)
}

pub fn grid_cols() -> u32 {
    env_positive("RANDLAND_GRID_COLS").unwrap_or(GRID_COLS)
}

pub fn grid_rows() -> u32 {
    env_positive("RANDLAND_GRID_ROWS").unwrap_or(GRID_ROWS)
}

pub fn jpeg_quality() -> u8 {
    std::env::var("RANDLAND_JPEG_QUALITY")
        .ok()
        .and_then(|value| value.trim().parse::<u8>().ok())
        .filter(|value| (1..=100).contains(value))
        .unwrap_or(DEFAULT_JPEG_QUALITY)
}

fn env_positive(key: &str) -> Option<u32> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}
