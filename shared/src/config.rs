//! Fixed tuning constants for the viewer and the asset pipeline.

/// Edge length of one map tile in pixels.
pub const TILE_SIZE: u32 = 256;
pub const GRID_COLS: u32 = 58;
pub const GRID_ROWS: u32 = 31;

pub const MAP_WIDTH: f64 = (GRID_COLS * TILE_SIZE) as f64;
pub const MAP_HEIGHT: f64 = (GRID_ROWS * TILE_SIZE) as f64;

pub const MIN_ZOOM: f64 = 0.05;
pub const MAX_ZOOM: f64 = 4.0;
pub const DEFAULT_ZOOM: f64 = 0.1;
pub const FOCUS_ZOOM: f64 = 1.0;
/// Multiplier applied per zoom step.
pub const ZOOM_STEP: f64 = 1.2;

/// Keyboard pan distance in screen pixels.
pub const KEY_PAN_STEP: f64 = 80.0;
/// Wheel delta (in CSS pixels) treated as one zoom step.
pub const WHEEL_DELTA_PER_STEP: f64 = 100.0;

pub const DEBOUNCE_MS: f64 = 300.0;

// Fallback viewport before the first resize event arrives.
pub const DEFAULT_VIEWPORT_WIDTH: f64 = 1200.0;
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;
