use crate::config::{
    DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, DEFAULT_ZOOM, MAP_HEIGHT, MAP_WIDTH,
    MAX_ZOOM, MIN_ZOOM, ZOOM_STEP,
};

/// Pixel dimensions of the full map at zoom 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapGeometry {
    pub width: f64,
    pub height: f64,
}

impl MapGeometry {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Map assembled from a `cols` x `rows` grid of square tiles.
    pub fn from_grid(cols: u32, rows: u32, tile_size: u32) -> Self {
        Self {
            width: cols as f64 * tile_size as f64,
            height: rows as f64 * tile_size as f64,
        }
    }
}

impl Default for MapGeometry {
    fn default() -> Self {
        Self::new(MAP_WIDTH, MAP_HEIGHT)
    }
}

/// Size of the on-screen drawing surface in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl ScreenSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT)
    }
}

/// Everything the renderer needs to draw one frame.
///
/// `pan_x`/`pan_y` are the map-pixel coordinates of the screen's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub borders_visible: bool,
    pub compass_visible: bool,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            pan_x: 0.0,
            pan_y: 0.0,
            borders_visible: true,
            compass_visible: true,
        }
    }
}

/// Inclusive-exclusive tile index ranges covering the visible region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub col_start: u32,
    pub col_end: u32,
    pub row_start: u32,
    pub row_end: u32,
}

impl TileRange {
    pub fn is_empty(&self) -> bool {
        self.col_start >= self.col_end || self.row_start >= self.row_end
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.row_start..self.row_end)
            .flat_map(move |row| (self.col_start..self.col_end).map(move |col| (row, col)))
    }
}

/// Viewport manages the pan/zoom transformation between map pixels and screen pixels.
///
/// `screen = (map - pan) * zoom`. Every mutating method leaves the pan clamped.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub state: ViewportState,
    map: MapGeometry,
    screen: ScreenSize,
}

impl Viewport {
    pub fn new(map: MapGeometry, screen: ScreenSize) -> Self {
        let mut vp = Self {
            state: ViewportState::default(),
            map,
            screen,
        };
        vp.reset();
        vp
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Convert map coordinates to screen coordinates.
    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        (
            (wx - self.state.pan_x) * self.state.zoom,
            (wy - self.state.pan_y) * self.state.zoom,
        )
    }

    /// Convert screen coordinates to map coordinates.
    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            sx / self.state.zoom + self.state.pan_x,
            sy / self.state.zoom + self.state.pan_y,
        )
    }

    /// Map-space rectangle `(left, top, right, bottom)` currently on screen.
    pub fn visible_region(&self) -> (f64, f64, f64, f64) {
        let (left, top) = self.screen_to_world(0.0, 0.0);
        let (right, bottom) = self.screen_to_world(self.screen.width, self.screen.height);
        (left, top, right, bottom)
    }

    /// Tiles of a `cols` x `rows` grid that intersect the visible region.
    pub fn visible_tiles(&self, tile_size: u32, cols: u32, rows: u32) -> TileRange {
        let size = tile_size.max(1) as f64;
        let (left, top, right, bottom) = self.visible_region();
        let start = |v: f64, max: u32| (v / size).floor().clamp(0.0, max as f64) as u32;
        let end = |v: f64, max: u32| (v / size).ceil().clamp(0.0, max as f64) as u32;
        TileRange {
            col_start: start(left, cols),
            col_end: end(right, cols),
            row_start: start(top, rows),
            row_end: end(bottom, rows),
        }
    }

    /// Zoom by `steps` multiples of [`ZOOM_STEP`] keeping the map point under
    /// `(screen_x, screen_y)` fixed. Returns `false` when the zoom is already pinned
    /// at the limit in the requested direction.
    pub fn zoom_by(&mut self, steps: f64, screen_x: f64, screen_y: f64) -> bool {
        if !steps.is_finite() || steps == 0.0 {
            return false;
        }
        let zoom = self.state.zoom;
        if (steps > 0.0 && zoom >= MAX_ZOOM) || (steps < 0.0 && zoom <= MIN_ZOOM) {
            return false;
        }
        self.zoom_at(zoom * ZOOM_STEP.powf(steps), screen_x, screen_y);
        true
    }

    /// Set an absolute zoom level anchored at a screen point.
    pub fn zoom_at(&mut self, zoom: f64, screen_x: f64, screen_y: f64) {
        let (anchor_x, anchor_y) = self.screen_to_world(screen_x, screen_y);
        let new_zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);

        self.state.zoom = new_zoom;
        self.state.pan_x = anchor_x - screen_x / new_zoom;
        self.state.pan_y = anchor_y - screen_y / new_zoom;
        self.clamp_pan();
    }

    /// Pan by a map-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) {
        if !dx.is_finite() || !dy.is_finite() {
            return;
        }
        self.state.pan_x += dx;
        self.state.pan_y += dy;
        self.clamp_pan();
    }

    /// Place map point `(wx, wy)` at the center of the screen.
    pub fn center_on(&mut self, wx: f64, wy: f64) {
        let (cx, cy) = self.screen.center();
        self.state.pan_x = wx - cx / self.state.zoom;
        self.state.pan_y = wy - cy / self.state.zoom;
        self.clamp_pan();
    }

    /// Default framing: [`DEFAULT_ZOOM`] with the map centered.
    pub fn reset(&mut self) {
        self.state.zoom = DEFAULT_ZOOM.clamp(MIN_ZOOM, MAX_ZOOM);
        self.center_on(self.map.width / 2.0, self.map.height / 2.0);
    }

    pub fn resize(&mut self, screen: ScreenSize) {
        if screen.width <= 0.0 || screen.height <= 0.0 {
            return;
        }
        self.screen = screen;
        self.clamp_pan();
    }

    /// Restore a saved zoom/pan, re-applying all clamps.
    pub fn restore(&mut self, zoom: f64, pan_x: f64, pan_y: f64) {
        self.state.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.state.pan_x = pan_x;
        self.state.pan_y = pan_y;
        self.clamp_pan();
    }

    /// Keep the visible region inside the map. On an axis where the map is
    /// narrower than the screen the map is centered instead.
    pub fn clamp_pan(&mut self) {
        let visible_w = self.screen.width / self.state.zoom;
        let visible_h = self.screen.height / self.state.zoom;
        self.state.pan_x = clamp_axis(self.state.pan_x, self.map.width, visible_w);
        self.state.pan_y = clamp_axis(self.state.pan_y, self.map.height, visible_h);
    }
}

fn clamp_axis(pan: f64, map_extent: f64, visible_extent: f64) -> f64 {
    if map_extent >= visible_extent {
        pan.clamp(0.0, map_extent - visible_extent)
    } else {
        (map_extent - visible_extent) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < 1e-6,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    fn viewport() -> Viewport {
        Viewport::new(
            MapGeometry::new(10_000.0, 6_000.0),
            ScreenSize::new(1000.0, 800.0),
        )
    }

    #[test]
    fn screen_world_roundtrip() {
        let mut vp = viewport();
        vp.zoom_at(1.5, 0.0, 0.0);
        vp.pan(1234.0, 567.0);
        let (sx, sy) = vp.world_to_screen(2000.0, 1500.0);
        let (wx, wy) = vp.screen_to_world(sx, sy);
        assert_close(wx, 2000.0);
        assert_close(wy, 1500.0);
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let mut vp = viewport();
        vp.zoom_at(1.0, 500.0, 400.0);
        let before = vp.screen_to_world(300.0, 250.0);
        assert!(vp.zoom_by(2.0, 300.0, 250.0));
        let after = vp.screen_to_world(300.0, 250.0);
        assert_close(after.0, before.0);
        assert_close(after.1, before.1);
    }

    #[test]
    fn zoom_stays_within_limits() {
        let mut vp = viewport();
        for _ in 0..100 {
            vp.zoom_by(3.0, 10.0, 10.0);
        }
        assert_close(vp.state.zoom, MAX_ZOOM);
        assert!(!vp.zoom_by(1.0, 10.0, 10.0));

        for _ in 0..100 {
            vp.zoom_by(-3.0, 10.0, 10.0);
        }
        assert_close(vp.state.zoom, MIN_ZOOM);
        assert!(!vp.zoom_by(-1.0, 10.0, 10.0));
    }

    #[test]
    fn pan_never_exposes_outside_map() {
        let mut vp = viewport();
        vp.zoom_at(1.0, 0.0, 0.0);
        vp.pan(-50_000.0, -50_000.0);
        assert_close(vp.state.pan_x, 0.0);
        assert_close(vp.state.pan_y, 0.0);

        vp.pan(1e9, 1e9);
        let (left, top, right, bottom) = vp.visible_region();
        assert!(left >= 0.0 && top >= 0.0);
        assert_close(right, 10_000.0);
        assert_close(bottom, 6_000.0);
    }

    #[test]
    fn small_map_is_centered() {
        let mut vp = viewport();
        vp.zoom_at(MIN_ZOOM, 0.0, 0.0);
        // 10_000 * 0.05 = 500px wide on a 1000px screen
        let (sx, _) = vp.world_to_screen(0.0, 0.0);
        let (ex, _) = vp.world_to_screen(10_000.0, 0.0);
        assert_close(sx, 250.0);
        assert_close(ex, 750.0);
    }

    #[test]
    fn reset_centers_map() {
        let mut vp = viewport();
        vp.zoom_at(3.0, 0.0, 0.0);
        vp.pan(400.0, 200.0);
        vp.reset();
        let fresh = viewport();
        assert_eq!(vp.state, fresh.state);
        let (cx, cy) = vp.screen_to_world(500.0, 400.0);
        assert_close(cx, 5_000.0);
        assert_close(cy, 3_000.0);
    }

    #[test]
    fn nan_pan_is_ignored() {
        let mut vp = viewport();
        let before = vp.state;
        vp.pan(f64::NAN, 3.0);
        assert_eq!(vp.state, before);
    }

    #[test]
    fn visible_tiles_cover_region() {
        let mut vp = viewport();
        vp.zoom_at(1.0, 0.0, 0.0);
        vp.pan(-1e9, -1e9);
        let range = vp.visible_tiles(256, 40, 24);
        assert_eq!(range.col_start, 0);
        assert_eq!(range.row_start, 0);
        // 1000 / 256 = 3.9 -> 4 columns, 800 / 256 = 3.1 -> 4 rows
        assert_eq!(range.col_end, 4);
        assert_eq!(range.row_end, 4);
        assert_eq!(range.iter().count(), 16);
    }

    #[test]
    fn visible_tiles_clamped_to_grid() {
        let mut vp = viewport();
        vp.zoom_at(MIN_ZOOM, 0.0, 0.0);
        let range = vp.visible_tiles(256, 40, 24);
        assert_eq!((range.col_start, range.col_end), (0, 40));
        assert_eq!((range.row_start, range.row_end), (0, 24));
    }
}
