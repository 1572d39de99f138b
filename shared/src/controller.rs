use crate::command::{InputEvent, KeyCommand};
use crate::config::{DEBOUNCE_MS, FOCUS_ZOOM, KEY_PAN_STEP, WHEEL_DELTA_PER_STEP, ZOOM_STEP};
use crate::poi::{PoiSet, PointOfInterest};
use crate::schedule::{Clock, Debouncer};
use crate::search;
use crate::settings::{PersistedSettings, SettingsStore};
use crate::viewport::{MapGeometry, ScreenSize, Viewport, ViewportState};

/// Side effects the controller cannot perform itself and hands back to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiRequest {
    None,
    FocusSearchInput,
    BlurSearchInput,
}

/// Owns the single [`ViewportState`] and applies every input to it.
///
/// Mutations mark a redraw as pending (drained once per frame with
/// [`ViewportController::take_redraw`]) and arm a debounced settings write
/// (performed by [`ViewportController::flush_settings`]).
pub struct ViewportController<S, C> {
    viewport: Viewport,
    pois: PoiSet,
    store: S,
    clock: C,
    bookmarks: Vec<String>,
    search_active: bool,
    redraw_pending: bool,
    persist: Debouncer,
}

impl<S: SettingsStore, C: Clock> ViewportController<S, C> {
    /// Build a controller, restoring the saved view when it is valid.
    pub fn new(map: MapGeometry, screen: ScreenSize, pois: PoiSet, store: S, clock: C) -> Self {
        let mut viewport = Viewport::new(map, screen);
        if let Some(saved) = PersistedSettings::load_or_discard(&store) {
            viewport.restore(saved.zoom, saved.pan_x, saved.pan_y);
            viewport.state.borders_visible = saved.borders_visible;
            tracing::debug!(zoom = saved.zoom, "restored saved view");
        }

        Self {
            viewport,
            pois,
            store,
            clock,
            bookmarks: Vec::new(),
            search_active: false,
            redraw_pending: true,
            persist: Debouncer::new(DEBOUNCE_MS),
        }
    }

    /// Locations reachable with the digit keys, in order.
    pub fn with_bookmarks(mut self, bookmarks: Vec<String>) -> Self {
        self.bookmarks = bookmarks;
        self
    }

    pub fn state(&self) -> ViewportState {
        self.viewport.state
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn pois(&self) -> &PoiSet {
        &self.pois
    }

    pub fn bookmarks(&self) -> &[String] {
        &self.bookmarks
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn search_active(&self) -> bool {
        self.search_active
    }

    pub fn set_search_active(&mut self, active: bool) {
        self.search_active = active;
    }

    /// Zoom by `steps` multiples of [`ZOOM_STEP`], keeping the map point under
    /// `anchor` fixed on screen.
    pub fn zoom_by(&mut self, steps: f64, anchor: (f64, f64)) {
        if self.viewport.zoom_by(steps, anchor.0, anchor.1) {
            self.touch();
        }
    }

    /// Pan by a map-pixel delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let before = self.viewport.state;
        self.viewport.pan(dx, dy);
        if self.viewport.state != before {
            self.touch();
        }
    }

    pub fn reset_view(&mut self) {
        self.viewport.reset();
        self.touch();
    }

    pub fn toggle_borders(&mut self) {
        self.viewport.state.borders_visible = !self.viewport.state.borders_visible;
        self.touch();
    }

    pub fn toggle_compass(&mut self) {
        self.viewport.state.compass_visible = !self.viewport.state.compass_visible;
        self.touch();
    }

    pub fn search(&self, query: &str) -> Vec<&PointOfInterest> {
        search::search(self.pois.points(), query)
    }

    /// Zoom to [`FOCUS_ZOOM`] and center `poi` on screen.
    pub fn focus_on(&mut self, poi: &PointOfInterest) {
        let (cx, cy) = self.viewport.screen().center();
        self.viewport.zoom_at(FOCUS_ZOOM, cx, cy);
        self.viewport.center_on(poi.x, poi.y);
        self.touch();
    }

    /// Drag by screen pixels; the map follows the pointer 1:1.
    pub fn handle_pointer_drag(&mut self, dx: f64, dy: f64) {
        let zoom = self.viewport.state.zoom;
        self.pan_by(-dx / zoom, -dy / zoom);
    }

    pub fn handle_pinch(&mut self, scale: f64, midpoint: (f64, f64)) {
        if !scale.is_finite() || scale <= 0.0 {
            return;
        }
        self.zoom_by(scale.ln() / ZOOM_STEP.ln(), midpoint);
    }

    pub fn handle_wheel(&mut self, delta_y: f64, anchor: (f64, f64)) {
        self.zoom_by(-delta_y / WHEEL_DELTA_PER_STEP, anchor);
    }

    pub fn handle_key_command(&mut self, command: KeyCommand) -> UiRequest {
        let step = KEY_PAN_STEP / self.viewport.state.zoom;
        let center = self.viewport.screen().center();
        match command {
            KeyCommand::MoveUp => self.pan_by(0.0, -step),
            KeyCommand::MoveDown => self.pan_by(0.0, step),
            KeyCommand::MoveLeft => self.pan_by(-step, 0.0),
            KeyCommand::MoveRight => self.pan_by(step, 0.0),
            KeyCommand::ZoomIn => self.zoom_by(1.0, center),
            KeyCommand::ZoomOut => self.zoom_by(-1.0, center),
            KeyCommand::Reset => self.reset_view(),
            KeyCommand::ToggleBorders => self.toggle_borders(),
            KeyCommand::ToggleCompass => self.toggle_compass(),
            KeyCommand::FocusSearch => {
                self.search_active = true;
                return UiRequest::FocusSearchInput;
            }
            KeyCommand::ExitSearch => {
                let was_active = self.search_active;
                self.search_active = false;
                if was_active {
                    return UiRequest::BlurSearchInput;
                }
            }
            KeyCommand::JumpTo(name) => {
                if let Some(poi) = self.pois.find_by_name(&name).cloned() {
                    self.focus_on(&poi);
                } else {
                    tracing::debug!(%name, "bookmark does not match any location");
                }
            }
        }
        UiRequest::None
    }

    /// Focus the best match for `query` and hand keyboard control back to the map.
    pub fn submit_search(&mut self, query: &str) -> Option<PointOfInterest> {
        let best = self.search(query).first().map(|poi| (*poi).clone());
        if let Some(poi) = &best {
            self.focus_on(poi);
            self.search_active = false;
        }
        best
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        let before = (self.viewport.screen(), self.viewport.state);
        self.viewport.resize(ScreenSize::new(width, height));
        if (self.viewport.screen(), self.viewport.state) != before {
            self.redraw_pending = true;
        }
    }

    /// Single dispatch point for decoded input.
    pub fn apply(&mut self, event: InputEvent) -> UiRequest {
        match event {
            InputEvent::Drag { dx, dy } => self.handle_pointer_drag(dx, dy),
            InputEvent::Wheel { delta_y, x, y } => self.handle_wheel(delta_y, (x, y)),
            InputEvent::Pinch { scale, x, y } => self.handle_pinch(scale, (x, y)),
            InputEvent::Key(command) => return self.handle_key_command(command),
            InputEvent::SearchSubmit(query) => {
                if self.submit_search(&query).is_some() {
                    return UiRequest::BlurSearchInput;
                }
            }
            InputEvent::Resize { width, height } => self.resize(width, height),
        }
        UiRequest::None
    }

    /// Returns whether a redraw was requested since the last call, clearing the flag.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    pub fn settings_pending(&self) -> bool {
        self.persist.is_pending()
    }

    /// Write settings if the debounce window has elapsed. Returns `true` on write.
    pub fn flush_settings(&mut self) -> bool {
        if !self.persist.poll(self.clock.now_ms()) {
            return false;
        }
        self.write_settings();
        true
    }

    /// Write settings immediately, e.g. when the page is being hidden.
    pub fn persist_now(&mut self) {
        self.persist.cancel();
        self.write_settings();
    }

    fn write_settings(&mut self) {
        let settings = PersistedSettings::from_state(&self.viewport.state);
        settings.save(&mut self.store);
        tracing::debug!(zoom = settings.zoom, "saved view settings");
    }

    fn touch(&mut self) {
        self.redraw_pending = true;
        self.persist.trigger(self.clock.now_ms());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_ZOOM, MAX_ZOOM, MIN_ZOOM};
    use crate::poi::PoiCategory;
    use crate::schedule::ManualClock;
    use crate::settings::{KEY_ZOOM, MemoryStore};

    type Controller = ViewportController<MemoryStore, ManualClock>;

    fn map() -> MapGeometry {
        MapGeometry::new(10_000.0, 6_000.0)
    }

    fn screen() -> ScreenSize {
        ScreenSize::new(1000.0, 800.0)
    }

    fn pois() -> PoiSet {
        let poi = |name: &str, category, x, y| PointOfInterest {
            name: name.to_string(),
            category,
            x,
            y,
        };
        PoiSet::new(
            vec![
                poi("Emond's Field", PoiCategory::City, 3000.0, 4000.0),
                poi("Tar Valon", PoiCategory::City, 6000.0, 1500.0),
                poi("Arinelle", PoiCategory::River, 3500.0, 3000.0),
                poi("Stedding Shangtai", PoiCategory::Steading, 200.0, 100.0),
            ],
            Vec::new(),
        )
    }

    fn controller_with(store: MemoryStore, clock: ManualClock) -> Controller {
        ViewportController::new(map(), screen(), pois(), store, clock)
    }

    fn controller() -> (Controller, ManualClock) {
        let clock = ManualClock::new(0.0);
        (controller_with(MemoryStore::new(), clock.clone()), clock)
    }

    fn assert_close(actual: f64, expected: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff < 1e-6,
            "expected {expected}, got {actual} (diff: {diff})"
        );
    }

    fn assert_inside_map(c: &Controller) {
        let (left, top, right, bottom) = c.viewport().visible_region();
        assert!(left >= -1e-6 && top >= -1e-6, "{left} {top}");
        assert!(right <= 10_000.0 + 1e-6 && bottom <= 6_000.0 + 1e-6, "{right} {bottom}");
    }

    #[test]
    fn zoom_always_within_limits() {
        let (mut c, _) = controller();
        for steps in [5.0, 40.0, -3.0, -100.0, 0.5, 77.0, -0.25] {
            c.zoom_by(steps, (123.0, 456.0));
            let zoom = c.state().zoom;
            assert!((MIN_ZOOM..=MAX_ZOOM).contains(&zoom), "zoom {zoom}");
        }
    }

    #[test]
    fn zoom_at_limit_is_noop() {
        let (mut c, _) = controller();
        c.zoom_by(100.0, (0.0, 0.0));
        c.take_redraw();
        let before = c.state();
        c.zoom_by(1.0, (500.0, 400.0));
        assert_eq!(c.state(), before);
        assert!(!c.take_redraw());
    }

    #[test]
    fn pan_stays_inside_map() {
        let (mut c, _) = controller();
        c.zoom_by(10.0, (500.0, 400.0));
        for (dx, dy) in [(-1e6, 0.0), (0.0, -1e6), (1e6, 1e6), (-37.0, 12.0)] {
            c.pan_by(dx, dy);
            assert_inside_map(&c);
        }
        for _ in 0..50 {
            c.handle_pointer_drag(-400.0, -300.0);
            assert_inside_map(&c);
        }
    }

    #[test]
    fn zoom_in_then_out_is_inverse() {
        let (mut c, _) = controller();
        c.zoom_by(8.0, (500.0, 400.0));
        let before = c.state();
        c.zoom_by(3.0, (420.0, 310.0));
        c.zoom_by(-3.0, (420.0, 310.0));
        let after = c.state();
        assert_close(after.zoom, before.zoom);
        assert_close(after.pan_x, before.pan_x);
        assert_close(after.pan_y, before.pan_y);
    }

    #[test]
    fn reset_is_independent_of_history() {
        let (mut a, _) = controller();
        a.reset_view();
        let expected = a.state();
        assert_close(expected.zoom, DEFAULT_ZOOM);

        let (mut b, _) = controller();
        b.zoom_by(9.0, (10.0, 10.0));
        b.pan_by(300.0, 700.0);
        b.reset_view();
        assert_eq!(b.state().zoom, expected.zoom);
        assert_eq!(b.state().pan_x, expected.pan_x);
        assert_eq!(b.state().pan_y, expected.pan_y);
    }

    #[test]
    fn drag_moves_map_with_pointer() {
        let (mut c, _) = controller();
        c.zoom_by(10.0, (500.0, 400.0));
        let grabbed = c.viewport().screen_to_world(500.0, 400.0);
        c.handle_pointer_drag(40.0, -25.0);
        let (sx, sy) = c.viewport().world_to_screen(grabbed.0, grabbed.1);
        assert_close(sx, 540.0);
        assert_close(sy, 375.0);
    }

    #[test]
    fn pinch_zooms_about_midpoint() {
        let (mut c, _) = controller();
        c.zoom_by(6.0, (500.0, 400.0));
        let zoom = c.state().zoom;
        let anchor = c.viewport().screen_to_world(450.0, 380.0);
        c.handle_pinch(1.44, (450.0, 380.0));
        assert_close(c.state().zoom, zoom * 1.44);
        let now = c.viewport().screen_to_world(450.0, 380.0);
        assert_close(now.0, anchor.0);
        assert_close(now.1, anchor.1);

        let before = c.state();
        c.handle_pinch(0.0, (0.0, 0.0));
        c.handle_pinch(f64::NAN, (0.0, 0.0));
        assert_eq!(c.state(), before);
    }

    #[test]
    fn wheel_down_zooms_out() {
        let (mut c, _) = controller();
        c.zoom_by(10.0, (500.0, 400.0));
        let zoom = c.state().zoom;
        c.handle_wheel(100.0, (500.0, 400.0));
        assert_close(c.state().zoom, zoom / ZOOM_STEP);
    }

    #[test]
    fn search_matches_partial_names() {
        let (c, _) = controller();
        assert!(c.search("").is_empty());
        let hits = c.search("emond");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Emond's Field");
    }

    #[test]
    fn search_on_empty_data_is_empty() {
        let c = ViewportController::new(
            map(),
            screen(),
            PoiSet::default(),
            MemoryStore::new(),
            ManualClock::new(0.0),
        );
        assert!(c.search("caemlyn").is_empty());
    }

    #[test]
    fn focus_centers_location() {
        let (mut c, _) = controller();
        let target = c.search("tar valon")[0].clone();
        c.focus_on(&target);
        assert_close(c.state().zoom, FOCUS_ZOOM);
        let (sx, sy) = c.viewport().world_to_screen(6000.0, 1500.0);
        assert_close(sx, 500.0);
        assert_close(sy, 400.0);
    }

    #[test]
    fn focus_near_edge_is_clamped() {
        let (mut c, _) = controller();
        let steading = c.search("stedding")[0].clone();
        c.focus_on(&steading);
        assert_close(c.state().pan_x, 0.0);
        assert_close(c.state().pan_y, 0.0);
        assert_inside_map(&c);
    }

    #[test]
    fn submit_search_focuses_best_match() {
        let (mut c, _) = controller();
        c.set_search_active(true);
        let hit = c.submit_search("ARIN").unwrap();
        assert_eq!(hit.name, "Arinelle");
        assert!(!c.search_active());

        c.set_search_active(true);
        let before = c.state();
        assert!(c.submit_search("Shayol Ghul").is_none());
        assert_eq!(c.state(), before);
        assert!(c.search_active());
    }

    #[test]
    fn key_commands_drive_primitives() {
        let (mut c, _) = controller();
        c.zoom_by(10.0, (500.0, 400.0));
        let start = c.state();

        c.handle_key_command(KeyCommand::MoveRight);
        assert_close(c.state().pan_x, start.pan_x + KEY_PAN_STEP / start.zoom);
        c.handle_key_command(KeyCommand::MoveDown);
        assert_close(c.state().pan_y, start.pan_y + KEY_PAN_STEP / start.zoom);

        c.handle_key_command(KeyCommand::ZoomIn);
        assert_close(c.state().zoom, start.zoom * ZOOM_STEP);

        let borders = c.state().borders_visible;
        c.handle_key_command(KeyCommand::ToggleBorders);
        assert_eq!(c.state().borders_visible, !borders);
        let compass = c.state().compass_visible;
        c.handle_key_command(KeyCommand::ToggleCompass);
        assert_eq!(c.state().compass_visible, !compass);

        c.handle_key_command(KeyCommand::Reset);
        assert_close(c.state().zoom, DEFAULT_ZOOM);
    }

    #[test]
    fn search_mode_requests() {
        let (mut c, _) = controller();
        assert_eq!(
            c.handle_key_command(KeyCommand::FocusSearch),
            UiRequest::FocusSearchInput
        );
        assert!(c.search_active());
        assert_eq!(
            c.handle_key_command(KeyCommand::ExitSearch),
            UiRequest::BlurSearchInput
        );
        assert!(!c.search_active());
        assert_eq!(c.handle_key_command(KeyCommand::ExitSearch), UiRequest::None);
    }

    #[test]
    fn jump_to_bookmark() {
        let (c, _) = controller();
        let mut c = c.with_bookmarks(vec!["Emond's Field".into()]);
        c.handle_key_command(KeyCommand::JumpTo("emond's field".into()));
        let (sx, sy) = c.viewport().world_to_screen(3000.0, 4000.0);
        assert_close(sx, 500.0);
        assert_close(sy, 400.0);

        let before = c.state();
        c.handle_key_command(KeyCommand::JumpTo("Shayol Ghul".into()));
        assert_eq!(c.state(), before);
    }

    #[test]
    fn apply_dispatches_events() {
        let (mut c, _) = controller();
        assert_eq!(
            c.apply(InputEvent::SearchSubmit("tar".into())),
            UiRequest::BlurSearchInput
        );
        assert_close(c.state().zoom, FOCUS_ZOOM);

        c.apply(InputEvent::Resize {
            width: 640.0,
            height: 480.0,
        });
        assert_eq!(c.viewport().screen(), ScreenSize::new(640.0, 480.0));
        assert_inside_map(&c);

        assert_eq!(
            c.apply(InputEvent::Key(KeyCommand::FocusSearch)),
            UiRequest::FocusSearchInput
        );
    }

    #[test]
    fn redraws_coalesce_per_frame() {
        let (mut c, _) = controller();
        assert!(c.take_redraw());
        assert!(!c.take_redraw());

        c.zoom_by(5.0, (100.0, 100.0));
        c.handle_pointer_drag(30.0, 30.0);
        c.toggle_compass();
        assert!(c.take_redraw());
        assert!(!c.take_redraw());
    }

    #[test]
    fn settings_written_once_after_quiet_period() {
        let (mut c, clock) = controller();
        c.zoom_by(5.0, (100.0, 100.0));
        clock.advance(100.0);
        c.handle_pointer_drag(10.0, 10.0);
        clock.advance(250.0);
        assert!(!c.flush_settings());
        assert!(c.store().is_empty());

        clock.advance(60.0);
        assert!(c.flush_settings());
        assert_eq!(c.store().len(), 4);
        assert!(!c.flush_settings());
    }

    #[test]
    fn settings_restore_on_startup() {
        let clock = ManualClock::new(0.0);
        let mut c = controller_with(MemoryStore::new(), clock.clone());
        c.zoom_by(7.0, (300.0, 200.0));
        c.pan_by(450.0, 120.0);
        c.toggle_borders();
        c.persist_now();
        let saved = c.state();

        let store = c.store().clone();
        let restored = controller_with(store, clock);
        let state = restored.state();
        assert_close(state.zoom, saved.zoom);
        assert_close(state.pan_x, saved.pan_x);
        assert_close(state.pan_y, saved.pan_y);
        assert_eq!(state.borders_visible, saved.borders_visible);
    }

    #[test]
    fn min_zoom_on_wide_screen_restores() {
        let clock = ManualClock::new(0.0);
        let wide = ScreenSize::new(2560.0, 1440.0);
        let geometry = MapGeometry::from_grid(58, 31, 256);
        let mut c = ViewportController::new(geometry, wide, pois(), MemoryStore::new(), clock.clone());
        c.zoom_by(-100.0, (1280.0, 720.0));
        c.toggle_borders();
        c.persist_now();
        let saved = c.state();
        assert_close(saved.zoom, MIN_ZOOM);
        assert!(saved.pan_x < -geometry.width);

        let restored = ViewportController::new(geometry, wide, pois(), c.store().clone(), clock);
        let state = restored.state();
        assert_close(state.zoom, saved.zoom);
        assert_close(state.pan_x, saved.pan_x);
        assert_close(state.pan_y, saved.pan_y);
        assert!(!state.borders_visible);
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        PersistedSettings {
            zoom: 2.0,
            pan_x: 100.0,
            pan_y: 100.0,
            borders_visible: false,
        }
        .save(&mut store);
        store.set(KEY_ZOOM, "abc");

        let c = controller_with(store, ManualClock::new(0.0));
        let (defaults, _) = controller();
        assert_eq!(c.state(), defaults.state());
    }
}
