use std::cell::RefCell;

use gloo_timers::callback::Timeout;
use leptos::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use randland_shared::config::{
    DEBOUNCE_MS, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, GRID_COLS, GRID_ROWS, TILE_SIZE,
};
use randland_shared::{
    InputEvent, MapGeometry, PoiSet, ScreenSize, UiRequest, ViewportController, ViewportState,
    decode_key,
};

use crate::canvas::MapCanvas;
use crate::search_panel::SearchPanel;
use crate::storage::{BrowserClock, BrowserStore};

const POI_JSON: &str = include_str!("../assets/poi.json");

/// Digit keys 1-9 jump to these, in order.
const BOOKMARKS: &[&str] = &[
    "Emond's Field",
    "Caemlyn",
    "Tar Valon",
    "Cairhien",
    "Tear",
    "Illian",
    "Ebou Dar",
    "Amador",
    "Falme",
];

pub(crate) type MapController = ViewportController<BrowserStore, BrowserClock>;

pub(crate) fn canvas_dimensions() -> (f64, f64) {
    let Some(window) = web_sys::window() else {
        return (DEFAULT_VIEWPORT_WIDTH, DEFAULT_VIEWPORT_HEIGHT);
    };
    let w = window
        .inner_width()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(DEFAULT_VIEWPORT_WIDTH);
    let h = window
        .inner_height()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(DEFAULT_VIEWPORT_HEIGHT);
    (w, h)
}

struct WindowBinding {
    window: web_sys::Window,
    event: &'static str,
    handler: Closure<dyn Fn(web_sys::Event)>,
}

impl WindowBinding {
    fn attach(event: &'static str, handler: impl Fn(web_sys::Event) + 'static) -> Option<Self> {
        let window = web_sys::window()?;
        let handler = Closure::<dyn Fn(web_sys::Event)>::new(handler);
        window
            .add_event_listener_with_callback(event, handler.as_ref().unchecked_ref())
            .ok()?;
        Some(Self {
            window,
            event,
            handler,
        })
    }
}

impl Drop for WindowBinding {
    fn drop(&mut self) {
        let _ = self
            .window
            .remove_event_listener_with_callback(self.event, self.handler.as_ref().unchecked_ref());
    }
}

thread_local! {
    static WINDOW_BINDINGS: RefCell<Vec<WindowBinding>> = const { RefCell::new(Vec::new()) };
    static PERSIST_TIMER: RefCell<Option<Timeout>> = const { RefCell::new(None) };
}

/// Shared entry point into the controller for every component.
///
/// Each mutation goes through [`MapHandle::update`], which publishes a redraw
/// and arms the settings write when the controller asks for them.
#[derive(Clone, Copy)]
pub(crate) struct MapHandle {
    controller: StoredValue<MapController>,
    view: RwSignal<ViewportState>,
    frame: RwSignal<u64>,
}

impl MapHandle {
    /// Mirror of the controller state for reactive UI (toggle buttons etc).
    pub fn view(&self) -> RwSignal<ViewportState> {
        self.view
    }

    /// Bumped once per mutation that needs a repaint.
    pub fn frame(&self) -> RwSignal<u64> {
        self.frame
    }

    pub fn with<R>(&self, f: impl FnOnce(&MapController) -> R) -> Option<R> {
        self.controller.try_with_value(f)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut MapController) -> R) -> Option<R> {
        let (result, redraw, state, pending) = self.controller.try_update_value(|c| {
            let result = f(c);
            (result, c.take_redraw(), c.state(), c.settings_pending())
        })?;
        if redraw {
            self.frame.update(|n| *n = n.wrapping_add(1));
            if self.view.get_untracked() != state {
                self.view.set(state);
            }
        }
        if pending {
            schedule_persist(self.controller);
        }
        Some(result)
    }

    pub fn dispatch(&self, event: InputEvent) {
        if let Some(request) = self.update(|c| c.apply(event)) {
            apply_ui_request(request);
        }
    }
}

/// (Re)arm the trailing settings write. Replacing the timer cancels the old one.
fn schedule_persist(controller: StoredValue<MapController>) {
    let timeout = Timeout::new(DEBOUNCE_MS as u32, move || {
        controller.update_value(|c| {
            // Timers may fire a hair early relative to Date.now(); the quiet
            // period has still elapsed since nothing re-armed us.
            if !c.flush_settings() && c.settings_pending() {
                c.persist_now();
            }
        });
    });
    PERSIST_TIMER.with(|slot| *slot.borrow_mut() = Some(timeout));
}

pub(crate) fn search_input() -> Option<web_sys::HtmlInputElement> {
    web_sys::window()?
        .document()?
        .query_selector("[data-search-input]")
        .ok()
        .flatten()?
        .dyn_into::<web_sys::HtmlInputElement>()
        .ok()
}

pub(crate) fn apply_ui_request(request: UiRequest) {
    match request {
        UiRequest::None => {}
        UiRequest::FocusSearchInput => {
            if let Some(input) = search_input() {
                input.focus().ok();
                input.select();
            }
        }
        UiRequest::BlurSearchInput => {
            if let Some(input) = search_input() {
                input.blur().ok();
            }
        }
    }
}

fn load_pois() -> PoiSet {
    match PoiSet::from_json(POI_JSON) {
        Ok(pois) => pois,
        Err(e) => {
            web_sys::console::warn_1(&format!("poi.json rejected, starting without locations: {e}").into());
            PoiSet::default()
        }
    }
}

fn on_keydown(handle: MapHandle, e: web_sys::KeyboardEvent) {
    if e.ctrl_key() || e.meta_key() || e.alt_key() {
        return;
    }
    let key = e.key();
    let target = e
        .target()
        .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok());
    let in_text_field = target
        .as_ref()
        .map(|el| matches!(el.tag_name().as_str(), "INPUT" | "TEXTAREA"))
        .unwrap_or(false);

    let Some(command) = handle
        .with(|c| decode_key(&key, in_text_field || c.search_active(), c.bookmarks()))
        .flatten()
    else {
        return;
    };
    e.prevent_default();

    let request = handle
        .update(|c| c.handle_key_command(command))
        .unwrap_or(UiRequest::None);
    apply_ui_request(request);
    if in_text_field
        && key == "Escape"
        && let Some(el) = target
    {
        el.blur().ok();
    }
}

/// Root application component. Owns the controller and wires window-level input.
#[component]
pub fn App() -> impl IntoView {
    let (w, h) = canvas_dimensions();
    let bookmarks = BOOKMARKS.iter().map(|name| name.to_string()).collect();
    let controller = MapController::new(
        MapGeometry::from_grid(GRID_COLS, GRID_ROWS, TILE_SIZE),
        ScreenSize::new(w, h),
        load_pois(),
        BrowserStore,
        BrowserClock,
    )
    .with_bookmarks(bookmarks);

    let view_state = RwSignal::new(controller.state());
    let handle = MapHandle {
        controller: StoredValue::new(controller),
        view: view_state,
        frame: RwSignal::new(0),
    };
    provide_context(handle);

    Effect::new(move || {
        WINDOW_BINDINGS.with(|slot| {
            let mut bindings = slot.borrow_mut();
            bindings.clear();

            if let Some(b) = WindowBinding::attach("keydown", move |e| {
                if let Ok(e) = e.dyn_into::<web_sys::KeyboardEvent>() {
                    on_keydown(handle, e);
                }
            }) {
                bindings.push(b);
            }

            if let Some(b) = WindowBinding::attach("resize", move |_| {
                let (width, height) = canvas_dimensions();
                handle.dispatch(InputEvent::Resize { width, height });
            }) {
                bindings.push(b);
            }

            if let Some(b) = WindowBinding::attach("pagehide", move |_| {
                handle.controller.update_value(|c| {
                    if c.settings_pending() {
                        c.persist_now();
                    }
                });
            }) {
                bindings.push(b);
            }
        });
    });

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden; background: #d8ccaa;">
            <MapCanvas />
            <SearchPanel />
        </div>
    }
}
