#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use js_sys::Reflect;
use randland_shared::TileRange;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlImageElement;

const MAX_IN_FLIGHT: usize = 6;
const ONLOAD_HANDLE_KEY: &str = "__randlandTileOnload";
const ONERROR_HANDLE_KEY: &str = "__randlandTileOnerror";

pub type TileKey = (u32, u32);
pub type SharedTileCache = Rc<RefCell<TileCache>>;

enum Slot {
    Loading,
    Ready(HtmlImageElement),
    Failed,
}

/// Visible-tile loader. Tiles are requested lazily as they scroll into view and
/// kept once decoded; the queue only ever holds tiles that were visible at the
/// last request.
pub struct TileCache {
    slots: HashMap<TileKey, Slot>,
    queue: VecDeque<TileKey>,
    in_flight: usize,
    on_ready: Rc<dyn Fn()>,
}

impl TileCache {
    pub fn shared(on_ready: impl Fn() + 'static) -> SharedTileCache {
        Rc::new(RefCell::new(Self {
            slots: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: 0,
            on_ready: Rc::new(on_ready),
        }))
    }

    pub fn image(&self, row: u32, col: u32) -> Option<&HtmlImageElement> {
        match self.slots.get(&(row, col)) {
            Some(Slot::Ready(img)) => Some(img),
            _ => None,
        }
    }

    fn replace_queue(&mut self, wanted: Vec<TileKey>) {
        self.queue = wanted
            .into_iter()
            .filter(|key| !self.slots.contains_key(key))
            .collect();
    }
}

/// `tiles/tile_{row}_{col}.jpg`, relative to the page.
pub fn tile_src(row: u32, col: u32) -> String {
    format!("tiles/tile_{row}_{col}.jpg")
}

/// Tiles of `range` ordered by distance from the (fractional) centre tile.
pub fn load_order(range: &TileRange, center_row: f64, center_col: f64) -> Vec<TileKey> {
    let mut keys: Vec<TileKey> = range.iter().collect();
    let distance = |&(row, col): &TileKey| {
        let dr = f64::from(row) + 0.5 - center_row;
        let dc = f64::from(col) + 0.5 - center_col;
        dr * dr + dc * dc
    };
    keys.sort_by(|a, b| distance(a).total_cmp(&distance(b)).then_with(|| a.cmp(b)));
    keys
}

/// Queue whatever part of `range` is not loaded yet and start fetching.
pub fn request_visible(cache: &SharedTileCache, range: &TileRange, center_row: f64, center_col: f64) {
    if range.is_empty() {
        return;
    }
    cache
        .borrow_mut()
        .replace_queue(load_order(range, center_row, center_col));
    pump(cache);
}

fn pump(cache: &SharedTileCache) {
    loop {
        let key = {
            let mut c = cache.borrow_mut();
            if c.in_flight >= MAX_IN_FLIGHT {
                return;
            }
            let Some(key) = c.queue.pop_front() else {
                return;
            };
            if c.slots.contains_key(&key) {
                continue;
            }
            c.slots.insert(key, Slot::Loading);
            c.in_flight += 1;
            key
        };
        load_tile(cache.clone(), key);
    }
}

fn finish(cache: &SharedTileCache, key: TileKey, slot: Slot) {
    let ready = matches!(slot, Slot::Ready(_));
    let on_ready = {
        let mut c = cache.borrow_mut();
        c.slots.insert(key, slot);
        c.in_flight = c.in_flight.saturating_sub(1);
        c.on_ready.clone()
    };
    if ready {
        on_ready();
    }
    pump(cache);
}

fn load_tile(cache: SharedTileCache, key: TileKey) {
    let (row, col) = key;
    let src = tile_src(row, col);
    let Ok(img) = HtmlImageElement::new() else {
        finish(&cache, key, Slot::Failed);
        return;
    };

    let img_for_load = img.clone();
    let cache_load = cache.clone();
    let onload = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_load);
        let img = img_for_load.clone();
        let cache = cache_load.clone();
        wasm_bindgen_futures::spawn_local(async move {
            let _ = JsFuture::from(img.decode()).await;
            finish(&cache, key, Slot::Ready(img));
        });
    });

    let img_for_error = img.clone();
    let cache_error = cache;
    let src_for_error = src.clone();
    let onerror = Closure::<dyn FnMut()>::new(move || {
        clear_image_handlers(&img_for_error);
        web_sys::console::warn_1(&format!("tile failed to load: {src_for_error}").into());
        finish(&cache_error, key, Slot::Failed);
    });

    let onload_js = onload.into_js_value();
    let onerror_js = onerror.into_js_value();
    img.set_onload(Some(onload_js.unchecked_ref()));
    img.set_onerror(Some(onerror_js.unchecked_ref()));
    let _ = Reflect::set(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY), &onload_js);
    let _ = Reflect::set(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY), &onerror_js);
    img.set_src(&src);
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}
