use std::cell::{Cell, RefCell};
use std::f64::consts::{FRAC_PI_2, PI};
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, PointerEvent, WheelEvent};

use randland_shared::config::{GRID_COLS, GRID_ROWS, TILE_SIZE};
use randland_shared::{InputEvent, Nation, PoiCategory, PointOfInterest, Viewport};

use crate::app::{MapHandle, MapController};
use crate::colors::{border_css, label_rgb, marker_rgb, rgba_css};
use crate::render_loop::FrameScheduler;
use crate::tiles::{self, SharedTileCache, TileCache};

const BACKGROUND: &str = "#d8ccaa";
/// Border stroke width in map pixels, matching the printed map.
const BORDER_WIDTH_MAP_PX: f64 = 5.0;
const MIN_BORDER_WIDTH_PX: f64 = 1.5;
const BORDER_SPLINE_SAMPLES: usize = 10;
const CITY_LABEL_MIN_ZOOM: f64 = 0.12;
const LABEL_MIN_ZOOM: f64 = 0.3;
const COMPASS_RADIUS: f64 = 34.0;
const COMPASS_MARGIN: f64 = 24.0;
const LINE_HEIGHT_PX: f64 = 16.0;

/// Wheel delta in CSS pixels regardless of the event's `deltaMode`.
pub fn wheel_delta_px(delta: f64, delta_mode: u32, page_height: f64) -> f64 {
    match delta_mode {
        1 => delta * LINE_HEIGHT_PX,
        2 => delta * page_height,
        _ => delta,
    }
}

/// Ratio between two finger distances, or `None` if either is degenerate.
pub fn pinch_scale(previous: f64, current: f64) -> Option<f64> {
    (previous > 0.0 && current > 0.0).then(|| current / previous)
}

pub fn label_visible(category: PoiCategory, zoom: f64) -> bool {
    match category {
        PoiCategory::City => zoom >= CITY_LABEL_MIN_ZOOM,
        _ => zoom >= LABEL_MIN_ZOOM,
    }
}

fn marker_radius(category: PoiCategory) -> f64 {
    match category {
        PoiCategory::City => 4.5,
        PoiCategory::River => 0.0,
        PoiCategory::Steading => 3.5,
        PoiCategory::Other => 3.0,
    }
}

struct FrameInput<'a> {
    ctx: &'a CanvasRenderingContext2d,
    width: f64,
    height: f64,
    controller: &'a MapController,
    tiles: &'a TileCache,
}

fn draw_frame(input: FrameInput<'_>) {
    let FrameInput {
        ctx,
        width,
        height,
        controller,
        tiles,
    } = input;
    let vp = controller.viewport();
    let state = vp.state;

    ctx.set_fill_style_str(BACKGROUND);
    ctx.fill_rect(0.0, 0.0, width, height);

    draw_tiles(ctx, vp, tiles);
    if state.borders_visible {
        draw_borders(ctx, vp, controller.pois().nations());
    }
    draw_points(ctx, vp, controller.pois().points(), width, height);
    if state.compass_visible {
        draw_compass(ctx, width - COMPASS_MARGIN - COMPASS_RADIUS, COMPASS_MARGIN + COMPASS_RADIUS);
    }
}

fn draw_tiles(ctx: &CanvasRenderingContext2d, vp: &Viewport, tiles: &TileCache) {
    let size = f64::from(TILE_SIZE);
    let range = vp.visible_tiles(TILE_SIZE, GRID_COLS, GRID_ROWS);
    for (row, col) in range.iter() {
        let Some(image) = tiles.image(row, col) else {
            continue;
        };
        let x = f64::from(col) * size;
        let y = f64::from(row) * size;
        let (sx, sy) = vp.world_to_screen(x, y);
        let (ex, ey) = vp.world_to_screen(x + size, y + size);
        // Floor the start and ceil the end so neighbours overlap instead of
        // leaving hairline seams.
        let (sx, sy) = (sx.floor(), sy.floor());
        ctx.draw_image_with_html_image_element_and_dw_and_dh(image, sx, sy, ex.ceil() - sx, ey.ceil() - sy)
            .ok();
    }
}

fn draw_borders(ctx: &CanvasRenderingContext2d, vp: &Viewport, nations: &[Nation]) {
    ctx.set_line_width((BORDER_WIDTH_MAP_PX * vp.state.zoom).max(MIN_BORDER_WIDTH_PX));
    ctx.set_line_join("round");
    ctx.set_line_cap("round");
    for nation in nations {
        let outline = nation.outline(BORDER_SPLINE_SAMPLES);
        let Some(((fx, fy), rest)) = outline.split_first() else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        ctx.begin_path();
        let (sx, sy) = vp.world_to_screen(*fx, *fy);
        ctx.move_to(sx, sy);
        for (x, y) in rest {
            let (sx, sy) = vp.world_to_screen(*x, *y);
            ctx.line_to(sx, sy);
        }
        ctx.set_stroke_style_str(&border_css(nation.rgba()));
        ctx.stroke();
    }
}

fn draw_points(ctx: &CanvasRenderingContext2d, vp: &Viewport, points: &[PointOfInterest], w: f64, h: f64) {
    let zoom = vp.state.zoom;
    ctx.set_text_align("center");
    ctx.set_text_baseline("top");
    ctx.set_line_join("round");

    for poi in points {
        let (sx, sy) = vp.world_to_screen(poi.x, poi.y);
        if sx < -100.0 || sy < -40.0 || sx > w + 100.0 || sy > h + 40.0 {
            continue;
        }

        let radius = marker_radius(poi.category);
        if radius > 0.0 {
            let (r, g, b) = marker_rgb(poi.category);
            ctx.begin_path();
            ctx.arc(sx, sy, radius, 0.0, 2.0 * PI).ok();
            ctx.set_fill_style_str(&rgba_css(r, g, b, 0.95));
            ctx.fill();
            ctx.set_line_width(1.5);
            ctx.set_stroke_style_str("rgba(255,255,255,0.9)");
            ctx.stroke();
        }

        if !label_visible(poi.category, zoom) {
            continue;
        }
        let font = match poi.category {
            PoiCategory::City => "600 13px Georgia, 'Times New Roman', serif",
            PoiCategory::River => "italic 12px Georgia, 'Times New Roman', serif",
            _ => "12px Georgia, 'Times New Roman', serif",
        };
        let label_y = sy + radius + 3.0;
        let (r, g, b) = label_rgb(poi.category);
        ctx.set_font(font);
        ctx.set_line_width(3.0);
        ctx.set_stroke_style_str("rgba(255,255,255,0.85)");
        ctx.stroke_text(&poi.name, sx, label_y).ok();
        ctx.set_fill_style_str(&rgba_css(r, g, b, 1.0));
        ctx.fill_text(&poi.name, sx, label_y).ok();
    }
}

fn draw_compass(ctx: &CanvasRenderingContext2d, cx: f64, cy: f64) {
    ctx.save();
    ctx.begin_path();
    ctx.arc(cx, cy, COMPASS_RADIUS, 0.0, 2.0 * PI).ok();
    ctx.set_fill_style_str("rgba(250,245,230,0.85)");
    ctx.fill();
    ctx.set_line_width(1.5);
    ctx.set_stroke_style_str("rgba(60,45,30,0.8)");
    ctx.stroke();

    let tip = COMPASS_RADIUS - 10.0;
    for (i, fill) in ["#7a1c1c", "#3c2d1e", "#3c2d1e", "#3c2d1e"].iter().enumerate() {
        // north first, then clockwise
        let angle = i as f64 * FRAC_PI_2 - FRAC_PI_2;
        let (dx, dy) = (angle.cos(), angle.sin());
        let (px, py) = (-dy * 5.0, dx * 5.0);
        ctx.begin_path();
        ctx.move_to(cx + dx * tip, cy + dy * tip);
        ctx.line_to(cx + px, cy + py);
        ctx.line_to(cx - px, cy - py);
        ctx.close_path();
        ctx.set_fill_style_str(fill);
        ctx.fill();
    }

    ctx.set_font("600 10px Georgia, serif");
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    ctx.set_fill_style_str("#3c2d1e");
    let label_r = COMPASS_RADIUS - 4.0;
    ctx.fill_text("N", cx, cy - label_r).ok();
    ctx.fill_text("E", cx + label_r, cy).ok();
    ctx.fill_text("S", cx, cy + label_r).ok();
    ctx.fill_text("W", cx - label_r, cy).ok();
    ctx.restore();
}

fn touch_pair(e: &web_sys::TouchEvent) -> Option<(f64, f64, f64)> {
    let touches = e.touches();
    if touches.length() != 2 {
        return None;
    }
    let (t0, t1) = (touches.get(0)?, touches.get(1)?);
    let dx = f64::from(t1.client_x() - t0.client_x());
    let dy = f64::from(t1.client_y() - t0.client_y());
    let mid_x = f64::from(t0.client_x() + t1.client_x()) / 2.0;
    let mid_y = f64::from(t0.client_y() + t1.client_y()) / 2.0;
    Some(((dx * dx + dy * dy).sqrt(), mid_x, mid_y))
}

/// Tiles, nation borders, markers and compass on one 2D canvas.
#[component]
pub fn MapCanvas() -> impl IntoView {
    let handle: MapHandle = expect_context();
    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    let is_dragging = Rc::new(Cell::new(false));
    let last_x = Rc::new(Cell::new(0.0f64));
    let last_y = Rc::new(Cell::new(0.0f64));
    let pinch_dist = Rc::new(Cell::new(0.0f64));
    let pinching = Rc::new(Cell::new(false));

    let tile_cache = TileCache::shared(move || {
        handle.frame().update(|n| *n = n.wrapping_add(1));
    });
    let cached_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> = Rc::new(RefCell::new(None));

    let scheduler = {
        let tile_cache: SharedTileCache = tile_cache.clone();
        let cached_ctx = cached_ctx.clone();
        FrameScheduler::new(move |_timestamp| {
            let Some(canvas) = canvas_ref.get_untracked() else {
                return;
            };
            let canvas: &HtmlCanvasElement = &canvas;
            let Some(parent) = canvas.parent_element() else {
                return;
            };
            let w = f64::from(parent.client_width());
            let h = f64::from(parent.client_height());
            if w <= 0.0 || h <= 0.0 {
                return;
            }

            let dpr = web_sys::window()
                .map(|win| win.device_pixel_ratio())
                .unwrap_or(1.0)
                .max(1.0);
            let bw = (w * dpr).round() as u32;
            let bh = (h * dpr).round() as u32;
            if canvas.width() != bw || canvas.height() != bh {
                canvas.set_width(bw);
                canvas.set_height(bh);
                // resizing resets 2D context state
                *cached_ctx.borrow_mut() = None;
            }

            let screen = handle.with(|c| c.viewport().screen()).unwrap_or_default();
            if screen.width != w || screen.height != h {
                handle.dispatch(InputEvent::Resize { width: w, height: h });
            }

            let ctx = {
                let mut slot = cached_ctx.borrow_mut();
                if slot.is_none() {
                    *slot = canvas
                        .get_context("2d")
                        .ok()
                        .flatten()
                        .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok());
                }
                let Some(ctx) = slot.clone() else {
                    return;
                };
                ctx
            };
            ctx.set_transform(dpr, 0.0, 0.0, dpr, 0.0, 0.0).ok();

            handle.with(|controller| {
                let vp = controller.viewport();
                let range = vp.visible_tiles(TILE_SIZE, GRID_COLS, GRID_ROWS);
                let (cx, cy) = vp.screen_to_world(w / 2.0, h / 2.0);
                let size = f64::from(TILE_SIZE);
                tiles::request_visible(&tile_cache, &range, cy / size, cx / size);

                draw_frame(FrameInput {
                    ctx: &ctx,
                    width: w,
                    height: h,
                    controller,
                    tiles: &tile_cache.borrow(),
                });
            });
        })
    };
    let scheduler = Rc::new(scheduler);

    // One repaint per frame, however many mutations bumped the counter.
    let sched_frame = scheduler.clone();
    Effect::new(move || {
        handle.frame().track();
        if canvas_ref.get().is_some() {
            sched_frame.request();
        }
    });

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        let page = handle.with(|c| c.viewport().screen().height).unwrap_or(0.0);
        handle.dispatch(InputEvent::Wheel {
            delta_y: wheel_delta_px(e.delta_y(), e.delta_mode(), page),
            x: f64::from(e.offset_x()),
            y: f64::from(e.offset_y()),
        });
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            if !e.is_primary() {
                return;
            }
            is_dragging.set(true);
            last_x.set(f64::from(e.client_x()));
            last_y.set(f64::from(e.client_y()));
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let pinching = pinching.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            if !is_dragging.get() || !e.is_primary() {
                return;
            }
            let (x, y) = (f64::from(e.client_x()), f64::from(e.client_y()));
            let (dx, dy) = (x - last_x.get(), y - last_y.get());
            last_x.set(x);
            last_y.set(y);
            if pinching.get() {
                return;
            }
            handle.dispatch(InputEvent::Drag { dx, dy });
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);
            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        let pinching = pinching.clone();
        move |e: web_sys::TouchEvent| {
            if let Some((dist, _, _)) = touch_pair(&e) {
                e.prevent_default();
                pinching.set(true);
                pinch_dist.set(dist);
            }
        }
    };

    let on_touch_move = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let Some((dist, mid_x, mid_y)) = touch_pair(&e) else {
                return;
            };
            e.prevent_default();
            let Some(scale) = pinch_scale(pinch_dist.get(), dist) else {
                pinch_dist.set(dist);
                return;
            };
            pinch_dist.set(dist);

            let (left, top) = canvas_ref
                .get_untracked()
                .map(|el| {
                    let rect = el.get_bounding_client_rect();
                    (rect.left(), rect.top())
                })
                .unwrap_or((0.0, 0.0));
            handle.dispatch(InputEvent::Pinch {
                scale,
                x: mid_x - left,
                y: mid_y - top,
            });
        }
    };

    let on_touch_end = {
        let pinching = pinching.clone();
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            if e.touches().length() < 2 {
                pinching.set(false);
                pinch_dist.set(0.0);
            }
        }
    };

    view! {
        <div
            style="position: absolute; inset: 0; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up.clone()
            on:pointercancel=on_pointer_up
            on:touchstart=on_touch_start
            on:touchmove=on_touch_move
            on:touchend=on_touch_end.clone()
            on:touchcancel=on_touch_end
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            />
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_lines_and_pages_become_pixels() {
        assert_eq!(wheel_delta_px(120.0, 0, 800.0), 120.0);
        assert_eq!(wheel_delta_px(3.0, 1, 800.0), 48.0);
        assert_eq!(wheel_delta_px(-1.0, 2, 800.0), -800.0);
    }

    #[test]
    fn pinch_scale_needs_two_real_distances() {
        assert_eq!(pinch_scale(100.0, 150.0), Some(1.5));
        assert_eq!(pinch_scale(0.0, 150.0), None);
        assert_eq!(pinch_scale(100.0, 0.0), None);
    }

    #[test]
    fn cities_label_before_everything_else() {
        assert!(label_visible(PoiCategory::City, 0.15));
        assert!(!label_visible(PoiCategory::River, 0.15));
        assert!(label_visible(PoiCategory::River, 0.5));
        assert!(!label_visible(PoiCategory::City, 0.05));
    }
}
