use leptos::prelude::*;
use wasm_bindgen::JsCast;

use randland_shared::{InputEvent, PointOfInterest};

use crate::app::{MapHandle, search_input};

const MAX_RESULTS: usize = 12;

const BUTTON_STYLE: &str = "padding: 6px 10px; background: #f6f0de; border: 1px solid #8c7a5b; border-radius: 4px; color: #3c2d1e; font-family: Georgia, serif; font-size: 0.8rem; cursor: pointer;";

/// Search box, result list and the view toggles, floating over the map.
#[component]
pub fn SearchPanel() -> impl IntoView {
    let handle: MapHandle = expect_context();
    let query: RwSignal<String> = RwSignal::new(String::new());

    let results = Memo::new(move |_| {
        let q = query.get();
        handle
            .with(|c| {
                c.search(&q)
                    .into_iter()
                    .take(MAX_RESULTS)
                    .cloned()
                    .collect::<Vec<PointOfInterest>>()
            })
            .unwrap_or_default()
    });

    let on_input = move |e: leptos::ev::Event| {
        let Some(target) = e.target() else {
            return;
        };
        let Ok(input) = target.dyn_into::<web_sys::HtmlInputElement>() else {
            return;
        };
        query.set(input.value());
    };

    let on_submit = move |e: leptos::ev::SubmitEvent| {
        e.prevent_default();
        handle.dispatch(InputEvent::SearchSubmit(query.get_untracked()));
    };

    let pick = move |poi: PointOfInterest| {
        handle.update(|c| {
            c.focus_on(&poi);
            c.set_search_active(false);
        });
        if let Some(input) = search_input() {
            input.blur().ok();
        }
    };

    view! {
        <div style="position: absolute; top: 16px; left: 16px; z-index: 10; width: 280px; display: flex; flex-direction: column; gap: 8px; font-family: Georgia, serif;">
            <form on:submit=on_submit style="margin: 0;">
                <input
                    data-search-input=""
                    type="search"
                    placeholder="Search places ( / )"
                    autocomplete="off"
                    style="width: 100%; box-sizing: border-box; padding: 9px 12px; background: rgba(250,245,230,0.95); border: 1px solid #8c7a5b; border-radius: 6px; color: #3c2d1e; font-family: Georgia, serif; font-size: 0.9rem; outline: none;"
                    prop:value=move || query.get()
                    on:input=on_input
                    on:focus=move |_| {
                        handle.update(|c| c.set_search_active(true));
                    }
                    on:blur=move |_| {
                        handle.update(|c| c.set_search_active(false));
                    }
                />
            </form>
            {move || {
                if query.with(|q| q.trim().is_empty()) {
                    return ().into_any();
                }
                let items = results.get();
                if items.is_empty() {
                    return view! {
                        <div style="padding: 8px 12px; background: rgba(250,245,230,0.95); border: 1px solid #c8b892; border-radius: 6px; color: #7a6a50; font-size: 0.85rem; font-style: italic;">
                            "No results"
                        </div>
                    }
                    .into_any();
                }
                view! {
                    <ul style="list-style: none; margin: 0; padding: 4px 0; background: rgba(250,245,230,0.95); border: 1px solid #c8b892; border-radius: 6px; max-height: 320px; overflow-y: auto;">
                        {items
                            .into_iter()
                            .map(|poi| {
                                let name = poi.name.clone();
                                let category = poi.category.label();
                                view! {
                                    <li
                                        style="padding: 6px 12px; cursor: pointer; display: flex; justify-content: space-between; gap: 8px; color: #3c2d1e; font-size: 0.88rem;"
                                        on:mousedown=move |e| e.prevent_default()
                                        on:click=move |_| pick(poi.clone())
                                    >
                                        <span>{name}</span>
                                        <span style="color: #8c7a5b; font-size: 0.72rem;">{category}</span>
                                    </li>
                                }
                            })
                            .collect_view()}
                    </ul>
                }
                .into_any()
            }}
            <div style="display: flex; gap: 6px; flex-wrap: wrap;">
                <button
                    style=BUTTON_STYLE
                    on:click=move |_| {
                        handle.update(|c| c.toggle_borders());
                    }
                >
                    {move || if handle.view().get().borders_visible { "Hide borders" } else { "Show borders" }}
                </button>
                <button
                    style=BUTTON_STYLE
                    on:click=move |_| {
                        handle.update(|c| c.toggle_compass());
                    }
                >
                    {move || if handle.view().get().compass_visible { "Hide compass" } else { "Show compass" }}
                </button>
                <button
                    style=BUTTON_STYLE
                    on:click=move |_| {
                        handle.update(|c| c.reset_view());
                    }
                >
                    "Reset view"
                </button>
            </div>
        </div>
    }
}
