use gloo_storage::{LocalStorage, Storage};
use randland_shared::{Clock, SettingsStore};

/// `localStorage`-backed settings. Values are stored as plain text, not JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStore;

impl SettingsStore for BrowserStore {
    fn get(&self, key: &str) -> Option<String> {
        LocalStorage::raw().get_item(key).ok().flatten()
    }

    fn set(&mut self, key: &str, value: &str) {
        if LocalStorage::raw().set_item(key, value).is_err() {
            web_sys::console::warn_1(&format!("failed to persist {key}").into());
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserClock;

impl Clock for BrowserClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}
