use std::collections::HashMap;

use thiserror::Error;

use crate::config::{MAX_ZOOM, MIN_ZOOM};
use crate::viewport::ViewportState;

pub const KEY_ZOOM: &str = "randland.zoom";
pub const KEY_PAN_X: &str = "randland.panX";
pub const KEY_PAN_Y: &str = "randland.panY";
pub const KEY_BORDERS_VISIBLE: &str = "randland.bordersVisible";

/// Text key-value storage the viewer persists into.
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// In-process store, used on the host and in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("missing setting `{0}`")]
    Missing(&'static str),
    #[error("setting `{key}` is not a number: {value:?}")]
    NotNumeric { key: &'static str, value: String },
    #[error("setting `{key}` is not a boolean: {value:?}")]
    NotBoolean { key: &'static str, value: String },
    #[error("setting `{key}` out of range: {value}")]
    OutOfRange { key: &'static str, value: f64 },
}

/// The slice of [`ViewportState`] that survives a reload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedSettings {
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub borders_visible: bool,
}

impl PersistedSettings {
    pub fn from_state(state: &ViewportState) -> Self {
        Self {
            zoom: state.zoom,
            pan_x: state.pan_x,
            pan_y: state.pan_y,
            borders_visible: state.borders_visible,
        }
    }

    /// Read every key; any missing or invalid value rejects the whole set.
    ///
    /// Pan only has to be finite. A centred framing of a map smaller than the
    /// screen sits far outside the map extent, and the viewport re-clamps on
    /// restore anyway.
    pub fn load(store: &impl SettingsStore) -> Result<Self, SettingsError> {
        let zoom = read_number(store, KEY_ZOOM)?;
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
            return Err(SettingsError::OutOfRange {
                key: KEY_ZOOM,
                value: zoom,
            });
        }

        let pan_x = read_number(store, KEY_PAN_X)?;
        let pan_y = read_number(store, KEY_PAN_Y)?;
        let borders_visible = read_bool(store, KEY_BORDERS_VISIBLE)?;

        Ok(Self {
            zoom,
            pan_x,
            pan_y,
            borders_visible,
        })
    }

    /// Like [`PersistedSettings::load`], but logs and returns `None` on any problem.
    pub fn load_or_discard(store: &impl SettingsStore) -> Option<Self> {
        match Self::load(store) {
            Ok(settings) => Some(settings),
            Err(SettingsError::Missing(key)) => {
                tracing::debug!(key, "no saved view, using defaults");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "discarding saved view settings");
                None
            }
        }
    }

    pub fn save(&self, store: &mut impl SettingsStore) {
        store.set(KEY_ZOOM, &self.zoom.to_string());
        store.set(KEY_PAN_X, &self.pan_x.to_string());
        store.set(KEY_PAN_Y, &self.pan_y.to_string());
        store.set(
            KEY_BORDERS_VISIBLE,
            if self.borders_visible { "true" } else { "false" },
        );
    }
}

fn read_number(store: &impl SettingsStore, key: &'static str) -> Result<f64, SettingsError> {
    let raw = store.get(key).ok_or(SettingsError::Missing(key))?;
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| SettingsError::NotNumeric {
            key,
            value: raw.clone(),
        })?;
    if !value.is_finite() {
        return Err(SettingsError::NotNumeric { key, value: raw });
    }
    Ok(value)
}

fn read_bool(store: &impl SettingsStore, key: &'static str) -> Result<bool, SettingsError> {
    let raw = store.get(key).ok_or(SettingsError::Missing(key))?;
    match raw.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(SettingsError::NotBoolean { key, value: raw }),
    }
}
