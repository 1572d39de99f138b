pub mod border;
pub mod command;
pub mod config;
pub mod controller;
pub mod poi;
pub mod schedule;
pub mod search;
pub mod settings;
pub mod viewport;

pub use border::Nation;
pub use command::{InputEvent, KeyCommand, decode_key};
pub use controller::{UiRequest, ViewportController};
pub use poi::{PoiCategory, PoiError, PoiSet, PointOfInterest};
pub use schedule::{Clock, Debouncer};
pub use settings::{PersistedSettings, SettingsError, SettingsStore};
pub use viewport::{MapGeometry, ScreenSize, TileRange, Viewport, ViewportState};
