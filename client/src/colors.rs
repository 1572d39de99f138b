use randland_shared::PoiCategory;

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

/// Nation border stroke; the 0-255 alpha from the data becomes a CSS fraction.
pub fn border_css((r, g, b, a): (u8, u8, u8, u8)) -> String {
    rgba_css(r, g, b, (f64::from(a) / 255.0 * 1000.0).round() / 1000.0)
}

/// Marker fill per category.
pub fn marker_rgb(category: PoiCategory) -> (u8, u8, u8) {
    match category {
        PoiCategory::City => (122, 28, 28),
        PoiCategory::River => (0, 90, 200),
        PoiCategory::Steading => (0, 100, 0),
        PoiCategory::Other => (70, 60, 90),
    }
}

/// Label fill per category. Rivers and steddings match the printed map.
pub fn label_rgb(category: PoiCategory) -> (u8, u8, u8) {
    match category {
        PoiCategory::City => (34, 24, 16),
        other => marker_rgb(other),
    }
}
