use std::cmp::Ordering;

use crate::poi::PointOfInterest;

/// Case-insensitive substring search over POI names.
///
/// Names starting with the query come first, then any other name containing it.
/// Within each group results are ordered alphabetically. A blank query matches
/// nothing.
pub fn search<'a>(points: &'a [PointOfInterest], query: &str) -> Vec<&'a PointOfInterest> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<(bool, String, &PointOfInterest)> = points
        .iter()
        .filter_map(|poi| {
            let name = poi.name.to_lowercase();
            let pos = name.find(&needle)?;
            Some((pos == 0, name, poi))
        })
        .collect();

    hits.sort_by(|a, b| match (a.0, b.0) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.1.cmp(&b.1).then_with(|| a.2.name.cmp(&b.2.name)),
    });

    hits.into_iter().map(|(_, _, poi)| poi).collect()
}
