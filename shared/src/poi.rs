use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::border::Nation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoiCategory {
    City,
    River,
    Steading,
    Other,
}

impl PoiCategory {
    pub fn label(self) -> &'static str {
        match self {
            PoiCategory::City => "City",
            PoiCategory::River => "River",
            PoiCategory::Steading => "Steading",
            PoiCategory::Other => "Landmark",
        }
    }
}

/// A named, searchable location in base map pixels (zoom 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub category: PoiCategory,
    pub x: f64,
    pub y: f64,
}

/// One labelled coordinate as it appears in `poi.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledCoord {
    #[serde(default)]
    pub label: String,
    pub coord: [f64; 2],
}

/// On-disk layout of `poi.json`, shared by the viewer and the annotate tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoiDocument {
    pub cities: Vec<LabeledCoord>,
    pub rivers: Vec<LabeledCoord>,
    pub steddings: Vec<LabeledCoord>,
    pub portal_stones: Vec<LabeledCoord>,
    pub nations: Vec<Nation>,
}

#[derive(Debug, Error)]
pub enum PoiError {
    #[error("invalid POI document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("POI `{name}` has a non-finite coordinate")]
    BadCoordinate { name: String },
}

/// Immutable set of points of interest plus the nation borders drawn over them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoiSet {
    points: Vec<PointOfInterest>,
    nations: Vec<Nation>,
}

impl PoiSet {
    pub fn new(points: Vec<PointOfInterest>, nations: Vec<Nation>) -> Self {
        Self { points, nations }
    }

    pub fn from_json(json: &str) -> Result<Self, PoiError> {
        let doc: PoiDocument = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    pub fn from_document(doc: PoiDocument) -> Result<Self, PoiError> {
        let groups = [
            (doc.cities, PoiCategory::City),
            (doc.rivers, PoiCategory::River),
            (doc.steddings, PoiCategory::Steading),
            (doc.portal_stones, PoiCategory::Other),
        ];

        let mut points = Vec::new();
        for (entries, category) in groups {
            for entry in entries {
                let [x, y] = entry.coord;
                if !x.is_finite() || !y.is_finite() {
                    return Err(PoiError::BadCoordinate { name: entry.label });
                }
                // Unlabelled portal stones are drawn but can't be searched for.
                if entry.label.trim().is_empty() {
                    continue;
                }
                points.push(PointOfInterest {
                    name: entry.label,
                    category,
                    x,
                    y,
                });
            }
        }

        Ok(Self {
            points,
            nations: doc.nations,
        })
    }

    pub fn points(&self) -> &[PointOfInterest] {
        &self.points
    }

    pub fn nations(&self) -> &[Nation] {
        &self.nations
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Case-insensitive exact name lookup.
    pub fn find_by_name(&self, name: &str) -> Option<&PointOfInterest> {
        let needle = name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.points
            .iter()
            .find(|poi| poi.name.to_lowercase() == needle)
    }
}
