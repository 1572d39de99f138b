use serde::{Deserialize, Serialize};

/// Alpha applied to every border stroke regardless of the colour in the data file.
pub const BORDER_ALPHA: u8 = 191;
const FALLBACK_RGB: (u8, u8, u8) = (255, 0, 0);

/// A nation outline: ordered control points smoothed at draw time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub border: Vec<[f64; 2]>,
}

impl Nation {
    /// Stroke colour as RGBA with the fixed border alpha.
    pub fn rgba(&self) -> (u8, u8, u8, u8) {
        let (r, g, b) = parse_rgb(&self.color).unwrap_or(FALLBACK_RGB);
        (r, g, b, BORDER_ALPHA)
    }

    /// Smoothed outline in map pixels.
    pub fn outline(&self, samples_per_segment: usize) -> Vec<(f64, f64)> {
        let points: Vec<(f64, f64)> = self.border.iter().map(|p| (p[0], p[1])).collect();
        catmull_rom(&points, samples_per_segment, false)
    }
}

/// Parse `rgb(r, g, b)` (case-insensitive, whitespace tolerant).
pub fn parse_rgb(s: &str) -> Option<(u8, u8, u8)> {
    let s = s.trim();
    let lower = s.to_ascii_lowercase();
    let inner = lower.strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<u8>());
    let r = parts.next()?.ok()?;
    let g = parts.next()?.ok()?;
    let b = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((r, g, b))
}

/// Sample a Catmull-Rom spline through `points`.
///
/// The first and last points are duplicated as phantom control points for open
/// curves; closed curves wrap around. The final input point is always emitted.
pub fn catmull_rom(points: &[(f64, f64)], samples_per_segment: usize, closed: bool) -> Vec<(f64, f64)> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let samples = samples_per_segment.max(1);

    let mut pts = Vec::with_capacity(points.len() + 3);
    if closed {
        pts.push(points[points.len() - 1]);
        pts.extend_from_slice(points);
        pts.push(points[0]);
        pts.push(points[1]);
    } else {
        pts.push(points[0]);
        pts.extend_from_slice(points);
        pts.push(points[points.len() - 1]);
    }

    let mut out = Vec::with_capacity((pts.len() - 3) * samples + 1);
    for i in 1..pts.len() - 2 {
        let (p0, p1, p2, p3) = (pts[i - 1], pts[i], pts[i + 1], pts[i + 2]);
        for j in 0..samples {
            let t = j as f64 / samples as f64;
            out.push((
                segment(p0.0, p1.0, p2.0, p3.0, t),
                segment(p0.1, p1.1, p2.1, p3.1, t),
            ));
        }
    }
    out.push(points[points.len() - 1]);
    out
}

fn segment(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}
