//! Zone geometry.
//!
//! Operator-drawn zones are closed polygons in frame coordinates. A detection
//! participates in alerting only when its bounding-box centroid passes the
//! camera's zone filter:
//!
//! - inside at least one inclusion zone (a camera with no inclusion zones
//!   treats the whole frame as included), and
//! - inside no exclusion zone.
//!
//! Point-in-polygon uses even-odd ray casting. Points exactly on an edge are
//! deliberately unspecified; callers must not rely on edge-exact behavior.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A point in frame pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box, `x1 <= x2`, `y1 <= y2`, in frame coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> i32 {
        (self.x2 - self.x1).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.y2 - self.y1).max(0)
    }

    pub fn area(&self) -> i64 {
        self.width() as i64 * self.height() as i64
    }

    pub fn centroid(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2, (self.y1 + self.y2) / 2)
    }

    /// Expand by `padding` on every side, clamped to `[0, width) x [0, height)`.
    pub fn padded(&self, padding: i32, frame_width: u32, frame_height: u32) -> BBox {
        BBox {
            x1: (self.x1 - padding).max(0),
            y1: (self.y1 - padding).max(0),
            x2: (self.x2 + padding).min(frame_width as i32),
            y2: (self.y2 + padding).min(frame_height as i32),
        }
    }

    /// Shift by a crop origin, mapping crop-local coordinates back to the frame.
    pub fn translated(&self, dx: i32, dy: i32) -> BBox {
        BBox {
            x1: self.x1 + dx,
            y1: self.y1 + dy,
            x2: self.x2 + dx,
            y2: self.y2 + dy,
        }
    }

    /// Intersection-over-union with another box.
    pub fn iou(&self, other: &BBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = ((ix2 - ix1).max(0) as i64) * ((iy2 - iy1).max(0) as i64);
        let union = self.area() + other.area() - inter;
        if union <= 0 {
            return 0.0;
        }
        inter as f32 / union as f32
    }
}

/// Role a zone plays in the filter decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneRole {
    Inclusion,
    Exclusion,
}

/// An operator-defined polygon zone. Immutable once loaded.
#[derive(Clone, Debug, Deserialize)]
pub struct Zone {
    pub role: ZoneRole,
    pub points: Vec<Point>,
}

impl Zone {
    pub fn new(role: ZoneRole, points: Vec<Point>) -> Result<Self> {
        if points.len() < 3 {
            return Err(anyhow!(
                "zone polygon needs at least 3 points, got {}",
                points.len()
            ));
        }
        Ok(Self { role, points })
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.points)
    }
}

/// Even-odd ray casting: cast a ray in +x and count edge crossings.
///
/// For each edge, a crossing is counted only when the point's y lies within
/// the edge's y-extent with one bound inclusive and one exclusive (so a
/// shared vertex is not double counted) and the ray's x-intersection lies at
/// or beyond the point. Horizontal edges never contribute.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let x = point.x as f64;
    let y = point.y as f64;
    let mut inside = false;

    let n = polygon.len();
    let mut p1 = polygon[0];
    for i in 1..=n {
        let p2 = polygon[i % n];
        let (p1x, p1y) = (p1.x as f64, p1.y as f64);
        let (p2x, p2y) = (p2.x as f64, p2.y as f64);

        if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) && p1y != p2y {
            let x_intersection = (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x;
            if p1x == p2x || x <= x_intersection {
                inside = !inside;
            }
        }
        p1 = p2;
    }

    inside
}

/// Per-camera zone filter. Built once from config, read-only afterwards.
#[derive(Clone, Debug, Default)]
pub struct ZoneFilter {
    inclusion: Vec<Zone>,
    exclusion: Vec<Zone>,
}

impl ZoneFilter {
    pub fn new(zones: Vec<Zone>) -> Self {
        let (inclusion, exclusion) = zones
            .into_iter()
            .partition(|zone| zone.role == ZoneRole::Inclusion);
        Self {
            inclusion,
            exclusion,
        }
    }

    /// True when the filter has no zones at all (everything passes).
    pub fn is_unrestricted(&self) -> bool {
        self.inclusion.is_empty() && self.exclusion.is_empty()
    }

    /// Zone decision for a detection centroid.
    pub fn allows(&self, point: Point) -> bool {
        let included = self.inclusion.is_empty()
            || self.inclusion.iter().any(|zone| zone.contains(point));
        if !included {
            return false;
        }
        !self.exclusion.iter().any(|zone| zone.contains(point))
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.inclusion.iter().chain(self.exclusion.iter())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
