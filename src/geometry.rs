//! Coordinate transforms between data space and screen space.
//!
//! Data space is (sequence coordinate, offset percentage). The sequence
//! coordinate is the point's grid index in scene units (`(position + 1) * GRID_UNIT`),
//! the offset is a percentage where 0 is the top extreme, 50 the center line and
//! 100 the bottom extreme. [`Plot::project`] is the only place the
//! horizontal/vertical axis swap happens; every drawable goes through it.

use serde::{Deserialize, Serialize};

/// Distance between consecutive points along the sequence axis, in scene units
pub const GRID_UNIT: f64 = 75.0;

/// Number of hash marks on each side of the center line
pub const HASH_COUNT: usize = 10;

/// Offset distance between neighbouring hash marks, in percent
pub const HASH_STEP: f64 = 50.0 / HASH_COUNT as f64;

/// The 21 settled offsets a point may rest on
pub const HASH_POINTS: [f64; HASH_COUNT * 2 + 1] = [
    0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0, 60.0, 65.0, 70.0, 75.0,
    80.0, 85.0, 90.0, 95.0, 100.0,
];

/// Center line offset
pub const CENTER: f64 = 50.0;

/// Visible marker radius
pub const POINT_RADIUS: f64 = 8.0;

/// Invisible hit-circle radius around each marker
pub const HIT_RADIUS: f64 = 32.0;

/// Extent of the offset axis used by print export, in scene units
pub const PRINT_EXTENT: f64 = 600.0;

/// Convert a pixel position into a percentage of `total`, clamped to `[0, 100]`.
///
/// A zero (or non-finite) `total` means the drawing has no measured size yet;
/// the center line is returned in that case.
pub fn to_percent(pos: f64, total: f64) -> f64 {
    if total == 0.0 || !total.is_finite() {
        return CENTER;
    }
    (pos / total * 100.0).clamp(0.0, 100.0)
}

/// Inverse of [`to_percent`], clamped to `[0, total]`.
pub fn from_percent(pct: f64, total: f64) -> f64 {
    if total == 0.0 || !total.is_finite() {
        return 0.0;
    }
    (pct / 100.0 * total).clamp(0.0, total)
}

/// Snap an offset to the nearest hash mark.
///
/// Ties resolve to the first hash mark encountered in ascending order.
pub fn snap_to_hash_mark(offset: f64) -> f64 {
    HASH_POINTS
        .iter()
        .copied()
        .reduce(|best, candidate| {
            if (candidate - offset).abs() < (best - offset).abs() {
                candidate
            } else {
                best
            }
        })
        .unwrap_or(CENTER)
}

/// Sequence coordinate of the point at `position` (zero based)
pub fn grid_index(position: usize) -> f64 {
    (position + 1) as f64 * GRID_UNIT
}

/// Layout orientation of the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Sequence runs left to right, offset top to bottom
    #[default]
    Horizontal,
    /// Sequence runs top to bottom, offset right ("above") to left ("below")
    Vertical,
}

impl Orientation {
    pub fn toggled(self) -> Self {
        match self {
            Orientation::Horizontal => Orientation::Vertical,
            Orientation::Vertical => Orientation::Horizontal,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Horizontal => "horizontal",
            Orientation::Vertical => "vertical",
        }
    }
}

/// A position in scene units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn midpoint(self, other: Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Axis-aligned rectangle in scene units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect2 {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect2 {
    /// Build from two corners in any order
    pub fn from_corners(a: Point2, b: Point2) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// The drawing surface: its orientation and its size in scene units.
///
/// Every drawable maps (sequence, offset) through [`Plot::project`], and every
/// pointer position maps back through [`Plot::offset_at`] / [`Plot::sequence_at`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plot {
    pub orientation: Orientation,
    pub width: f64,
    pub height: f64,
}

impl Plot {
    pub fn new(orientation: Orientation, width: f64, height: f64) -> Self {
        Self {
            orientation,
            width,
            height,
        }
    }

    /// Size of the axis offsets are measured along
    pub fn offset_extent(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.height,
            Orientation::Vertical => self.width,
        }
    }

    /// Size of the axis the sequence runs along
    pub fn sequence_extent(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.width,
            Orientation::Vertical => self.height,
        }
    }

    /// Map a data-space pair to a scene position.
    ///
    /// In vertical orientation the offset sense is inverted: screen-left is the
    /// "below center" extreme.
    pub fn project(&self, sequence: f64, offset: f64) -> Point2 {
        match self.orientation {
            Orientation::Horizontal => Point2::new(sequence, from_percent(offset, self.height)),
            Orientation::Vertical => {
                Point2::new(from_percent(100.0 - offset, self.width), sequence)
            }
        }
    }

    /// Move `p` by `distance` across the sequence axis, toward the
    /// above-center extreme
    pub fn lift(&self, p: Point2, distance: f64) -> Point2 {
        match self.orientation {
            Orientation::Horizontal => Point2::new(p.x, p.y - distance),
            Orientation::Vertical => Point2::new(p.x + distance, p.y),
        }
    }

    /// Unsnapped offset under a scene position
    pub fn offset_at(&self, p: Point2) -> f64 {
        match self.orientation {
            Orientation::Horizontal => to_percent(p.y, self.height),
            Orientation::Vertical => 100.0 - to_percent(p.x, self.width),
        }
    }

    /// Sequence coordinate under a scene position
    pub fn sequence_at(&self, p: Point2) -> f64 {
        match self.orientation {
            Orientation::Horizontal => p.x,
            Orientation::Vertical => p.y,
        }
    }

    /// Scene distance between neighbouring hash marks
    pub fn hash_spacing(&self) -> f64 {
        self.offset_extent() * HASH_STEP / 100.0
    }

    /// Rectangle spanning `[seq_from, seq_to]` along the sequence axis and
    /// `[offset_from, offset_to]` along the offset axis
    pub fn span(&self, seq_from: f64, seq_to: f64, offset_from: f64, offset_to: f64) -> Rect2 {
        Rect2::from_corners(
            self.project(seq_from, offset_from),
            self.project(seq_to, offset_to),
        )
    }

    /// Full-width strip across the offset axis centred on `sequence`
    pub fn band(&self, sequence: f64, thickness: f64) -> Rect2 {
        self.span(
            sequence - thickness / 2.0,
            sequence + thickness / 2.0,
            0.0,
            100.0,
        )
    }

    /// Whether the sequence coordinate of `p` lies within half a grid unit of `sequence`
    pub fn near_slot(&self, p: Point2, sequence: f64) -> bool {
        (self.sequence_at(p) - sequence).abs() < GRID_UNIT / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hash_points_are_evenly_spaced() {
        assert_eq!(HASH_POINTS.len(), 21);
        for pair in HASH_POINTS.windows(2) {
            assert!((pair[1] - pair[0] - HASH_STEP).abs() < 1e-9);
        }
    }

    #[test]
    fn to_percent_guards_zero_size() {
        assert_eq!(to_percent(40.0, 0.0), 50.0);
        assert_eq!(from_percent(40.0, 0.0), 0.0);
    }

    #[test]
    fn to_percent_clamps() {
        assert_eq!(to_percent(-10.0, 200.0), 0.0);
        assert_eq!(to_percent(300.0, 200.0), 100.0);
        assert_eq!(to_percent(50.0, 200.0), 25.0);
        assert_eq!(from_percent(150.0, 200.0), 200.0);
        assert_eq!(from_percent(25.0, 200.0), 50.0);
    }

    #[test]
    fn snap_picks_nearest_and_breaks_ties_low() {
        assert_eq!(snap_to_hash_mark(11.0), 10.0);
        assert_eq!(snap_to_hash_mark(13.0), 15.0);
        assert_eq!(snap_to_hash_mark(2.5), 0.0);
        assert_eq!(snap_to_hash_mark(7.5), 5.0);
        assert_eq!(snap_to_hash_mark(-20.0), 0.0);
        assert_eq!(snap_to_hash_mark(140.0), 100.0);
    }

    #[test]
    fn grid_index_is_one_based() {
        assert_eq!(grid_index(0), 75.0);
        assert_eq!(grid_index(2), 225.0);
    }

    #[test]
    fn horizontal_projection() {
        let plot = Plot::new(Orientation::Horizontal, 1000.0, 600.0);
        assert_eq!(plot.project(150.0, 25.0), Point2::new(150.0, 150.0));
        assert_eq!(plot.offset_at(Point2::new(0.0, 150.0)), 25.0);
        assert_eq!(plot.sequence_at(Point2::new(150.0, 0.0)), 150.0);
        assert_eq!(plot.hash_spacing(), 30.0);
    }

    #[test]
    fn vertical_projection_swaps_and_inverts() {
        let plot = Plot::new(Orientation::Vertical, 400.0, 1000.0);
        // offset 25 is above center, which lands right of the midline
        assert_eq!(plot.project(150.0, 25.0), Point2::new(300.0, 150.0));
        assert_eq!(plot.offset_at(Point2::new(300.0, 0.0)), 25.0);
        assert_eq!(plot.sequence_at(Point2::new(0.0, 150.0)), 150.0);
        assert_eq!(plot.hash_spacing(), 20.0);
    }

    #[test]
    fn band_spans_offset_axis() {
        let h = Plot::new(Orientation::Horizontal, 1000.0, 600.0);
        assert_eq!(h.band(150.0, 75.0), Rect2 { x: 112.5, y: 0.0, width: 75.0, height: 600.0 });
        let v = Plot::new(Orientation::Vertical, 400.0, 1000.0);
        assert_eq!(v.band(150.0, 75.0), Rect2 { x: 0.0, y: 112.5, width: 400.0, height: 75.0 });
    }

    proptest! {
        #[test]
        fn snap_is_idempotent(x in 0.0f64..=100.0) {
            let once = snap_to_hash_mark(x);
            prop_assert_eq!(snap_to_hash_mark(once), once);
            prop_assert!(HASH_POINTS.contains(&once));
            prop_assert!((once - x).abs() <= HASH_STEP / 2.0 + 1e-9);
        }

        #[test]
        fn percent_stays_in_range(pos in -1e4f64..1e4, total in 1.0f64..5e3) {
            let pct = to_percent(pos, total);
            prop_assert!((0.0..=100.0).contains(&pct));
            let px = from_percent(pct, total);
            prop_assert!((0.0..=total).contains(&px));
        }

        #[test]
        fn projection_round_trips_offset(offset in 0.0f64..=100.0, seq in 0.0f64..2000.0, vertical in any::<bool>()) {
            let orientation = if vertical { Orientation::Vertical } else { Orientation::Horizontal };
            let plot = Plot::new(orientation, 800.0, 600.0);
            let p = plot.project(seq, offset);
            prop_assert!((plot.offset_at(p) - offset).abs() < 1e-9);
            prop_assert!((plot.sequence_at(p) - seq).abs() < 1e-9);
        }
    }
}
