//! Retained vector scene produced by the renderer.
//!
//! A [`Scene`] is plain data: painters (the terminal canvas, the SVG writer)
//! walk its elements in order, and pointer handlers query its hit targets.

use ratatui::style::Color;

use crate::document::PointId;
use crate::geometry::{Point2, Rect2};

/// An RGBA paint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f64,
}

impl Paint {
    pub const BLACK: Paint = Paint::rgb(0, 0, 0);
    pub const WHITE: Paint = Paint::rgb(255, 255, 255);
    pub const GREY: Paint = Paint::rgb(128, 128, 128);
    pub const GRID: Paint = Paint::rgb(0xdd, 0xdd, 0xdd);
    pub const YELLOW: Paint = Paint::rgb(0xfc, 0xd3, 0x4d);
    pub const BLUE: Paint = Paint::rgb(0x3b, 0x82, 0xf6);
    pub const PURPLE: Paint = Paint::rgb(0xa8, 0x55, 0xf7);
    pub const RED: Paint = Paint::rgb(0xef, 0x44, 0x44);
    pub const POSITIVE: Paint = Paint::rgb(52, 211, 153);
    pub const NEGATIVE: Paint = Paint::rgb(248, 113, 113);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, alpha: 1.0 }
    }

    pub const fn with_alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }

    /// `#rrggbb`, alpha handled separately by the caller
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Terminal color, blended against a white background
    pub fn to_color(self) -> Color {
        let blend = |c: u8| (f64::from(c) * self.alpha + 255.0 * (1.0 - self.alpha)).round() as u8;
        Color::Rgb(blend(self.r), blend(self.g), blend(self.b))
    }
}

/// Horizontal text anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
}

/// One drawable
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Line {
        from: Point2,
        to: Point2,
        stroke: Paint,
        width: f64,
    },
    Rect {
        rect: Rect2,
        fill: Paint,
        radius: f64,
    },
    Circle {
        center: Point2,
        radius: f64,
        fill: Option<Paint>,
        stroke: Option<(Paint, f64)>,
    },
    Polyline {
        points: Vec<Point2>,
        stroke: Paint,
        width: f64,
    },
    Text {
        at: Point2,
        text: String,
        size: f64,
        fill: Paint,
        anchor: Anchor,
    },
    /// `content` painted everywhere except inside `holes`
    Masked {
        holes: Vec<Element>,
        content: Vec<Element>,
    },
}

impl Element {
    /// Whether `p` lies inside the filled area of this element
    pub fn covers(&self, p: Point2) -> bool {
        match self {
            Element::Rect { rect, .. } => rect.contains(p),
            Element::Circle { center, radius, .. } => center.distance(p) <= *radius,
            Element::Masked { holes, content } => {
                !holes.iter().any(|h| h.covers(p)) && content.iter().any(|c| c.covers(p))
            }
            _ => false,
        }
    }
}

/// What a pointer press lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    Point(PointId),
    Delete(PointId),
    /// Insert a new point at this position
    Insert(usize),
}

impl HitKind {
    fn priority(self) -> u8 {
        match self {
            HitKind::Delete(_) => 0,
            HitKind::Insert(_) => 1,
            HitKind::Point(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitTarget {
    pub kind: HitKind,
    pub center: Point2,
    pub radius: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub width: f64,
    pub height: f64,
    pub elements: Vec<Element>,
    pub hit_targets: Vec<HitTarget>,
}

impl Scene {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn add_target(&mut self, kind: HitKind, center: Point2, radius: f64) {
        self.hit_targets.push(HitTarget {
            kind,
            center,
            radius,
        });
    }

    /// Target under `p`. Controls win over markers; among equals the nearest wins.
    pub fn hit_test(&self, p: Point2) -> Option<HitKind> {
        self.hit_targets
            .iter()
            .filter(|t| t.center.distance(p) <= t.radius)
            .min_by(|a, b| {
                a.kind
                    .priority()
                    .cmp(&b.kind.priority())
                    .then(a.center.distance(p).total_cmp(&b.center.distance(p)))
            })
            .map(|t| t.kind)
    }

    /// Marker (not control) under `p`
    pub fn point_at(&self, p: Point2) -> Option<PointId> {
        self.hit_targets
            .iter()
            .filter(|t| matches!(t.kind, HitKind::Point(_)) && t.center.distance(p) <= t.radius)
            .min_by(|a, b| a.center.distance(p).total_cmp(&b.center.distance(p)))
            .and_then(|t| match t.kind {
                HitKind::Point(id) => Some(id),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_blends_toward_white() {
        assert_eq!(Paint::BLACK.to_color(), Color::Rgb(0, 0, 0));
        assert_eq!(Paint::BLACK.with_alpha(0.5).to_color(), Color::Rgb(128, 128, 128));
        assert_eq!(Paint::YELLOW.to_hex(), "#fcd34d");
    }

    #[test]
    fn controls_take_priority_over_markers() {
        let mut scene = Scene::new(100.0, 100.0);
        scene.add_target(HitKind::Point(PointId(1)), Point2::new(50.0, 50.0), 32.0);
        scene.add_target(HitKind::Delete(PointId(1)), Point2::new(50.0, 30.0), 10.0);

        assert_eq!(scene.hit_test(Point2::new(50.0, 32.0)), Some(HitKind::Delete(PointId(1))));
        assert_eq!(scene.hit_test(Point2::new(50.0, 60.0)), Some(HitKind::Point(PointId(1))));
        assert_eq!(scene.point_at(Point2::new(50.0, 32.0)), Some(PointId(1)));
        assert_eq!(scene.hit_test(Point2::new(0.0, 0.0)), None);
    }

    #[test]
    fn nearest_marker_wins() {
        let mut scene = Scene::new(200.0, 100.0);
        scene.add_target(HitKind::Point(PointId(1)), Point2::new(75.0, 50.0), 32.0);
        scene.add_target(HitKind::Point(PointId(2)), Point2::new(100.0, 50.0), 32.0);
        assert_eq!(scene.point_at(Point2::new(95.0, 50.0)), Some(PointId(2)));
    }

    #[test]
    fn masked_coverage_excludes_holes() {
        let masked = Element::Masked {
            holes: vec![Element::Circle {
                center: Point2::new(10.0, 10.0),
                radius: 5.0,
                fill: Some(Paint::BLACK),
                stroke: None,
            }],
            content: vec![Element::Rect {
                rect: Rect2 { x: 0.0, y: 0.0, width: 100.0, height: 100.0 },
                fill: Paint::YELLOW,
                radius: 0.0,
            }],
        };
        assert!(!masked.covers(Point2::new(10.0, 10.0)));
        assert!(masked.covers(Point2::new(50.0, 50.0)));
    }
}
