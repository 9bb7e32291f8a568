//! Scene construction for the chart.
//!
//! [`render_scene`] turns a flow (or a reorder preview of it) plus the view
//! settings into a [`Scene`]. Every position goes through [`Plot::project`],
//! so both orientations share one code path.

use serde::{Deserialize, Serialize};

use crate::document::{Flow, Point, PointId, Tag};
use crate::geometry::{
    grid_index, snap_to_hash_mark, Orientation, Plot, Point2, Rect2, CENTER, GRID_UNIT,
    HASH_POINTS, HIT_RADIUS, POINT_RADIUS,
};
use crate::scene::{Element, HitKind, Paint, Scene};
use crate::score::{compute_scores, cumulative_segments, score_to_offset};

/// Half length of a hash-mark tick, in scene units
const TICK: f64 = 6.0;

/// Cumulative bar thickness as a fraction of the grid unit
const BAR_FRACTION: f64 = 0.8;

const CONTROL_RADIUS: f64 = 8.0;

/// Screen distance from a marker to its delete control
const DELETE_LIFT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CumulativeMode {
    #[default]
    None,
    Bars,
    Line,
}

impl CumulativeMode {
    pub fn cycle(self) -> Self {
        match self {
            CumulativeMode::None => CumulativeMode::Bars,
            CumulativeMode::Bars => CumulativeMode::Line,
            CumulativeMode::Line => CumulativeMode::None,
        }
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            CumulativeMode::None => None,
            CumulativeMode::Bars => Some("Cumulative Bars"),
            CumulativeMode::Line => Some("Cumulative Line"),
        }
    }
}

/// Category overlay selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutoutMode {
    #[default]
    None,
    A,
    B,
    Both,
}

impl CutoutMode {
    pub fn cycle(self) -> Self {
        match self {
            CutoutMode::None => CutoutMode::A,
            CutoutMode::A => CutoutMode::B,
            CutoutMode::B => CutoutMode::Both,
            CutoutMode::Both => CutoutMode::None,
        }
    }

    pub fn is_active(self) -> bool {
        self != CutoutMode::None
    }

    /// Whether a point belongs to the highlighted category
    pub fn includes(self, flow: &Flow, id: PointId) -> bool {
        match self {
            CutoutMode::None => true,
            CutoutMode::A => flow.has_tag(id, Tag::A),
            CutoutMode::B => flow.has_tag(id, Tag::B),
            CutoutMode::Both => flow.has_tag(id, Tag::A) && flow.has_tag(id, Tag::B),
        }
    }

    pub fn paint(self) -> Paint {
        match self {
            CutoutMode::None | CutoutMode::A => Paint::YELLOW,
            CutoutMode::B => Paint::BLUE,
            CutoutMode::Both => Paint::PURPLE,
        }
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            CutoutMode::None => None,
            CutoutMode::A => Some("Yellow Cutout"),
            CutoutMode::B => Some("Blue Cutout"),
            CutoutMode::Both => Some("Yellow+Blue Cutout"),
        }
    }
}

/// Pointer class of the device; affects affordances only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceClass {
    #[default]
    Mouse,
    Touch,
}

/// Display settings for one chart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub orientation: Orientation,
    pub cumulative: CumulativeMode,
    pub cutout: CutoutMode,
    pub show_points: bool,
    pub edit_mode: bool,
    pub device: DeviceClass,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            orientation: Orientation::Horizontal,
            cumulative: CumulativeMode::None,
            cutout: CutoutMode::None,
            show_points: true,
            edit_mode: false,
            device: DeviceClass::Mouse,
        }
    }
}

/// Output the scene is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Interactive,
    Print,
}

/// Everything the renderer reads
#[derive(Debug, Clone)]
pub struct RenderInput<'a> {
    /// Owner of the tag sets
    pub flow: &'a Flow,
    /// Ordering to draw: the committed points or a reorder preview
    pub points: &'a [Point],
    pub view: ViewState,
    pub target: Target,
    pub plot: Plot,
    /// Offset drag in progress
    pub live_offset: Option<(PointId, f64)>,
    pub cursor: Option<Point2>,
    pub hovered: Option<PointId>,
    /// Row being reordered
    pub highlighted: Option<PointId>,
    pub selected: Option<PointId>,
    /// Flow-switch transition in progress
    pub veil: bool,
}

impl<'a> RenderInput<'a> {
    pub fn new(flow: &'a Flow, points: &'a [Point], view: ViewState, target: Target, plot: Plot) -> Self {
        Self {
            flow,
            points,
            view,
            target,
            plot,
            live_offset: None,
            cursor: None,
            hovered: None,
            highlighted: None,
            selected: None,
            veil: false,
        }
    }

    fn interactive(&self) -> bool {
        self.target == Target::Interactive
    }

    fn mouse(&self) -> bool {
        self.view.device == DeviceClass::Mouse
    }
}

/// Sequence extent needed to show `count` points with a spare slot
pub fn sequence_extent_for(count: usize, minimum: f64) -> f64 {
    ((count + 2) as f64 * GRID_UNIT).max(minimum)
}

/// Points with any in-flight offset drag applied
fn effective_points(input: &RenderInput<'_>) -> Vec<Point> {
    input
        .points
        .iter()
        .map(|p| match input.live_offset {
            Some((id, offset)) if id == p.id => Point {
                offset,
                ..p.clone()
            },
            _ => p.clone(),
        })
        .collect()
}

pub fn render_scene(input: &RenderInput<'_>) -> Scene {
    let plot = input.plot;
    let mut scene = Scene::new(plot.width, plot.height);
    scene.push(Element::Rect {
        rect: full_rect(&plot),
        fill: Paint::WHITE,
        radius: 0.0,
    });

    let points = effective_points(input);
    let positions: Vec<Point2> = points
        .iter()
        .enumerate()
        .map(|(i, p)| plot.project(grid_index(i), p.offset))
        .collect();

    draw_grid(&mut scene, input);
    draw_faces(&mut scene, &plot);
    draw_next_point_preview(&mut scene, input);

    match input.view.cumulative {
        CumulativeMode::None => {}
        CumulativeMode::Bars => draw_cumulative_bars(&mut scene, input, &points),
        CumulativeMode::Line => draw_cumulative_line(&mut scene, input, &points),
    }

    if input.view.show_points {
        draw_connections(&mut scene, input, &positions);
        draw_markers(&mut scene, input, &points, &positions);
    }

    if input.interactive() && input.live_offset.is_none() {
        if input.view.edit_mode {
            draw_delete_controls(&mut scene, &plot, &points, &positions);
        }
        if input.mouse() {
            draw_insert_controls(&mut scene, input, &positions);
        }
    }

    if input.view.cutout.is_active() {
        draw_cutout(&mut scene, input, &points, &positions);
    }

    if input.veil {
        scene.push(Element::Rect {
            rect: full_rect(&plot),
            fill: Paint::WHITE.with_alpha(0.7),
            radius: 0.0,
        });
    }

    scene
}

fn full_rect(plot: &Plot) -> Rect2 {
    Rect2 {
        x: 0.0,
        y: 0.0,
        width: plot.width,
        height: plot.height,
    }
}

fn draw_grid(scene: &mut Scene, input: &RenderInput<'_>) {
    let plot = input.plot;
    let print = input.target == Target::Print;
    let color = if print { Paint::GREY } else { Paint::GRID };

    let slots = (plot.sequence_extent() / GRID_UNIT).floor() as usize;
    for slot in 1..=slots {
        let seq = slot as f64 * GRID_UNIT;
        scene.push(Element::Line {
            from: plot.project(seq, 0.0),
            to: plot.project(seq, 100.0),
            stroke: color,
            width: 1.0,
        });
        for &mark in &HASH_POINTS {
            scene.push(Element::Line {
                from: plot.project(seq - TICK, mark),
                to: plot.project(seq + TICK, mark),
                stroke: color,
                width: 1.0,
            });
        }
    }

    scene.push(Element::Line {
        from: plot.project(0.0, CENTER),
        to: plot.project(plot.sequence_extent(), CENTER),
        stroke: if print { Paint::GREY } else { Paint::BLACK },
        width: 1.0,
    });
}

/// Smile at the top extreme, frown at the bottom one
fn draw_faces(scene: &mut Scene, plot: &Plot) {
    draw_face(scene, plot.project(32.0, 10.0), true);
    draw_face(scene, plot.project(32.0, 90.0), false);
}

fn draw_face(scene: &mut Scene, center: Point2, smile: bool) {
    scene.push(Element::Circle {
        center,
        radius: 14.0,
        fill: Some(Paint::YELLOW),
        stroke: Some((Paint::BLACK, 1.5)),
    });
    for dx in [-5.0, 5.0] {
        scene.push(Element::Circle {
            center: Point2::new(center.x + dx, center.y - 4.0),
            radius: 2.0,
            fill: Some(Paint::BLACK),
            stroke: None,
        });
    }
    let mouth = (0..=8)
        .map(|step| {
            let angle = std::f64::consts::PI * f64::from(step) / 8.0;
            let x = center.x - 7.0 * angle.cos();
            let y = if smile {
                center.y + 3.0 + 4.0 * angle.sin()
            } else {
                center.y + 8.0 - 4.0 * angle.sin()
            };
            Point2::new(x, y)
        })
        .collect();
    scene.push(Element::Polyline {
        points: mouth,
        stroke: Paint::BLACK,
        width: 1.5,
    });
}

/// Ghost marker where a click would create the next point
fn draw_next_point_preview(scene: &mut Scene, input: &RenderInput<'_>) {
    if !input.interactive()
        || !input.mouse()
        || input.view.edit_mode
        || input.live_offset.is_some()
        || input.hovered.is_some()
    {
        return;
    }
    let Some(cursor) = input.cursor else {
        return;
    };
    let next = grid_index(input.points.len());
    if !input.plot.near_slot(cursor, next) {
        return;
    }
    let offset = snap_to_hash_mark(input.plot.offset_at(cursor));
    scene.push(Element::Circle {
        center: input.plot.project(next, offset),
        radius: POINT_RADIUS,
        fill: Some(Paint::GREY.with_alpha(0.5)),
        stroke: None,
    });
}

fn cumulative_paint(input: &RenderInput<'_>, positive: bool, normal_alpha: f64) -> Paint {
    let base = if positive { Paint::POSITIVE } else { Paint::NEGATIVE };
    let faded = input.view.edit_mode && input.interactive();
    base.with_alpha(if faded { 0.3 } else { normal_alpha })
}

fn draw_cumulative_bars(scene: &mut Scene, input: &RenderInput<'_>, points: &[Point]) {
    let scores = compute_scores(points);
    let thickness = GRID_UNIT * BAR_FRACTION;
    for (i, &score) in scores.cumulative.iter().enumerate() {
        if score == 0 {
            continue;
        }
        let seq = grid_index(i);
        let rect = input.plot.span(
            seq - thickness / 2.0,
            seq + thickness / 2.0,
            CENTER,
            score_to_offset(f64::from(score)),
        );
        scene.push(Element::Rect {
            rect,
            fill: cumulative_paint(input, score >= 0, 0.4),
            radius: 2.0,
        });
    }
}

fn draw_cumulative_line(scene: &mut Scene, input: &RenderInput<'_>, points: &[Point]) {
    let scores = compute_scores(points);
    for segment in cumulative_segments(&scores.cumulative) {
        let projected = segment
            .points
            .iter()
            .map(|&(seq, score)| input.plot.project(seq, score_to_offset(score)))
            .collect();
        scene.push(Element::Polyline {
            points: projected,
            stroke: cumulative_paint(input, segment.positive, 1.0),
            width: 2.0,
        });
    }
}

fn draw_connections(scene: &mut Scene, input: &RenderInput<'_>, positions: &[Point2]) {
    let width = match input.target {
        Target::Interactive => 2.0,
        Target::Print => 3.0,
    };
    for pair in positions.windows(2) {
        scene.push(Element::Line {
            from: pair[0],
            to: pair[1],
            stroke: Paint::BLACK,
            width,
        });
    }
}

fn draw_markers(scene: &mut Scene, input: &RenderInput<'_>, points: &[Point], positions: &[Point2]) {
    for (point, &center) in points.iter().zip(positions) {
        let offset_dragged = input.live_offset.is_some_and(|(id, _)| id == point.id);
        let reordered = input.highlighted == Some(point.id);
        let selected = input.selected == Some(point.id);

        let (enlarge, fill) = match (input.target, input.view.device) {
            (Target::Print, _) => (false, Paint::BLACK),
            (Target::Interactive, DeviceClass::Touch) => (selected || offset_dragged, Paint::BLACK),
            (Target::Interactive, DeviceClass::Mouse) => {
                let hovered = input.hovered == Some(point.id);
                let fill = if offset_dragged || reordered {
                    Paint::YELLOW
                } else {
                    Paint::BLACK
                };
                (hovered || offset_dragged || reordered || selected, fill)
            }
        };

        scene.push(Element::Circle {
            center,
            radius: if enlarge { POINT_RADIUS * 2.0 } else { POINT_RADIUS },
            fill: Some(fill),
            stroke: None,
        });
        if input.interactive() && !input.view.edit_mode {
            scene.add_target(HitKind::Point(point.id), center, HIT_RADIUS);
        }
    }
}

fn draw_delete_controls(scene: &mut Scene, plot: &Plot, points: &[Point], positions: &[Point2]) {
    for (point, &marker) in points.iter().zip(positions) {
        let center = plot.lift(marker, DELETE_LIFT);
        scene.push(Element::Circle {
            center,
            radius: CONTROL_RADIUS,
            fill: Some(Paint::WHITE),
            stroke: Some((Paint::RED, 1.0)),
        });
        let arm = CONTROL_RADIUS * 0.45;
        for (dx, dy) in [(arm, arm), (arm, -arm)] {
            scene.push(Element::Line {
                from: Point2::new(center.x - dx, center.y - dy),
                to: Point2::new(center.x + dx, center.y + dy),
                stroke: Paint::RED,
                width: 1.5,
            });
        }
        scene.add_target(HitKind::Delete(point.id), center, CONTROL_RADIUS + 4.0);
    }
}

/// "Insert here" controls between consecutive markers; shown on hover
fn draw_insert_controls(scene: &mut Scene, input: &RenderInput<'_>, positions: &[Point2]) {
    for (i, pair) in positions.windows(2).enumerate() {
        let center = pair[0].midpoint(pair[1]);
        let position = i + 1;
        scene.add_target(HitKind::Insert(position), center, CONTROL_RADIUS + 4.0);

        let hovering = input
            .cursor
            .is_some_and(|c| c.distance(center) <= CONTROL_RADIUS + 4.0);
        if !hovering {
            continue;
        }
        scene.push(Element::Circle {
            center,
            radius: CONTROL_RADIUS,
            fill: Some(Paint::WHITE),
            stroke: Some((Paint::GREY, 1.0)),
        });
        let arm = CONTROL_RADIUS * 0.6;
        scene.push(Element::Line {
            from: Point2::new(center.x - arm, center.y),
            to: Point2::new(center.x + arm, center.y),
            stroke: Paint::GREY,
            width: 1.5,
        });
        scene.push(Element::Line {
            from: Point2::new(center.x, center.y - arm),
            to: Point2::new(center.x, center.y + arm),
            stroke: Paint::GREY,
            width: 1.5,
        });
    }
}

/// Solid overlay with holes punched at the members, so the gaps stand out
fn draw_cutout(scene: &mut Scene, input: &RenderInput<'_>, points: &[Point], positions: &[Point2]) {
    let cutout = input.view.cutout;
    let mut holes = Vec::new();
    for (i, (point, &center)) in points.iter().zip(positions).enumerate() {
        if !cutout.includes(input.flow, point.id) {
            continue;
        }
        holes.push(Element::Rect {
            rect: input.plot.band(grid_index(i), GRID_UNIT),
            fill: Paint::BLACK,
            radius: 0.0,
        });
        holes.push(Element::Circle {
            center,
            radius: POINT_RADIUS * 2.0,
            fill: Some(Paint::BLACK),
            stroke: None,
        });
    }
    scene.push(Element::Masked {
        holes,
        content: vec![Element::Rect {
            rect: full_rect(&input.plot),
            fill: cutout.paint(),
            radius: 0.0,
        }],
    });

    if input.view.show_points {
        for (point, &center) in points.iter().zip(positions) {
            if cutout.includes(input.flow, point.id) {
                continue;
            }
            scene.push(Element::Circle {
                center,
                radius: POINT_RADIUS * 2.0,
                fill: Some(Paint::BLACK),
                stroke: None,
            });
        }
    }
}
