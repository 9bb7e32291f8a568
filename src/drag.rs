//! The two drag protocols.
//!
//! [`OffsetDragController`] moves a plotted marker along the offset axis to
//! change its score. [`ReorderDragState`] moves a description row to change
//! the point order. They never share state: a reorder drag never touches an
//! offset and an offset drag never touches the ordering.

use std::time::{Duration, Instant};

use crate::document::{reordered, Point, PointId};
use crate::geometry::{snap_to_hash_mark, Plot, Point2};

/// How long the trailing click of a drop is ignored
pub const DROP_COOLDOWN: Duration = Duration::from_millis(100);

/// Minimum interval between reorder preview recomputations
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(100);

/// An offset drag in progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetDrag {
    pub point_id: PointId,
    pub original_offset: f64,
    /// Unsnapped offset under the pointer, used only for rendering
    pub live_offset: f64,
}

/// Vertical repositioning: idle -> dragging -> drop (always commits)
#[derive(Debug, Clone, Default)]
pub struct OffsetDragController {
    drag: Option<OffsetDrag>,
    just_dropped_until: Option<Instant>,
}

impl OffsetDragController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin dragging `point_id`. Refused while another drag is active.
    pub fn start(&mut self, point_id: PointId, offset: f64) -> bool {
        if self.drag.is_some() {
            return false;
        }
        self.drag = Some(OffsetDrag {
            point_id,
            original_offset: offset,
            live_offset: offset,
        });
        tracing::debug!(%point_id, offset, "offset drag started");
        true
    }

    /// Follow the pointer; the offset axis depends on the plot orientation
    pub fn update(&mut self, pointer: Point2, plot: &Plot) -> Option<f64> {
        let drag = self.drag.as_mut()?;
        drag.live_offset = plot.offset_at(pointer);
        Some(drag.live_offset)
    }

    /// Release: snap the live offset and hand it back for committing.
    ///
    /// Starts the just-dropped cooldown.
    pub fn finish(&mut self, now: Instant) -> Option<(PointId, f64)> {
        let drag = self.drag.take()?;
        self.just_dropped_until = Some(now + DROP_COOLDOWN);
        let snapped = snap_to_hash_mark(drag.live_offset);
        tracing::debug!(point_id = %drag.point_id, offset = snapped, "offset drag dropped");
        Some((drag.point_id, snapped))
    }

    pub fn active(&self) -> Option<&OffsetDrag> {
        self.drag.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Live offset for `id` while it is being dragged
    pub fn live_offset_for(&self, id: PointId) -> Option<f64> {
        self.drag
            .filter(|d| d.point_id == id)
            .map(|d| d.live_offset)
    }

    /// True during the short window after a drop, when clicks must not create points
    pub fn cooldown_active(&self, now: Instant) -> bool {
        self.just_dropped_until.is_some_and(|until| now < until)
    }
}

/// Where a reorder gesture comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputSource {
    #[default]
    Mouse,
    Touch,
}

/// Vertical extent of one rendered description row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowBounds {
    pub position: usize,
    pub top: f64,
    pub bottom: f64,
}

/// Position of the row under `y`, if any
pub fn row_at(rows: &[RowBounds], y: f64) -> Option<usize> {
    rows.iter()
        .find(|row| y >= row.top && y < row.bottom)
        .map(|row| row.position)
}

/// Bookkeeping for one reorder gesture
#[derive(Debug, Clone)]
pub struct ReorderDrag {
    original: Vec<Point>,
    dragged: PointId,
    source: usize,
    input: InputSource,
    /// Most recent hovered position, possibly not yet previewed
    target: Option<usize>,
    preview: Option<(usize, Vec<Point>)>,
    last_preview_at: Option<Instant>,
}

impl ReorderDrag {
    pub fn dragged(&self) -> PointId {
        self.dragged
    }

    pub fn source(&self) -> usize {
        self.source
    }

    pub fn input(&self) -> InputSource {
        self.input
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }
}

/// Coarse phase of the reorder state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderPhase {
    Idle,
    Dragging,
    Previewing,
}

/// Sequence reordering: idle -> dragging -> previewing -> drop | cancel.
///
/// The document is never touched during the gesture; the preview ordering is
/// what gets rendered until the drop commits or the cancel discards it.
#[derive(Debug, Clone, Default)]
pub enum ReorderDragState {
    #[default]
    Idle,
    Dragging(ReorderDrag),
}

impl ReorderDragState {
    pub fn phase(&self) -> ReorderPhase {
        match self {
            ReorderDragState::Idle => ReorderPhase::Idle,
            ReorderDragState::Dragging(drag) if drag.preview.is_some() => ReorderPhase::Previewing,
            ReorderDragState::Dragging(_) => ReorderPhase::Dragging,
        }
    }

    pub fn drag(&self) -> Option<&ReorderDrag> {
        match self {
            ReorderDragState::Idle => None,
            ReorderDragState::Dragging(drag) => Some(drag),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, ReorderDragState::Dragging(_))
    }

    pub fn dragged_id(&self) -> Option<PointId> {
        self.drag().map(|d| d.dragged)
    }

    /// Snapshot the ordering and pick up the row at `position`
    pub fn start(&mut self, points: &[Point], position: usize, input: InputSource) -> bool {
        let Some(point) = points.get(position) else {
            return false;
        };
        tracing::debug!(position, ?input, "reorder drag started");
        *self = ReorderDragState::Dragging(ReorderDrag {
            original: points.to_vec(),
            dragged: point.id,
            source: position,
            input,
            target: None,
            preview: None,
            last_preview_at: None,
        });
        true
    }

    /// Hover over `target`. Returns whether the preview was recomputed.
    pub fn drag_over(&mut self, target: usize, now: Instant) -> bool {
        let ReorderDragState::Dragging(drag) = self else {
            return false;
        };
        drag.target = Some(target);
        self.refresh(now)
    }

    /// Touch variant of [`drag_over`](Self::drag_over): hit-test the pointer
    /// against the rendered rows. Outside every row the last target is kept.
    pub fn touch_move(&mut self, y: f64, rows: &[RowBounds], now: Instant) -> bool {
        match row_at(rows, y) {
            Some(target) => self.drag_over(target, now),
            None => self.refresh(now),
        }
    }

    /// Recompute the preview for the latest target once the debounce allows it.
    ///
    /// Called on hover and from the idle tick, so a target that arrived inside
    /// the debounce window is still previewed once the window closes.
    pub fn refresh(&mut self, now: Instant) -> bool {
        let ReorderDragState::Dragging(drag) = self else {
            return false;
        };
        let Some(target) = drag.target else {
            return false;
        };
        if drag.preview.as_ref().is_some_and(|(shown, _)| *shown == target) {
            return false;
        }
        if drag
            .last_preview_at
            .is_some_and(|at| now.duration_since(at) < PREVIEW_DEBOUNCE)
        {
            return false;
        }
        let preview = reordered(&drag.original, drag.source, target);
        drag.preview = Some((target, preview));
        drag.last_preview_at = Some(now);
        true
    }

    /// Drop on `target`. `None` means no valid target and cancels.
    ///
    /// Returns the `(from, to)` move to commit, if any.
    pub fn drop(&mut self, target: Option<usize>) -> Option<(usize, usize)> {
        let state = std::mem::take(self);
        let ReorderDragState::Dragging(drag) = state else {
            return None;
        };
        let Some(to) = target else {
            tracing::debug!(source = drag.source, "reorder drag cancelled");
            return None;
        };
        tracing::debug!(from = drag.source, to, "reorder drag dropped");
        (drag.source != to).then_some((drag.source, to))
    }

    /// Drop on whatever was hovered last (touch end)
    pub fn release(&mut self) -> Option<(usize, usize)> {
        let target = self.drag().and_then(|d| d.target);
        self.drop(target)
    }

    /// Abandon the gesture; the committed ordering is rendered again
    pub fn cancel(&mut self) {
        if self.is_active() {
            tracing::debug!("reorder drag cancelled");
        }
        *self = ReorderDragState::Idle;
    }

    /// Ordering to render: the preview while one exists, else `committed`
    pub fn ordering<'a>(&'a self, committed: &'a [Point]) -> &'a [Point] {
        match self {
            ReorderDragState::Dragging(ReorderDrag {
                preview: Some((_, preview)),
                ..
            }) => preview.as_slice(),
            _ => committed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;

    fn points(n: u64) -> Vec<Point> {
        let mut pts: Vec<Point> = (1..=n).map(|i| Point::new(PointId(i), 50.0)).collect();
        crate::document::renumber(&mut pts);
        pts
    }

    fn order(pts: &[Point]) -> Vec<u64> {
        pts.iter().map(|p| p.id.0).collect()
    }

    #[test]
    fn offset_drag_commits_snapped_value_on_release() {
        let plot = Plot::new(Orientation::Horizontal, 800.0, 600.0);
        let mut ctl = OffsetDragController::new();
        assert!(ctl.start(PointId(1), 50.0));
        assert!(!ctl.start(PointId(2), 50.0));

        let live = ctl.update(Point2::new(10.0, 126.0), &plot).unwrap();
        assert!((live - 21.0).abs() < 1e-9);
        assert_eq!(ctl.live_offset_for(PointId(1)), Some(live));
        assert_eq!(ctl.live_offset_for(PointId(2)), None);

        let now = Instant::now();
        assert_eq!(ctl.finish(now), Some((PointId(1), 20.0)));
        assert!(!ctl.is_dragging());
        assert!(ctl.finish(now).is_none());
    }

    #[test]
    fn offset_drag_follows_horizontal_pointer_axis_when_vertical() {
        let plot = Plot::new(Orientation::Vertical, 400.0, 900.0);
        let mut ctl = OffsetDragController::new();
        ctl.start(PointId(1), 50.0);
        // far right is the top extreme
        ctl.update(Point2::new(400.0, 5.0), &plot);
        assert_eq!(ctl.finish(Instant::now()), Some((PointId(1), 0.0)));
    }

    #[test]
    fn cooldown_blocks_trailing_click() {
        let mut ctl = OffsetDragController::new();
        let now = Instant::now();
        assert!(!ctl.cooldown_active(now));
        ctl.start(PointId(1), 50.0);
        ctl.finish(now);
        assert!(ctl.cooldown_active(now + Duration::from_millis(50)));
        assert!(!ctl.cooldown_active(now + DROP_COOLDOWN));
    }

    #[test]
    fn update_without_drag_is_ignored() {
        let plot = Plot::new(Orientation::Horizontal, 800.0, 600.0);
        let mut ctl = OffsetDragController::new();
        assert!(ctl.update(Point2::new(0.0, 0.0), &plot).is_none());
    }

    #[test]
    fn reorder_preview_then_drop() {
        let committed = points(3);
        let mut state = ReorderDragState::default();
        assert_eq!(state.phase(), ReorderPhase::Idle);

        let t0 = Instant::now();
        assert!(state.start(&committed, 0, InputSource::Mouse));
        assert_eq!(state.phase(), ReorderPhase::Dragging);
        assert_eq!(state.dragged_id(), Some(PointId(1)));

        assert!(state.drag_over(2, t0));
        assert_eq!(state.phase(), ReorderPhase::Previewing);
        let preview = state.ordering(&committed);
        assert_eq!(order(preview), vec![2, 3, 1]);
        assert_eq!(preview[2].x, 225.0);
        // committed ordering untouched
        assert_eq!(order(&committed), vec![1, 2, 3]);

        assert_eq!(state.drop(Some(2)), Some((0, 2)));
        assert_eq!(state.phase(), ReorderPhase::Idle);
        assert_eq!(order(state.ordering(&committed)), vec![1, 2, 3]);
    }

    #[test]
    fn preview_is_rate_limited_but_catches_up() {
        let committed = points(4);
        let mut state = ReorderDragState::default();
        let t0 = Instant::now();
        state.start(&committed, 0, InputSource::Mouse);

        assert!(state.drag_over(1, t0));
        assert!(!state.drag_over(3, t0 + Duration::from_millis(30)));
        assert_eq!(order(state.ordering(&committed)), vec![2, 1, 3, 4]);

        // the pending target is previewed once the window closes
        assert!(state.refresh(t0 + PREVIEW_DEBOUNCE));
        assert_eq!(order(state.ordering(&committed)), vec![2, 3, 4, 1]);
        assert!(!state.refresh(t0 + PREVIEW_DEBOUNCE * 3));
    }

    #[test]
    fn drop_without_target_cancels() {
        let committed = points(3);
        let mut state = ReorderDragState::default();
        state.start(&committed, 1, InputSource::Mouse);
        state.drag_over(0, Instant::now());
        assert_eq!(state.drop(None), None);
        assert!(!state.is_active());
        assert_eq!(order(state.ordering(&committed)), vec![1, 2, 3]);
    }

    #[test]
    fn drop_on_source_is_noop() {
        let committed = points(3);
        let mut state = ReorderDragState::default();
        state.start(&committed, 1, InputSource::Mouse);
        assert_eq!(state.drop(Some(1)), None);
    }

    #[test]
    fn touch_hit_tests_rows() {
        let committed = points(3);
        let rows: Vec<RowBounds> = (0..3)
            .map(|i| RowBounds {
                position: i,
                top: i as f64 * 10.0,
                bottom: (i + 1) as f64 * 10.0,
            })
            .collect();
        assert_eq!(row_at(&rows, 25.0), Some(2));
        assert_eq!(row_at(&rows, 30.0), None);

        let mut state = ReorderDragState::default();
        let t0 = Instant::now();
        state.start(&committed, 2, InputSource::Touch);
        assert!(state.touch_move(3.0, &rows, t0));
        // leaving the list keeps the last hovered row
        state.touch_move(99.0, &rows, t0 + PREVIEW_DEBOUNCE);
        assert_eq!(state.drag().and_then(|d| d.target()), Some(0));
        assert_eq!(state.release(), Some((2, 0)));
    }

    #[test]
    fn start_out_of_range_is_refused() {
        let mut state = ReorderDragState::default();
        assert!(!state.start(&points(2), 5, InputSource::Mouse));
        assert!(!state.is_active());
    }

    #[test]
    fn cancel_restores_committed_ordering() {
        let committed = points(2);
        let mut state = ReorderDragState::default();
        state.start(&committed, 0, InputSource::Mouse);
        state.drag_over(1, Instant::now());
        state.cancel();
        assert_eq!(order(state.ordering(&committed)), vec![1, 2]);
    }
}
