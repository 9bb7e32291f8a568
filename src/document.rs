//! The point store and flow manager - THE source of truth for all chart data.
//!
//! Every edit goes through [`Document`]. It handles:
//! - Ordered points per flow, with indices kept at `(position + 1) * GRID_UNIT`
//! - Tag memberships, keyed by point id
//! - Flow creation, duplication, deletion and the active-flow selection
//! - The single-slot "undo dot" buffer
//!
//! Operations never fail; out-of-range requests are clamped or ignored.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{grid_index, snap_to_hash_mark, CENTER, GRID_UNIT};
use crate::undo::{RemovedPoint, RemovedPointSlot};

/// Default document name
pub const DEFAULT_FILENAME: &str = "My Drawing";

/// Point identifier - assigned in creation order, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub u64);

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flow identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(pub Uuid);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One plotted event
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: PointId,
    /// Sequence coordinate, always `(position + 1) * GRID_UNIT` once settled
    pub x: f64,
    /// Percentage offset, 0 = top extreme, 50 = center, 100 = bottom extreme
    pub offset: f64,
    pub text: String,
}

impl Point {
    pub fn new(id: PointId, offset: f64) -> Self {
        Self {
            id,
            x: 0.0,
            offset,
            text: String::new(),
        }
    }

    /// Above the center line (scores positive)
    pub fn is_above(&self) -> bool {
        self.offset < CENTER
    }
}

/// The two categorical tags a point can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tag {
    A,
    B,
}

impl Tag {
    pub fn label(self) -> &'static str {
        match self {
            Tag::A => "Yellow",
            Tag::B => "Blue",
        }
    }
}

/// Renumber indices to the canonical grid spacing
pub fn renumber(points: &mut [Point]) {
    for (i, point) in points.iter_mut().enumerate() {
        point.x = grid_index(i);
    }
}

/// Copy of `points` with the item at `from` moved to `to`, renumbered.
///
/// Out-of-range `from` returns the input unchanged; `to` is clamped to the
/// last position.
pub fn reordered(points: &[Point], from: usize, to: usize) -> Vec<Point> {
    let mut out = points.to_vec();
    if from < out.len() && from != to {
        let to = to.min(out.len() - 1);
        let moved = out.remove(from);
        out.insert(to, moved);
    }
    renumber(&mut out);
    out
}

/// An independent named timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    pub id: FlowId,
    pub name: String,
    points: Vec<Point>,
    tag_a: BTreeSet<PointId>,
    tag_b: BTreeSet<PointId>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(FlowId::new(), name)
    }

    pub fn with_id(id: FlowId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            points: Vec::new(),
            tag_a: BTreeSet::new(),
            tag_b: BTreeSet::new(),
        }
    }

    /// Build a flow from stored parts: indices are renumbered, offsets snapped
    /// and tag ids that name no point are dropped.
    pub fn from_parts(
        id: FlowId,
        name: impl Into<String>,
        mut points: Vec<Point>,
        tag_a: impl IntoIterator<Item = PointId>,
        tag_b: impl IntoIterator<Item = PointId>,
    ) -> Self {
        for point in &mut points {
            point.offset = snap_to_hash_mark(point.offset);
        }
        renumber(&mut points);
        let mut flow = Self {
            id,
            name: name.into(),
            points,
            tag_a: tag_a.into_iter().collect(),
            tag_b: tag_b.into_iter().collect(),
        };
        flow.prune_tags();
        flow
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn position_of(&self, id: PointId) -> Option<usize> {
        self.points.iter().position(|p| p.id == id)
    }

    pub fn tag_set(&self, tag: Tag) -> &BTreeSet<PointId> {
        match tag {
            Tag::A => &self.tag_a,
            Tag::B => &self.tag_b,
        }
    }

    fn tag_set_mut(&mut self, tag: Tag) -> &mut BTreeSet<PointId> {
        match tag {
            Tag::A => &mut self.tag_a,
            Tag::B => &mut self.tag_b,
        }
    }

    pub fn has_tag(&self, id: PointId, tag: Tag) -> bool {
        self.tag_set(tag).contains(&id)
    }

    pub fn tags_of(&self, id: PointId) -> Vec<Tag> {
        [Tag::A, Tag::B]
            .into_iter()
            .filter(|&tag| self.has_tag(id, tag))
            .collect()
    }

    /// Give every point a fresh id, carrying tag memberships over
    fn rekey_points(&mut self, mut fresh: impl FnMut() -> PointId) {
        let mut tag_a = BTreeSet::new();
        let mut tag_b = BTreeSet::new();
        for point in &mut self.points {
            let id = fresh();
            if self.tag_a.contains(&point.id) {
                tag_a.insert(id);
            }
            if self.tag_b.contains(&point.id) {
                tag_b.insert(id);
            }
            point.id = id;
        }
        self.tag_a = tag_a;
        self.tag_b = tag_b;
    }

    fn push(&mut self, point: Point) {
        self.points.push(point);
        renumber(&mut self.points);
    }

    fn insert(&mut self, position: usize, mut point: Point) {
        // Start halfway between the neighbours, then collapse onto the grid.
        let before = position.checked_sub(1).map_or(0.0, |i| self.points[i].x);
        let after = self
            .points
            .get(position)
            .map_or(before + GRID_UNIT, |p| p.x);
        point.x = (before + after) / 2.0;
        self.points.insert(position, point);
        renumber(&mut self.points);
    }

    fn remove(&mut self, id: PointId) -> Option<(usize, Point)> {
        let position = self.position_of(id)?;
        let point = self.points.remove(position);
        renumber(&mut self.points);
        self.prune_tags();
        Some((position, point))
    }

    fn clear(&mut self) {
        self.points.clear();
        self.tag_a.clear();
        self.tag_b.clear();
    }

    fn point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        self.points.iter_mut().find(|p| p.id == id)
    }

    fn reorder(&mut self, from: usize, to: usize) {
        self.points = reordered(&self.points, from, to);
    }

    /// Drop tag memberships for ids no longer present
    fn prune_tags(&mut self) {
        let present: BTreeSet<PointId> = self.points.iter().map(|p| p.id).collect();
        self.tag_a.retain(|id| present.contains(id));
        self.tag_b.retain(|id| present.contains(id));
    }
}

/// Trailing number of a flow name ("Flow 12" -> 12)
fn numeric_suffix(name: &str) -> Option<u32> {
    name.rsplit(char::is_whitespace).next()?.parse().ok()
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The persisted unit: every flow, the active selection and the document name
#[derive(Debug, Clone)]
pub struct Document {
    flows: Vec<Flow>,
    active: FlowId,
    pub filename: String,
    removed: RemovedPointSlot,
    last_point_id: u64,
    dirty: bool,
}

impl Default for Document {
    fn default() -> Self {
        let flow = Flow::new("Flow 1");
        Self {
            active: flow.id,
            flows: vec![flow],
            filename: DEFAULT_FILENAME.to_string(),
            removed: RemovedPointSlot::new(),
            last_point_id: 0,
            dirty: false,
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a document from stored flows.
    ///
    /// An empty flow list yields the default document; an unknown active id
    /// selects the first flow.
    pub fn from_flows(flows: Vec<Flow>, active: Option<FlowId>, filename: String) -> Self {
        if flows.is_empty() {
            return Self {
                filename,
                ..Self::default()
            };
        }
        let active = active
            .filter(|id| flows.iter().any(|f| f.id == *id))
            .unwrap_or(flows[0].id);
        let last_point_id = flows
            .iter()
            .flat_map(|f| f.points.iter().map(|p| p.id.0))
            .max()
            .unwrap_or(0);
        let mut doc = Self {
            flows,
            active,
            filename,
            removed: RemovedPointSlot::new(),
            last_point_id,
            dirty: false,
        };
        // No room left above the stored ids: hand out a fresh range.
        if last_point_id == u64::MAX {
            tracing::warn!("stored point ids exhausted, re-keying points");
            let mut next = now_millis();
            for flow in &mut doc.flows {
                flow.rekey_points(|| {
                    let id = PointId(next);
                    next += 1;
                    id
                });
            }
            doc.last_point_id = next - 1;
        }
        doc
    }

    // --- Bookkeeping ---

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// A single flow with no points: nothing worth saving
    pub fn is_blank(&self) -> bool {
        self.flows.len() == 1 && self.flows[0].is_empty()
    }

    fn next_point_id(&mut self) -> PointId {
        let id = now_millis().max(self.last_point_id.saturating_add(1));
        self.last_point_id = id;
        PointId(id)
    }

    // --- Queries ---

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn flow(&self, id: FlowId) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == id)
    }

    pub fn active_flow_id(&self) -> FlowId {
        self.active
    }

    pub fn active_flow(&self) -> &Flow {
        // The active id is kept valid by every flow operation.
        let index = self.active_index();
        &self.flows[index]
    }

    fn active_index(&self) -> usize {
        self.flows
            .iter()
            .position(|f| f.id == self.active)
            .unwrap_or(0)
    }

    fn active_flow_mut(&mut self) -> &mut Flow {
        let index = self.active_index();
        &mut self.flows[index]
    }

    pub fn points(&self) -> &[Point] {
        self.active_flow().points()
    }

    pub fn can_restore_point(&self) -> bool {
        self.removed.can_restore()
    }

    // --- Point operations (active flow) ---

    /// Append a centered point at the next grid slot
    pub fn append_point(&mut self) -> PointId {
        self.append_point_at(CENTER)
    }

    /// Append a point at the next grid slot with the given offset (snapped)
    pub fn append_point_at(&mut self, offset: f64) -> PointId {
        let id = self.next_point_id();
        let point = Point::new(id, snap_to_hash_mark(offset));
        self.active_flow_mut().push(point);
        self.removed.clear();
        self.dirty = true;
        tracing::debug!(%id, offset, "appended point");
        id
    }

    /// Insert a centered point between `position - 1` and `position`.
    ///
    /// Positions are clamped to `1..=len`; an empty flow has no gap to insert
    /// into and is left alone.
    pub fn insert_point_at(&mut self, position: usize) -> Option<PointId> {
        let len = self.active_flow().len();
        if len == 0 {
            tracing::debug!(position, "insert ignored on empty flow");
            return None;
        }
        let clamped = position.clamp(1, len);
        if clamped != position {
            tracing::warn!(position, clamped, "insert position clamped");
        }
        let id = self.next_point_id();
        self.active_flow_mut()
            .insert(clamped, Point::new(id, CENTER));
        self.removed.clear();
        self.dirty = true;
        tracing::debug!(%id, position = clamped, "inserted point");
        Some(id)
    }

    /// Delete a point. Deleting the last point parks it for "redo dot";
    /// deleting any other point empties the slot.
    pub fn delete_point(&mut self, id: PointId) -> bool {
        let was_last = self.points().last().is_some_and(|p| p.id == id);
        let tags = self.active_flow().tags_of(id);
        let Some((position, point)) = self.active_flow_mut().remove(id) else {
            return false;
        };
        if was_last {
            self.removed.store(RemovedPoint { point, tags });
        } else {
            self.removed.clear();
        }
        self.dirty = true;
        tracing::debug!(%id, position, "deleted point");
        true
    }

    /// "Undo dot": take the last point off the end of the active flow
    pub fn remove_last_point(&mut self) -> Option<PointId> {
        let id = self.points().last()?.id;
        self.delete_point(id).then_some(id)
    }

    /// "Redo dot": put the parked point back at the end of the active flow
    pub fn restore_removed_point(&mut self) -> Option<PointId> {
        let RemovedPoint { point, tags } = self.removed.take()?;
        let id = point.id;
        let flow = self.active_flow_mut();
        flow.push(point);
        for tag in tags {
            flow.tag_set_mut(tag).insert(id);
        }
        self.dirty = true;
        tracing::debug!(%id, "restored point");
        Some(id)
    }

    /// Remove every point of the active flow together with its tag sets
    pub fn clear_points(&mut self) {
        self.active_flow_mut().clear();
        self.removed.clear();
        self.dirty = true;
        tracing::debug!("cleared active flow");
    }

    /// Set a point's offset, snapped to the nearest hash mark
    pub fn update_point_offset(&mut self, id: PointId, offset: f64) -> bool {
        let snapped = snap_to_hash_mark(offset);
        let Some(point) = self.active_flow_mut().point_mut(id) else {
            return false;
        };
        point.offset = snapped;
        self.dirty = true;
        tracing::debug!(%id, offset = snapped, "moved point");
        true
    }

    pub fn update_point_text(&mut self, id: PointId, text: impl Into<String>) -> bool {
        let Some(point) = self.active_flow_mut().point_mut(id) else {
            return false;
        };
        point.text = text.into();
        self.dirty = true;
        true
    }

    /// Move the point at `from` to `to`. Out-of-range `from` is ignored,
    /// `to` is clamped to the last position.
    pub fn reorder_points(&mut self, from: usize, to: usize) -> bool {
        let len = self.active_flow().len();
        if from >= len {
            tracing::warn!(from, len, "reorder source out of range");
            return false;
        }
        if from == to.min(len - 1) {
            return false;
        }
        self.active_flow_mut().reorder(from, to);
        self.removed.clear();
        self.dirty = true;
        tracing::debug!(from, to, "reordered points");
        true
    }

    /// Flip a point's membership in a tag set; returns the new membership
    pub fn toggle_tag(&mut self, id: PointId, tag: Tag) -> Option<bool> {
        let flow = self.active_flow_mut();
        flow.point(id)?;
        let set = flow.tag_set_mut(tag);
        let member = if set.remove(&id) {
            false
        } else {
            set.insert(id);
            true
        };
        self.dirty = true;
        Some(member)
    }

    // --- Flow operations ---

    /// "Flow N" with N one past the highest numeric suffix in use
    pub fn next_flow_name(&self) -> String {
        let highest = self
            .flows
            .iter()
            .filter_map(|f| numeric_suffix(&f.name))
            .max()
            .unwrap_or(0);
        format!("Flow {}", highest + 1)
    }

    /// Create an empty flow at the front of the list and make it active
    pub fn create_flow(&mut self) -> FlowId {
        let flow = Flow::new(self.next_flow_name());
        let id = flow.id;
        tracing::info!(%id, name = %flow.name, "created flow");
        self.flows.insert(0, flow);
        self.set_active_flow(id);
        self.dirty = true;
        id
    }

    /// Deep-copy a flow (fresh point ids) right after the source and make it active
    pub fn duplicate_flow(&mut self, source: FlowId) -> Option<FlowId> {
        let index = self.flows.iter().position(|f| f.id == source)?;
        let original = self.flows[index].clone();

        let mut points = Vec::with_capacity(original.points.len());
        let mut tag_a = BTreeSet::new();
        let mut tag_b = BTreeSet::new();
        for point in &original.points {
            let id = self.next_point_id();
            if original.has_tag(point.id, Tag::A) {
                tag_a.insert(id);
            }
            if original.has_tag(point.id, Tag::B) {
                tag_b.insert(id);
            }
            points.push(Point {
                id,
                ..point.clone()
            });
        }

        let copy = Flow {
            id: FlowId::new(),
            name: format!("{} (copy)", original.name),
            points,
            tag_a,
            tag_b,
        };
        let id = copy.id;
        tracing::info!(%id, %source, "duplicated flow");
        self.flows.insert(index + 1, copy);
        self.set_active_flow(id);
        self.dirty = true;
        Some(id)
    }

    /// Delete a flow. The last remaining flow cannot be deleted. When the
    /// active flow goes, the previous flow (else the next) becomes active.
    pub fn delete_flow(&mut self, id: FlowId) -> bool {
        if self.flows.len() <= 1 {
            tracing::info!(%id, "refusing to delete the only flow");
            return false;
        }
        let Some(index) = self.flows.iter().position(|f| f.id == id) else {
            return false;
        };
        self.flows.remove(index);
        if self.active == id {
            let next = index.saturating_sub(1).min(self.flows.len() - 1);
            let next_id = self.flows[next].id;
            self.set_active_flow(next_id);
        }
        self.dirty = true;
        tracing::info!(%id, "deleted flow");
        true
    }

    pub fn rename_flow(&mut self, id: FlowId, name: impl Into<String>) -> bool {
        let Some(flow) = self.flows.iter_mut().find(|f| f.id == id) else {
            return false;
        };
        flow.name = name.into();
        self.dirty = true;
        true
    }

    /// Select the active flow; returns whether the selection changed
    pub fn set_active_flow(&mut self, id: FlowId) -> bool {
        if self.active == id || self.flow(id).is_none() {
            return false;
        }
        self.active = id;
        // The parked point belongs to the flow it came from.
        self.removed.clear();
        self.dirty = true;
        true
    }

    /// Step the active selection through the flow list, wrapping around
    pub fn cycle_active_flow(&mut self, step: isize) -> bool {
        let len = self.flows.len() as isize;
        let current = self.active_index() as isize;
        let next = (current + step).rem_euclid(len) as usize;
        let id = self.flows[next].id;
        self.set_active_flow(id)
    }

    pub fn set_filename(&mut self, name: impl Into<String>) {
        self.filename = name.into();
        self.dirty = true;
    }
}
