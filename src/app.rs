use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui::layout::{Margin, Rect};

use crate::config::Config;
use crate::document::{Document, FlowId, PointId, Tag};
use crate::drag::{row_at, InputSource, OffsetDragController, ReorderDragState, RowBounds};
use crate::export::{export_to_dir, ExportFormat, ExportRequest};
use crate::geometry::{grid_index, snap_to_hash_mark, Plot, Point2, HASH_STEP};
use crate::render::{render_scene, DeviceClass, RenderInput, Target, ViewState};
use crate::scene::{HitKind, Scene};
use crate::storage::{save_document, KeyValueStore};
use crate::viewport::Viewport;

/// How long the chart stays veiled after switching flows
pub const TRANSITION: Duration = Duration::from_millis(150);

/// Application mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Normal,
    EditText { point_id: PointId, text: String },
    RenameFlow { flow_id: FlowId, text: String },
    RenameDocument { text: String },
    ConfirmDeleteFlow { flow_id: FlowId },
}

/// Screen regions, recomputed on every resize
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Panes {
    pub tabs: Rect,
    pub chart: Rect,
    pub list: Rect,
    pub status: Rect,
    pub help: Rect,
}

/// Main application state
pub struct App {
    pub doc: Document,
    store: Box<dyn KeyValueStore>,
    pub view: ViewState,
    pub viewport: Viewport,
    pub panes: Panes,
    /// First description row shown in the list pane
    pub list_scroll: usize,
    pub offset_drag: OffsetDragController,
    pub reorder: ReorderDragState,
    pub mode: Mode,
    pub selected: Option<PointId>,
    pub hovered: Option<PointId>,
    /// Pointer position over the chart, in scene units
    pub cursor: Option<Point2>,
    pub running: bool,
    pub status_message: Option<String>,
    transition_until: Option<Instant>,
    pub export_dir: PathBuf,
    pub share_url: Option<String>,
}

impl App {
    pub fn new(doc: Document, store: Box<dyn KeyValueStore>, config: &Config) -> Self {
        let view = config.view();
        Self {
            doc,
            store,
            view,
            viewport: Viewport::new(view.orientation),
            panes: Panes::default(),
            list_scroll: 0,
            offset_drag: OffsetDragController::new(),
            reorder: ReorderDragState::default(),
            mode: Mode::Normal,
            selected: None,
            hovered: None,
            cursor: None,
            running: true,
            status_message: None,
            transition_until: None,
            export_dir: config.export_dir(),
            share_url: config.share_url.clone(),
        }
    }

    /// Adopt a new screen layout
    pub fn resize(&mut self, panes: Panes) {
        self.panes = panes;
        self.viewport.resize(panes.chart.inner(Margin::new(1, 1)));
        self.ensure_selection_visible();
    }

    /// Rows of the description list, excluding its border
    pub fn list_area(&self) -> Rect {
        self.panes.list.inner(Margin::new(1, 1))
    }

    pub fn plot(&self) -> Plot {
        self.viewport.plot(self.doc.points().len())
    }

    /// Whether the flow-switch veil is showing
    pub fn transition_active(&self, now: Instant) -> bool {
        self.transition_until.is_some_and(|until| now < until)
    }

    fn begin_transition(&mut self) {
        self.transition_until = Some(Instant::now() + TRANSITION);
    }

    /// The interactive chart as it should look right now
    pub fn scene(&self, now: Instant) -> Scene {
        let flow = self.doc.active_flow();
        let points = self.reorder.ordering(flow.points());
        let mut input = RenderInput::new(flow, points, self.view, Target::Interactive, self.plot());
        input.live_offset = self.offset_drag.active().map(|d| (d.point_id, d.live_offset));
        input.cursor = self.cursor;
        input.hovered = self.hovered;
        input.highlighted = self.reorder.dragged_id();
        input.selected = self.selected;
        input.veil = self.transition_active(now);
        render_scene(&input)
    }

    /// Check if document is dirty
    pub fn is_dirty(&self) -> bool {
        self.doc.is_dirty()
    }

    /// Save document to storage if dirty
    pub fn autosave(&mut self) {
        if !self.doc.is_dirty() {
            return;
        }
        match save_document(self.store.as_mut(), &self.doc) {
            Ok(_) => self.doc.mark_clean(),
            Err(e) => {
                tracing::error!("autosave failed: {e:#}");
                self.set_status(format!("Autosave error: {}", e));
            }
        }
    }

    /// Set a status message to display
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    /// Clear the status message
    pub fn clear_status(&mut self) {
        self.status_message = None;
    }

    /// Periodic housekeeping: debounced reorder preview and veil expiry
    pub fn tick(&mut self, now: Instant) {
        self.reorder.refresh(now);
        if !self.transition_active(now) {
            self.transition_until = None;
        }
    }

    // --- Selection ---

    fn selected_position(&self) -> Option<usize> {
        self.selected
            .and_then(|id| self.doc.active_flow().position_of(id))
    }

    /// Move the selection by `step` points
    pub fn select_step(&mut self, step: isize) {
        let points = self.doc.points();
        if points.is_empty() {
            self.selected = None;
            return;
        }
        let next = match self.selected_position() {
            Some(pos) => pos.saturating_add_signed(step).min(points.len() - 1),
            None if step < 0 => points.len() - 1,
            None => 0,
        };
        self.selected = Some(points[next].id);
        self.ensure_selection_visible();
    }

    fn select(&mut self, id: Option<PointId>) {
        self.selected = id;
        self.ensure_selection_visible();
    }

    /// Scroll the chart and the list so the selected point shows
    pub fn ensure_selection_visible(&mut self) {
        let Some(pos) = self.selected_position() else {
            return;
        };
        let plot = self.plot();
        self.viewport.scroll_into_view(grid_index(pos), &plot);

        let rows = usize::from(self.list_area().height).max(1);
        if pos < self.list_scroll {
            self.list_scroll = pos;
        } else if pos >= self.list_scroll + rows {
            self.list_scroll = pos + 1 - rows;
        }
    }

    // --- Point editing ---

    pub fn append_point(&mut self) {
        let id = self.doc.append_point();
        self.select(Some(id));
        self.set_status(format!("Added event {}", self.doc.points().len()));
    }

    /// Create the next point at a clicked offset
    pub fn append_point_at(&mut self, offset: f64) {
        let id = self.doc.append_point_at(offset);
        self.select(Some(id));
    }

    pub fn insert_at(&mut self, position: usize) {
        match self.doc.insert_point_at(position) {
            Some(id) => {
                self.select(Some(id));
                self.set_status("Inserted event");
            }
            None => self.set_status("Nothing to insert between"),
        }
    }

    /// Insert a new point in front of the selected one
    pub fn insert_before_selected(&mut self) {
        match self.selected_position() {
            Some(pos) => self.insert_at(pos),
            None => self.set_status("Select an event first"),
        }
    }

    pub fn delete_point(&mut self, id: PointId) {
        let position = self.doc.active_flow().position_of(id);
        if !self.doc.delete_point(id) {
            return;
        }
        if self.selected == Some(id) {
            let points = self.doc.points();
            let next = position
                .filter(|_| !points.is_empty())
                .map(|pos| points[pos.min(points.len() - 1)].id);
            self.select(next);
        }
        self.set_status("Deleted event");
    }

    /// Delete the selected point; only in edit mode
    pub fn delete_selected(&mut self) {
        if !self.view.edit_mode {
            self.set_status("Press e for edit mode to delete events");
            return;
        }
        if let Some(id) = self.selected {
            self.delete_point(id);
        }
    }

    pub fn undo_dot(&mut self) {
        match self.doc.remove_last_point() {
            Some(id) => {
                if self.selected == Some(id) {
                    let last = self.doc.points().last().map(|p| p.id);
                    self.select(last);
                }
                self.set_status("Undo dot");
            }
            None => self.set_status("Nothing to undo"),
        }
    }

    pub fn redo_dot(&mut self) {
        match self.doc.restore_removed_point() {
            Some(id) => {
                self.select(Some(id));
                self.set_status("Redo dot");
            }
            None => self.set_status("Nothing to redo"),
        }
    }

    /// Move the selected point one hash mark; positive `steps` move it up
    pub fn nudge_selected(&mut self, steps: f64) {
        let Some(id) = self.selected else {
            return;
        };
        let Some(point) = self.doc.active_flow().point(id) else {
            return;
        };
        let offset = (point.offset - steps * HASH_STEP).clamp(0.0, 100.0);
        self.doc.update_point_offset(id, offset);
    }

    pub fn toggle_tag(&mut self, tag: Tag) {
        let Some(id) = self.selected else {
            self.set_status("Select an event first");
            return;
        };
        if let Some(member) = self.doc.toggle_tag(id, tag) {
            let verb = if member { "Tagged" } else { "Untagged" };
            self.set_status(format!("{} {}", verb, tag.label()));
        }
    }

    // --- View toggles ---

    pub fn toggle_edit_mode(&mut self) {
        self.view.edit_mode = !self.view.edit_mode;
        self.set_status(if self.view.edit_mode {
            "Edit mode"
        } else {
            "Edit mode off"
        });
    }

    pub fn rotate(&mut self) {
        self.view.orientation = self.view.orientation.toggled();
        self.viewport.set_orientation(self.view.orientation);
        self.ensure_selection_visible();
        self.set_status(format!("Orientation: {}", self.view.orientation.name()));
    }

    pub fn cycle_cumulative(&mut self) {
        self.view.cumulative = self.view.cumulative.cycle();
        self.set_status(self.view.cumulative.label().unwrap_or("Cumulative off"));
    }

    pub fn cycle_cutout(&mut self) {
        self.view.cutout = self.view.cutout.cycle();
        self.set_status(self.view.cutout.label().unwrap_or("Cutout off"));
    }

    pub fn toggle_points(&mut self) {
        self.view.show_points = !self.view.show_points;
    }

    // --- Flows ---

    fn after_flow_switch(&mut self) {
        self.offset_drag = OffsetDragController::new();
        self.reorder.cancel();
        self.selected = None;
        self.hovered = None;
        self.list_scroll = 0;
        self.viewport.scroll = 0.0;
        self.begin_transition();
    }

    pub fn new_flow(&mut self) {
        self.doc.create_flow();
        self.after_flow_switch();
        self.set_status(format!("Created {}", self.doc.active_flow().name));
    }

    pub fn duplicate_flow(&mut self) {
        let source = self.doc.active_flow_id();
        if let Some(id) = self.doc.duplicate_flow(source) {
            self.doc.set_active_flow(id);
            self.after_flow_switch();
            self.set_status(format!("Duplicated as {}", self.doc.active_flow().name));
        }
    }

    pub fn cycle_flow(&mut self, step: isize) {
        if self.doc.cycle_active_flow(step) {
            self.after_flow_switch();
        }
    }

    /// Ask before deleting the active flow
    pub fn request_delete_flow(&mut self) {
        if self.doc.flows().len() <= 1 {
            tracing::info!("refusing to delete the last flow");
            self.set_status("Cannot delete the last flow");
            return;
        }
        self.mode = Mode::ConfirmDeleteFlow {
            flow_id: self.doc.active_flow_id(),
        };
    }

    pub fn confirm_delete_flow(&mut self) {
        if let Mode::ConfirmDeleteFlow { flow_id } = self.mode {
            let name = self.doc.flow(flow_id).map(|f| f.name.clone()).unwrap_or_default();
            if self.doc.delete_flow(flow_id) {
                self.after_flow_switch();
                self.set_status(format!("Deleted {}", name));
            }
        }
        self.mode = Mode::Normal;
    }

    // --- Text input modes ---

    pub fn start_edit_text(&mut self) {
        let Some(point) = self.selected.and_then(|id| self.doc.active_flow().point(id)) else {
            self.set_status("Select an event first");
            return;
        };
        self.mode = Mode::EditText {
            point_id: point.id,
            text: point.text.clone(),
        };
    }

    pub fn start_rename_flow(&mut self) {
        let flow = self.doc.active_flow();
        self.mode = Mode::RenameFlow {
            flow_id: flow.id,
            text: flow.name.clone(),
        };
    }

    pub fn start_rename_document(&mut self) {
        self.mode = Mode::RenameDocument {
            text: self.doc.filename.clone(),
        };
    }

    fn input_text_mut(&mut self) -> Option<&mut String> {
        match &mut self.mode {
            Mode::EditText { text, .. }
            | Mode::RenameFlow { text, .. }
            | Mode::RenameDocument { text } => Some(text),
            Mode::Normal | Mode::ConfirmDeleteFlow { .. } => None,
        }
    }

    pub fn add_input_char(&mut self, c: char) {
        if let Some(text) = self.input_text_mut() {
            text.push(c);
        }
    }

    pub fn backspace_input(&mut self) {
        if let Some(text) = self.input_text_mut() {
            text.pop();
        }
    }

    /// Apply the text being edited and return to normal mode
    pub fn commit_input(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::EditText { point_id, text } => {
                self.doc.update_point_text(point_id, text);
            }
            Mode::RenameFlow { flow_id, text } => {
                let name = text.trim();
                if name.is_empty() {
                    self.set_status("Flow name cannot be empty");
                } else {
                    self.doc.rename_flow(flow_id, name);
                }
            }
            Mode::RenameDocument { text } => {
                let name = text.trim();
                if !name.is_empty() {
                    self.doc.set_filename(name);
                }
            }
            Mode::Normal | Mode::ConfirmDeleteFlow { .. } => {}
        }
    }

    pub fn cancel_input(&mut self) {
        self.mode = Mode::Normal;
    }

    // --- Chart pointer ---

    /// Pointer moved over the chart (or left it, with `None`)
    pub fn hover_chart(&mut self, p: Option<Point2>, now: Instant) {
        self.cursor = p;
        if self.view.device == DeviceClass::Touch {
            return;
        }
        self.hovered = p.and_then(|p| self.scene(now).point_at(p));
    }

    /// Press on the chart: delete/insert controls, marker drag, or click-to-create
    pub fn press_chart(&mut self, p: Point2, now: Instant) {
        if self.offset_drag.cooldown_active(now) {
            tracing::debug!("click ignored right after a drop");
            return;
        }
        self.cursor = Some(p);
        match self.scene(now).hit_test(p) {
            Some(HitKind::Delete(id)) => self.delete_point(id),
            Some(HitKind::Insert(position)) => self.insert_at(position),
            Some(HitKind::Point(id)) => {
                self.select(Some(id));
                if let Some(point) = self.doc.active_flow().point(id) {
                    self.offset_drag.start(id, point.offset);
                }
            }
            None => {
                let plot = self.plot();
                let next = grid_index(self.doc.points().len());
                if !self.view.edit_mode && plot.near_slot(p, next) {
                    self.append_point_at(snap_to_hash_mark(plot.offset_at(p)));
                }
            }
        }
    }

    pub fn drag_chart(&mut self, p: Point2) {
        let plot = self.plot();
        self.cursor = Some(p);
        self.offset_drag.update(p, &plot);
    }

    /// Release ends an offset drag: snap and commit
    pub fn release_chart(&mut self, now: Instant) {
        if let Some((id, offset)) = self.offset_drag.finish(now) {
            self.doc.update_point_offset(id, offset);
        }
    }

    // --- Description list pointer ---

    /// Rendered bounds of the visible description rows, in terminal rows
    pub fn list_rows(&self) -> Vec<RowBounds> {
        let area = self.list_area();
        let len = self.doc.points().len();
        (self.list_scroll..len)
            .take(usize::from(area.height))
            .map(|position| {
                let top = f64::from(area.y) + (position - self.list_scroll) as f64;
                RowBounds {
                    position,
                    top,
                    bottom: top + 1.0,
                }
            })
            .collect()
    }

    /// Description row under a terminal position
    pub fn list_position_at(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.list_area();
        if column < area.x || column >= area.x + area.width {
            return None;
        }
        row_at(&self.list_rows(), f64::from(row))
    }

    fn input_source(&self) -> InputSource {
        match self.view.device {
            DeviceClass::Mouse => InputSource::Mouse,
            DeviceClass::Touch => InputSource::Touch,
        }
    }

    pub fn press_list(&mut self, position: usize) {
        let input = self.input_source();
        if self.reorder.start(self.doc.points(), position, input) {
            let id = self.doc.points()[position].id;
            self.select(Some(id));
        }
    }

    /// Pointer moved during a reorder drag
    pub fn drag_list(&mut self, column: u16, row: u16, now: Instant) {
        match self.input_source() {
            InputSource::Mouse => {
                if let Some(target) = self.list_position_at(column, row) {
                    self.reorder.drag_over(target, now);
                }
            }
            InputSource::Touch => {
                let rows = self.list_rows();
                self.reorder.touch_move(f64::from(row), &rows, now);
            }
        }
    }

    /// Release ends a reorder drag: commit over a row, cancel elsewhere
    pub fn release_list(&mut self, column: u16, row: u16) {
        let committed = match self.input_source() {
            InputSource::Mouse => {
                let target = self.list_position_at(column, row);
                self.reorder.drop(target)
            }
            InputSource::Touch => self.reorder.release(),
        };
        if let Some((from, to)) = committed {
            if self.doc.reorder_points(from, to) {
                self.set_status(format!("Moved event {} to {}", from + 1, to + 1));
            }
        }
    }

    pub fn scroll_list(&mut self, rows: isize) {
        let max = self.doc.points().len().saturating_sub(1);
        self.list_scroll = self.list_scroll.saturating_add_signed(rows).min(max);
    }

    // --- Export ---

    pub fn export_request(&self) -> ExportRequest<'_> {
        ExportRequest {
            document_name: &self.doc.filename,
            flow: self.doc.active_flow(),
            view: self.view,
            share_url: self.share_url.as_deref(),
        }
    }

    pub fn export(&mut self, format: ExportFormat) {
        let result = export_to_dir(&self.export_request(), format, &self.export_dir);
        match result {
            Ok(path) => self.set_status(format!("Exported to {}", path.display())),
            Err(e) => {
                tracing::error!("export failed: {e:#}");
                self.set_status(format!("Export failed: {}", e));
            }
        }
    }
}
