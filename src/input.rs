use std::time::Instant;

use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::App;
use crate::geometry::Point2;

/// Rows scrolled per wheel step in the description list
const LIST_SCROLL_STEP: isize = 3;

/// Route a mouse event to the chart or the description list
pub fn handle_mouse_event(app: &mut App, event: MouseEvent, now: Instant) {
    if app.offset_drag.is_dragging() {
        handle_offset_drag_event(app, event, now);
    } else if app.reorder.is_active() {
        handle_reorder_event(app, event, now);
    } else if app.viewport.area.contains(Position::new(event.column, event.row)) {
        handle_chart_event(app, event, now);
    } else {
        app.hover_chart(None, now);
        handle_list_event(app, event);
    }
}

/// Scene position under the pointer, clamped into the chart pane
fn clamped_scene_point(app: &App, column: u16, row: u16) -> Option<Point2> {
    let area = app.viewport.area;
    if area.width == 0 || area.height == 0 {
        return None;
    }
    let column = column.clamp(area.x, area.x + area.width - 1);
    let row = row.clamp(area.y, area.y + area.height - 1);
    app.viewport.screen_to_scene(column, row)
}

fn handle_chart_event(app: &mut App, event: MouseEvent, now: Instant) {
    let Some(p) = app.viewport.screen_to_scene(event.column, event.row) else {
        return;
    };
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => app.press_chart(p, now),
        MouseEventKind::Moved => app.hover_chart(Some(p), now),
        MouseEventKind::ScrollUp | MouseEventKind::ScrollLeft => {
            let plot = app.plot();
            app.viewport.pan(-1.0, &plot);
        }
        MouseEventKind::ScrollDown | MouseEventKind::ScrollRight => {
            let plot = app.plot();
            app.viewport.pan(1.0, &plot);
        }
        _ => {}
    }
}

fn handle_offset_drag_event(app: &mut App, event: MouseEvent, now: Instant) {
    match event.kind {
        MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
            if let Some(p) = clamped_scene_point(app, event.column, event.row) {
                app.drag_chart(p);
            }
        }
        MouseEventKind::Up(MouseButton::Left) => app.release_chart(now),
        _ => {}
    }
}

fn handle_list_event(app: &mut App, event: MouseEvent) {
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(position) = app.list_position_at(event.column, event.row) {
                app.press_list(position);
            }
        }
        MouseEventKind::ScrollUp => app.scroll_list(-LIST_SCROLL_STEP),
        MouseEventKind::ScrollDown => app.scroll_list(LIST_SCROLL_STEP),
        _ => {}
    }
}

fn handle_reorder_event(app: &mut App, event: MouseEvent, now: Instant) {
    match event.kind {
        MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
            app.drag_list(event.column, event.row, now);
        }
        MouseEventKind::Up(MouseButton::Left) => app.release_list(event.column, event.row),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Panes;
    use crate::config::Config;
    use crate::document::Document;
    use crate::storage::MemoryStore;
    use crossterm::event::KeyModifiers;
    use ratatui::layout::Rect;

    fn app() -> App {
        let mut app = App::new(Document::new(), Box::new(MemoryStore::new()), &Config::default());
        app.resize(Panes {
            tabs: Rect::new(0, 0, 100, 1),
            chart: Rect::new(0, 1, 82, 32),
            list: Rect::new(0, 33, 100, 12),
            status: Rect::new(0, 45, 100, 1),
            help: Rect::new(0, 46, 100, 1),
        });
        app
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn click_in_chart_creates_point() {
        let mut app = app();
        let now = Instant::now();
        // column 1 + 8 cells lands on the first grid slot; row 2 is the top
        handle_mouse_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 8, 2), now);
        assert_eq!(app.doc.points().len(), 1);
        assert_eq!(app.doc.points()[0].offset, 0.0);
    }

    #[test]
    fn drag_leaving_the_chart_keeps_dragging() {
        let mut app = app();
        app.append_point();
        let now = Instant::now();
        // centre row of the 30-row chart
        handle_mouse_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 8, 17), now);
        assert!(app.offset_drag.is_dragging());

        handle_mouse_event(&mut app, mouse(MouseEventKind::Drag(MouseButton::Left), 8, 40), now);
        handle_mouse_event(&mut app, mouse(MouseEventKind::Up(MouseButton::Left), 8, 40), now);
        assert!(!app.offset_drag.is_dragging());
        assert_eq!(app.doc.points()[0].offset, 100.0);
    }

    #[test]
    fn list_drag_reorders() {
        let mut app = app();
        for _ in 0..3 {
            app.append_point();
        }
        let ids: Vec<_> = app.doc.points().iter().map(|p| p.id).collect();
        let now = Instant::now();
        handle_mouse_event(&mut app, mouse(MouseEventKind::Down(MouseButton::Left), 10, 36), now);
        assert!(app.reorder.is_active());
        handle_mouse_event(&mut app, mouse(MouseEventKind::Drag(MouseButton::Left), 10, 34), now);
        handle_mouse_event(&mut app, mouse(MouseEventKind::Up(MouseButton::Left), 10, 34), now);
        let order: Vec<_> = app.doc.points().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
    }
}
