use std::time::Instant;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        canvas::{Canvas, Circle, Context, Line as CanvasLine, Points},
        Block, Borders, Clear, Paragraph,
    },
    Frame,
};

use crate::app::{App, Mode, Panes};
use crate::document::Tag;
use crate::drag::ReorderPhase;
use crate::geometry::{Orientation, Point2, Rect2};
use crate::render::DeviceClass;
use crate::scene::{Element, Paint, Scene};
use crate::score::compute_scores;

/// Split the terminal into tab bar, chart, description list, status and help
pub fn layout(area: Rect, orientation: Orientation) -> Panes {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Flow tabs
            Constraint::Min(4),    // Chart + list
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Help bar
        ])
        .split(area);

    let body = match orientation {
        Orientation::Horizontal => Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
            .split(rows[1]),
        Orientation::Vertical => Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(rows[1]),
    };

    Panes {
        tabs: rows[0],
        chart: body[0],
        list: body[1],
        status: rows[2],
        help: rows[3],
    }
}

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    let now = Instant::now();
    let panes = app.panes;

    render_tabs(frame, app, panes.tabs);
    render_chart(frame, app, panes.chart, now);
    render_list(frame, app, panes.list);
    render_status_bar(frame, app, panes.status);
    render_help_bar(frame, app, panes.help);

    let overlay_area = panes.chart;
    match &app.mode {
        Mode::EditText { text, .. } => render_text_input(frame, "Description:", text, overlay_area),
        Mode::RenameFlow { text, .. } => render_text_input(frame, "Flow name:", text, overlay_area),
        Mode::RenameDocument { text } => {
            render_text_input(frame, "Document name:", text, overlay_area)
        }
        Mode::ConfirmDeleteFlow { flow_id } => {
            let name = app
                .doc
                .flow(*flow_id)
                .map(|f| f.name.as_str())
                .unwrap_or_default();
            render_confirm(frame, &format!("Delete flow '{}'? [y/n]", name), overlay_area);
        }
        Mode::Normal => {}
    }
}

/// Document name followed by one tab per flow
fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::styled(
        format!(" {} ", app.doc.filename),
        Style::default().add_modifier(Modifier::BOLD),
    )];
    let active = app.doc.active_flow_id();
    for flow in app.doc.flows() {
        let style = if flow.id == active {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::raw("│"));
        spans.push(Span::styled(format!(" {} ", flow.name), style));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_chart(frame: &mut Frame, app: &App, area: Rect, now: Instant) {
    let title = format!(" {} ", app.doc.active_flow().name);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let scene = app.scene(now);
    let veiled = app.transition_active(now);
    let (x_bounds, y_bounds) = app.viewport.bounds();
    let painter = ScenePainter::new(&scene, &app.viewport.bounds(), app.viewport.area);

    let canvas = Canvas::default()
        .block(block)
        .background_color(Color::White)
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        // Canvas y grows upwards; scene y grows downwards.
        .y_bounds([-y_bounds[1], -y_bounds[0]])
        .paint(move |ctx| {
            if !veiled {
                painter.paint(ctx);
            }
        });
    frame.render_widget(canvas, area);
}

/// Draws scene elements onto a braille canvas
struct ScenePainter<'a> {
    scene: &'a Scene,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    /// Scene units per braille dot
    dot_x: f64,
    dot_y: f64,
}

impl<'a> ScenePainter<'a> {
    fn new(scene: &'a Scene, bounds: &([f64; 2], [f64; 2]), area: Rect) -> Self {
        let (x_bounds, y_bounds) = *bounds;
        let columns = f64::from(area.width.max(1)) * 2.0;
        let rows = f64::from(area.height.max(1)) * 4.0;
        Self {
            scene,
            x_bounds,
            y_bounds,
            dot_x: (x_bounds[1] - x_bounds[0]) / columns,
            dot_y: (y_bounds[1] - y_bounds[0]) / rows,
        }
    }

    fn paint(&self, ctx: &mut Context<'_>) {
        for element in &self.scene.elements {
            self.paint_element(ctx, element);
        }
    }

    fn paint_element(&self, ctx: &mut Context<'_>, element: &Element) {
        match element {
            Element::Line {
                from, to, stroke, ..
            } => self.line(ctx, *from, *to, *stroke),
            Element::Polyline { points, stroke, .. } => {
                for pair in points.windows(2) {
                    self.line(ctx, pair[0], pair[1], *stroke);
                }
            }
            Element::Rect { rect, fill, .. } => {
                // The opaque white background is the canvas itself.
                if *fill == Paint::WHITE || fill.alpha < 0.05 {
                    return;
                }
                self.fill(ctx, *rect, element, fill.to_color());
            }
            Element::Circle {
                center,
                radius,
                fill,
                stroke,
            } => {
                if let Some(fill) = fill {
                    let bounds = Rect2::from_corners(
                        Point2::new(center.x - radius, center.y - radius),
                        Point2::new(center.x + radius, center.y + radius),
                    );
                    self.fill(ctx, bounds, element, fill.to_color());
                }
                if let Some((stroke, _)) = stroke {
                    ctx.draw(&Circle {
                        x: center.x,
                        y: -center.y,
                        radius: *radius,
                        color: stroke.to_color(),
                    });
                }
            }
            Element::Text { at, text, fill, .. } => {
                ctx.print(
                    at.x,
                    -at.y,
                    Span::styled(text.clone(), Style::default().fg(fill.to_color())),
                );
            }
            Element::Masked { content, .. } => {
                for inner in content {
                    if let Element::Rect { rect, fill, .. } = inner {
                        // Covering is tested against the masked element, holes included.
                        self.fill(ctx, *rect, element, fill.to_color());
                    }
                }
            }
        }
    }

    fn line(&self, ctx: &mut Context<'_>, from: Point2, to: Point2, stroke: Paint) {
        ctx.draw(&CanvasLine {
            x1: from.x,
            y1: -from.y,
            x2: to.x,
            y2: -to.y,
            color: stroke.to_color(),
        });
    }

    /// Set every braille dot inside `bounds` that `shape` covers
    fn fill(&self, ctx: &mut Context<'_>, bounds: Rect2, shape: &Element, color: Color) {
        if self.dot_x <= 0.0 || self.dot_y <= 0.0 {
            return;
        }
        let x0 = bounds.x.max(self.x_bounds[0]);
        let x1 = (bounds.x + bounds.width).min(self.x_bounds[1]);
        let y0 = bounds.y.max(self.y_bounds[0]);
        let y1 = (bounds.y + bounds.height).min(self.y_bounds[1]);

        let mut coords = Vec::new();
        let mut y = y0 + self.dot_y / 2.0;
        while y < y1 {
            let mut x = x0 + self.dot_x / 2.0;
            while x < x1 {
                if shape.covers(Point2::new(x, y)) {
                    coords.push((x, -y));
                }
                x += self.dot_x;
            }
            y += self.dot_y;
        }
        ctx.draw(&Points {
            coords: &coords,
            color,
        });
    }
}

/// One row per point: position, score, tags and description
fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let dragging = app.reorder.phase() != ReorderPhase::Idle;
    let title = if dragging {
        " Events (drop on a row, release elsewhere to cancel) "
    } else {
        " Events "
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let flow = app.doc.active_flow();
    let points = app.reorder.ordering(flow.points());
    let scores = compute_scores(points);
    let dragged = app.reorder.dragged_id();

    let visible = usize::from(app.list_area().height);
    let lines: Vec<Line> = points
        .iter()
        .enumerate()
        .skip(app.list_scroll)
        .take(visible)
        .map(|(position, point)| {
            let mut spans = vec![
                Span::styled(
                    format!("{:>3} ", position + 1),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:>+3} ", scores.individual[position]),
                    score_style(scores.individual[position]),
                ),
            ];
            for (tag, color) in [(Tag::A, Color::Yellow), (Tag::B, Color::Blue)] {
                if flow.has_tag(point.id, tag) {
                    spans.push(Span::styled(
                        &tag.label()[..1],
                        Style::default().fg(Color::Black).bg(color),
                    ));
                } else {
                    spans.push(Span::raw(" "));
                }
            }
            spans.push(Span::raw(" "));
            if point.text.is_empty() {
                spans.push(Span::styled(
                    "(no description)",
                    Style::default().fg(Color::DarkGray),
                ));
            } else {
                spans.push(Span::raw(point.text.as_str()));
            }

            let style = if dragged == Some(point.id) {
                Style::default().bg(Color::Yellow).fg(Color::Black)
            } else if app.selected == Some(point.id) {
                Style::default().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Line::from(spans).style(style)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn score_style(score: i32) -> Style {
    match score {
        s if s > 0 => Style::default().fg(Paint::POSITIVE.to_color()),
        s if s < 0 => Style::default().fg(Paint::NEGATIVE.to_color()),
        _ => Style::default().fg(Color::Gray),
    }
}

/// Render the status bar (Helix-style with mode indicator)
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (mode_name, mode_bg) = match &app.mode {
        Mode::Normal if app.view.edit_mode => ("EDIT", Color::Red),
        Mode::Normal => ("NOR", Color::Blue),
        Mode::EditText { .. } | Mode::RenameFlow { .. } | Mode::RenameDocument { .. } => {
            ("INS", Color::Green)
        }
        Mode::ConfirmDeleteFlow { .. } => ("ASK", Color::Magenta),
    };

    let mode_style = Style::default()
        .fg(Color::Black)
        .bg(mode_bg)
        .add_modifier(Modifier::BOLD);

    let scores = compute_scores(app.doc.points());
    let dirty_marker = if app.is_dirty() { " *" } else { "" };

    let mut info = format!(
        " {} Events | Score {} | {}",
        app.doc.points().len(),
        scores.total,
        app.view.orientation.name()
    );
    for label in [app.view.cumulative.label(), app.view.cutout.label()]
        .into_iter()
        .flatten()
    {
        info.push_str(" | ");
        info.push_str(label);
    }
    if !app.view.show_points {
        info.push_str(" | points hidden");
    }
    if app.view.device == DeviceClass::Touch {
        info.push_str(" | touch");
    }

    let status_text = app
        .status_message
        .as_ref()
        .map(|m| format!("  {}", m))
        .unwrap_or_default();

    let spans = vec![
        Span::styled(format!(" {} ", mode_name), mode_style),
        Span::raw(format!(" {}{}", app.doc.filename, dirty_marker)),
        Span::raw(info),
        Span::styled(status_text, Style::default().add_modifier(Modifier::BOLD)),
    ];

    let paragraph = Paragraph::new(Line::from(spans))
        .style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(paragraph, area);
}

/// Render the help bar
fn render_help_bar(frame: &mut Frame, app: &App, area: Rect) {
    let help_text = match &app.mode {
        Mode::Normal if app.view.edit_mode => {
            "[x] delete [i]nsert [u]ndo/[U] redo dot | [e] leave edit mode | [q]uit"
        }
        Mode::Normal => {
            "[a]dd [i]nsert [Enter] describe [1/2] tag | [e]dit [r]otate [c]umul. cuto[k] [p]oints | [n]ew [d]up [X] del [R]ename [F]ile flow | [E/H/S] export | [q]uit"
        }
        Mode::EditText { .. } | Mode::RenameFlow { .. } | Mode::RenameDocument { .. } => {
            "type text | [Enter] confirm [Esc] cancel [Backspace] delete"
        }
        Mode::ConfirmDeleteFlow { .. } => "[y] delete flow | [n/Esc] keep it",
    };

    let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));

    frame.render_widget(paragraph, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let x = (area.width.saturating_sub(width)) / 2 + area.x;
    let y = (area.height.saturating_sub(height)) / 2 + area.y;
    Rect::new(x, y, width, height.min(area.height))
}

/// Render a single-line text input overlay
fn render_text_input(frame: &mut Frame, label: &str, text: &str, area: Rect) {
    let popup_area = centered(area, 60, 3);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(label)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(format!("{}▏", text))
        .block(block)
        .style(Style::default().fg(Color::White).bg(Color::Black));

    frame.render_widget(paragraph, popup_area);
}

fn render_confirm(frame: &mut Frame, question: &str, area: Rect) {
    let popup_area = centered(area, question.chars().count() as u16 + 4, 3);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));

    let paragraph = Paragraph::new(question)
        .block(block)
        .style(Style::default().fg(Color::White).bg(Color::Black));

    frame.render_widget(paragraph, popup_area);
}
