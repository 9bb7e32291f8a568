mod app;
mod config;
mod document;
mod drag;
mod export;
mod geometry;
mod input;
mod render;
mod scene;
mod score;
mod storage;
mod svg;
mod ui;
mod undo;
mod viewport;

use std::fs::{self, OpenOptions};
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tracing_subscriber::EnvFilter;

use app::{App, Mode};
use config::{Config, Overrides};
use document::{Document, Tag};
use export::{export_to_path, ExportFormat, ExportRequest};
use storage::{load_document, FileStore};

/// Timeline scoring diagrams with PDF and HTML export
#[derive(Parser, Debug)]
#[command(name = "sumpoints")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory the document is stored in
    #[arg(long, value_name = "DIR")]
    storage: Option<PathBuf>,

    /// Run the sequence top to bottom
    #[arg(long)]
    vertical: bool,

    /// Touch device: no hover affordances or insertion controls
    #[arg(long)]
    touch: bool,

    /// Link printed as a QR code in the export corner
    #[arg(long, value_name = "URL")]
    share_url: Option<String>,

    /// Export without starting the editor (.pdf, .html or .svg)
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Flow to export, by name (defaults to the active flow)
    #[arg(long, value_name = "NAME", requires = "export")]
    flow: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_dir = args.storage.clone().unwrap_or_else(FileStore::default_dir);
    if args.export.is_some() {
        init_logging(None)?;
    } else {
        init_logging(Some(&log_dir.join("sumpoints.log")))?;
    }

    let mut config = Config::load();
    config.apply_overrides(Overrides {
        storage_dir: args.storage.clone(),
        share_url: args.share_url.clone(),
        vertical: args.vertical,
        touch: args.touch,
    });

    let store = FileStore::new(config.storage_dir());
    let doc = load_document(&store);

    if let Some(path) = &args.export {
        return export_headless(&doc, &config, path, args.flow.as_deref());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(doc, Box::new(store), &config);
    app.set_status(format!("Loaded {}", app.doc.filename));

    // Main event loop
    let result = run_app(&mut terminal, &mut app);

    // Flush anything the last event left unsaved
    app.autosave();

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        tracing::error!("editor stopped: {e:#}");
        eprintln!("Error: {:?}", e);
    }

    Ok(())
}

/// `RUST_LOG` filter, default `info`. The editor owns the terminal, so its
/// log goes to a file; headless runs log to stderr.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {:?}", parent))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn export_headless(doc: &Document, config: &Config, path: &Path, flow: Option<&str>) -> Result<()> {
    let format = ExportFormat::from_path(path)?;
    let flow = match flow {
        Some(name) => doc
            .flows()
            .iter()
            .find(|f| f.name == name)
            .with_context(|| format!("No flow named {:?}", name))?,
        None => doc.active_flow(),
    };
    let request = ExportRequest {
        document_name: &doc.filename,
        flow,
        view: config.view(),
        share_url: config.share_url.as_deref(),
    };
    export_to_path(&request, format, path)
        .inspect_err(|e| tracing::error!("export failed: {e:#}"))?;
    eprintln!("Exported {} to {}", flow.name, path.display());
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        let size = terminal.size()?;
        let panes = ui::layout(Rect::new(0, 0, size.width, size.height), app.view.orientation);
        if panes != app.panes {
            app.resize(panes);
        }

        app.tick(Instant::now());
        terminal.draw(|frame| ui::render(frame, app))?;

        // Short poll keeps the reorder preview and the veil moving
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    // Clear status message on any keypress
                    app.clear_status();

                    match &app.mode {
                        Mode::Normal => handle_normal_mode(app, key),
                        Mode::EditText { .. } | Mode::RenameFlow { .. } | Mode::RenameDocument { .. } => {
                            handle_text_input_mode(app, key)
                        }
                        Mode::ConfirmDeleteFlow { .. } => handle_confirm_mode(app, key),
                    }

                    if matches!(app.mode, Mode::Normal) {
                        app.autosave();
                    }
                }
                Event::Mouse(mouse) => {
                    if matches!(app.mode, Mode::Normal) {
                        input::handle_mouse_event(app, mouse, Instant::now());
                        if app.is_dirty() {
                            app.autosave();
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.running = false,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.running = false;
        }
        KeyCode::Esc => {
            app.reorder.cancel();
            app.selected = None;
        }

        // Points
        KeyCode::Char('a') => app.append_point(),
        KeyCode::Char('i') => app.insert_before_selected(),
        KeyCode::Char('x') | KeyCode::Delete => app.delete_selected(),
        KeyCode::Char('u') => app.undo_dot(),
        KeyCode::Char('U') => app.redo_dot(),
        KeyCode::Left => app.select_step(-1),
        KeyCode::Right => app.select_step(1),
        KeyCode::Up => app.nudge_selected(1.0),
        KeyCode::Down => app.nudge_selected(-1.0),
        KeyCode::Enter => app.start_edit_text(),
        KeyCode::Char('1') => app.toggle_tag(Tag::A),
        KeyCode::Char('2') => app.toggle_tag(Tag::B),

        // View
        KeyCode::Char('e') => app.toggle_edit_mode(),
        KeyCode::Char('r') => app.rotate(),
        KeyCode::Char('c') => app.cycle_cumulative(),
        KeyCode::Char('k') => app.cycle_cutout(),
        KeyCode::Char('p') => app.toggle_points(),
        KeyCode::PageUp => {
            let plot = app.plot();
            app.viewport.pan(-4.0, &plot);
        }
        KeyCode::PageDown => {
            let plot = app.plot();
            app.viewport.pan(4.0, &plot);
        }

        // Flows
        KeyCode::Char('n') => app.new_flow(),
        KeyCode::Char('d') => app.duplicate_flow(),
        KeyCode::Char('X') => app.request_delete_flow(),
        KeyCode::Char('R') => app.start_rename_flow(),
        KeyCode::Char('F') => app.start_rename_document(),
        KeyCode::Tab => app.cycle_flow(1),
        KeyCode::BackTab => app.cycle_flow(-1),

        // Export
        KeyCode::Char('E') => app.export(ExportFormat::Pdf),
        KeyCode::Char('H') => app.export(ExportFormat::Html),
        KeyCode::Char('S') => app.export(ExportFormat::Svg),

        _ => {}
    }
}

fn handle_text_input_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_input(),
        KeyCode::Enter => app.commit_input(),
        KeyCode::Backspace => app.backspace_input(),
        KeyCode::Char(c) => app.add_input_char(c),
        _ => {}
    }
}

fn handle_confirm_mode(app: &mut App, key: event::KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete_flow(),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_input(),
        _ => {}
    }
}
