//! Print export: page layout shared by the PDF and HTML writers.
//!
//! The print scene is always horizontal, sized `max(16, n + 1)` grid units
//! wide by [`PRINT_EXTENT`] tall, and fitted onto a US-Letter landscape page
//! without ever scaling past 1:1.

pub mod html;
pub mod pdf;
pub mod qr;
pub mod raster;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::document::Flow;
use crate::geometry::{grid_index, Orientation, Plot, GRID_UNIT, PRINT_EXTENT};
use crate::render::{render_scene, RenderInput, Target, ViewState};
use crate::scene::Scene;
use crate::score::compute_scores;

/// Screen pixels per inch used when fitting the scene to the page
pub const CSS_DPI: f64 = 96.0;

/// Description text size, points
pub const DESCRIPTION_PT: f64 = 9.0;

/// Chunk length for descriptions on charts of up to [`BASE_POINT_COUNT`] points
pub const BASE_CHAR_BUDGET: usize = 26;

pub const BASE_POINT_COUNT: usize = 15;

/// Fallback printed for points without a description
pub const NO_DESCRIPTION: &str = "No description";

/// Page size and margins, inches
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
}

impl Page {
    pub const LETTER_LANDSCAPE: Page = Page {
        width: 11.0,
        height: 8.5,
        margin: 0.5,
    };

    pub fn printable_width(&self) -> f64 {
        self.width - self.margin * 2.0
    }

    pub fn printable_height(&self) -> f64 {
        self.height - self.margin * 2.0
    }
}

/// Geometry of one exported page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportLayout {
    pub page: Page,
    pub count: usize,
    /// Scene width in scene units
    pub total_width: f64,
    /// Scene height in scene units
    pub height: f64,
    /// Scene-to-screen scale, never above 1
    pub scale: f64,
}

impl ExportLayout {
    pub fn new(count: usize) -> Self {
        let page = Page::LETTER_LANDSCAPE;
        let total_width = (16.0 * GRID_UNIT).max((count + 1) as f64 * GRID_UNIT);
        let height = PRINT_EXTENT;
        let scale = (page.printable_width() * CSS_DPI / total_width)
            .min(page.printable_height() * CSS_DPI / height)
            .min(1.0);
        Self {
            page,
            count,
            total_width,
            height,
            scale,
        }
    }

    pub fn plot(&self) -> Plot {
        Plot::new(Orientation::Horizontal, self.total_width, self.height)
    }

    pub fn title_y(&self) -> f64 {
        self.page.margin
    }

    pub fn summary_y(&self) -> f64 {
        self.page.margin + 0.3
    }

    /// Top edge of the chart image
    pub fn image_top(&self) -> f64 {
        self.page.margin + 0.5
    }

    pub fn image_width(&self) -> f64 {
        self.page.printable_width()
    }

    pub fn image_height(&self) -> f64 {
        self.image_width() * self.height / self.total_width
    }

    /// Page x of the point at `position`, inches
    pub fn point_x(&self, position: usize) -> f64 {
        self.page.margin + grid_index(position) / self.total_width * self.image_width()
    }

    /// Baseline origin of the rotated descriptions, inches from the top
    pub fn description_y(&self) -> f64 {
        self.page.height - self.page.margin - 0.2
    }

    /// Raster size in pixels: the fitted scene at twice screen density
    pub fn raster_size(&self) -> (u32, u32) {
        let w = (self.total_width * self.scale * 2.0).round().max(1.0) as u32;
        let h = (self.height * self.scale * 2.0).round().max(1.0) as u32;
        (w, h)
    }

    /// Characters per description line
    pub fn char_budget(&self) -> usize {
        char_budget(self.count, self.scale)
    }
}

/// Constant up to 15 points, then growing with the square root of the count
/// to use the longer vertical run each narrower column gets.
pub fn char_budget(count: usize, scale: f64) -> usize {
    if count <= BASE_POINT_COUNT {
        return BASE_CHAR_BUDGET;
    }
    let ratio = count as f64 / BASE_POINT_COUNT as f64;
    let extra = (BASE_CHAR_BUDGET as f64 * ratio.sqrt() * (1.0 / scale) * 0.8).floor();
    BASE_CHAR_BUDGET + extra as usize
}

/// Hard-chunk a description every `budget` characters
pub fn wrap_description(text: &str, budget: usize) -> Vec<String> {
    let text = if text.is_empty() { NO_DESCRIPTION } else { text };
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(budget.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// Overlay labels active for the export, in display order
fn overlay_labels(view: &ViewState) -> Vec<&'static str> {
    [view.cumulative.label(), view.cutout.label()]
        .into_iter()
        .flatten()
        .collect()
}

/// `"12 Events | Cumulative Score 7 | Cumulative Line"`
pub fn summary_line(count: usize, total: i32, view: &ViewState) -> String {
    let mut parts = vec![format!("{count} Events"), format!("Cumulative Score {total}")];
    parts.extend(overlay_labels(view).into_iter().map(String::from));
    parts.join(" | ")
}

/// Replace characters that are not safe in file names
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// `"{document}_{flow}_{n} Events_{total} Cml Score[_{labels}]"`, without extension
pub fn export_filename(document: &str, flow: &str, count: usize, total: i32, view: &ViewState) -> String {
    let mut name = format!("{document}_{flow}_{count} Events_{total} Cml Score");
    for label in overlay_labels(view) {
        name.push('_');
        name.push_str(label);
    }
    sanitize_filename(&name)
}

/// Output format, chosen from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Pdf,
    Html,
    Svg,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Html => "html",
            ExportFormat::Svg => "svg",
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pdf") => Ok(ExportFormat::Pdf),
            Some("html") | Some("htm") => Ok(ExportFormat::Html),
            Some("svg") => Ok(ExportFormat::Svg),
            _ => bail!("Unsupported export format for {:?} (use .pdf, .html or .svg)", path),
        }
    }
}

/// One flow prepared for printing
#[derive(Debug, Clone)]
pub struct ExportRequest<'a> {
    pub document_name: &'a str,
    pub flow: &'a Flow,
    pub view: ViewState,
    pub share_url: Option<&'a str>,
}

impl<'a> ExportRequest<'a> {
    pub fn layout(&self) -> ExportLayout {
        ExportLayout::new(self.flow.len())
    }

    pub fn total(&self) -> i32 {
        compute_scores(self.flow.points()).total
    }

    pub fn title(&self) -> &str {
        self.document_name
    }

    pub fn summary(&self) -> String {
        summary_line(self.flow.len(), self.total(), &self.view)
    }

    pub fn filename(&self) -> String {
        export_filename(
            self.document_name,
            &self.flow.name,
            self.flow.len(),
            self.total(),
            &self.view,
        )
    }

    /// Whether a point's description gets struck through
    pub fn is_excluded(&self, position: usize) -> bool {
        let cutout = self.view.cutout;
        cutout.is_active()
            && self
                .flow
                .points()
                .get(position)
                .is_some_and(|p| !cutout.includes(self.flow, p.id))
    }

    /// The chart as printed: horizontal, full grid, every point shown
    pub fn scene(&self) -> Scene {
        let view = ViewState {
            orientation: Orientation::Horizontal,
            show_points: true,
            edit_mode: false,
            ..self.view
        };
        let input = RenderInput::new(
            self.flow,
            self.flow.points(),
            view,
            Target::Print,
            self.layout().plot(),
        );
        render_scene(&input)
    }
}

/// Export in `format` to `path`. Nothing is written unless every step succeeds.
pub fn export_to_path(request: &ExportRequest<'_>, format: ExportFormat, path: &Path) -> Result<()> {
    let bytes = match format {
        ExportFormat::Pdf => pdf::render_pdf(request)?,
        ExportFormat::Html => html::render_html(request)?.into_bytes(),
        ExportFormat::Svg => {
            crate::svg::save_svg(&request.scene(), path)?;
            tracing::info!(?path, ?format, "exported flow");
            return Ok(());
        }
    };
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    tracing::info!(?path, ?format, "exported flow");
    Ok(())
}

/// Export into `dir` under the synthesized file name
pub fn export_to_dir(request: &ExportRequest<'_>, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let path = dir.join(format!("{}.{}", request.filename(), format.extension()));
    export_to_path(request, format, &path)?;
    Ok(path)
}
