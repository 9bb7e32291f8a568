//! PDF page composition.
//!
//! [`compose_page`] lays the page out against the [`PdfSink`] draw-command
//! interface (inches, measured from the top-left corner). [`PrintPdfSink`]
//! turns those commands into a `printpdf` document held in memory.

use std::io::BufWriter;

use anyhow::{anyhow, Context, Result};
use printpdf::image_crate::{DynamicImage, RgbImage};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Pt, Rgb, TextMatrix,
};

use super::raster::{rasterize_scene, RgbRaster};
use super::{qr, wrap_description, ExportRequest, Page, DESCRIPTION_PT};

pub const TITLE_PT: f64 = 16.0;
pub const SUMMARY_PT: f64 = 12.0;

/// Edge of the share-link QR code, inches
pub const QR_SIZE_IN: f64 = 0.9;

/// Line advance for stacked description lines, as a multiple of the font size
const LINE_HEIGHT: f64 = 1.15;

/// Helvetica advance widths for ' ' through '~', in 1/1000 em (core font AFM)
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Advance used for characters outside the table
const FALLBACK_WIDTH: u16 = 556;

const POINTS_PER_INCH: f64 = 72.0;

/// Draw commands the page is built from
pub trait PdfSink {
    /// Text with its baseline origin at (`x`, `y`), rotated counter-clockwise
    fn text(&mut self, text: &str, size_pt: f64, x: f64, y: f64, rotation_deg: f64) -> Result<()>;

    /// Image with its top-left corner at (`x`, `y`)
    fn image(&mut self, raster: &RgbRaster, x: f64, y: f64, width: f64, height: f64) -> Result<()>;

    fn line(&mut self, from: (f64, f64), to: (f64, f64), width_pt: f64) -> Result<()>;
}

/// Lay out title, summary, chart image, descriptions, strikethroughs and the
/// optional QR code.
pub fn compose_page(sink: &mut dyn PdfSink, request: &ExportRequest<'_>) -> Result<()> {
    let layout = request.layout();
    let page = layout.page;

    sink.text(request.title(), TITLE_PT, page.margin, layout.title_y(), 0.0)?;
    sink.text(&request.summary(), SUMMARY_PT, page.margin, layout.summary_y(), 0.0)?;

    let (raster_width, _) = layout.raster_size();
    let raster = rasterize_scene(&request.scene(), raster_width)?;
    sink.image(
        &raster,
        page.margin,
        layout.image_top(),
        layout.image_width(),
        layout.image_height(),
    )?;

    let budget = layout.char_budget();
    let line_advance = DESCRIPTION_PT * LINE_HEIGHT / POINTS_PER_INCH;
    let base_y = layout.description_y();
    for (position, point) in request.flow.points().iter().enumerate() {
        let x = layout.point_x(position);
        let excluded = request.is_excluded(position);
        for (k, chunk) in wrap_description(&point.text, budget).iter().enumerate() {
            let line_x = x + k as f64 * line_advance;
            sink.text(chunk, DESCRIPTION_PT, line_x, base_y, 90.0)?;
            if excluded {
                // Rotated glyphs sit left of their baseline; strike through the middle.
                let strike_x = line_x - DESCRIPTION_PT * 0.3 / POINTS_PER_INCH;
                let length = text_width_pt(chunk, DESCRIPTION_PT) / POINTS_PER_INCH;
                sink.line((strike_x, base_y), (strike_x, base_y - length), 0.75)?;
            }
        }
    }

    if let Some(url) = request.share_url {
        let code = qr::qr_raster(url)?;
        sink.image(
            &code,
            page.width - page.margin - QR_SIZE_IN,
            page.margin - 0.25,
            QR_SIZE_IN,
            QR_SIZE_IN,
        )?;
    }
    Ok(())
}

/// Rendered width of `text` in builtin Helvetica, in points
fn text_width_pt(text: &str, size_pt: f64) -> f64 {
    let units: u32 = text
        .chars()
        .map(|c| {
            (c as usize)
                .checked_sub(0x20)
                .and_then(|i| HELVETICA_WIDTHS.get(i))
                .copied()
                .unwrap_or(FALLBACK_WIDTH) as u32
        })
        .sum();
    units as f64 * size_pt / 1000.0
}

fn mm(inches: f64) -> Mm {
    Mm((inches * 25.4) as f32)
}

/// `printpdf` backed sink with a single US-Letter landscape page
pub struct PrintPdfSink {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    page: Page,
}

impl PrintPdfSink {
    pub fn new(title: &str, page: Page) -> Result<Self> {
        let (doc, page_index, layer_index) =
            PdfDocument::new(title, mm(page.width), mm(page.height), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("Failed to load Helvetica: {e:?}"))?;
        let layer = doc.get_page(page_index).get_layer(layer_index);
        Ok(Self {
            doc,
            layer,
            font,
            page,
        })
    }

    /// PDF y for a distance from the top edge
    fn flip(&self, y: f64) -> f64 {
        self.page.height - y
    }

    /// Serialize the finished document
    pub fn finish(self) -> Result<Vec<u8>> {
        let mut writer = BufWriter::new(Vec::new());
        self.doc
            .save(&mut writer)
            .map_err(|e| anyhow!("Failed to assemble PDF: {e:?}"))?;
        writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush PDF buffer: {e}"))
    }
}

impl PdfSink for PrintPdfSink {
    fn text(&mut self, text: &str, size_pt: f64, x: f64, y: f64, rotation_deg: f64) -> Result<()> {
        let y = self.flip(y);
        if rotation_deg == 0.0 {
            self.layer
                .use_text(text, size_pt as f32, mm(x), mm(y), &self.font);
            return Ok(());
        }
        self.layer.begin_text_section();
        self.layer.set_font(&self.font, size_pt as f32);
        self.layer.set_text_matrix(TextMatrix::TranslateRotate(
            Pt((x * POINTS_PER_INCH) as f32),
            Pt((y * POINTS_PER_INCH) as f32),
            rotation_deg as f32,
        ));
        self.layer.write_text(text, &self.font);
        self.layer.end_text_section();
        Ok(())
    }

    fn image(&mut self, raster: &RgbRaster, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
        let buffer = RgbImage::from_raw(raster.width, raster.height, raster.pixels.clone())
            .context("Raster size does not match its pixel data")?;
        let image = Image::from_dynamic_image(&DynamicImage::ImageRgb8(buffer));

        // At this dpi the image is exactly `width` wide; scale_y fixes the height.
        let dpi = f64::from(raster.width) / width;
        let natural_height = f64::from(raster.height) / dpi;
        image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(x)),
                translate_y: Some(mm(self.flip(y + height))),
                scale_x: Some(1.0),
                scale_y: Some((height / natural_height) as f32),
                dpi: Some(dpi as f32),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), width_pt: f64) -> Result<()> {
        self.layer
            .set_outline_color(Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None)));
        self.layer.set_outline_thickness(width_pt as f32);
        self.layer.add_line(Line {
            points: vec![
                (Point::new(mm(from.0), mm(self.flip(from.1))), false),
                (Point::new(mm(to.0), mm(self.flip(to.1))), false),
            ],
            is_closed: false,
        });
        Ok(())
    }
}

/// Build the whole PDF in memory
pub fn render_pdf(request: &ExportRequest<'_>) -> Result<Vec<u8>> {
    let layout = request.layout();
    let mut sink = PrintPdfSink::new(request.title(), layout.page)?;
    compose_page(&mut sink, request).inspect_err(|e| tracing::error!("PDF export failed: {e:#}"))?;
    sink.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Tag};
    use crate::render::{CutoutMode, ViewState};

    #[derive(Debug, Clone, PartialEq)]
    enum Command {
        Text { text: String, size: f64, x: f64, y: f64, rotation: f64 },
        Image { width_px: u32, x: f64, y: f64, width: f64, height: f64 },
        Line { from: (f64, f64), to: (f64, f64) },
    }

    #[derive(Default)]
    struct Recorder {
        commands: Vec<Command>,
    }

    impl PdfSink for Recorder {
        fn text(&mut self, text: &str, size_pt: f64, x: f64, y: f64, rotation_deg: f64) -> Result<()> {
            self.commands.push(Command::Text {
                text: text.to_string(),
                size: size_pt,
                x,
                y,
                rotation: rotation_deg,
            });
            Ok(())
        }

        fn image(&mut self, raster: &RgbRaster, x: f64, y: f64, width: f64, height: f64) -> Result<()> {
            self.commands.push(Command::Image {
                width_px: raster.width,
                x,
                y,
                width,
                height,
            });
            Ok(())
        }

        fn line(&mut self, from: (f64, f64), to: (f64, f64), _width_pt: f64) -> Result<()> {
            self.commands.push(Command::Line { from, to });
            Ok(())
        }
    }

    fn sample() -> Document {
        let mut doc = Document::new();
        let a = doc.append_point_at(20.0);
        let b = doc.append_point_at(70.0);
        doc.update_point_text(a, "Left home early");
        doc.update_point_text(b, &"x".repeat(30));
        doc.toggle_tag(a, Tag::A);
        doc.set_filename("Trip");
        doc
    }

    #[test]
    fn page_layout_commands() {
        let doc = sample();
        let request = ExportRequest {
            document_name: &doc.filename,
            flow: doc.active_flow(),
            view: ViewState::default(),
            share_url: None,
        };
        let mut recorder = Recorder::default();
        compose_page(&mut recorder, &request).unwrap();
        let commands = recorder.commands;

        assert_eq!(
            commands[0],
            Command::Text { text: "Trip".into(), size: 16.0, x: 0.5, y: 0.5, rotation: 0.0 }
        );
        assert_eq!(
            commands[1],
            Command::Text {
                text: "2 Events | Cumulative Score 2".into(),
                size: 12.0,
                x: 0.5,
                y: 0.8,
                rotation: 0.0
            }
        );
        assert_eq!(
            commands[2],
            Command::Image { width_px: 1920, x: 0.5, y: 1.0, width: 10.0, height: 5.0 }
        );

        let rotated: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                Command::Text { text, rotation, x, y, size } if *rotation == 90.0 => {
                    assert_eq!(*size, 9.0);
                    assert_eq!(*y, 7.8);
                    Some((text.clone(), *x))
                }
                _ => None,
            })
            .collect();
        // the 30-character description is chunked at 26
        assert_eq!(rotated.len(), 3);
        assert_eq!(rotated[0].0, "Left home early");
        assert_eq!(rotated[1].0, "x".repeat(26));
        assert_eq!(rotated[2].0, "xxxx");
        assert!(rotated[2].1 > rotated[1].1);
        assert!(!commands.iter().any(|c| matches!(c, Command::Line { .. })));
    }

    #[test]
    fn cutout_strikes_excluded_descriptions() {
        let doc = sample();
        let request = ExportRequest {
            document_name: &doc.filename,
            flow: doc.active_flow(),
            view: ViewState {
                cutout: CutoutMode::A,
                ..ViewState::default()
            },
            share_url: None,
        };
        let mut recorder = Recorder::default();
        compose_page(&mut recorder, &request).unwrap();
        let strikes: Vec<_> = recorder
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Line { from, to } => Some((*from, *to)),
                _ => None,
            })
            .collect();
        // only the untagged point, one strike per chunk
        assert_eq!(strikes.len(), 2);
        let (from, to) = strikes[0];
        assert_eq!(from.0, to.0);
        assert!(to.1 < from.1);
    }

    #[test]
    fn text_width_follows_glyph_metrics() {
        assert_eq!(text_width_pt("", 10.0), 0.0);
        // narrow and wide glyphs of the same count measure differently
        assert_eq!(text_width_pt("iiii", 10.0), 8.88);
        assert_eq!(text_width_pt("WWWW", 10.0), 37.76);
        assert_eq!(text_width_pt("Hi there", 1000.0), 3501.0);
        assert_eq!(text_width_pt("é", 1000.0), 556.0);
    }

    #[test]
    fn share_url_adds_corner_code() {
        let doc = sample();
        let request = ExportRequest {
            document_name: &doc.filename,
            flow: doc.active_flow(),
            view: ViewState::default(),
            share_url: Some("https://example.com/s/1"),
        };
        let mut recorder = Recorder::default();
        compose_page(&mut recorder, &request).unwrap();
        match recorder.commands.last() {
            Some(Command::Image { x, width, height, .. }) => {
                assert!((x - (11.0 - 0.5 - QR_SIZE_IN)).abs() < 1e-9);
                assert_eq!((*width, *height), (QR_SIZE_IN, QR_SIZE_IN));
            }
            other => panic!("expected QR image last, got {other:?}"),
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let doc = sample();
        let request = ExportRequest {
            document_name: &doc.filename,
            flow: doc.active_flow(),
            view: ViewState::default(),
            share_url: Some("https://example.com"),
        };
        let bytes = render_pdf(&request).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn export_to_path_writes_pdf() {
        let doc = sample();
        let request = ExportRequest {
            document_name: &doc.filename,
            flow: doc.active_flow(),
            view: ViewState::default(),
            share_url: None,
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        crate::export::export_to_path(&request, crate::export::ExportFormat::Pdf, &path).unwrap();
        assert!(std::fs::read(&path).unwrap().starts_with(b"%PDF"));
    }
}
