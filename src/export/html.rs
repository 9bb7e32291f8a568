//! Print-ready HTML export.
//!
//! Same page structure as the PDF, but the chart is inline SVG and the
//! descriptions are live text, so the browser's print-to-PDF stays vector.

use std::fmt::Write;

use anyhow::Result;

use super::{qr, wrap_description, ExportRequest, DESCRIPTION_PT};
use crate::svg::{escape_xml, scene_to_svg};

/// Render the full HTML document for one flow
pub fn render_html(request: &ExportRequest<'_>) -> Result<String> {
    let layout = request.layout();
    let page = layout.page;
    let title = escape_xml(request.title());
    let budget = layout.char_budget();

    let svg = scene_to_svg(&request.scene(), 1.0);
    // Drop the XML prolog; inline SVG must start at the element.
    let svg = svg
        .split_once("?>")
        .map_or(svg.as_str(), |(_, rest)| rest)
        .trim_start();

    let mut output = String::new();
    writeln!(
        &mut output,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  @page {{ size: letter landscape; margin: {margin}in; }}
  body {{ margin: 0; font-family: Helvetica, Arial, sans-serif; }}
  .page {{ position: relative; width: {printable_w}in; height: {printable_h}in; }}
  h1 {{ font-size: 16pt; margin: 0; }}
  .summary {{ font-size: 12pt; margin: 0.1in 0 0 0; }}
  .chart {{ position: absolute; top: 0.5in; left: 0; width: {image_w}in; height: {image_h}in; }}
  .chart svg {{ width: 100%; height: 100%; }}
  .descriptions {{ position: absolute; left: 0; right: 0; top: {strip_top}in; bottom: 0.2in; }}
  .description {{ position: absolute; bottom: 0; font-size: {desc_pt}pt; white-space: pre;
    writing-mode: vertical-rl; transform: rotate(180deg); transform-origin: center; }}
  .excluded {{ text-decoration: line-through; }}
  .qr {{ position: absolute; top: -0.25in; right: 0; width: 0.9in; height: 0.9in; }}
</style>
</head>
<body onload="window.print()">
<div class="page">
<h1>{title}</h1>
<p class="summary">{summary}</p>"#,
        margin = page.margin,
        printable_w = page.printable_width(),
        printable_h = page.printable_height(),
        image_w = layout.image_width(),
        image_h = layout.image_height(),
        strip_top = 0.5 + layout.image_height(),
        desc_pt = DESCRIPTION_PT,
        summary = escape_xml(&request.summary()),
    )
    .unwrap();

    if let Some(url) = request.share_url {
        let uri = qr::qr_data_uri(url)?;
        writeln!(
            &mut output,
            r#"<img class="qr" src="{uri}" alt="{}">"#,
            escape_xml(url)
        )
        .unwrap();
    }

    writeln!(&mut output, r#"<div class="chart">{}</div>"#, svg.trim_end()).unwrap();

    writeln!(&mut output, r#"<div class="descriptions">"#).unwrap();
    for (position, point) in request.flow.points().iter().enumerate() {
        let left = layout.point_x(position) - page.margin;
        let class = if request.is_excluded(position) {
            "description excluded"
        } else {
            "description"
        };
        let lines: Vec<String> = wrap_description(&point.text, budget)
            .iter()
            .map(|chunk| escape_xml(chunk))
            .collect();
        writeln!(
            &mut output,
            r#"  <div class="{class}" style="left: {left:.3}in">{}</div>"#,
            lines.join("<br>")
        )
        .unwrap();
    }
    writeln!(&mut output, "</div>\n</div>\n</body>\n</html>").unwrap();

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Tag};
    use crate::render::{CutoutMode, ViewState};

    fn sample() -> Document {
        let mut doc = Document::new();
        let a = doc.append_point_at(25.0);
        doc.append_point_at(75.0);
        doc.update_point_text(a, "Fish & <chips>");
        doc.toggle_tag(a, Tag::B);
        doc.set_filename("Lunch");
        doc
    }

    #[test]
    fn mirrors_pdf_structure() {
        let doc = sample();
        let request = ExportRequest {
            document_name: &doc.filename,
            flow: doc.active_flow(),
            view: ViewState::default(),
            share_url: None,
        };
        let html = render_html(&request).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("size: letter landscape; margin: 0.5in;"));
        assert!(html.contains("<h1>Lunch</h1>"));
        assert!(html.contains(r#"<p class="summary">2 Events | Cumulative Score 0</p>"#));
        assert!(html.contains(r#"<div class="chart"><svg"#));
        assert!(!html.contains("<?xml"));
        assert!(html.contains("Fish &amp; &lt;chips&gt;"));
        assert!(html.contains(">No description</div>"));
        assert!(html.contains("window.print()"));
        assert!(!html.contains("excluded\""));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn cutout_strikes_and_qr_embeds() {
        let doc = sample();
        let request = ExportRequest {
            document_name: &doc.filename,
            flow: doc.active_flow(),
            view: ViewState {
                cutout: CutoutMode::B,
                ..ViewState::default()
            },
            share_url: Some("https://example.com/?a=1&b=2"),
        };
        let html = render_html(&request).unwrap();
        assert_eq!(html.matches(r#"class="description excluded""#).count(), 1);
        assert!(html.contains("Blue Cutout"));
        assert!(html.contains(r#"src="data:image/png;base64,"#));
        assert!(html.contains(r#"alt="https://example.com/?a=1&amp;b=2""#));
    }
}
