//! SVG serialization of a [`Scene`].
//!
//! Output is a standalone document in scene units. Masked elements become an
//! SVG `<mask>` so the holes stay transparent; everything else maps one to one.

use std::fmt::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::geometry::Point2;
use crate::scene::{Anchor, Element, Paint, Scene};

/// Serialize a scene, scaled by `scale` in the outer width/height only
pub fn scene_to_svg(scene: &Scene, scale: f64) -> String {
    let mut output = String::new();
    let mut mask_count = 0;

    writeln!(
        &mut output,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg"
     width="{}" height="{}"
     viewBox="0 0 {} {}"
     style="background-color: white;">"#,
        num(scene.width * scale),
        num(scene.height * scale),
        num(scene.width),
        num(scene.height)
    )
    .unwrap();

    for element in &scene.elements {
        render_element(&mut output, element, &mut mask_count, "  ");
    }

    writeln!(&mut output, "</svg>").unwrap();
    output
}

/// Save a scene to a file
pub fn save_svg(scene: &Scene, path: &Path) -> Result<()> {
    let svg = scene_to_svg(scene, 1.0);
    std::fs::write(path, svg).with_context(|| format!("Failed to save to {:?}", path))?;
    Ok(())
}

/// Compact number formatting: integers without a trailing `.0`
fn num(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

fn paint_attr(name: &str, paint: Paint) -> String {
    if paint.alpha < 1.0 {
        format!(
            r#"{name}="{}" {name}-opacity="{}""#,
            paint.to_hex(),
            num(paint.alpha)
        )
    } else {
        format!(r#"{name}="{}""#, paint.to_hex())
    }
}

fn points_attr(points: &[Point2]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", num(p.x), num(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_element(output: &mut String, element: &Element, mask_count: &mut usize, indent: &str) {
    match element {
        Element::Line {
            from,
            to,
            stroke,
            width,
        } => {
            writeln!(
                output,
                r#"{indent}<line x1="{}" y1="{}" x2="{}" y2="{}" {} stroke-width="{}"/>"#,
                num(from.x),
                num(from.y),
                num(to.x),
                num(to.y),
                paint_attr("stroke", *stroke),
                num(*width)
            )
            .unwrap();
        }
        Element::Rect { rect, fill, radius } => {
            let rx = if *radius > 0.0 {
                format!(r#" rx="{}""#, num(*radius))
            } else {
                String::new()
            };
            writeln!(
                output,
                r#"{indent}<rect x="{}" y="{}" width="{}" height="{}"{rx} {}/>"#,
                num(rect.x),
                num(rect.y),
                num(rect.width),
                num(rect.height),
                paint_attr("fill", *fill)
            )
            .unwrap();
        }
        Element::Circle {
            center,
            radius,
            fill,
            stroke,
        } => {
            let fill = fill.map_or_else(|| r#"fill="none""#.to_string(), |f| paint_attr("fill", f));
            let stroke = stroke.map_or_else(String::new, |(paint, width)| {
                format!(r#" {} stroke-width="{}""#, paint_attr("stroke", paint), num(width))
            });
            writeln!(
                output,
                r#"{indent}<circle cx="{}" cy="{}" r="{}" {fill}{stroke}/>"#,
                num(center.x),
                num(center.y),
                num(*radius)
            )
            .unwrap();
        }
        Element::Polyline {
            points,
            stroke,
            width,
        } => {
            writeln!(
                output,
                r#"{indent}<polyline points="{}" fill="none" {} stroke-width="{}" stroke-linejoin="round"/>"#,
                points_attr(points),
                paint_attr("stroke", *stroke),
                num(*width)
            )
            .unwrap();
        }
        Element::Text {
            at,
            text,
            size,
            fill,
            anchor,
        } => {
            let anchor = match anchor {
                Anchor::Start => "start",
                Anchor::Middle => "middle",
            };
            writeln!(
                output,
                r#"{indent}<text x="{}" y="{}" font-family="sans-serif" font-size="{}" text-anchor="{anchor}" dominant-baseline="middle" {}>{}</text>"#,
                num(at.x),
                num(at.y),
                num(*size),
                paint_attr("fill", *fill),
                escape_xml(text)
            )
            .unwrap();
        }
        Element::Masked { holes, content } => {
            *mask_count += 1;
            let id = format!("mask{}", mask_count);
            writeln!(output, r#"{indent}<mask id="{id}">"#).unwrap();
            writeln!(
                output,
                r#"{indent}  <rect x="-100%" y="-100%" width="300%" height="300%" fill="white"/>"#
            )
            .unwrap();
            let inner = format!("{indent}  ");
            for hole in holes {
                // Holes are painted black in the mask regardless of their own paint.
                render_element(output, &as_mask_hole(hole), mask_count, &inner);
            }
            writeln!(output, "{indent}</mask>").unwrap();
            writeln!(output, r#"{indent}<g mask="url(#{id})">"#).unwrap();
            for element in content {
                render_element(output, element, mask_count, &inner);
            }
            writeln!(output, "{indent}</g>").unwrap();
        }
    }
}

fn as_mask_hole(element: &Element) -> Element {
    match element {
        Element::Rect { rect, radius, .. } => Element::Rect {
            rect: *rect,
            fill: Paint::BLACK,
            radius: *radius,
        },
        Element::Circle { center, radius, .. } => Element::Circle {
            center: *center,
            radius: *radius,
            fill: Some(Paint::BLACK),
            stroke: None,
        },
        other => other.clone(),
    }
}

/// Escape special XML characters
pub fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
