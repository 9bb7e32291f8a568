//! SVG to raster conversion for the PDF page image.

use anyhow::{Context, Result};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg;

use crate::scene::Scene;
use crate::svg::scene_to_svg;

/// Opaque 8-bit RGB pixels, row major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbRaster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbRaster {
    /// Expand single-channel pixels
    pub fn from_luma(width: u32, height: u32, luma: &[u8]) -> Self {
        let pixels = luma.iter().flat_map(|&v| [v, v, v]).collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y * self.width + x) * 3) as usize;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
    }
}

/// Render SVG text onto a white background
pub fn rasterize_svg(svg: &str) -> Result<RgbRaster> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_str(svg, &options).context("Failed to parse SVG for rasterizing")?;

    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .with_context(|| format!("Failed to create pixmap {}x{}", size.width(), size.height()))?;
    pixmap.fill(Color::WHITE);
    resvg::render(&tree, Transform::identity(), &mut pixmap.as_mut());

    // The background is opaque white, so dropping alpha loses nothing.
    let pixels = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    Ok(RgbRaster {
        width: size.width(),
        height: size.height(),
        pixels,
    })
}

/// Rasterize a scene to `width` pixels wide, keeping its aspect ratio
pub fn rasterize_scene(scene: &Scene, width: u32) -> Result<RgbRaster> {
    let scale = f64::from(width.max(1)) / scene.width.max(1.0);
    rasterize_svg(&scene_to_svg(scene, scale))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Point2, Rect2};
    use crate::scene::{Element, Paint};

    #[test]
    fn renders_scene_pixels() {
        let mut scene = Scene::new(100.0, 50.0);
        scene.push(Element::Rect {
            rect: Rect2 {
                x: 0.0,
                y: 0.0,
                width: 50.0,
                height: 50.0,
            },
            fill: Paint::BLACK,
            radius: 0.0,
        });
        scene.push(Element::Circle {
            center: Point2::new(75.0, 25.0),
            radius: 10.0,
            fill: Some(Paint::BLUE),
            stroke: None,
        });

        let raster = rasterize_scene(&scene, 200).unwrap();
        assert_eq!((raster.width, raster.height), (200, 100));
        assert_eq!(raster.pixels.len(), 200 * 100 * 3);
        assert_eq!(raster.pixel(10, 10), Some([0, 0, 0]));
        assert_eq!(raster.pixel(190, 90), Some([255, 255, 255]));
        assert_eq!(raster.pixel(150, 50), Some([0x3b, 0x82, 0xf6]));
        assert_eq!(raster.pixel(200, 0), None);
    }

    #[test]
    fn malformed_svg_is_an_error() {
        assert!(rasterize_svg("<svg").is_err());
    }

    #[test]
    fn luma_expands_to_rgb() {
        let raster = RgbRaster::from_luma(2, 1, &[0, 255]);
        assert_eq!(raster.pixels, vec![0, 0, 0, 255, 255, 255]);
    }
}
