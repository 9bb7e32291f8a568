//! QR code image for the optional share link printed in the page corner.

use std::io::Cursor;

use anyhow::{Context, Result};
use base64::Engine;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use qrcode::QrCode;

use super::raster::RgbRaster;

/// Minimum rendered edge, pixels
const QR_MIN_SIZE: u32 = 240;

/// Render `url` as a QR code with its quiet zone
pub fn qr_image(url: &str) -> Result<GrayImage> {
    let code = QrCode::new(url.as_bytes()).context("Failed to encode share link as QR code")?;
    Ok(code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .min_dimensions(QR_MIN_SIZE, QR_MIN_SIZE)
        .build())
}

/// QR code as an opaque RGB raster for the PDF page
pub fn qr_raster(url: &str) -> Result<RgbRaster> {
    let image = qr_image(url)?;
    Ok(RgbRaster::from_luma(image.width(), image.height(), image.as_raw()))
}

/// QR code as a `data:image/png;base64,...` URI for HTML
pub fn qr_data_uri(url: &str) -> Result<String> {
    let image = qr_image(url)?;
    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .context("Failed to encode QR code as PNG")?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);
    Ok(format!("data:image/png;base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(image: &GrayImage) -> String {
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            image.width() as usize,
            image.height() as usize,
            |x, y| image.get_pixel(x as u32, y as u32).0[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1);
        let (_meta, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn qr_round_trips_url() {
        let url = "https://example.com/sumpoints?flow=1";
        let image = qr_image(url).unwrap();
        assert!(image.width() >= QR_MIN_SIZE);
        assert_eq!(decode(&image), url);
    }

    #[test]
    fn raster_matches_image_size() {
        let raster = qr_raster("https://example.com").unwrap();
        assert_eq!(raster.pixels.len(), (raster.width * raster.height * 3) as usize);
        // quiet zone corner is white
        assert_eq!(raster.pixel(0, 0), Some([255, 255, 255]));
    }

    #[test]
    fn data_uri_is_png() {
        let uri = qr_data_uri("https://example.com").unwrap();
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(payload).unwrap();
        assert_eq!(&bytes[..4], b"\x89PNG");
    }
}
