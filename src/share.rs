use std::io::Cursor;

use anyhow::{Context, Result};
use base64::Engine;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

// Low error correction keeps the module grid coarse, which scans better at
// small sizes.
const EC_LEVEL: EcLevel = EcLevel::L;
const QUIET_ZONE: u32 = 4;
const TARGET_PIXELS: u32 = 240;

const DARK: Luma<u8> = Luma([0u8]);
const LIGHT: Luma<u8> = Luma([255u8]);

/// Render a permalink as a QR code image.
pub fn qr_image(text: &str) -> Result<GrayImage> {
    let code = QrCode::with_error_correction_level(text.as_bytes(), EC_LEVEL)
        .with_context(|| format!("encode qr for {text}"))?;
    let modules = code.width() as u32;
    let colors = code.to_colors();

    let grid = modules + 2 * QUIET_ZONE;
    let scale = (TARGET_PIXELS / grid).max(1);
    let size = grid * scale;

    let mut image = GrayImage::from_pixel(size, size, LIGHT);
    for (index, color) in colors.iter().enumerate() {
        if *color != qrcode::Color::Dark {
            continue;
        }
        let module_x = (index as u32 % modules + QUIET_ZONE) * scale;
        let module_y = (index as u32 / modules + QUIET_ZONE) * scale;
        for dy in 0..scale {
            for dx in 0..scale {
                image.put_pixel(module_x + dx, module_y + dy, DARK);
            }
        }
    }
    Ok(image)
}

pub fn png_bytes(image: &GrayImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .context("encode qr png")?;
    Ok(bytes)
}

/// The `data:` URL form the page fed straight into the preview modal.
pub fn data_url(png: &[u8]) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

pub fn qr_png(text: &str) -> Result<Vec<u8>> {
    png_bytes(&qr_image(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_image_is_square_and_contains_dark_modules() {
        let image = qr_image("https://example.com/post/42").unwrap();
        assert_eq!(image.width(), image.height());
        assert!(image.width() >= TARGET_PIXELS / 2);
        assert!(image.pixels().any(|p| *p == DARK));
        // Quiet zone stays light.
        assert_eq!(*image.get_pixel(0, 0), LIGHT);
    }

    #[test]
    fn png_round_trips_through_the_decoder() {
        let png = qr_png("https://example.com/post/42").unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), decoded.height());
    }

    #[test]
    fn data_url_has_the_png_prefix() {
        let url = data_url(&[0x89, 0x50, 0x4e, 0x47]);
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }
}
