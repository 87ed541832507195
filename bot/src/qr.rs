//! QR codes for tickets: PNG rendering and photo decoding.

use boxoffice_core::error::{DeskError, Result};
use boxoffice_core::ports::QrCodec;
use image::{GrayImage, ImageFormat, Luma};
use qrcode::{Color, QrCode};
use std::io::Cursor;

/// Pixels per module
const SCALE: u32 = 10;
/// Blank modules around the symbol
const QUIET_ZONE: u32 = 4;

/// [`QrCodec`] backed by `qrcode` + `image` for rendering and `rqrr` for decoding
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageQrCodec;

impl ImageQrCodec {
    fn rasterize(code: &QrCode) -> Result<GrayImage> {
        let modules = u32::try_from(code.width())
            .map_err(|_| DeskError::Validation("QR symbol too large".into()))?;
        let side = (modules + 2 * QUIET_ZONE) * SCALE;
        let colors = code.to_colors();

        let mut image = GrayImage::from_pixel(side, side, Luma([255]));
        for (index, color) in colors.iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let index = u32::try_from(index).map_err(|_| DeskError::Validation("QR symbol too large".into()))?;
            let left = (index % modules + QUIET_ZONE) * SCALE;
            let top = (index / modules + QUIET_ZONE) * SCALE;
            for y in top..top + SCALE {
                for x in left..left + SCALE {
                    image.put_pixel(x, y, Luma([0]));
                }
            }
        }
        Ok(image)
    }
}

impl QrCodec for ImageQrCodec {
    fn render_png(&self, payload: &str) -> Result<Vec<u8>> {
        let code = QrCode::new(payload.as_bytes()).map_err(|e| DeskError::Validation(format!("QR encoding: {e}")))?;
        let image = Self::rasterize(&code)?;

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| DeskError::Validation(format!("PNG encoding: {e}")))?;
        Ok(png)
    }

    // Grid coordinates never exceed the u32 dimensions they came from
    #[allow(clippy::cast_possible_truncation)]
    fn decode(&self, bytes: &[u8]) -> Option<String> {
        let gray = match image::load_from_memory(bytes) {
            Ok(decoded) => decoded.to_luma8(),
            Err(error) => {
                tracing::debug!(%error, bytes = bytes.len(), "Photo is not a readable image");
                return None;
            },
        };

        let (width, height) = gray.dimensions();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0]
        });

        prepared.detect_grids().into_iter().find_map(|grid| match grid.decode() {
            Ok((_, content)) => {
                let content = content.trim().to_uppercase();
                (!content.is_empty()).then_some(content)
            },
            Err(error) => {
                tracing::debug!(?error, "QR grid found but not decodable");
                None
            },
        })
    }
}
