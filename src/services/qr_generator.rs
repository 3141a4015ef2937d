use image::{ImageBuffer, Luma};
use qrcode::render::svg;
use qrcode::QrCode;

use crate::error::AppError;

const MODULE_SIZE: u32 = 10; // Each module is 10x10 pixels
const QUIET_ZONE: u32 = 4; // Modules of white border on each side

#[derive(thiserror::Error, Debug)]
pub enum QrGenerationError {
    #[error("QR code generation failed: {0}")]
    QrCodeError(#[from] qrcode::types::QrError),

    #[error("PNG encoding failed: {0}")]
    ImageError(#[from] image::ImageError),
}

impl From<QrGenerationError> for AppError {
    fn from(e: QrGenerationError) -> Self {
        AppError::Internal(e.into())
    }
}

/// Renders `data` (normally a check-in URL) as an SVG QR code
pub fn generate_qr_svg(data: &str) -> Result<String, QrGenerationError> {
    let code = QrCode::new(data.as_bytes())?;

    let svg = code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .build();

    Ok(svg)
}

/// Renders `data` as a grayscale PNG QR code
pub fn generate_qr_png(data: &str) -> Result<Vec<u8>, QrGenerationError> {
    let code = QrCode::new(data.as_bytes())?;

    let width = code.width() as u32;
    let img_size = (width + 2 * QUIET_ZONE) * MODULE_SIZE;

    let img = ImageBuffer::<Luma<u8>, Vec<u8>>::from_fn(img_size, img_size, |x, y| {
        let module_x = (x / MODULE_SIZE).checked_sub(QUIET_ZONE);
        let module_y = (y / MODULE_SIZE).checked_sub(QUIET_ZONE);

        match (module_x, module_y) {
            (Some(mx), Some(my)) if mx < width && my < width => {
                match code[(mx as usize, my as usize)] {
                    qrcode::types::Color::Dark => Luma([0u8]),
                    qrcode::types::Color::Light => Luma([255u8]),
                }
            }
            _ => Luma([255u8]),
        }
    });

    let mut png_data = Vec::new();
    image::DynamicImage::ImageLuma8(img).write_to(
        &mut std::io::Cursor::new(&mut png_data),
        image::ImageFormat::Png,
    )?;

    Ok(png_data)
}
