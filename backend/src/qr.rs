use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;
use thiserror::Error;

/// Smallest edge, in pixels, of a rendered code including its quiet zone.
pub const QR_MIN_DIMENSION: u32 = 240;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("Voting URL is empty")]
    EmptyUrl,
    #[error("Voting URL cannot be encoded as a QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("Failed to encode QR image: {0}")]
    Image(#[from] image::ImageError),
}

/// Renders `url` as a grayscale PNG. Same input, same bytes.
pub fn render_voting_qr(url: &str) -> Result<Vec<u8>, QrError> {
    if url.trim().is_empty() {
        return Err(QrError::EmptyUrl);
    }

    let code = QrCode::new(url.as_bytes())?;
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(QR_MIN_DIMENSION, QR_MIN_DIMENSION)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(image).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

/// `data:` URI for embedding a PNG straight into an `<img>` tag.
pub fn data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}
