use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

use crate::error::ScanError;
use crate::models::CanvasImage;

/// Encoded image as handed over by the capture side
#[derive(Debug, Clone)]
pub enum ImageInput {
    /// Raw file bytes (PNG, JPEG, ...)
    Bytes(Vec<u8>),
    /// `data:image/...;base64,...` string
    DataUrl(String),
}

impl ImageInput {
    /// Resolve to encoded image bytes
    pub fn into_bytes(self) -> Result<Vec<u8>, ScanError> {
        match self {
            ImageInput::Bytes(bytes) => Ok(bytes),
            ImageInput::DataUrl(url) => decode_data_url(&url),
        }
    }
}

impl From<Vec<u8>> for ImageInput {
    fn from(bytes: Vec<u8>) -> Self {
        ImageInput::Bytes(bytes)
    }
}

/// Extract the payload of a base64 data URL
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, ScanError> {
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| ScanError::ImageLoad("not a data URL".to_string()))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| ScanError::ImageLoad("data URL has no payload".to_string()))?;

    if !meta.split(';').any(|part| part.eq_ignore_ascii_case("base64")) {
        return Err(ScanError::ImageLoad(
            "only base64 data URLs are supported".to_string(),
        ));
    }

    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(payload)
        .map_err(|e| ScanError::ImageLoad(format!("invalid base64 payload: {}", e)))
}

/// Decode image bytes, guessing the format from the content
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ScanError> {
    if bytes.is_empty() {
        return Err(ScanError::ImageLoad("empty input".to_string()));
    }

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ScanError::ImageLoad(format!("unreadable input: {}", e)))?
        .decode()
        .map_err(|e| ScanError::ImageLoad(format!("failed to decode image: {}", e)))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(ScanError::ImageLoad("image has no pixels".to_string()));
    }

    Ok(img)
}

/// Scale down so neither side exceeds `max_dimension`, keeping the aspect ratio
pub fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Triangle)
}

/// Decode and bound an input image. Blocking; the pipeline runs it off the executor.
pub fn prepare_image(input: ImageInput, max_dimension: u32) -> Result<CanvasImage, ScanError> {
    let bytes = input.into_bytes()?;
    let img = decode_image(&bytes)?;
    let (width, height) = (img.width(), img.height());
    let img = fit_within(img, max_dimension);

    if (img.width(), img.height()) != (width, height) {
        tracing::debug!(
            "Scaled input from {}x{} to {}x{}",
            width,
            height,
            img.width(),
            img.height()
        );
    }

    Ok(CanvasImage::new(img))
}
