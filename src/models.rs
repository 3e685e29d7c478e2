use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::error::ScanError;

/// Bounding box in the prepared source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pixel buffer handed from stage to stage.
///
/// A `CanvasImage` is never mutated once built. Transforms produce a new one,
/// and stages share them through `Arc`, so a decoder that outlives its stage
/// keeps reading exactly the pixels it was given.
#[derive(Debug, Clone)]
pub struct CanvasImage {
    image: DynamicImage,
    /// Region of the prepared source image this buffer was cut from (None means full image)
    bbox: Option<BoundingBox>,
}

impl CanvasImage {
    pub fn new(image: DynamicImage) -> Self {
        Self { image, bbox: None }
    }

    pub fn from_gray(gray: GrayImage) -> Self {
        Self::new(DynamicImage::ImageLuma8(gray))
    }

    /// Create a canvas for a sub-region of a larger image
    pub fn from_region(image: DynamicImage, bbox: BoundingBox) -> Self {
        Self {
            image,
            bbox: Some(bbox),
        }
    }

    /// Keep the source region of `self` on a derived buffer
    pub fn derive(&self, image: DynamicImage) -> Self {
        Self {
            image,
            bbox: self.bbox,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        self.bbox
    }

    pub fn is_grayscale(&self) -> bool {
        matches!(
            self.image,
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_)
        )
    }
}

/// Symbology family implied by the length of a validated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BarcodeKind {
    Ean8,
    UpcA,
    Ean13,
    Itf14,
}

impl BarcodeKind {
    pub fn from_len(len: usize) -> Option<Self> {
        match len {
            8 => Some(BarcodeKind::Ean8),
            12 => Some(BarcodeKind::UpcA),
            13 => Some(BarcodeKind::Ean13),
            14 => Some(BarcodeKind::Itf14),
            _ => None,
        }
    }
}

/// A digit string that passed [`crate::validate::is_valid_barcode`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Barcode(String);

impl Barcode {
    /// Validate a candidate string, trimming surrounding whitespace.
    pub fn parse(candidate: &str) -> Result<Self, ScanError> {
        let code = candidate.trim();
        if crate::validate::is_valid_barcode(code) {
            Ok(Self(code.to_string()))
        } else {
            Err(ScanError::ValidationRejected(candidate.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> BarcodeKind {
        // Length was checked in `parse`
        BarcodeKind::from_len(self.0.len()).unwrap_or(BarcodeKind::Ean13)
    }

    /// GS1 mod-10 check digit test.
    ///
    /// Informational only: acceptance depends on length and digits alone.
    pub fn has_valid_check_digit(&self) -> bool {
        let digits: Vec<u32> = self.0.bytes().map(|b| (b - b'0') as u32).collect();
        let Some((check, body)) = digits.split_last() else {
            return false;
        };
        let sum: u32 = body
            .iter()
            .rev()
            .enumerate()
            .map(|(i, d)| if i % 2 == 0 { d * 3 } else { *d })
            .sum();
        (10 - sum % 10) % 10 == *check
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a single stage ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    NoMatch,
    Timeout,
    Error,
    /// The backend produced candidates but none passed validation
    Rejected,
}

/// Diagnostics for one stage run
#[derive(Debug, Clone, Serialize)]
pub struct DetectionAttempt {
    pub stage: String,
    pub backend: String,
    pub status: AttemptStatus,
    pub barcode: Option<String>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl DetectionAttempt {
    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }
}

/// Final outcome of one scan
#[derive(Debug, Clone)]
pub struct DetectionResult {
    success: bool,
    barcode: Option<Barcode>,
    error: Option<ScanError>,
    attempts: Vec<DetectionAttempt>,
    elapsed: Duration,
}

impl DetectionResult {
    pub(crate) fn succeeded(
        barcode: Barcode,
        attempts: Vec<DetectionAttempt>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: true,
            barcode: Some(barcode),
            error: None,
            attempts,
            elapsed,
        }
    }

    pub(crate) fn failed(
        error: ScanError,
        attempts: Vec<DetectionAttempt>,
        elapsed: Duration,
    ) -> Self {
        Self {
            success: false,
            barcode: None,
            error: Some(error),
            attempts,
            elapsed,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn barcode(&self) -> Option<&Barcode> {
        self.barcode.as_ref()
    }

    /// The underlying error, for logging
    pub fn error(&self) -> Option<&ScanError> {
        self.error.as_ref()
    }

    /// Message meant for the end user; never a raw per-stage error
    pub fn error_message(&self) -> Option<&'static str> {
        self.error.as_ref().map(ScanError::user_message)
    }

    pub fn attempts(&self) -> &[DetectionAttempt] {
        &self.attempts
    }

    /// Wall-clock time of the whole scan
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The caller-facing `{ success, barcode?, error? }` contract
    pub fn response(&self) -> ScanResponse {
        ScanResponse {
            success: self.success,
            barcode: self.barcode.as_ref().map(|b| b.as_str().to_string()),
            error: self.error_message().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
