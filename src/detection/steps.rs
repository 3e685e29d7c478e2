use anyhow::Result;
use image::DynamicImage;

use crate::config::ThresholdMode;
use crate::detection::preprocessing::{self, Region};
use crate::models::{BoundingBox, CanvasImage};

/// Image transform applied at the start of a stage.
///
/// Implementations must return a freshly allocated buffer: a decoder from an
/// earlier, abandoned stage may still be reading the input.
pub trait Transform: Send + Sync {
    fn apply(&self, image: &CanvasImage) -> Result<CanvasImage>;

    /// Human-readable name (used in logs and debug output)
    fn name(&self) -> &str;
}

/// Hand the image to the decoder unchanged
pub struct IdentityStep;

impl Transform for IdentityStep {
    fn apply(&self, image: &CanvasImage) -> Result<CanvasImage> {
        Ok(image.clone())
    }

    fn name(&self) -> &str {
        "Raw Image"
    }
}

/// Grayscale, then binarize against a single global cutoff
pub struct GlobalThresholdStep {
    pub mode: ThresholdMode,
}

impl Transform for GlobalThresholdStep {
    fn apply(&self, image: &CanvasImage) -> Result<CanvasImage> {
        let gray = preprocessing::to_grayscale(image.image());
        let binary = match self.mode {
            ThresholdMode::Binary => preprocessing::global_threshold(&gray),
            ThresholdMode::ThreeLevel => preprocessing::three_level_threshold(&gray),
        };
        Ok(image.derive(DynamicImage::ImageLuma8(binary)))
    }

    fn name(&self) -> &str {
        match self.mode {
            ThresholdMode::Binary => "Global Threshold",
            ThresholdMode::ThreeLevel => "Three-Level Threshold",
        }
    }
}

/// Grayscale, then binarize each pixel against its neighborhood
pub struct AdaptiveThresholdStep;

impl Transform for AdaptiveThresholdStep {
    fn apply(&self, image: &CanvasImage) -> Result<CanvasImage> {
        let gray = preprocessing::to_grayscale(image.image());
        let binary = preprocessing::adaptive_threshold(&gray);
        Ok(image.derive(DynamicImage::ImageLuma8(binary)))
    }

    fn name(&self) -> &str {
        "Adaptive Threshold"
    }
}

/// Cut one region of interest out of the frame
pub struct RegionCropStep {
    pub region: Region,
    name: String,
}

impl RegionCropStep {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            name: format!("Region {}", region.name()),
        }
    }
}

impl Transform for RegionCropStep {
    fn apply(&self, image: &CanvasImage) -> Result<CanvasImage> {
        let (width, height) = image.dimensions();
        let bbox = self.region.bounds(width, height).ok_or_else(|| {
            anyhow::anyhow!(
                "{} region is empty for a {}x{} image",
                self.region.name(),
                width,
                height
            )
        })?;

        let cropped = preprocessing::crop_region(image.image(), &bbox);

        // Report the crop in coordinates of the prepared source image
        let origin = image.bbox().map(|b| (b.x, b.y)).unwrap_or((0, 0));
        let source_bbox = BoundingBox {
            x: origin.0 + bbox.x,
            y: origin.1 + bbox.y,
            ..bbox
        };

        Ok(CanvasImage::from_region(cropped, source_bbox))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
