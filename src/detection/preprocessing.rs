use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::{ThresholdType, threshold};

use crate::models::BoundingBox;

/// Cutoff used by the global and three-level thresholds
pub const MID_GRAY: u8 = 128;

/// Luminance with fixed 0.299/0.587/0.114 weights, rounded
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
    y.round().clamp(0.0, 255.0) as u8
}

/// Convert image to grayscale with the fixed luminance weights.
///
/// `DynamicImage::to_luma8` uses Rec. 709 weights, which shifts mid-tones
/// enough to change threshold decisions, so grayscale inputs are copied as-is
/// and color inputs are converted here.
pub fn to_grayscale(img: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = img {
        return gray.clone();
    }
    let rgb = img.to_rgb8();
    let mut gray = GrayImage::new(rgb.width(), rgb.height());
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        gray.put_pixel(x, y, Luma([luminance(r, g, b)]));
    }
    gray
}

/// Binarize at mid-gray: strictly brighter than 128 becomes white
pub fn global_threshold(gray: &GrayImage) -> GrayImage {
    threshold(gray, MID_GRAY, ThresholdType::Binary)
}

/// Very dark pixels go black, very light go white, mid-tones are cut at 127.
pub fn three_level_threshold(gray: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let level = match pixel[0] {
            0..=79 => 0,
            176..=255 => 255,
            v if v > 127 => 255,
            _ => 0,
        };
        out.put_pixel(x, y, Luma([level]));
    }
    out
}

/// Pixels closer than this to a border keep the global cutoff
const ADAPTIVE_MARGIN: u32 = 5;
/// A pixel stays white down to this far below its local mean
const ADAPTIVE_BIAS: f32 = 10.0;

/// Binarize each pixel against the mean of its 3x3 neighborhood.
pub fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let interior = x > ADAPTIVE_MARGIN
                && x + ADAPTIVE_MARGIN < width
                && y > ADAPTIVE_MARGIN
                && y + ADAPTIVE_MARGIN < height;

            let local = if interior {
                let mut sum = 0u32;
                for ny in y - 1..=y + 1 {
                    for nx in x - 1..=x + 1 {
                        sum += gray.get_pixel(nx, ny)[0] as u32;
                    }
                }
                sum as f32 / 9.0
            } else {
                MID_GRAY as f32
            };

            let value = gray.get_pixel(x, y)[0] as f32;
            let level = if value > local - ADAPTIVE_BIAS { 255 } else { 0 };
            out.put_pixel(x, y, Luma([level]));
        }
    }

    out
}

/// Region of interest, as fractions of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Center,
    Top,
    Bottom,
    Left,
    Right,
}

impl Region {
    /// Regions in the order the pipeline tries them
    pub const ALL: [Region; 5] = [
        Region::Center,
        Region::Top,
        Region::Bottom,
        Region::Left,
        Region::Right,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Region::Center => "center",
            Region::Top => "top",
            Region::Bottom => "bottom",
            Region::Left => "left",
            Region::Right => "right",
        }
    }

    /// (x, y, width, height) as fractions of the frame
    pub fn fractions(&self) -> (f32, f32, f32, f32) {
        match self {
            Region::Center => (0.25, 0.25, 0.5, 0.5),
            Region::Top => (0.1, 0.1, 0.8, 0.4),
            Region::Bottom => (0.1, 0.5, 0.8, 0.4),
            Region::Left => (0.0, 0.2, 0.5, 0.6),
            Region::Right => (0.5, 0.2, 0.5, 0.6),
        }
    }

    /// Pixel rectangle for a frame of the given size, clamped to the frame.
    /// Returns None when the region would be empty.
    pub fn bounds(&self, width: u32, height: u32) -> Option<BoundingBox> {
        let (fx, fy, fw, fh) = self.fractions();
        let x = (width as f32 * fx).floor() as u32;
        let y = (height as f32 * fy).floor() as u32;
        let w = ((width as f32 * fw).floor() as u32).min(width.saturating_sub(x));
        let h = ((height as f32 * fh).floor() as u32).min(height.saturating_sub(y));

        if w == 0 || h == 0 {
            return None;
        }

        Some(BoundingBox {
            x,
            y,
            width: w,
            height: h,
        })
    }
}

/// Copy a region out of the image; the source is left untouched
pub fn crop_region(img: &DynamicImage, bbox: &BoundingBox) -> DynamicImage {
    img.crop_imm(bbox.x, bbox.y, bbox.width, bbox.height)
}
