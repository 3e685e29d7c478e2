use barscan::detection::preprocessing::to_grayscale;
use barscan::{BackendError, CanvasImage, DecoderBackend};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Code rendered by the crisp barcode fixtures; its check digit is correct
pub const SAMPLE_EAN13: &str = "5012345678900";

const L_CODES: [&str; 10] = [
    "0001101", "0011001", "0010011", "0111101", "0100011", "0110001", "0101111", "0111011",
    "0110111", "0001011",
];

/// Left-half parity per leading digit (L = odd, G = even)
const PARITY: [&str; 10] = [
    "LLLLLL", "LLGLGG", "LLGGLG", "LLGGGL", "LGLLGG", "LGGLLG", "LGGGLL", "LGLGLG", "LGLGGL",
    "LGGLGL",
];

fn r_code(digit: usize) -> String {
    L_CODES[digit]
        .chars()
        .map(|c| if c == '0' { '1' } else { '0' })
        .collect()
}

fn g_code(digit: usize) -> String {
    r_code(digit).chars().rev().collect()
}

/// The 95 modules of an EAN-13 symbol, `true` for a bar
pub fn ean13_modules(code: &str) -> Vec<bool> {
    let digits: Vec<usize> = code
        .bytes()
        .map(|b| (b - b'0') as usize)
        .collect();
    assert_eq!(digits.len(), 13, "EAN-13 needs 13 digits");

    let mut pattern = String::from("101");
    for (i, parity) in PARITY[digits[0]].chars().enumerate() {
        let digit = digits[i + 1];
        if parity == 'L' {
            pattern.push_str(L_CODES[digit]);
        } else {
            pattern.push_str(&g_code(digit));
        }
    }
    pattern.push_str("01010");
    for &digit in &digits[7..] {
        pattern.push_str(&r_code(digit));
    }
    pattern.push_str("101");

    pattern.chars().map(|c| c == '1').collect()
}

/// Draw an EAN-13 symbol centered on a `width` x `height` canvas.
///
/// `bar` and `space` are the gray levels of bars and of everything else.
pub fn render_ean13(
    code: &str,
    width: u32,
    height: u32,
    module_px: u32,
    bar: u8,
    space: u8,
) -> RgbImage {
    let modules = ean13_modules(code);
    let symbol_width = modules.len() as u32 * module_px;
    let left = width.saturating_sub(symbol_width) / 2;
    let top = height / 4;
    let bottom = height - height / 4;

    ImageBuffer::from_fn(width, height, |x, y| {
        let inside = x >= left && x < left + symbol_width && y >= top && y < bottom;
        let is_bar = inside && modules[((x - left) / module_px) as usize];
        let level = if is_bar { bar } else { space };
        Rgb([level, level, level])
    })
}

/// Crisp black-on-white sample barcode
pub fn sample_barcode_image(width: u32, height: u32) -> RgbImage {
    render_ean13(SAMPLE_EAN13, width, height, 3, 0, 255)
}

/// Deterministic noise with no barcode in it
pub fn noise_image(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed;
    ImageBuffer::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let v = (state >> 24) as u8;
        Rgb([v, v.wrapping_add(37), v.wrapping_mul(3)])
    })
}

/// Vertical stripes alternating between two gray levels
pub fn striped_image(width: u32, height: u32, dark: u8, light: u8) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, _| {
        let level = if (x / 8) % 2 == 0 { dark } else { light };
        Rgb([level, level, level])
    })
}

/// Black left half, white right half
pub fn left_dark_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, _| {
        if x < width / 2 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

pub fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut out, ImageFormat::Png)
        .expect("Failed to encode test image");
    out.into_inner()
}

pub fn png_data_url(img: &RgbImage) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png_bytes(img)))
}

/// Backend that always answers the same way, optionally after a delay
pub struct FixedBackend {
    name: String,
    result: Result<Vec<String>, BackendError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedBackend {
    pub fn found(name: &str, candidates: &[&str]) -> Self {
        Self::with_result(
            name,
            Ok(candidates.iter().map(|c| c.to_string()).collect()),
        )
    }

    pub fn nothing(name: &str) -> Self {
        Self::with_result(name, Ok(Vec::new()))
    }

    pub fn failing(name: &str) -> Self {
        Self::with_result(
            name,
            Err(BackendError::Decode {
                backend: name.to_string(),
                reason: "simulated failure".to_string(),
            }),
        )
    }

    fn with_result(name: &str, result: Result<Vec<String>, BackendError>) -> Self {
        Self {
            name: name.to_string(),
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DecoderBackend for FixedBackend {
    fn decode(&self, _image: &CanvasImage) -> Result<Vec<String>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.result.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Reads `code` only from images whose pixels all satisfy `accept`
pub struct PixelGateBackend {
    code: String,
    accept: fn(u8) -> bool,
}

impl PixelGateBackend {
    /// Succeeds on fully binarized images
    pub fn binary_only(code: &str) -> Self {
        Self {
            code: code.to_string(),
            accept: |v| v == 0 || v == 255,
        }
    }

    /// Succeeds on images with no light pixels at all
    pub fn dark_only(code: &str) -> Self {
        Self {
            code: code.to_string(),
            accept: |v| v < 50,
        }
    }
}

impl DecoderBackend for PixelGateBackend {
    fn decode(&self, image: &CanvasImage) -> Result<Vec<String>, BackendError> {
        let gray = to_grayscale(image.image());
        if gray.pixels().all(|p| (self.accept)(p[0])) {
            Ok(vec![self.code.clone()])
        } else {
            Ok(Vec::new())
        }
    }

    fn name(&self) -> &str {
        "pixel-gate"
    }
}
