use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;

use crate::detection::backend::DecoderBackend;
use crate::error::BackendError;
use crate::models::CanvasImage;

const BACKEND_NAME: &str = "ocr";

/// Digits printed under the bars: 8 to 13 of them, standing alone
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{8,13}\b").expect("valid regex"));

/// Loaded once per process and shared read-only afterwards.
///
/// A failed load is not cached, so installing the models fixes the next scan.
static OCR_ENGINE: OnceCell<Arc<OcrEngine>> = OnceCell::new();

/// Load the ocrs detection and recognition models from `model_dir`
pub fn init_ocr_engine(model_dir: &Path) -> anyhow::Result<OcrEngine> {
    let detection_model_path = model_dir.join("text-detection.rten");
    let recognition_model_path = model_dir.join("text-recognition.rten");

    if !detection_model_path.exists() || !recognition_model_path.exists() {
        anyhow::bail!(
            "OCR models not found. Please run: ocrs-cli --help (or download models manually)\n\
             Expected locations:\n  - {}\n  - {}",
            detection_model_path.display(),
            recognition_model_path.display()
        );
    }

    let detection_model = Model::load_file(&detection_model_path)?;
    let recognition_model = Model::load_file(&recognition_model_path)?;

    let engine = OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        allowed_chars: Some("0123456789".to_string()),
        ..Default::default()
    })?;

    Ok(engine)
}

/// Process-wide OCR engine, loading it on first use
pub fn shared_engine(model_dir: &Path) -> anyhow::Result<Arc<OcrEngine>> {
    OCR_ENGINE
        .get_or_try_init(|| {
            tracing::info!("Initializing OCR engine from {}", model_dir.display());
            init_ocr_engine(model_dir).map(Arc::new)
        })
        .cloned()
}

/// Every standalone 8-13 digit run in `text`, in reading order
pub fn extract_digit_runs(text: &str) -> Vec<String> {
    DIGIT_RUN
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Fallback backend reading the human-readable digits under a barcode
pub struct OcrDecoder {
    model_dir: Option<PathBuf>,
}

impl OcrDecoder {
    /// `model_dir` of None means no models are available; every call then fails
    /// with an init error.
    pub fn new(model_dir: Option<PathBuf>) -> Self {
        Self { model_dir }
    }

    fn engine(&self) -> Result<Arc<OcrEngine>, BackendError> {
        let init_error = |reason: String| BackendError::Init {
            backend: BACKEND_NAME.to_string(),
            reason,
        };
        let dir = self
            .model_dir
            .as_deref()
            .ok_or_else(|| init_error("no OCR model directory configured".to_string()))?;
        shared_engine(dir).map_err(|e| init_error(e.to_string()))
    }
}

impl DecoderBackend for OcrDecoder {
    fn decode(&self, image: &CanvasImage) -> Result<Vec<String>, BackendError> {
        let engine = self.engine()?;
        let decode_error = |reason: String| BackendError::Decode {
            backend: BACKEND_NAME.to_string(),
            reason,
        };

        let img = image.image().to_rgb8();
        let img_source = ImageSource::from_bytes(img.as_raw(), img.dimensions())
            .map_err(|e| decode_error(e.to_string()))?;
        let ocr_input = engine
            .prepare_input(img_source)
            .map_err(|e| decode_error(e.to_string()))?;
        let text = engine
            .get_text(&ocr_input)
            .map_err(|e| decode_error(e.to_string()))?;

        tracing::debug!("OCR text: {:?}", text.trim());
        Ok(extract_digit_runs(&text))
    }

    fn name(&self) -> &str {
        BACKEND_NAME
    }
}
