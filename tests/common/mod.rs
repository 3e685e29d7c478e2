#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from barscan for tests
pub use barscan::{
    AttemptStatus, CanvasImage, DecoderBackend, DetectionResult, ImageInput, Pipeline,
    ScanConfig, build_pipeline_with, build_standard_pipeline,
};

pub const NO_BARCODE_MESSAGE: &str =
    "No barcode detected. Please ensure the barcode is clear and well-lit.";

/// Default settings without the OCR stage, so tests never need model files
pub fn config_without_ocr() -> ScanConfig {
    ScanConfig {
        enable_ocr: false,
        ..ScanConfig::default()
    }
}

pub fn statuses(result: &DetectionResult) -> Vec<AttemptStatus> {
    result.attempts().iter().map(|a| a.status).collect()
}

pub fn stage_names(result: &DetectionResult) -> Vec<String> {
    result.attempts().iter().map(|a| a.stage.clone()).collect()
}
