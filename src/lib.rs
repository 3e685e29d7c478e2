pub mod config;
pub mod detection;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod validate;

pub use config::{ScanConfig, ThresholdMode};
pub use detection::backend::{DecodeOutcome, DecoderBackend};
pub use detection::{build_pipeline_with, build_standard_pipeline};
pub use detection::preparer::ImageInput;
pub use detection::steps::Transform;
pub use error::{BackendError, ScanError};
pub use models::{
    AttemptStatus, Barcode, BarcodeKind, BoundingBox, CanvasImage, DetectionAttempt,
    DetectionResult, ScanResponse,
};
pub use pipeline::{DebugConfig, DetectionStage, Pipeline};
pub use validate::is_valid_barcode;
