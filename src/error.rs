use std::time::Duration;

/// Failure of a single decoder backend call.
///
/// Backend errors are never fatal to a scan: they fail the stage that
/// produced them and the pipeline moves on.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BackendError {
    #[error("{backend} could not be initialized: {reason}")]
    Init { backend: String, reason: String },
    #[error("{backend} failed to decode: {reason}")]
    Decode { backend: String, reason: String },
    #[error("{backend} panicked while decoding")]
    Panicked { backend: String },
}

/// Everything that can go wrong during a scan.
///
/// Only [`ScanError::ImageLoad`] and [`ScanError::AllStagesExhausted`] ever
/// reach the caller; the rest are recorded per attempt.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ScanError {
    #[error("failed to load image: {0}")]
    ImageLoad(String),
    #[error("stage timed out after {0:?}")]
    StageTimeout(Duration),
    #[error("no barcode found")]
    NoMatch,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("candidate {0:?} is not a valid barcode")]
    ValidationRejected(String),
    #[error("no valid barcode after {stages} stages")]
    AllStagesExhausted { stages: usize },
}

impl ScanError {
    /// Short message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            ScanError::ImageLoad(_) => "Failed to load image",
            _ => "No barcode detected. Please ensure the barcode is clear and well-lit.",
        }
    }
}
