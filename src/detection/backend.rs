use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedSemaphorePermit;

use crate::error::BackendError;
use crate::models::{AttemptStatus, CanvasImage, DetectionAttempt};
use crate::validate;

/// A barcode decoding algorithm.
///
/// `decode` is blocking and may take a long time; callers run it on the
/// blocking pool. Finding nothing is a normal outcome and is reported as an
/// empty candidate list, not an error.
pub trait DecoderBackend: Send + Sync {
    /// Candidate strings in order of preference
    fn decode(&self, image: &CanvasImage) -> Result<Vec<String>, BackendError>;

    fn name(&self) -> &str;
}

/// Raw result of one backend call, before validation
#[derive(Debug, Clone)]
pub enum DecodeOutcome {
    Candidates(Vec<String>),
    NoMatch,
    Failed(BackendError),
}

/// Run `backend.decode` on the blocking pool.
///
/// The permit, if any, is held until the decode really finishes. Dropping the
/// returned future does not stop the decode; it keeps the permit and its
/// result is thrown away.
pub async fn decode_async(
    backend: Arc<dyn DecoderBackend>,
    image: Arc<CanvasImage>,
    permit: Option<OwnedSemaphorePermit>,
) -> DecodeOutcome {
    let name = backend.name().to_string();
    let handle = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        backend.decode(&image)
    });

    match handle.await {
        Ok(Ok(candidates)) if candidates.is_empty() => DecodeOutcome::NoMatch,
        Ok(Ok(candidates)) => DecodeOutcome::Candidates(candidates),
        Ok(Err(e)) => DecodeOutcome::Failed(e),
        Err(e) if e.is_panic() => DecodeOutcome::Failed(BackendError::Panicked { backend: name }),
        Err(e) => DecodeOutcome::Failed(BackendError::Decode {
            backend: name,
            reason: e.to_string(),
        }),
    }
}

/// Run a single backend on an image and validate what it finds.
///
/// This is one stage without a transform or timer; the pipeline composes the
/// same pieces with both.
pub async fn detect(backend: Arc<dyn DecoderBackend>, image: Arc<CanvasImage>) -> DetectionAttempt {
    let started = Instant::now();
    let name = backend.name().to_string();
    let outcome = decode_async(backend, image, None).await;
    let mut attempt = DetectionAttempt {
        stage: name.clone(),
        backend: name,
        status: AttemptStatus::NoMatch,
        barcode: None,
        error: None,
        elapsed: started.elapsed(),
    };

    match outcome {
        DecodeOutcome::Candidates(candidates) => {
            match validate::first_valid(&candidates) {
                Some(barcode) => {
                    attempt.status = AttemptStatus::Success;
                    attempt.barcode = Some(barcode.into_string());
                }
                None => {
                    attempt.status = AttemptStatus::Rejected;
                    attempt.barcode = candidates.into_iter().next();
                }
            }
        }
        DecodeOutcome::NoMatch => {}
        DecodeOutcome::Failed(e) => {
            attempt.status = AttemptStatus::Error;
            attempt.error = Some(e.to_string());
        }
    }

    attempt
}
