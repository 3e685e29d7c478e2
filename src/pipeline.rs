use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::Semaphore;

use crate::detection::backend::{self, DecodeOutcome, DecoderBackend};
use crate::detection::preparer::{self, ImageInput};
use crate::detection::steps::Transform;
use crate::error::ScanError;
use crate::models::{AttemptStatus, Barcode, CanvasImage, DetectionAttempt, DetectionResult};
use crate::validate;

/// One (transform, backend, timeout) unit of the pipeline
#[derive(Clone)]
pub struct DetectionStage {
    pub name: String,
    pub transform: Arc<dyn Transform>,
    pub backend: Arc<dyn DecoderBackend>,
    pub timeout: Duration,
}

impl DetectionStage {
    pub fn new(
        name: impl Into<String>,
        transform: Arc<dyn Transform>,
        backend: Arc<dyn DecoderBackend>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            transform,
            backend,
            timeout,
        }
    }
}

impl std::fmt::Debug for DetectionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionStage")
            .field("name", &self.name)
            .field("transform", &self.transform.name())
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// Write the image a stage is about to decode. Failures are logged only.
    fn save(&self, dir_name: &str, image: &CanvasImage) {
        let dir = self.output_dir.join(dir_name);
        let result = std::fs::create_dir_all(&dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| {
                image
                    .image()
                    .save(dir.join("input.png"))
                    .map_err(anyhow::Error::from)
            });
        match result {
            Ok(()) => tracing::debug!("Debug: saved {}/input.png", dir_name),
            Err(e) => tracing::warn!("Failed to save debug image to {}: {}", dir.display(), e),
        }
    }
}

/// Where a scan currently is
#[derive(Debug)]
enum PipelineState {
    Preparing(ImageInput),
    RunningStage(usize),
    Validating(usize, DetectionAttempt, Vec<String>),
    Succeeded(Barcode),
    Exhausted(ScanError),
}

/// What one stage produced before validation
enum StageOutcome {
    Decoded(DecodeOutcome),
    Failed(String),
    TimedOut,
}

/// Ordered list of detection stages plus the shared limits they run under
pub struct Pipeline {
    stages: Vec<DetectionStage>,
    max_dimension: u32,
    in_flight: Arc<Semaphore>,
    debug: Option<DebugConfig>,
}

impl Pipeline {
    /// Create a new empty pipeline
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            max_dimension: 800,
            in_flight: Arc::new(Semaphore::new(2)),
            debug: None,
        }
    }

    /// Bound on the longest side of the prepared image
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension.max(1);
        self
    }

    /// Bound on decoder calls running at once, including abandoned ones
    pub fn with_max_in_flight(mut self, permits: usize) -> Self {
        self.in_flight = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    /// Enable debug mode with output directory.
    /// The directory must be empty or non-existent.
    pub fn with_debug(mut self, output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    /// Append a stage; stages run in the order they were added
    pub fn add_stage(mut self, stage: DetectionStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[DetectionStage] {
        &self.stages
    }

    pub fn debug_dir(&self) -> Option<&Path> {
        self.debug.as_ref().map(|d| d.output_dir.as_path())
    }

    /// Sum of all stage timeouts: the worst-case scan time, scheduling aside
    pub fn total_budget(&self) -> Duration {
        self.stages.iter().map(|s| s.timeout).sum()
    }

    /// Scan encoded image bytes
    pub async fn detect_bytes(&self, bytes: Vec<u8>) -> DetectionResult {
        self.detect(ImageInput::Bytes(bytes)).await
    }

    /// Scan a `data:image/...;base64,` URL
    pub async fn detect_data_url(&self, url: impl Into<String>) -> DetectionResult {
        self.detect(ImageInput::DataUrl(url.into())).await
    }

    /// Prepare the input, then run the stages until one yields a valid barcode
    pub async fn detect(&self, input: ImageInput) -> DetectionResult {
        self.drive(PipelineState::Preparing(input), None).await
    }

    /// Run the stages on an already decoded image, skipping preparation
    pub async fn run(&self, image: CanvasImage) -> DetectionResult {
        self.drive(PipelineState::RunningStage(0), Some(Arc::new(image)))
            .await
    }

    async fn drive(
        &self,
        mut state: PipelineState,
        mut source: Option<Arc<CanvasImage>>,
    ) -> DetectionResult {
        let started = Instant::now();
        let mut attempts: Vec<DetectionAttempt> = Vec::with_capacity(self.stages.len());

        tracing::info!("Running barcode pipeline ({} stages)", self.stages.len());

        loop {
            state = match state {
                PipelineState::Preparing(input) => match self.prepare(input).await {
                    Ok(image) => {
                        tracing::debug!("Prepared {}x{} image", image.width(), image.height());
                        if let Some(debug) = &self.debug {
                            debug.save("00_input", &image);
                        }
                        source = Some(Arc::new(image));
                        PipelineState::RunningStage(0)
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                        return DetectionResult::failed(e, attempts, started.elapsed());
                    }
                },

                PipelineState::RunningStage(index) if index >= self.stages.len() => {
                    PipelineState::Exhausted(ScanError::AllStagesExhausted {
                        stages: self.stages.len(),
                    })
                }

                PipelineState::RunningStage(index) => {
                    let Some(image) = source.clone() else {
                        let e = ScanError::ImageLoad("no image to scan".to_string());
                        return DetectionResult::failed(e, attempts, started.elapsed());
                    };
                    let stage = &self.stages[index];
                    let stage_started = Instant::now();
                    let outcome = self.run_stage(index, stage, image).await;

                    let mut attempt = DetectionAttempt {
                        stage: stage.name.clone(),
                        backend: stage.backend.name().to_string(),
                        status: AttemptStatus::NoMatch,
                        barcode: None,
                        error: None,
                        elapsed: stage_started.elapsed(),
                    };

                    match outcome {
                        // Validation decides the final status of this attempt
                        StageOutcome::Decoded(DecodeOutcome::Candidates(candidates)) => {
                            PipelineState::Validating(index, attempt, candidates)
                        }
                        StageOutcome::Decoded(DecodeOutcome::NoMatch) => {
                            self.record(&mut attempts, index, attempt)
                        }
                        StageOutcome::Decoded(DecodeOutcome::Failed(e)) => {
                            tracing::warn!("Stage '{}': {}", stage.name, e);
                            attempt.status = AttemptStatus::Error;
                            attempt.error = Some(ScanError::from(e).to_string());
                            self.record(&mut attempts, index, attempt)
                        }
                        StageOutcome::Failed(reason) => {
                            tracing::warn!("Stage '{}' failed: {}", stage.name, reason);
                            attempt.status = AttemptStatus::Error;
                            attempt.error = Some(reason);
                            self.record(&mut attempts, index, attempt)
                        }
                        StageOutcome::TimedOut => {
                            attempt.status = AttemptStatus::Timeout;
                            attempt.error =
                                Some(ScanError::StageTimeout(stage.timeout).to_string());
                            self.record(&mut attempts, index, attempt)
                        }
                    }
                }

                PipelineState::Validating(index, mut attempt, candidates) => {
                    match validate::first_valid(&candidates) {
                        Some(barcode) => {
                            attempt.status = AttemptStatus::Success;
                            attempt.barcode = Some(barcode.as_str().to_string());
                            self.record(&mut attempts, index, attempt);
                            PipelineState::Succeeded(barcode)
                        }
                        None => {
                            let rejected = candidates.into_iter().next().unwrap_or_default();
                            attempt.status = AttemptStatus::Rejected;
                            attempt.error =
                                Some(ScanError::ValidationRejected(rejected.clone()).to_string());
                            attempt.barcode = Some(rejected);
                            self.record(&mut attempts, index, attempt)
                        }
                    }
                }

                PipelineState::Succeeded(barcode) => {
                    let stage = attempts.last().map(|a| a.stage.as_str()).unwrap_or("");
                    tracing::info!(
                        "Detected {:?} barcode {} at stage '{}' in {:?}",
                        barcode.kind(),
                        barcode,
                        stage,
                        started.elapsed()
                    );
                    if !barcode.has_valid_check_digit() {
                        tracing::warn!("Barcode {} has an unexpected check digit", barcode);
                    }
                    return DetectionResult::succeeded(barcode, attempts, started.elapsed());
                }

                PipelineState::Exhausted(e) => {
                    tracing::info!(
                        "No barcode after {} attempts in {:?}",
                        attempts.len(),
                        started.elapsed()
                    );
                    return DetectionResult::failed(e, attempts, started.elapsed());
                }
            };
        }
    }

    /// Log and keep a finished attempt, then move on to the next stage
    fn record(
        &self,
        attempts: &mut Vec<DetectionAttempt>,
        index: usize,
        attempt: DetectionAttempt,
    ) -> PipelineState {
        tracing::debug!(
            "Stage {} '{}' -> {:?} in {:?}",
            index + 1,
            attempt.stage,
            attempt.status,
            attempt.elapsed
        );
        attempts.push(attempt);
        PipelineState::RunningStage(index + 1)
    }

    async fn prepare(&self, input: ImageInput) -> Result<CanvasImage, ScanError> {
        let max_dimension = self.max_dimension;
        tokio::task::spawn_blocking(move || preparer::prepare_image(input, max_dimension))
            .await
            .map_err(|e| ScanError::ImageLoad(format!("image decoding aborted: {}", e)))?
    }

    /// Transform, then decode, all under the stage timer
    async fn run_stage(
        &self,
        index: usize,
        stage: &DetectionStage,
        source: Arc<CanvasImage>,
    ) -> StageOutcome {
        let transform = stage.transform.clone();
        let backend = stage.backend.clone();
        let in_flight = self.in_flight.clone();
        let debug = self
            .debug
            .clone()
            .map(|d| (d, format!("{:02}_{}", index + 1, dir_name(&stage.name))));

        let work = async move {
            let transformed = tokio::task::spawn_blocking(move || {
                let image = transform.apply(&source)?;
                if let Some((debug, folder)) = debug {
                    debug.save(&folder, &image);
                }
                Ok::<_, anyhow::Error>(image)
            })
            .await;

            let image = match transformed {
                Ok(Ok(image)) => Arc::new(image),
                Ok(Err(e)) => return StageOutcome::Failed(format!("transform failed: {}", e)),
                Err(e) => return StageOutcome::Failed(format!("transform aborted: {}", e)),
            };

            let permit = match in_flight.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return StageOutcome::Failed(e.to_string()),
            };

            StageOutcome::Decoded(backend::decode_async(backend, image, Some(permit)).await)
        };

        match tokio::time::timeout(stage.timeout, work).await {
            Ok(outcome) => outcome,
            Err(_) => StageOutcome::TimedOut,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn dir_name(stage_name: &str) -> String {
    stage_name.to_lowercase().replace([' ', '/'], "_")
}
