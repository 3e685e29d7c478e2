mod common;

use barscan::detection::backend;
use barscan::detection::preprocessing::Region;
use barscan::detection::steps::{IdentityStep, RegionCropStep};
use barscan::{DetectionStage, ScanError};
use common::*;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;

fn stage(name: &str, backend: Arc<dyn DecoderBackend>, timeout: Duration) -> DetectionStage {
    DetectionStage::new(name, Arc::new(IdentityStep), backend, timeout)
}

fn canvas(img: image::RgbImage) -> CanvasImage {
    CanvasImage::new(DynamicImage::ImageRgb8(img))
}

#[tokio::test]
async fn test_standard_stage_order() {
    let pipeline = build_standard_pipeline(&ScanConfig::default());
    let names: Vec<&str> = pipeline.stages().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "raw",
            "enhanced",
            "region-center",
            "region-top",
            "region-bottom",
            "region-left",
            "region-right",
            "adaptive",
            "ocr",
        ]
    );
    assert_eq!(pipeline.total_budget(), Duration::from_millis(20_500));

    let without_ocr = build_standard_pipeline(&config_without_ocr());
    assert_eq!(without_ocr.stages().len(), 8);
    assert!(without_ocr.stages().iter().all(|s| s.name != "ocr"));
}

#[tokio::test]
async fn test_low_contrast_found_by_enhanced_stage() {
    let backend = Arc::new(PixelGateBackend::binary_only(SAMPLE_EAN13));
    let pipeline = build_pipeline_with(&config_without_ocr(), backend, None);

    let result = pipeline
        .detect_bytes(png_bytes(&striped_image(320, 240, 110, 150)))
        .await;

    assert!(result.success());
    assert_eq!(result.barcode().unwrap().as_str(), SAMPLE_EAN13);
    assert_eq!(
        statuses(&result),
        vec![AttemptStatus::NoMatch, AttemptStatus::Success]
    );
    assert_eq!(result.attempts()[1].stage, "enhanced");
}

#[tokio::test]
async fn test_barcode_in_left_region() {
    let backend = Arc::new(PixelGateBackend::dark_only("04912345"));
    let pipeline = build_pipeline_with(&config_without_ocr(), backend, None);

    let result = pipeline.run(canvas(left_dark_image(800, 600))).await;

    assert!(result.success());
    assert_eq!(result.barcode().unwrap().as_str(), "04912345");
    assert_eq!(
        stage_names(&result),
        vec![
            "raw",
            "enhanced",
            "region-center",
            "region-top",
            "region-bottom",
            "region-left",
        ]
    );
    assert!(
        result.attempts()[..5]
            .iter()
            .all(|a| a.status == AttemptStatus::NoMatch)
    );
}

#[tokio::test]
async fn test_stops_at_first_success() {
    let first = Arc::new(FixedBackend::nothing("first"));
    let second = Arc::new(FixedBackend::found("second", &["5012345678900"]));
    let third = Arc::new(FixedBackend::found("third", &["04912345"]));
    let pipeline = Pipeline::new()
        .add_stage(stage("one", first.clone(), Duration::from_secs(1)))
        .add_stage(stage("two", second.clone(), Duration::from_secs(1)))
        .add_stage(stage("three", third.clone(), Duration::from_secs(1)));

    let result = pipeline.run(canvas(noise_image(64, 64, 1))).await;

    assert!(result.success());
    assert_eq!(result.barcode().unwrap().as_str(), "5012345678900");
    assert_eq!(result.attempts().len(), 2);
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
    assert_eq!(third.calls(), 0);
}

#[tokio::test]
async fn test_invalid_candidate_is_rejected_and_scan_continues() {
    let pipeline = Pipeline::new()
        .add_stage(stage(
            "short",
            Arc::new(FixedBackend::found("short", &["1234567"])),
            Duration::from_secs(1),
        ))
        .add_stage(stage(
            "letters",
            Arc::new(FixedBackend::found("letters", &["04912345a"])),
            Duration::from_secs(1),
        ))
        .add_stage(stage(
            "good",
            Arc::new(FixedBackend::found("good", &["  012345678905 "])),
            Duration::from_secs(1),
        ));

    let result = pipeline.run(canvas(noise_image(64, 64, 2))).await;

    assert!(result.success());
    assert_eq!(result.barcode().unwrap().as_str(), "012345678905");
    assert_eq!(
        statuses(&result),
        vec![
            AttemptStatus::Rejected,
            AttemptStatus::Rejected,
            AttemptStatus::Success,
        ]
    );
    assert_eq!(result.attempts()[0].barcode.as_deref(), Some("1234567"));
    assert!(result.attempts()[0].error.is_some());
}

#[tokio::test]
async fn test_rejected_only_candidates_fail_the_scan() {
    let pipeline = Pipeline::new().add_stage(stage(
        "only",
        Arc::new(FixedBackend::found("only", &["1234567"])),
        Duration::from_secs(1),
    ));

    let result = pipeline.run(canvas(noise_image(64, 64, 3))).await;

    assert!(!result.success());
    assert!(result.barcode().is_none());
    assert_eq!(result.error_message(), Some(NO_BARCODE_MESSAGE));
    assert!(matches!(
        result.error(),
        Some(ScanError::AllStagesExhausted { stages: 1 })
    ));
}

#[tokio::test]
async fn test_backend_error_does_not_stop_scan() {
    let pipeline = Pipeline::new()
        .add_stage(stage(
            "broken",
            Arc::new(FixedBackend::failing("broken")),
            Duration::from_secs(1),
        ))
        .add_stage(stage(
            "working",
            Arc::new(FixedBackend::found("working", &["04912345"])),
            Duration::from_secs(1),
        ));

    let result = pipeline.run(canvas(noise_image(64, 64, 4))).await;

    assert!(result.success());
    assert_eq!(
        statuses(&result),
        vec![AttemptStatus::Error, AttemptStatus::Success]
    );
    let error = result.attempts()[0].error.as_deref().unwrap();
    assert!(error.contains("simulated failure"));
}

#[tokio::test]
async fn test_slow_stage_times_out() {
    let slow = Arc::new(
        FixedBackend::found("slow", &["04912345"]).with_delay(Duration::from_millis(400)),
    );
    let pipeline = Pipeline::new()
        .add_stage(stage("slow", slow, Duration::from_millis(50)))
        .add_stage(stage(
            "fast",
            Arc::new(FixedBackend::nothing("fast")),
            Duration::from_secs(1),
        ));

    let result = pipeline.run(canvas(noise_image(64, 64, 5))).await;

    assert!(!result.success());
    assert_eq!(
        statuses(&result),
        vec![AttemptStatus::Timeout, AttemptStatus::NoMatch]
    );
    // The late answer from the abandoned decode is never used
    assert!(result.attempts()[0].barcode.is_none());
    assert!(result.attempts()[0].elapsed < Duration::from_millis(300));
    assert!(result.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_abandoned_decodes_hold_their_slot() {
    let slow = Arc::new(FixedBackend::nothing("slow").with_delay(Duration::from_millis(500)));
    let quick = Arc::new(FixedBackend::found("quick", &["04912345"]));
    let pipeline = Pipeline::new()
        .with_max_in_flight(1)
        .add_stage(stage("slow", slow, Duration::from_millis(50)))
        .add_stage(stage("starved", quick.clone(), Duration::from_millis(100)))
        .add_stage(stage("patient", quick.clone(), Duration::from_secs(3)));

    let result = pipeline.run(canvas(noise_image(64, 64, 6))).await;

    assert!(result.success());
    assert_eq!(
        statuses(&result),
        vec![
            AttemptStatus::Timeout,
            AttemptStatus::Timeout,
            AttemptStatus::Success,
        ]
    );
    // The starved stage never got to call its backend
    assert_eq!(quick.calls(), 1);
}

#[tokio::test]
async fn test_transform_failure_is_recorded() {
    let backend = Arc::new(FixedBackend::found("after", &["04912345"]));
    let pipeline = Pipeline::new()
        .add_stage(DetectionStage::new(
            "tiny-region",
            Arc::new(RegionCropStep::new(Region::Center)),
            backend.clone(),
            Duration::from_secs(1),
        ))
        .add_stage(stage("after", backend.clone(), Duration::from_secs(1)));

    let result = pipeline.run(canvas(noise_image(1, 1, 7))).await;

    assert!(result.success());
    assert_eq!(
        statuses(&result),
        vec![AttemptStatus::Error, AttemptStatus::Success]
    );
    assert!(
        result.attempts()[0]
            .error
            .as_deref()
            .unwrap()
            .contains("transform failed")
    );
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn test_empty_pipeline_reports_no_barcode() {
    let result = Pipeline::new().run(canvas(noise_image(16, 16, 8))).await;

    assert!(!result.success());
    assert!(result.attempts().is_empty());
    assert_eq!(result.error_message(), Some(NO_BARCODE_MESSAGE));
}

#[tokio::test]
async fn test_repeated_scans_are_deterministic() {
    let backend = Arc::new(PixelGateBackend::binary_only(SAMPLE_EAN13));
    let pipeline = build_pipeline_with(&config_without_ocr(), backend, None);
    let bytes = png_bytes(&noise_image(200, 150, 9));

    let first = pipeline.detect_bytes(bytes.clone()).await;
    let second = pipeline.detect_bytes(bytes).await;

    assert_eq!(first.success(), second.success());
    assert_eq!(statuses(&first), statuses(&second));
    assert_eq!(stage_names(&first), stage_names(&second));
    assert_eq!(first.response(), second.response());
}

#[tokio::test]
async fn test_single_backend_detect() {
    let image = Arc::new(canvas(noise_image(32, 32, 10)));

    let found = backend::detect(
        Arc::new(FixedBackend::found("mock", &["abc", "5012345678900"])),
        image.clone(),
    )
    .await;
    assert!(found.is_success());
    assert_eq!(found.barcode.as_deref(), Some("5012345678900"));

    let rejected = backend::detect(
        Arc::new(FixedBackend::found("mock", &["1234567"])),
        image.clone(),
    )
    .await;
    assert_eq!(rejected.status, AttemptStatus::Rejected);

    let failed = backend::detect(Arc::new(FixedBackend::failing("mock")), image).await;
    assert_eq!(failed.status, AttemptStatus::Error);
    assert!(failed.error.is_some());
}

#[tokio::test]
async fn test_debug_mode_saves_stage_inputs() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let backend = Arc::new(FixedBackend::nothing("mock"));
    let pipeline = build_pipeline_with(&config_without_ocr(), backend, None)
        .with_debug(dir.path().to_path_buf())?;

    let result = pipeline
        .detect_bytes(png_bytes(&noise_image(120, 90, 11)))
        .await;
    assert!(!result.success());

    assert!(dir.path().join("00_input/input.png").exists());
    assert!(dir.path().join("01_raw/input.png").exists());
    assert!(dir.path().join("06_region-left/input.png").exists());
    assert!(dir.path().join("08_adaptive/input.png").exists());

    let saved = image::open(dir.path().join("03_region-center/input.png"))?;
    assert_eq!((saved.width(), saved.height()), (60, 45));
    Ok(())
}

#[tokio::test]
async fn test_debug_dir_must_be_empty() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    std::fs::write(dir.path().join("leftover.txt"), "x")?;

    assert!(Pipeline::new().with_debug(dir.path().to_path_buf()).is_err());

    let fresh = dir.path().join("fresh");
    let pipeline = Pipeline::new().with_debug(fresh.clone())?;
    assert_eq!(pipeline.debug_dir(), Some(fresh.as_path()));
    assert!(fresh.is_dir());
    Ok(())
}
