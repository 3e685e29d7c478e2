use barscan::detection::preprocessing::Region;
use barscan::detection::steps::*;
use barscan::detection::symbolic::SymbolicDecoder;
use barscan::{DetectionStage, Pipeline, ThresholdMode};
use image::ImageReader;
use std::env;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image_path> [debug_dir]", args[0]);
        std::process::exit(1);
    }

    let img = ImageReader::open(&args[1])?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    println!("Loaded image: {}x{}", img.width(), img.height());

    // Retail codes only, and only the cheap stages with short timers
    let decoder = Arc::new(SymbolicDecoder::product_codes().with_try_harder(false));
    let mut pipeline = Pipeline::new()
        .with_max_in_flight(1)
        .add_stage(DetectionStage::new(
            "binary",
            Arc::new(GlobalThresholdStep {
                mode: ThresholdMode::Binary,
            }),
            decoder.clone(),
            Duration::from_millis(1500),
        ))
        .add_stage(DetectionStage::new(
            "bottom",
            Arc::new(RegionCropStep::new(Region::Bottom)),
            decoder.clone(),
            Duration::from_millis(500),
        ))
        .add_stage(DetectionStage::new(
            "adaptive",
            Arc::new(AdaptiveThresholdStep),
            decoder,
            Duration::from_millis(1000),
        ));

    if let Some(dir) = args.get(2) {
        pipeline = pipeline.with_debug(dir.into())?;
        println!("Saving stage inputs under {}", dir);
    }

    for stage in pipeline.stages() {
        println!("  {:?}", stage);
    }

    let result = pipeline.run(barscan::CanvasImage::new(img)).await;
    match result.barcode() {
        Some(barcode) => println!("\nFound {:?} {}", barcode.kind(), barcode),
        None => println!("\n{}", result.error_message().unwrap_or("No barcode")),
    }
    Ok(())
}
