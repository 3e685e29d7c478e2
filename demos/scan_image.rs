use barscan::logging::init_logging;
use barscan::{ScanConfig, build_standard_pipeline};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <image_path>", args[0]);
        std::process::exit(1);
    }
    init_logging(true);

    let bytes = std::fs::read(&args[1])?;
    let config = ScanConfig {
        enable_ocr: false,
        ..ScanConfig::default()
    };
    let pipeline = build_standard_pipeline(&config);

    println!("Scanning {} ({} bytes)", args[1], bytes.len());
    let result = pipeline.detect_bytes(bytes).await;

    println!("\n=== Attempts ===");
    for attempt in result.attempts() {
        println!(
            "  {:<14} {:?} in {:?}",
            attempt.stage, attempt.status, attempt.elapsed
        );
    }

    println!("\n=== Result ===");
    println!("{}", serde_json::to_string_pretty(&result.response())?);
    Ok(())
}
