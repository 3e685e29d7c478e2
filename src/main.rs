use clap::Parser;
use std::path::PathBuf;

use barscan::logging::init_logging;
use barscan::{ImageInput, ScanConfig, build_standard_pipeline};

#[derive(Parser)]
#[command(name = "barscan")]
#[command(about = "Find and read a product barcode in a photo")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// Treat the file content as a `data:image/...;base64,` URL
    #[arg(long)]
    data_url: bool,

    /// JSON file overriding the default scan settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Skip the OCR fallback stage
    #[arg(long)]
    skip_ocr: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Save each stage's input image to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(path) => ScanConfig::from_json_file(path)?,
        None => ScanConfig::default(),
    };
    if args.skip_ocr {
        config.enable_ocr = false;
    }

    let input = if args.data_url {
        ImageInput::DataUrl(std::fs::read_to_string(&args.image_path)?)
    } else {
        ImageInput::Bytes(std::fs::read(&args.image_path)?)
    };

    let mut pipeline = build_standard_pipeline(&config);
    if let Some(debug_dir) = args.debug_out {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let result = pipeline.detect(input).await;

    if args.json {
        let output = if args.verbose {
            serde_json::json!({
                "result": result.response(),
                "attempts": result.attempts(),
            })
        } else {
            serde_json::to_value(result.response())?
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match result.barcode() {
        Some(barcode) => println!("{}", barcode),
        None => println!("{}", result.error_message().unwrap_or("No barcode detected")),
    }

    if args.verbose {
        println!("\n=== Stage Attempts ===");
        for (i, attempt) in result.attempts().iter().enumerate() {
            println!(
                "  {:>2}. {:<16} {:<9} {:?} ({} ms){}",
                i + 1,
                attempt.stage,
                attempt.backend,
                attempt.status,
                attempt.elapsed.as_millis(),
                attempt
                    .error
                    .as_deref()
                    .map(|e| format!(" - {}", e))
                    .unwrap_or_default()
            );
        }
        println!("Total: {} ms", result.elapsed().as_millis());
    }

    Ok(())
}
