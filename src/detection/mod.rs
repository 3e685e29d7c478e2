pub mod backend;
pub mod ocr;
pub mod preparer;
pub mod preprocessing;
pub mod steps;
pub mod symbolic;

use std::sync::Arc;

use crate::config::ScanConfig;
use crate::detection::backend::DecoderBackend;
use crate::detection::ocr::OcrDecoder;
use crate::detection::preprocessing::Region;
use crate::detection::steps::*;
use crate::detection::symbolic::SymbolicDecoder;
use crate::pipeline::{DetectionStage, Pipeline};

/// Build the standard detection pipeline.
///
/// Cheap, reliable stages come first; later stages are slower or more
/// approximate:
/// raw image → enhanced contrast → five regions → adaptive threshold → OCR.
pub fn build_standard_pipeline(config: &ScanConfig) -> Pipeline {
    let ocr: Option<Arc<dyn DecoderBackend>> = if config.enable_ocr {
        Some(Arc::new(OcrDecoder::new(config.resolved_model_dir())))
    } else {
        None
    };
    build_pipeline_with(config, Arc::new(SymbolicDecoder::new()), ocr)
}

/// Standard stage layout with caller-supplied backends
pub fn build_pipeline_with(
    config: &ScanConfig,
    symbolic: Arc<dyn DecoderBackend>,
    ocr: Option<Arc<dyn DecoderBackend>>,
) -> Pipeline {
    let mut pipeline = Pipeline::new()
        .with_max_dimension(config.max_dimension)
        .with_max_in_flight(config.max_in_flight_decodes)
        .add_stage(DetectionStage::new(
            "raw",
            Arc::new(IdentityStep),
            symbolic.clone(),
            config.raw_timeout(),
        ))
        .add_stage(DetectionStage::new(
            "enhanced",
            Arc::new(GlobalThresholdStep {
                mode: config.threshold_mode,
            }),
            symbolic.clone(),
            config.enhanced_timeout(),
        ));

    for region in Region::ALL {
        pipeline = pipeline.add_stage(DetectionStage::new(
            format!("region-{}", region.name()),
            Arc::new(RegionCropStep::new(region)),
            symbolic.clone(),
            config.region_timeout(),
        ));
    }

    pipeline = pipeline.add_stage(DetectionStage::new(
        "adaptive",
        Arc::new(AdaptiveThresholdStep),
        symbolic,
        config.adaptive_timeout(),
    ));

    if let Some(ocr) = ocr {
        pipeline = pipeline.add_stage(DetectionStage::new(
            "ocr",
            Arc::new(IdentityStep),
            ocr,
            config.ocr_timeout(),
        ));
    }

    pipeline
}
