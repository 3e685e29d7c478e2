use rxing::common::HybridBinarizer;
use rxing::{
    BarcodeFormat, BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary,
    Exceptions, Luma8LuminanceSource, MultiFormatReader, Reader,
};
use std::collections::HashSet;

use crate::detection::backend::DecoderBackend;
use crate::detection::preprocessing;
use crate::error::BackendError;
use crate::models::CanvasImage;

/// Multi-format 1-D / 2-D symbol reader backed by rxing.
///
/// Reads bar geometry directly from pixels; the most reliable backend, so the
/// pipeline tries it first.
pub struct SymbolicDecoder {
    formats: Option<HashSet<BarcodeFormat>>,
    try_harder: bool,
}

impl SymbolicDecoder {
    /// Accept every symbology rxing knows
    pub fn new() -> Self {
        Self {
            formats: None,
            try_harder: true,
        }
    }

    /// Restrict decoding to the retail product symbologies
    pub fn product_codes() -> Self {
        let formats = [
            BarcodeFormat::EAN_8,
            BarcodeFormat::EAN_13,
            BarcodeFormat::UPC_A,
            BarcodeFormat::UPC_E,
            BarcodeFormat::ITF,
        ]
        .into_iter()
        .collect();
        Self {
            formats: Some(formats),
            try_harder: true,
        }
    }

    pub fn with_try_harder(mut self, try_harder: bool) -> Self {
        self.try_harder = try_harder;
        self
    }

    fn hints(&self) -> DecodingHintDictionary {
        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            DecodeHintType::TRY_HARDER,
            DecodeHintValue::TryHarder(self.try_harder),
        );
        if let Some(formats) = &self.formats {
            hints.insert(
                DecodeHintType::POSSIBLE_FORMATS,
                DecodeHintValue::PossibleFormats(formats.clone()),
            );
        }
        hints
    }
}

impl Default for SymbolicDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderBackend for SymbolicDecoder {
    fn decode(&self, image: &CanvasImage) -> Result<Vec<String>, BackendError> {
        let gray = preprocessing::to_grayscale(image.image());
        let (width, height) = gray.dimensions();

        let source = Luma8LuminanceSource::new(gray.into_raw(), width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        let mut reader = MultiFormatReader::default();

        match reader.decode_with_hints(&mut bitmap, &self.hints()) {
            Ok(result) => {
                tracing::debug!(
                    "rxing read {:?} symbol: {}",
                    result.getBarcodeFormat(),
                    result.getText()
                );
                Ok(vec![result.getText().to_string()])
            }
            // Nothing that looks like a symbol, or a symbol that failed its own checks
            Err(Exceptions::NotFoundException(_))
            | Err(Exceptions::ChecksumException(_))
            | Err(Exceptions::FormatException(_)) => Ok(Vec::new()),
            Err(e) => Err(BackendError::Decode {
                backend: self.name().to_string(),
                reason: format!("{:?}", e),
            }),
        }
    }

    fn name(&self) -> &str {
        "symbolic"
    }
}
