use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which global binarization the "enhanced contrast" stage uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Single cutoff at mid-gray
    Binary,
    /// Clamp clearly dark / clearly light pixels, then cut at mid-gray
    ThreeLevel,
}

/// Tunables for the standard scan pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Longest allowed side of the prepared image, in pixels
    pub max_dimension: u32,
    pub raw_timeout_ms: u64,
    pub enhanced_timeout_ms: u64,
    /// Applies to each of the five region stages individually
    pub region_timeout_ms: u64,
    pub adaptive_timeout_ms: u64,
    pub ocr_timeout_ms: u64,
    pub threshold_mode: ThresholdMode,
    pub enable_ocr: bool,
    /// Directory holding `text-detection.rten` and `text-recognition.rten`
    pub ocr_model_dir: Option<PathBuf>,
    /// Upper bound on decoder calls running at once, abandoned ones included
    pub max_in_flight_decodes: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            raw_timeout_ms: 5000,
            enhanced_timeout_ms: 3000,
            region_timeout_ms: 500,
            adaptive_timeout_ms: 2000,
            ocr_timeout_ms: 8000,
            threshold_mode: ThresholdMode::ThreeLevel,
            enable_ocr: true,
            ocr_model_dir: None,
            max_in_flight_decodes: 2,
        }
    }
}

impl ScanConfig {
    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let config: ScanConfig = serde_json::from_str(raw)?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.max_dimension == 0 {
            anyhow::bail!("max_dimension must be positive");
        }
        if self.max_in_flight_decodes == 0 {
            anyhow::bail!("max_in_flight_decodes must be at least 1");
        }
        Ok(())
    }

    /// Model directory, falling back to the ocrs cache in the home directory
    pub fn resolved_model_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.ocr_model_dir {
            return Some(dir.clone());
        }
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(|home| Path::new(&home).join(".cache/ocrs"))
    }

    pub fn raw_timeout(&self) -> Duration {
        Duration::from_millis(self.raw_timeout_ms)
    }

    pub fn enhanced_timeout(&self) -> Duration {
        Duration::from_millis(self.enhanced_timeout_ms)
    }

    pub fn region_timeout(&self) -> Duration {
        Duration::from_millis(self.region_timeout_ms)
    }

    pub fn adaptive_timeout(&self) -> Duration {
        Duration::from_millis(self.adaptive_timeout_ms)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_millis(self.ocr_timeout_ms)
    }
}
