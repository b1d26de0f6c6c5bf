use serde::Deserialize;
use std::path::PathBuf;

/// Thresholds applied before and after inference.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DiagnosisSettings {
    pub min_confidence: f32,
    pub min_green_ratio: f32,
    pub min_edge_ratio: f32,
    pub min_dimension: u32,
    pub img_size: u32,
    pub green_band: HsvBand,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for DiagnosisSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.70,
            min_green_ratio: 0.15,
            min_edge_ratio: 0.01,
            min_dimension: 100,
            img_size: 224,
            green_band: HsvBand::default(),
            canny_low: 50.0,
            canny_high: 150.0,
        }
    }
}

impl DiagnosisSettings {
    /// Rejects threshold combinations the checks cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("min_confidence", self.min_confidence),
            ("min_green_ratio", self.min_green_ratio),
            ("min_edge_ratio", self.min_edge_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("diagnosis.{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.min_dimension == 0 {
            return Err("diagnosis.min_dimension must be at least 1".to_string());
        }
        if self.img_size == 0 {
            return Err("diagnosis.img_size must be at least 1".to_string());
        }
        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(format!(
                "diagnosis.canny_low ({}) must not exceed diagnosis.canny_high ({})",
                self.canny_low, self.canny_high
            ));
        }
        Ok(())
    }
}

/// Inclusive HSV bounds on the 8-bit scale (hue 0..180, saturation and value 0..255).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct HsvBand {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl Default for HsvBand {
    fn default() -> Self {
        Self {
            lower: [35, 50, 50],
            upper: [85, 255, 255],
        }
    }
}

impl HsvBand {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        hsv.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(value, (lo, hi))| value >= lo && value <= hi)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelSettings {
    pub onnx_file: String,
    pub model_dir: PathBuf,
    #[serde(default = "default_model_instances")]
    pub num_instances: usize,
    #[serde(default = "default_output_name")]
    pub output_name: String,
    #[serde(default)]
    pub execution_provider: ExecutionProvider,
}

fn default_model_instances() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_output_name() -> String {
    "logits".to_string()
}

impl ModelSettings {
    pub fn get_model_path(&self) -> PathBuf {
        self.model_dir.join(&self.onnx_file)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.get_model_path().exists() {
            return Err(format!("Model file not found: {:?}", self.get_model_path()));
        }
        if self.num_instances == 0 {
            return Err("model.num_instances must be at least 1".to_string());
        }
        Ok(())
    }
}
