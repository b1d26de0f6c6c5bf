use crate::settings::{DiagnosisSettings, HsvBand};
use image::{DynamicImage, GenericImageView, GrayImage, ImageError, ImageReader, RgbImage};
use imageproc::edges::canny;
use std::{fmt, path::Path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    NotFound,
    Undecodable,
    TooSmall,
    InsufficientPlantContent,
    LacksLeafTexture,
    ValidationError(String),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NotFound => f.write_str("file not found"),
            RejectionReason::Undecodable => f.write_str("undecodable image"),
            RejectionReason::TooSmall => f.write_str("too small"),
            RejectionReason::InsufficientPlantContent => f.write_str("insufficient plant content"),
            RejectionReason::LacksLeafTexture => f.write_str("lacks leaf-like texture"),
            RejectionReason::ValidationError(cause) => write!(f, "validation error: {}", cause),
        }
    }
}

/// Outcome of the plausibility checks for one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub reason: String,
    pub rejection: Option<RejectionReason>,
}

impl ValidationVerdict {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: "valid plant image".to_string(),
            rejection: None,
        }
    }

    fn reject(reason: RejectionReason) -> Self {
        Self {
            accepted: false,
            reason: reason.to_string(),
            rejection: Some(reason),
        }
    }
}

/// Cheap color and texture heuristics that keep screenshots, portraits,
/// documents and blank frames away from the classifier.
#[derive(Debug, Clone)]
pub struct ImageValidator {
    min_dimension: u32,
    min_green_ratio: f32,
    min_edge_ratio: f32,
    green_band: HsvBand,
    canny_low: f32,
    canny_high: f32,
}

impl ImageValidator {
    pub fn new(settings: &DiagnosisSettings) -> Self {
        Self {
            min_dimension: settings.min_dimension,
            min_green_ratio: settings.min_green_ratio,
            min_edge_ratio: settings.min_edge_ratio,
            green_band: settings.green_band,
            canny_low: settings.canny_low,
            canny_high: settings.canny_high,
        }
    }

    pub fn validate(&self, path: &Path) -> ValidationVerdict {
        let checked = load_image(path).and_then(|image| self.check_image(&image));
        match checked {
            Ok(()) => ValidationVerdict::accept(),
            Err(reason) => {
                tracing::debug!("Rejected {:?}: {}", path, reason);
                ValidationVerdict::reject(reason)
            }
        }
    }

    /// Runs the size, color and texture checks on an already decoded image.
    pub fn check_image(&self, image: &DynamicImage) -> Result<(), RejectionReason> {
        let (width, height) = image.dimensions();
        if width < self.min_dimension || height < self.min_dimension {
            return Err(RejectionReason::TooSmall);
        }

        let green = green_ratio(&image.to_rgb8(), &self.green_band);
        if green < self.min_green_ratio {
            tracing::debug!("Green ratio {:.4} below {}", green, self.min_green_ratio);
            return Err(RejectionReason::InsufficientPlantContent);
        }

        if !(self.canny_low >= 0.0 && self.canny_low <= self.canny_high) {
            return Err(RejectionReason::ValidationError(format!(
                "edge thresholds out of order ({} > {})",
                self.canny_low, self.canny_high
            )));
        }
        let edges = edge_ratio(&image.to_luma8(), self.canny_low, self.canny_high);
        if edges < self.min_edge_ratio {
            tracing::debug!("Edge ratio {:.4} below {}", edges, self.min_edge_ratio);
            return Err(RejectionReason::LacksLeafTexture);
        }

        Ok(())
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, RejectionReason> {
    if !path.exists() {
        return Err(RejectionReason::NotFound);
    }

    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| RejectionReason::ValidationError(e.to_string()))?;

    // Read failures past this point come from the codec hitting a truncated or
    // corrupt stream.
    reader.decode().map_err(|e| match e {
        ImageError::Decoding(_) | ImageError::Unsupported(_) | ImageError::IoError(_) => {
            RejectionReason::Undecodable
        }
        other => RejectionReason::ValidationError(other.to_string()),
    })
}

/// Fraction of pixels whose HSV value falls inside `band`.
pub fn green_ratio(image: &RgbImage, band: &HsvBand) -> f32 {
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let inside = image
        .pixels()
        .filter(|pixel| {
            let [r, g, b] = pixel.0;
            band.contains(rgb_to_hsv(r, g, b))
        })
        .count();
    inside as f32 / total as f32
}

/// Fraction of pixels marked by the hysteresis edge detector.
pub fn edge_ratio(gray: &GrayImage, low: f32, high: f32) -> f32 {
    let total = gray.width() as usize * gray.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let edges = canny(gray, low, high);
    let marked = edges.pixels().filter(|pixel| pixel.0[0] > 0).count();
    marked as f32 / total as f32
}

/// 8-bit HSV: hue in 0..180 (degrees halved), saturation and value in 0..=255.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = max - min;

    let saturation = if max > 0.0 {
        (255.0 * diff / max).round()
    } else {
        0.0
    };

    let hue = if diff == 0.0 {
        0.0
    } else {
        let degrees = if max == rf {
            60.0 * (gf - bf) / diff
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / diff
        } else {
            240.0 + 60.0 * (rf - gf) / diff
        };
        let degrees = if degrees < 0.0 { degrees + 360.0 } else { degrees };
        (degrees / 2.0).round() % 180.0
    };

    [hue as u8, saturation as u8, max as u8]
}
