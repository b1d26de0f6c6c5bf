use image::{imageops::FilterType, DynamicImage, ImageReader};
use ndarray::{Array3, ArrayView3};
use std::path::Path;
use thiserror::Error;

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Normalized CHW image, `[3, size, size]`, with no batch axis.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Array3<f32>,
}

impl Tensor {
    pub fn zeros(size: usize) -> Self {
        Self {
            data: Array3::zeros((3, size, size)),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }
}

#[derive(Debug, Clone)]
pub struct Preprocessor {
    size: u32,
    filter: FilterType,
}

impl Preprocessor {
    /// Bilinear resize to `size`x`size`, the policy the classifier was trained with.
    pub fn new(size: u32) -> Self {
        Self {
            size,
            filter: FilterType::Triangle,
        }
    }

    pub fn prepare(&self, path: &Path) -> Result<Tensor, PreprocessError> {
        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(self.prepare_image(&image))
    }

    pub fn prepare_image(&self, image: &DynamicImage) -> Tensor {
        let size = self.size as usize;
        let rgb = image
            .resize_exact(self.size, self.size, self.filter)
            .to_rgb8();

        let mut data = Array3::zeros((3, size, size));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = pixel.0[c] as f32 / 255.0;
                data[[c, y, x]] = (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            }
        }

        Tensor { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    fn gradient(width: u32, height: u32) -> RgbImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_prepare_image_shape() {
        let tensor = Preprocessor::new(224).prepare_image(&DynamicImage::ImageRgb8(gradient(500, 300)));
        assert_eq!(tensor.shape(), &[3, 224, 224]);
    }

    #[test]
    fn test_normalization_values() {
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(224, 224, Rgb([255, 0, 255])));
        let tensor = Preprocessor::new(224).prepare_image(&image);
        let view = tensor.view();

        let expected_r = (1.0 - IMAGENET_MEAN[0]) / IMAGENET_STD[0];
        let expected_g = (0.0 - IMAGENET_MEAN[1]) / IMAGENET_STD[1];
        let expected_b = (1.0 - IMAGENET_MEAN[2]) / IMAGENET_STD[2];
        assert!((view[[0, 10, 10]] - expected_r).abs() < 1e-6);
        assert!((view[[1, 10, 10]] - expected_g).abs() < 1e-6);
        assert!((view[[2, 10, 10]] - expected_b).abs() < 1e-6);
    }

    #[test]
    fn test_prepare_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        gradient(320, 240).save(&path).unwrap();

        let preprocessor = Preprocessor::new(224);
        let first = preprocessor.prepare(&path).unwrap();
        let second = preprocessor.prepare(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_prepare_forces_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(120, 120, image::Luma([128])).save(&path).unwrap();

        let tensor = Preprocessor::new(224).prepare(&path).unwrap();
        assert_eq!(tensor.shape(), &[3, 224, 224]);
    }

    #[test]
    fn test_prepare_undecodable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();

        let result = Preprocessor::new(224).prepare(&path);
        assert!(matches!(result, Err(PreprocessError::Decode(_))));
    }
}
