//! Windowed feature extraction.
//!
//! A pixel's feature vector is the square window of intensities around it,
//! row-major, with side length `2r + 1`. Coordinates outside the image are
//! clamped to the image rectangle, so the vector has the same length at every
//! position including borders and corners. The same extractor configuration
//! must be used at training and at inference time; the window radius is
//! persisted with the model for that reason.

use image::GrayImage;

use crate::error::{Error, Result};

/// Converts a user-facing window size (the full side length) into the radius
/// used internally. Fails fast on even or non-positive sizes, before any
/// image data is touched.
pub fn window_radius_from_size(window_size: u32) -> Result<u32> {
    if window_size == 0 || window_size % 2 == 0 {
        return Err(Error::Configuration(format!(
            "window size must be odd and positive, got {window_size}"
        )));
    }
    Ok((window_size - 1) / 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureExtractor {
    radius: u32,
}

impl FeatureExtractor {
    pub fn new(window_radius: u32) -> Self {
        Self {
            radius: window_radius,
        }
    }

    pub fn window_radius(&self) -> u32 {
        self.radius
    }

    /// Length of every feature vector this extractor produces.
    pub fn len(&self) -> usize {
        let side = (2 * self.radius + 1) as usize;
        side * side
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn extract(&self, image: &GrayImage, x: u32, y: u32) -> Vec<i16> {
        let mut features = Vec::with_capacity(self.len());
        self.extract_into(image, x, y, &mut features);
        features
    }

    /// Like [`extract`](Self::extract), reusing the given buffer.
    pub fn extract_into(&self, image: &GrayImage, x: u32, y: u32, out: &mut Vec<i16>) {
        out.clear();
        let max_x = (image.width() - 1) as i64;
        let max_y = (image.height() - 1) as i64;
        let r = self.radius as i64;
        for dy in -r..=r {
            let sy = (y as i64 + dy).clamp(0, max_y) as u32;
            for dx in -r..=r {
                let sx = (x as i64 + dx).clamp(0, max_x) as u32;
                out.push(image.get_pixel(sx, sy).0[0] as i16);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| image::Luma([(x * 10 + y) as u8]))
    }

    #[test]
    fn window_size_validation() {
        assert!(window_radius_from_size(0).is_err());
        assert!(window_radius_from_size(4).is_err());
        assert_eq!(window_radius_from_size(1).unwrap(), 0);
        assert_eq!(window_radius_from_size(3).unwrap(), 1);
        assert_eq!(window_radius_from_size(9).unwrap(), 4);
    }

    #[test]
    fn fixed_length_everywhere() {
        let image = gradient_image(5, 4);
        for radius in [0, 1, 2, 3] {
            let extractor = FeatureExtractor::new(radius);
            for y in 0..image.height() {
                for x in 0..image.width() {
                    assert_eq!(extractor.extract(&image, x, y).len(), extractor.len());
                }
            }
        }
    }

    #[test]
    fn interior_window_is_row_major() {
        let image = gradient_image(5, 5);
        let extractor = FeatureExtractor::new(1);
        let features = extractor.extract(&image, 2, 2);
        let expected: Vec<i16> = (1..=3)
            .flat_map(|y| (1..=3).map(move |x| (x * 10 + y) as i16))
            .collect();
        assert_eq!(features, expected);
    }

    #[test]
    fn corner_is_clamped() {
        let image = gradient_image(3, 3);
        let extractor = FeatureExtractor::new(1);
        let features = extractor.extract(&image, 0, 0);
        // Top-left corner: out-of-bounds positions repeat the edge pixels.
        assert_eq!(features, vec![0, 0, 10, 0, 0, 10, 1, 1, 11]);
    }
}
