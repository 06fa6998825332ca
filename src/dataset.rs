//! Assembles the labeled training pixels from (image, label image) pairs.
//!
//! Label images use 0 for "unlabeled" plus at most two distinct nonzero
//! intensities; the brighter one is taken as foreground. Since foreground
//! regions are usually much smaller than the background, the background is
//! subsampled down to the foreground count so the classes stay balanced.

use image::GrayImage;
use rand::rngs::StdRng;
use rand::seq::index::sample;

use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::LabelColors;

/// One labeled training pixel, already converted to its feature vector.
#[derive(Debug, Clone)]
pub struct Sample {
    pub features: Vec<i16>,
    pub foreground: bool,
}

pub struct TrainingSet {
    pub samples: Vec<Sample>,
    pub colors: LabelColors,
}

impl TrainingSet {
    /// Builds the sample set from training images and their label images.
    ///
    /// Fails with a dimension mismatch when an image and its label image
    /// differ in size, with a configuration error when the label images use
    /// more than two nonzero intensities, and with an insufficient-data
    /// error when fewer than two label classes are present.
    pub fn build(
        pairs: &[(GrayImage, GrayImage)],
        extractor: &FeatureExtractor,
        rng: &mut StdRng,
    ) -> Result<TrainingSet> {
        for (image, labels) in pairs {
            if image.dimensions() != labels.dimensions() {
                return Err(Error::DimensionMismatch {
                    expected_width: image.width(),
                    expected_height: image.height(),
                    actual_width: labels.width(),
                    actual_height: labels.height(),
                });
            }
        }

        let colors = detect_colors(pairs.iter().map(|(_, labels)| labels))?;

        // (pair index, x, y) of every labeled pixel, per class.
        let mut foreground = Vec::new();
        let mut background = Vec::new();
        for (idx, (_, labels)) in pairs.iter().enumerate() {
            for (x, y, pixel) in labels.enumerate_pixels() {
                let value = pixel.0[0];
                if value == colors.foreground {
                    foreground.push((idx, x, y));
                } else if value == colors.background {
                    background.push((idx, x, y));
                }
            }
        }

        // Keep the classes balanced: all foreground pixels are used, and the
        // background is subsampled down to the same count when it is larger.
        let background = if background.len() > foreground.len() {
            sample(rng, background.len(), foreground.len())
                .into_iter()
                .map(|i| background[i])
                .collect()
        } else {
            background
        };

        let mut samples = Vec::with_capacity(foreground.len() + background.len());
        for (&(idx, x, y), is_foreground) in foreground
            .iter()
            .map(|c| (c, true))
            .chain(background.iter().map(|c| (c, false)))
        {
            samples.push(Sample {
                features: extractor.extract(&pairs[idx].0, x, y),
                foreground: is_foreground,
            });
        }

        Ok(TrainingSet { samples, colors })
    }
}

/// Finds the two label intensities used across all label images. The
/// brighter of the two is foreground.
fn detect_colors<'a>(labels: impl Iterator<Item = &'a GrayImage>) -> Result<LabelColors> {
    let mut values: Vec<u8> = Vec::new();
    for image in labels {
        for pixel in image.pixels() {
            let value = pixel.0[0];
            if value != 0 && !values.contains(&value) {
                values.push(value);
                if values.len() > 2 {
                    return Err(Error::Configuration(format!(
                        "label images must use at most two nonzero intensities, found {values:?}"
                    )));
                }
            }
        }
    }

    match values.as_slice() {
        [] => Err(Error::InsufficientData(
            "label images contain no labeled pixels".into(),
        )),
        [_] => Err(Error::InsufficientData(
            "label images contain only one label class".into(),
        )),
        &[a, b] => Ok(LabelColors {
            background: a.min(b),
            foreground: a.max(b),
        }),
        _ => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn half_split_pair(size: u32) -> (GrayImage, GrayImage) {
        let image = GrayImage::from_fn(size, size, |x, _| {
            image::Luma([if x < size / 2 { 20 } else { 200 }])
        });
        let labels = GrayImage::from_fn(size, size, |x, _| {
            image::Luma([if x < size / 2 { 100 } else { 250 }])
        });
        (image, labels)
    }

    #[test]
    fn brighter_label_is_foreground() {
        let mut rng = StdRng::seed_from_u64(0);
        let pair = half_split_pair(4);
        let set = TrainingSet::build(&[pair], &FeatureExtractor::new(1), &mut rng).unwrap();
        assert_eq!(
            set.colors,
            LabelColors {
                background: 100,
                foreground: 250
            }
        );
    }

    #[test]
    fn classes_are_balanced() {
        let mut rng = StdRng::seed_from_u64(0);
        // 4 foreground pixels in a 6x6 image, the rest labeled background.
        let image = GrayImage::from_fn(6, 6, |x, y| image::Luma([(x * 20 + y) as u8]));
        let labels = GrayImage::from_fn(6, 6, |x, y| {
            image::Luma([if x < 2 && y < 2 { 255 } else { 128 }])
        });
        let set =
            TrainingSet::build(&[(image, labels)], &FeatureExtractor::new(1), &mut rng).unwrap();
        let foreground = set.samples.iter().filter(|s| s.foreground).count();
        assert_eq!(foreground, 4);
        assert_eq!(set.samples.len(), 8);
    }

    #[test]
    fn mismatched_label_size_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = GrayImage::new(4, 4);
        let labels = GrayImage::new(4, 5);
        let result = TrainingSet::build(&[(image, labels)], &FeatureExtractor::new(1), &mut rng);
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }

    #[test]
    fn three_label_colors_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = GrayImage::new(3, 1);
        let mut labels = GrayImage::new(3, 1);
        labels.put_pixel(0, 0, image::Luma([10]));
        labels.put_pixel(1, 0, image::Luma([20]));
        labels.put_pixel(2, 0, image::Luma([30]));
        let result = TrainingSet::build(&[(image, labels)], &FeatureExtractor::new(0), &mut rng);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn unlabeled_images_are_insufficient() {
        let mut rng = StdRng::seed_from_u64(0);
        let image = GrayImage::new(4, 4);
        let labels = GrayImage::new(4, 4);
        let result = TrainingSet::build(&[(image, labels)], &FeatureExtractor::new(1), &mut rng);
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }
}
