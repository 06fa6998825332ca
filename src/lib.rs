pub mod crf;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod features;
pub mod forest;
pub mod gibbs;
pub mod maxflow;
pub mod model;
pub mod tree;

pub use error::{Error, Result};

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// The two intensities used for background and foreground in label images
/// and in the produced result images. Recorded at training time so that the
/// output labeling can be painted with the same colors the labels used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelColors {
    pub background: u8,
    pub foreground: u8,
}

/// Per-pixel foreground probability, as produced by a trained forest.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    width: u32,
    height: u32,
    data: Vec<f64>,
}

impl ProbabilityMap {
    pub fn from_raw(width: u32, height: u32, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> f64 {
        self.data[(y * self.width + x) as usize]
    }

    /// Per-pixel thresholding: probability >= 0.5 is foreground.
    pub fn threshold(&self) -> Labeling {
        Labeling {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&p| p >= 0.5).collect(),
        }
    }

    /// Render as a grayscale image, 0.0 -> black, 1.0 -> white.
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([(self.get(x, y) * 255.0).round() as u8])
        })
    }
}

/// A binary per-pixel assignment; `true` is foreground.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Labeling {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; (width * height) as usize],
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<bool>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Reads a labeling from an image: pixels matching the foreground color
    /// are foreground, everything else is background.
    pub fn from_image(image: &GrayImage, colors: LabelColors) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.pixels().map(|p| p.0[0] == colors.foreground).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        self.data[(y * self.width + x) as usize] = foreground;
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&l| l).count()
    }

    /// Paint the labeling with the given background/foreground colors.
    pub fn to_image(&self, colors: LabelColors) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            image::Luma([if self.get(x, y) {
                colors.foreground
            } else {
                colors.background
            }])
        })
    }
}
