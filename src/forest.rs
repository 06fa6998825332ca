//! The random forest: independently trained trees, combined by averaging.

use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::dataset::TrainingSet;
use crate::error::{Error, Result};
use crate::features::FeatureExtractor;
use crate::tree::Tree;
use crate::{LabelColors, ProbabilityMap};

#[derive(Debug, Clone, Copy)]
pub struct TrainParams {
    pub forest_size: u32,
    pub max_tree_depth: u32,
    pub testobject_tries: u32,
    /// 0 = one worker per hardware thread, 1 = sequential, N = exactly N.
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    pub trees: Vec<Tree>,
    pub window_radius: u32,
    pub max_tree_depth: u32,
    pub testobject_tries: u32,
    pub colors: LabelColors,
}

impl Forest {
    /// Trains `forest_size` trees, each on its own bootstrap resample of the
    /// training set, in parallel up to the thread budget.
    ///
    /// Each tree derives its RNG from `seed` plus its index, so the result
    /// is identical at every thread budget and reproducible across runs.
    pub fn train(
        set: &TrainingSet,
        window_radius: u32,
        params: &TrainParams,
        seed: u64,
    ) -> Result<Forest> {
        if params.forest_size == 0 {
            return Err(Error::Configuration("forest size must be at least 1".into()));
        }
        if params.testobject_tries == 0 {
            return Err(Error::Configuration(
                "testobject tries must be at least 1".into(),
            ));
        }
        if set.samples.is_empty() {
            return Err(Error::InsufficientData("the training set is empty".into()));
        }

        let workers = match params.threads {
            0 => num_cpus::get(),
            n => n,
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build thread pool: {e}")))?;

        let forest_size = params.forest_size;
        let trees = pool.install(|| {
            (0..forest_size)
                .into_par_iter()
                .map(|i| {
                    info!("training tree {} of {}", i + 1, forest_size);
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                    let indices = bootstrap(set.samples.len(), &mut rng);
                    Tree::train(
                        &set.samples,
                        indices,
                        params.max_tree_depth,
                        params.testobject_tries,
                        &mut rng,
                    )
                })
                .collect::<Result<Vec<Tree>>>()
        })?;

        Ok(Forest {
            trees,
            window_radius,
            max_tree_depth: params.max_tree_depth,
            testobject_tries: params.testobject_tries,
            colors: set.colors,
        })
    }

    pub fn feature_extractor(&self) -> FeatureExtractor {
        FeatureExtractor::new(self.window_radius)
    }

    /// Mean of the trees' leaf probabilities. The feature vector must match
    /// the window radius the forest was trained with.
    pub fn infer(&self, features: &[i16]) -> Result<f64> {
        let expected = self.feature_extractor().len();
        if features.len() != expected {
            return Err(Error::Configuration(format!(
                "feature vector of length {} does not match the model's window radius {} \
                 (expected {expected})",
                features.len(),
                self.window_radius,
            )));
        }
        Ok(self.infer_trusted(features))
    }

    fn infer_trusted(&self, features: &[i16]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.infer(features)).sum();
        sum / self.trees.len() as f64
    }

    /// Classifies every pixel of the image, rows in parallel.
    pub fn probability_map(&self, image: &GrayImage) -> ProbabilityMap {
        let extractor = self.feature_extractor();
        let (width, height) = image.dimensions();
        debug!("classifying {}x{} pixels", width, height);

        let mut data = vec![0.0f64; (width * height) as usize];
        data.par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let mut features = Vec::with_capacity(extractor.len());
                for x in 0..width {
                    extractor.extract_into(image, x, y as u32, &mut features);
                    row[x as usize] = self.infer_trusted(&features);
                }
            });

        ProbabilityMap::from_raw(width, height, data)
    }
}

/// Draws `len` sample indices with replacement.
fn bootstrap(len: usize, rng: &mut StdRng) -> Vec<usize> {
    (0..len).map(|_| rng.gen_range(0..len)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Sample;

    fn toy_set() -> TrainingSet {
        let samples = (0..40)
            .map(|i| Sample {
                features: vec![if i % 2 == 0 { 30 } else { 220 }; 9],
                foreground: i % 2 == 1,
            })
            .collect();
        TrainingSet {
            samples,
            colors: LabelColors {
                background: 100,
                foreground: 200,
            },
        }
    }

    fn params(threads: usize) -> TrainParams {
        TrainParams {
            forest_size: 3,
            max_tree_depth: 3,
            testobject_tries: 40,
            threads,
        }
    }

    #[test]
    fn zero_forest_size_is_rejected() {
        let set = toy_set();
        let mut p = params(1);
        p.forest_size = 0;
        assert!(matches!(
            Forest::train(&set, 1, &p, 0),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let set = TrainingSet {
            samples: Vec::new(),
            colors: LabelColors {
                background: 1,
                foreground: 2,
            },
        };
        assert!(matches!(
            Forest::train(&set, 1, &params(1), 0),
            Err(Error::InsufficientData(_))
        ));
    }

    #[test]
    fn inference_stays_in_unit_interval() {
        let set = toy_set();
        let forest = Forest::train(&set, 1, &params(1), 9).unwrap();
        for value in [0, 30, 128, 220, 255] {
            let p = forest.infer(&vec![value; 9]).unwrap();
            assert!((0.0..=1.0).contains(&p));
        }
    }

    #[test]
    fn feature_length_mismatch_is_a_configuration_error() {
        let set = toy_set();
        let forest = Forest::train(&set, 1, &params(1), 9).unwrap();
        assert!(matches!(
            forest.infer(&[0i16; 25]),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn training_is_independent_of_the_thread_budget() {
        let set = toy_set();
        let sequential = Forest::train(&set, 1, &params(1), 123).unwrap();
        let parallel = Forest::train(&set, 1, &params(3), 123).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn probability_map_covers_every_pixel() {
        let set = toy_set();
        let forest = Forest::train(&set, 1, &params(1), 5).unwrap();
        let image = GrayImage::from_fn(5, 4, |x, _| image::Luma([if x < 2 { 30 } else { 220 }]));
        let map = forest.probability_map(&image);
        assert_eq!((map.width(), map.height()), (5, 4));
        for y in 0..4 {
            for x in 0..5 {
                assert!((0.0..=1.0).contains(&map.get(x, y)));
            }
        }
    }
}
