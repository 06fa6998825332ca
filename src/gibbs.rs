//! Approximate binary labeling via Gibbs sampling.
//!
//! The chain starts from the thresholded probability map and performs a
//! fixed number of full sweeps. A sweep visits every pixel in raster order
//! (left to right, top to bottom) and resamples its label in place from the
//! conditional distribution implied by its unary cost and the current labels
//! of its 4-neighbors, so updates within a sweep see the freshest state.
//! More sweeps trend toward the exact minimum-cut labeling but no
//! convergence is guaranteed; the caller picks the budget. A fixed seed
//! makes the whole run reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::crf::PixelCrf;
use crate::Labeling;

/// Runs `steps` sweeps and returns the final state. `steps == 0` returns
/// the initial thresholded labeling unchanged.
pub fn solve(crf: &PixelCrf, steps: u32, seed: u64) -> Labeling {
    let (width, height) = (crf.width(), crf.height());
    let mut rng = StdRng::seed_from_u64(seed);

    // Initial state: unary costs alone, i.e. probability >= 0.5.
    let mut labeling = Labeling::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let unary = crf.unary(x, y);
            labeling.set(x, y, unary.foreground <= unary.background);
        }
    }

    for step in 0..steps {
        if step % 100 == 0 {
            debug!("sampling sweep {} of {}", step + 1, steps);
        }
        for y in 0..height {
            for x in 0..width {
                let unary = crf.unary(x, y);
                let mut foreground_energy = unary.foreground;
                let mut background_energy = unary.background;
                crf.for_each_neighbor(x, y, |nx, ny, weight| {
                    if labeling.get(nx, ny) {
                        background_energy += weight;
                    } else {
                        foreground_energy += weight;
                    }
                });

                // Boltzmann conditional for the two states of this site.
                let p_foreground = 1.0 / (1.0 + (foreground_energy - background_energy).exp());
                labeling.set(x, y, rng.gen::<f64>() < p_foreground);
            }
        }
    }

    labeling
}
