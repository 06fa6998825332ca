//! A single randomized decision tree.
//!
//! Nodes hold a split test sampled from a small pool of random candidates,
//! scored by the expected binary entropy of the partition they induce
//! (information gain). Leaves hold the empirical foreground probability of
//! the training pixels routed to them.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::Sample;
use crate::error::{Error, Result};

/// A node keeps splitting only while it has at least this many samples.
const MIN_SAMPLES_TO_SPLIT: usize = 2;

/// Scores within this distance count as ties and are broken by the ordering
/// of the test itself, so training is deterministic under a fixed seed.
const SCORE_EPSILON: f64 = 1e-12;

/// A branching rule: either a single window intensity against a threshold,
/// or the difference of two window intensities against a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitTest {
    Value { index: usize, threshold: i16 },
    Difference { first: usize, second: usize, threshold: i16 },
}

impl SplitTest {
    pub fn goes_true(&self, features: &[i16]) -> bool {
        match *self {
            SplitTest::Value { index, threshold } => features[index] < threshold,
            SplitTest::Difference {
                first,
                second,
                threshold,
            } => features[first] - features[second] < threshold,
        }
    }

    fn sample(rng: &mut StdRng, feature_len: usize) -> SplitTest {
        if rng.gen::<bool>() {
            SplitTest::Value {
                index: rng.gen_range(0..feature_len),
                threshold: rng.gen_range(0..=255),
            }
        } else {
            SplitTest::Difference {
                first: rng.gen_range(0..feature_len),
                second: rng.gen_range(0..feature_len),
                threshold: rng.gen_range(-255..=255),
            }
        }
    }

    /// Largest feature index the test reads.
    fn max_index(&self) -> usize {
        match *self {
            SplitTest::Value { index, .. } => index,
            SplitTest::Difference { first, second, .. } => first.max(second),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Split {
        test: SplitTest,
        when_true: Box<Node>,
        when_false: Box<Node>,
    },
    Leaf {
        probability: f64,
    },
}

impl Node {
    /// Checks structural invariants of a deserialized node: probabilities in
    /// [0, 1] and feature indices inside the model's feature vector.
    pub fn validate(&self, feature_len: usize) -> Result<()> {
        match self {
            Node::Leaf { probability } => {
                if !(0.0..=1.0).contains(probability) {
                    return Err(Error::Serialization(format!(
                        "leaf probability {probability} outside [0, 1]"
                    )));
                }
                Ok(())
            }
            Node::Split {
                test,
                when_true,
                when_false,
            } => {
                if test.max_index() >= feature_len {
                    return Err(Error::Serialization(format!(
                        "split test reads feature {} but the window only has {feature_len}",
                        test.max_index()
                    )));
                }
                when_true.validate(feature_len)?;
                when_false.validate(feature_len)
            }
        }
    }

    fn depth(&self) -> u32 {
        match self {
            Node::Leaf { .. } => 0,
            Node::Split {
                when_true,
                when_false,
                ..
            } => 1 + when_true.depth().max(when_false.depth()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tree {
    root: Node,
}

impl Tree {
    /// Trains a tree on the samples selected by `indices` (a bootstrap
    /// resample, possibly with repeats). An empty selection is an error.
    pub fn train(
        samples: &[Sample],
        indices: Vec<usize>,
        max_depth: u32,
        testobject_tries: u32,
        rng: &mut StdRng,
    ) -> Result<Tree> {
        if indices.is_empty() {
            return Err(Error::InsufficientData(
                "cannot train a tree on zero samples".into(),
            ));
        }
        let feature_len = samples[indices[0]].features.len();
        let root = grow(samples, indices, 0, max_depth, testobject_tries, feature_len, rng);
        Ok(Tree { root })
    }

    pub fn from_root(root: Node) -> Tree {
        Tree { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of splits on the longest root-to-leaf path.
    pub fn depth(&self) -> u32 {
        self.root.depth()
    }

    /// Walks from the root to a leaf and returns its foreground probability.
    pub fn infer(&self, features: &[i16]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { probability } => return *probability,
                Node::Split {
                    test,
                    when_true,
                    when_false,
                } => {
                    node = if test.goes_true(features) {
                        when_true
                    } else {
                        when_false
                    };
                }
            }
        }
    }
}

fn grow(
    samples: &[Sample],
    indices: Vec<usize>,
    depth: u32,
    max_depth: u32,
    testobject_tries: u32,
    feature_len: usize,
    rng: &mut StdRng,
) -> Node {
    let total = indices.len();
    let foreground = indices
        .iter()
        .filter(|&&i| samples[i].foreground)
        .count();

    let pure = foreground == 0 || foreground == total;
    if depth >= max_depth || pure || total < MIN_SAMPLES_TO_SPLIT {
        return leaf(foreground, total);
    }

    let mut best: Option<(f64, SplitTest)> = None;
    for _ in 0..testobject_tries {
        let test = SplitTest::sample(rng, feature_len);

        let mut total_true = 0usize;
        let mut foreground_true = 0usize;
        for &i in &indices {
            if test.goes_true(&samples[i].features) {
                total_true += 1;
                foreground_true += samples[i].foreground as usize;
            }
        }
        let total_false = total - total_true;
        let foreground_false = foreground - foreground_true;

        // A test that routes everything one way tells us nothing.
        if total_true == 0 || total_false == 0 {
            continue;
        }

        // Expected entropy of the partition, unnormalized; lower is better.
        let score = total_true as f64 * entropy(foreground_true, total_true)
            + total_false as f64 * entropy(foreground_false, total_false);

        best = match best {
            None => Some((score, test)),
            Some((best_score, best_test)) => {
                if score + SCORE_EPSILON < best_score
                    || ((score - best_score).abs() <= SCORE_EPSILON && test < best_test)
                {
                    Some((score, test))
                } else {
                    Some((best_score, best_test))
                }
            }
        };
    }

    // Nothing separated the samples (e.g. they are all identical).
    let Some((_, test)) = best else {
        return leaf(foreground, total);
    };

    let (when_true, when_false): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| test.goes_true(&samples[i].features));

    Node::Split {
        test,
        when_true: Box::new(grow(
            samples,
            when_true,
            depth + 1,
            max_depth,
            testobject_tries,
            feature_len,
            rng,
        )),
        when_false: Box::new(grow(
            samples,
            when_false,
            depth + 1,
            max_depth,
            testobject_tries,
            feature_len,
            rng,
        )),
    }
}

fn leaf(foreground: usize, total: usize) -> Node {
    Node::Leaf {
        probability: foreground as f64 / total as f64,
    }
}

/// Binary entropy of the foreground/background split, in bits.
fn entropy(foreground: usize, total: usize) -> f64 {
    if foreground == 0 || foreground == total {
        return 0.0;
    }
    let p = foreground as f64 / total as f64;
    -(p * p.log2() + (1.0 - p) * (1.0 - p).log2())
}
