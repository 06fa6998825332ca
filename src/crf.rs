//! The pairwise graph model over the pixel grid.
//!
//! Every pixel is a node carrying a unary cost pair (negative log-likelihood
//! of the forest's foreground probability and its complement), and every
//! 4-neighbor pair is connected by an edge whose weight is the smoothness
//! strength attenuated by the intensity difference of the two pixels:
//! similar neighbors couple strongly, edges across a contrast couple weakly.
//! The model is read-only once built; both solvers take it by shared
//! reference so their outputs are comparable under identical configuration.

use image::GrayImage;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::{Error, Result};
use crate::{Labeling, ProbabilityMap};

/// Probabilities are kept away from 0 and 1 so the log-costs stay finite.
const PROBABILITY_CLAMP: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnaryCost {
    pub foreground: f64,
    pub background: f64,
}

impl UnaryCost {
    fn from_probability(p: f64) -> UnaryCost {
        let p = p.clamp(PROBABILITY_CLAMP, 1.0 - PROBABILITY_CLAMP);
        UnaryCost {
            foreground: -p.ln(),
            background: -(1.0 - p).ln(),
        }
    }

    pub fn of(&self, foreground: bool) -> f64 {
        if foreground {
            self.foreground
        } else {
            self.background
        }
    }
}

pub struct PixelCrf {
    width: u32,
    height: u32,
    graph: UnGraph<UnaryCost, f64>,
}

impl PixelCrf {
    /// Builds the grid model from an image and its probability map.
    ///
    /// `edge_weight` scales the smoothness pressure and must be finite and
    /// non-negative; zero decouples the pixels entirely.
    pub fn build(
        image: &GrayImage,
        probabilities: &ProbabilityMap,
        edge_weight: f64,
    ) -> Result<PixelCrf> {
        if !edge_weight.is_finite() || edge_weight < 0.0 {
            return Err(Error::Configuration(format!(
                "edge weight must be finite and non-negative, got {edge_weight}"
            )));
        }
        if image.dimensions() != (probabilities.width(), probabilities.height()) {
            return Err(Error::DimensionMismatch {
                expected_width: image.width(),
                expected_height: image.height(),
                actual_width: probabilities.width(),
                actual_height: probabilities.height(),
            });
        }

        let (width, height) = image.dimensions();
        let mut graph = UnGraph::with_capacity(
            (width * height) as usize,
            (2 * width * height) as usize,
        );

        // Nodes in row-major order, so NodeIndex == y * width + x.
        for y in 0..height {
            for x in 0..width {
                graph.add_node(UnaryCost::from_probability(probabilities.get(x, y)));
            }
        }

        for y in 0..height {
            for x in 0..width {
                let here = image.get_pixel(x, y).0[0];
                if x + 1 < width {
                    let right = image.get_pixel(x + 1, y).0[0];
                    graph.add_edge(
                        node_index(width, x, y),
                        node_index(width, x + 1, y),
                        edge_weight * affinity(here, right),
                    );
                }
                if y + 1 < height {
                    let down = image.get_pixel(x, y + 1).0[0];
                    graph.add_edge(
                        node_index(width, x, y),
                        node_index(width, x, y + 1),
                        edge_weight * affinity(here, down),
                    );
                }
            }
        }

        Ok(PixelCrf {
            width,
            height,
            graph,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn unary(&self, x: u32, y: u32) -> &UnaryCost {
        self.graph
            .node_weight(node_index(self.width, x, y))
            .expect("pixel node exists")
    }

    /// All grid edges as (node index, node index, weight) with row-major
    /// node indices.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.source().index(), e.target().index(), *e.weight()))
    }

    /// Visits the 4-neighbors of a pixel together with the edge weight.
    pub fn for_each_neighbor(&self, x: u32, y: u32, mut visit: impl FnMut(u32, u32, f64)) {
        let node = node_index(self.width, x, y);
        for edge in self.graph.edges(node) {
            let other = if edge.source() == node {
                edge.target()
            } else {
                edge.source()
            };
            let idx = other.index() as u32;
            visit(idx % self.width, idx / self.width, *edge.weight());
        }
    }

    /// Total energy of a labeling: unary costs plus the weight of every edge
    /// whose endpoints disagree.
    pub fn energy(&self, labeling: &Labeling) -> f64 {
        let mut total = 0.0;
        for y in 0..self.height {
            for x in 0..self.width {
                total += self.unary(x, y).of(labeling.get(x, y));
            }
        }
        for (a, b, weight) in self.edges() {
            let (ax, ay) = (a as u32 % self.width, a as u32 / self.width);
            let (bx, by) = (b as u32 % self.width, b as u32 / self.width);
            if labeling.get(ax, ay) != labeling.get(bx, by) {
                total += weight;
            }
        }
        total
    }
}

fn node_index(width: u32, x: u32, y: u32) -> NodeIndex {
    NodeIndex::new((y * width + x) as usize)
}

/// 1.0 for identical intensities, falling off linearly to 0.0 for maximal
/// contrast.
fn affinity(a: u8, b: u8) -> f64 {
    1.0 - a.abs_diff(b) as f64 / u8::MAX as f64
}
