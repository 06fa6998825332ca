//! Exact binary labeling via minimum cut.
//!
//! The grid model is augmented with a source and a sink: the arc from the
//! source to a pixel carries its foreground cost, the arc from the pixel to
//! the sink its background cost, and grid edges become symmetric arcs. With
//! non-negative pairwise weights the minimum s-t cut of this network equals
//! the minimum of the labeling energy, so the result is exact and
//! deterministic. Pixels left on the source side of the cut are background;
//! pixels cut off from the source (including unary ties at probability 0.5,
//! where both terminal arcs saturate) are foreground.

use crate::crf::PixelCrf;
use crate::Labeling;

const EPS: f64 = 1e-12;

/// Residual network with paired forward/reverse arcs; the reverse arc of
/// arc `e` is `e ^ 1`.
struct FlowNetwork {
    adj: Vec<Vec<u32>>,
    to: Vec<u32>,
    cap: Vec<f64>,
    level: Vec<i32>,
    iter: Vec<usize>,
}

impl FlowNetwork {
    fn new(nodes: usize) -> FlowNetwork {
        FlowNetwork {
            adj: vec![Vec::new(); nodes],
            to: Vec::new(),
            cap: Vec::new(),
            level: vec![-1; nodes],
            iter: vec![0; nodes],
        }
    }

    fn add_arc(&mut self, from: usize, to: usize, forward: f64, reverse: f64) {
        let id = self.to.len() as u32;
        self.to.push(to as u32);
        self.cap.push(forward);
        self.adj[from].push(id);
        self.to.push(from as u32);
        self.cap.push(reverse);
        self.adj[to].push(id + 1);
    }

    /// Breadth-first levels over the residual graph; true when the sink is
    /// still reachable.
    fn bfs(&mut self, source: usize, sink: usize) -> bool {
        self.level.fill(-1);
        self.level[source] = 0;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            for &e in &self.adj[v] {
                let u = self.to[e as usize] as usize;
                if self.cap[e as usize] > EPS && self.level[u] < 0 {
                    self.level[u] = self.level[v] + 1;
                    queue.push_back(u);
                }
            }
        }
        self.level[sink] >= 0
    }

    /// Sends one augmenting path along the level graph. Recursion depth is
    /// bounded by the BFS level of the sink, which on a grid is at most
    /// width + height + 2.
    fn dfs(&mut self, v: usize, sink: usize, flow: f64) -> f64 {
        if v == sink {
            return flow;
        }
        while self.iter[v] < self.adj[v].len() {
            let e = self.adj[v][self.iter[v]] as usize;
            let u = self.to[e] as usize;
            if self.cap[e] > EPS && self.level[u] == self.level[v] + 1 {
                let sent = self.dfs(u, sink, flow.min(self.cap[e]));
                if sent > EPS {
                    self.cap[e] -= sent;
                    self.cap[e ^ 1] += sent;
                    return sent;
                }
            }
            self.iter[v] += 1;
        }
        0.0
    }

    fn maxflow(&mut self, source: usize, sink: usize) {
        while self.bfs(source, sink) {
            self.iter.fill(0);
            loop {
                let sent = self.dfs(source, sink, f64::INFINITY);
                if sent <= EPS {
                    break;
                }
            }
        }
    }

    /// Nodes still reachable from the source in the residual graph.
    fn source_side(&self, source: usize) -> Vec<bool> {
        let mut reachable = vec![false; self.adj.len()];
        reachable[source] = true;
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            for &e in &self.adj[v] {
                let u = self.to[e as usize] as usize;
                if self.cap[e as usize] > EPS && !reachable[u] {
                    reachable[u] = true;
                    queue.push_back(u);
                }
            }
        }
        reachable
    }
}

/// Computes the exact minimum-energy labeling of the model.
pub fn solve(crf: &PixelCrf) -> Labeling {
    let (width, height) = (crf.width(), crf.height());
    let pixels = (width * height) as usize;
    let source = pixels;
    let sink = pixels + 1;

    let mut network = FlowNetwork::new(pixels + 2);
    for y in 0..height {
        for x in 0..width {
            let v = (y * width + x) as usize;
            let unary = crf.unary(x, y);
            network.add_arc(source, v, unary.foreground, 0.0);
            network.add_arc(v, sink, unary.background, 0.0);
        }
    }
    for (a, b, weight) in crf.edges() {
        if weight > 0.0 {
            network.add_arc(a, b, weight, weight);
        }
    }

    network.maxflow(source, sink);
    let source_side = network.source_side(source);

    let mut labeling = Labeling::new(width, height);
    for y in 0..height {
        for x in 0..width {
            labeling.set(x, y, !source_side[(y * width + x) as usize]);
        }
    }
    labeling
}
