//! Second-order regression tree fitted to per-row gradients and hessians.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::matrix::FeatureMatrix;

/// Growth limits and regularisation shared by every tree of an ensemble.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub lambda: f64,
    pub min_child_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        weight: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    pub(crate) fn fit(
        x: &FeatureMatrix,
        grad: &[f64],
        hess: &[f64],
        params: &TreeParams,
    ) -> Self {
        let indices: Vec<usize> = (0..x.n_rows()).collect();
        let mut nodes = Vec::new();
        grow(x, grad, hess, &indices, params, 0, &mut nodes);
        Self { nodes }
    }

    /// Raw leaf weight for one row.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { weight } => return *weight,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    /// Multiply every leaf weight by `factor` (learning-rate shrinkage).
    pub(crate) fn scale_leaves(&mut self, factor: f64) {
        for node in &mut self.nodes {
            if let Node::Leaf { weight } = node {
                *weight *= factor;
            }
        }
    }
}

fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    -g / (h + lambda)
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

fn grow(
    x: &FeatureMatrix,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    params: &TreeParams,
    depth: usize,
    nodes: &mut Vec<Node>,
) -> usize {
    let g: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h: f64 = indices.iter().map(|&i| hess[i]).sum();

    let split = if depth < params.max_depth && h >= 2.0 * params.min_child_weight {
        best_split(x, grad, hess, indices, g, h, params)
    } else {
        None
    };

    let Some(split) = split else {
        nodes.push(Node::Leaf {
            weight: leaf_weight(g, h, params.lambda),
        });
        return nodes.len() - 1;
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .partition(|&&i| x.get(i, split.feature) <= split.threshold);

    let node = nodes.len();
    nodes.push(Node::Leaf { weight: 0.0 });
    let left = grow(x, grad, hess, &left_idx, params, depth + 1, nodes);
    let right = grow(x, grad, hess, &right_idx, params, depth + 1, nodes);
    nodes[node] = Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left,
        right,
    };
    node
}

/// Best positive-gain split across all features.
///
/// Features are scanned in parallel; the reduction walks results in feature
/// order and keeps the first strict maximum, so the outcome does not depend
/// on thread scheduling.
fn best_split(
    x: &FeatureMatrix,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    g_total: f64,
    h_total: f64,
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let per_feature: Vec<Option<SplitCandidate>> = (0..x.n_cols())
        .into_par_iter()
        .map(|feature| {
            best_split_for_feature(x, grad, hess, indices, feature, g_total, h_total, params)
        })
        .collect();

    let mut best: Option<SplitCandidate> = None;
    for candidate in per_feature.into_iter().flatten() {
        if best.map_or(true, |b| candidate.gain > b.gain) {
            best = Some(candidate);
        }
    }
    best
}

#[allow(clippy::too_many_arguments)]
fn best_split_for_feature(
    x: &FeatureMatrix,
    grad: &[f64],
    hess: &[f64],
    indices: &[usize],
    feature: usize,
    g_total: f64,
    h_total: f64,
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let mut order: Vec<usize> = indices.to_vec();
    order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));

    let parent = score(g_total, h_total, params.lambda);
    let mut best: Option<SplitCandidate> = None;
    let (mut g_left, mut h_left) = (0.0, 0.0);

    for pair in order.windows(2) {
        let (i, next) = (pair[0], pair[1]);
        g_left += grad[i];
        h_left += hess[i];

        let (v, v_next) = (x.get(i, feature), x.get(next, feature));
        if v == v_next {
            continue;
        }
        let h_right = h_total - h_left;
        if h_left < params.min_child_weight || h_right < params.min_child_weight {
            continue;
        }
        let g_right = g_total - g_left;
        let gain = score(g_left, h_left, params.lambda) + score(g_right, h_right, params.lambda)
            - parent;
        if gain > 1e-12 && best.map_or(true, |b| gain > b.gain) {
            best = Some(SplitCandidate {
                feature,
                threshold: v + (v_next - v) / 2.0,
                gain,
            });
        }
    }
    best
}
