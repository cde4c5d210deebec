//! Isolation forest outlier scorer
//!
//! Points isolated by few random axis-aligned splits are anomalous. The
//! decision threshold is the training-score quantile that leaves the
//! configured contamination fraction above it.

use super::{OutlierScorer, Verdict};
use crate::error::{MeterError, Result};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
pub struct IsolationForestConfig {
    pub n_estimators: usize,
    /// Sub-sample size per tree (capped at the number of rows)
    pub max_samples: usize,
    /// Expected share of outliers in the training data
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.01,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(rows: &[&[f64]], sample: Vec<usize>, max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(rows, sample, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        rows: &[&[f64]],
        members: Vec<usize>,
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: members.len(),
        });
        if depth >= max_depth || members.len() <= 1 {
            return id;
        }

        let width = rows[members[0]].len();
        let splittable: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|feature| {
                let (min, max) = members.iter().map(|&i| rows[i][feature]).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), v| (lo.min(v), hi.max(v)),
                );
                (min < max).then_some((feature, min, max))
            })
            .collect();
        if splittable.is_empty() {
            return id;
        }

        let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
        // finite even when `max - min` overflows
        let u: f64 = rng.gen();
        let threshold = min * (1.0 - u) + max * u;
        let (left, right): (Vec<usize>, Vec<usize>) =
            members.into_iter().partition(|&i| rows[i][feature] < threshold);

        let left = self.grow(rows, left, depth + 1, max_depth, rng);
        let right = self.grow(rows, right, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        let mut depth = 0.0;
        let mut node = 0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if point[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful search in a binary search tree
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile of unsorted values, `q` in [0, 1]
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    width: usize,
    threshold: f64,
}

impl IsolationForest {
    pub fn fit<R: AsRef<[f64]>>(data: &[R], config: &IsolationForestConfig) -> Result<Self> {
        let rows: Vec<&[f64]> = data.iter().map(|r| r.as_ref()).collect();
        if rows.len() < 2 {
            return Err(MeterError::Fit("isolation forest needs at least two rows".into()));
        }
        let width = rows[0].len();
        if width == 0 || rows.iter().any(|r| r.len() != width) {
            return Err(MeterError::Fit("feature rows have inconsistent width".into()));
        }
        if rows.iter().any(|r| r.iter().any(|v| !v.is_finite())) {
            return Err(MeterError::Fit("training data contains non-finite values".into()));
        }
        if config.n_estimators == 0 || !(0.0..0.5).contains(&config.contamination) {
            return Err(MeterError::Fit("invalid isolation forest configuration".into()));
        }

        let sample_size = config.max_samples.clamp(2, rows.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, rows.len(), sample_size).into_vec();
                IsolationTree::build(&rows, sample, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            width,
            threshold: f64::INFINITY,
        };
        let scores: Vec<f64> = rows.iter().map(|r| forest.anomaly_score(r)).collect();
        forest.threshold = quantile(&scores, 1.0 - config.contamination);
        Ok(forest)
    }

    /// Anomaly score in (0, 1]; higher is more anomalous
    pub fn anomaly_score(&self, point: &[f64]) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|t| t.path_length(point))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_path / average_path_length(self.sample_size))
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl OutlierScorer for IsolationForest {
    fn score(&self, features: &[f64]) -> Result<Verdict> {
        if features.len() != self.width {
            return Err(MeterError::Inference(format!(
                "expected {} features, got {}",
                self.width,
                features.len()
            )));
        }
        if self.anomaly_score(features) > self.threshold {
            Ok(Verdict::Outlier)
        } else {
            Ok(Verdict::Inlier)
        }
    }

    fn name(&self) -> &str {
        "isolation_forest"
    }
}
