//! Bagged CART decision trees.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::scoring::Feature;

pub type Row = [f64; Feature::COUNT];

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 8,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        positive_rate: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, row: &Row) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { positive_rate } => return *positive_rate,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Node,
}

impl DecisionTree {
    fn fit(rows: &[Row], labels: &[bool], sample: &[usize], params: &ForestParams, rng: &mut StdRng) -> Self {
        let max_features = ((Feature::COUNT as f64).sqrt().round() as usize).clamp(1, Feature::COUNT);
        let builder = TreeBuilder {
            rows,
            labels,
            params,
            max_features,
        };
        Self {
            root: builder.build(sample.to_vec(), 0, rng),
        }
    }

    pub fn predict_probability(&self, row: &Row) -> f64 {
        self.root.predict(row)
    }
}

struct TreeBuilder<'a> {
    rows: &'a [Row],
    labels: &'a [bool],
    params: &'a ForestParams,
    max_features: usize,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl TreeBuilder<'_> {
    fn build(&self, sample: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let n = sample.len();
        let positives = sample.iter().filter(|&&i| self.labels[i]).count();
        let positive_rate = if n == 0 { 0.0 } else { positives as f64 / n as f64 };

        if depth >= self.params.max_depth
            || n < self.params.min_samples_split.max(2)
            || positives == 0
            || positives == n
        {
            return Node::Leaf { positive_rate };
        }

        let parent_impurity = gini(positives, n);
        let features = index::sample(rng, Feature::COUNT, self.max_features).into_vec();
        let best = features
            .into_iter()
            .filter_map(|feature| self.best_split(&sample, feature))
            .fold(None::<SplitCandidate>, |best, candidate| match best {
                Some(b) if b.impurity <= candidate.impurity => Some(b),
                _ => Some(candidate),
            });

        let Some(split) = best.filter(|s| s.impurity < parent_impurity - 1e-12) else {
            return Node::Leaf { positive_rate };
        };

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| self.rows[i][split.feature] <= split.threshold);

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    /// Lowest weighted Gini split on one feature, thresholds at value midpoints.
    fn best_split(&self, sample: &[usize], feature: usize) -> Option<SplitCandidate> {
        let mut values: Vec<(f64, bool)> = sample
            .iter()
            .map(|&i| (self.rows[i][feature], self.labels[i]))
            .collect();
        values.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = values.len();
        let total_positives = values.iter().filter(|(_, label)| *label).count();
        let mut left_positives = 0;
        let mut best: Option<SplitCandidate> = None;

        for i in 1..n {
            if values[i - 1].1 {
                left_positives += 1;
            }
            if values[i].0 <= values[i - 1].0 {
                continue;
            }
            let left_n = i;
            let right_n = n - i;
            let impurity = (left_n as f64 * gini(left_positives, left_n)
                + right_n as f64 * gini(total_positives - left_positives, right_n))
                / n as f64;
            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: (values[i - 1].0 + values[i].0) / 2.0,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(positives: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// Ensemble of bootstrap-trained trees. The probability is the mean of the
/// trees' leaf positive rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit on `rows`/`labels`. The same inputs and seed always give the same forest.
    pub fn fit(rows: &[Row], labels: &[bool], params: &ForestParams) -> Self {
        let n = rows.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(rows, labels, &bootstrap, params, &mut rng)
            })
            .collect();
        Self { trees }
    }

    pub fn predict_probability(&self, row: &Row) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict_probability(row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
