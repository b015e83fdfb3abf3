//! Isolation tree
//!
//! A tree is grown on one subsample by recursive random cuts. At each node a
//! feature that still varies is picked at random, and a split value is drawn
//! uniformly between that feature's minimum and maximum. Growth stops at the
//! depth limit, at a single sample, or when every remaining sample is equal.

use crate::{MLError, MLResult, Node, NodeType, Rng, Sample};

/// Configuration for isolation tree
#[derive(Debug, Clone, Copy)]
pub struct TreeConfig {
    /// Maximum depth of tree
    pub max_depth: usize,
    /// Random seed for this tree
    pub seed: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            // ceil(log2(256))
            max_depth: 8,
            seed: 42,
        }
    }
}

/// Isolation tree in flat array form; index 0 is the root
#[derive(Debug, Clone)]
pub struct IsolationTree {
    nodes: Vec<Node>,
    config: TreeConfig,
    rng: Rng,
}

impl IsolationTree {
    /// Create an empty tree
    pub fn new(config: TreeConfig) -> Self {
        Self {
            nodes: Vec::new(),
            config,
            rng: Rng::new(config.seed),
        }
    }

    /// Grow the tree on `samples`, replacing any previous structure
    pub fn fit(&mut self, samples: &[Sample]) -> MLResult<()> {
        let Some(first) = samples.first() else {
            return Err(MLError::InsufficientData);
        };
        let num_features = first.num_features;
        if samples.iter().any(|s| s.num_features != num_features) {
            return Err(MLError::InvalidFeature);
        }

        self.nodes.clear();
        self.build(samples, 0);

        Ok(())
    }

    fn build(&mut self, samples: &[Sample], depth: u16) -> u32 {
        let index = self.nodes.len() as u32;

        if depth as usize >= self.config.max_depth || samples.len() <= 1 {
            self.nodes.push(Node::external(samples.len() as u32, depth));
            return index;
        }

        let Some((feature, split_value)) = self.select_split(samples) else {
            // Every remaining sample is identical
            self.nodes.push(Node::external(samples.len() as u32, depth));
            return index;
        };

        let (left_samples, right_samples): (Vec<Sample>, Vec<Sample>) = samples
            .iter()
            .copied()
            .partition(|s| s.features[feature as usize] < split_value);

        if left_samples.is_empty() || right_samples.is_empty() {
            self.nodes.push(Node::external(samples.len() as u32, depth));
            return index;
        }

        // Reserve this slot, fill it once the children have indices
        self.nodes.push(Node::external(0, depth));
        let left = self.build(&left_samples, depth + 1);
        let right = self.build(&right_samples, depth + 1);
        self.nodes[index as usize] = Node::internal(feature, split_value, left, right, depth);

        index
    }

    /// Random feature among those that still vary, and a cut inside its range
    fn select_split(&mut self, samples: &[Sample]) -> Option<(u8, f64)> {
        let num_features = samples[0].num_features;

        let mut candidates: Vec<(u8, f64, f64)> = Vec::with_capacity(num_features);
        for feature in 0..num_features {
            let (min, max) = feature_range(samples, feature);
            if max > min {
                candidates.push((feature as u8, min, max));
            }
        }

        if candidates.is_empty() {
            return None;
        }

        let (feature, min, max) = candidates[self.rng.next_range(candidates.len())];
        Some((feature, self.rng.next_f64_range(min, max)))
    }

    /// Path length of `sample`: leaf depth plus `c(leaf size)`
    pub fn path_length(&self, sample: &Sample) -> f64 {
        let mut current = 0usize;

        while let Some(node) = self.nodes.get(current) {
            match node.node_type {
                NodeType::External { .. } => return node.path_length(),
                NodeType::Internal { .. } => match node.traverse(sample) {
                    Ok(next) => current = next as usize,
                    Err(_) => return f64::from(node.depth),
                },
            }
        }

        0.0
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Deepest node
    pub fn depth(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.depth as usize)
            .max()
            .unwrap_or(0)
    }

    /// Nodes in storage order
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

fn feature_range(samples: &[Sample], feature: usize) -> (f64, f64) {
    samples.iter().map(|s| s.features[feature]).fold(
        (f64::INFINITY, f64::NEG_INFINITY),
        |(min, max), v| (min.min(v), max.max(v)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_samples() -> Vec<Sample> {
        vec![
            Sample::new(&[20.0, 50.0, 100.0]).unwrap(),
            Sample::new(&[22.0, 55.0, 102.0]).unwrap(),
            Sample::new(&[21.0, 52.0, 98.0]).unwrap(),
            Sample::new(&[19.0, 48.0, 101.0]).unwrap(),
            Sample::new(&[20.5, 51.0, 99.0]).unwrap(),
            Sample::new(&[21.5, 53.0, 100.5]).unwrap(),
            Sample::new(&[20.2, 49.0, 100.2]).unwrap(),
            // Anomaly
            Sample::new(&[60.0, 10.0, 450.0]).unwrap(),
        ]
    }

    #[test]
    fn tree_creation() {
        let tree = IsolationTree::new(TreeConfig::default());
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn tree_fit_respects_depth_limit() {
        let mut tree = IsolationTree::new(TreeConfig {
            max_depth: 3,
            seed: 123,
        });
        tree.fit(&create_test_samples()).unwrap();

        assert!(tree.node_count() > 1);
        assert!(tree.depth() <= 3);
    }

    #[test]
    fn leaves_account_for_every_sample() {
        let samples = create_test_samples();
        let mut tree = IsolationTree::new(TreeConfig {
            max_depth: 2,
            seed: 9,
        });
        tree.fit(&samples).unwrap();

        let total: u32 = tree
            .nodes()
            .iter()
            .filter_map(|n| match n.node_type {
                NodeType::External { size } => Some(size),
                NodeType::Internal { .. } => None,
            })
            .sum();
        assert_eq!(total as usize, samples.len());
    }

    #[test]
    fn children_point_inside_the_tree() {
        let mut tree = IsolationTree::new(TreeConfig {
            max_depth: 8,
            seed: 5,
        });
        tree.fit(&create_test_samples()).unwrap();

        for node in tree.nodes() {
            if let NodeType::Internal { left, right, .. } = node.node_type {
                let (l, r) = (&tree.nodes()[left as usize], &tree.nodes()[right as usize]);
                assert_eq!(l.depth, node.depth + 1);
                assert_eq!(r.depth, node.depth + 1);
            }
        }
    }

    #[test]
    fn identical_samples_make_a_single_leaf() {
        let samples = vec![Sample::new(&[1.0, 2.0]).unwrap(); 10];
        let mut tree = IsolationTree::new(TreeConfig::default());
        tree.fit(&samples).unwrap();

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.nodes()[0], Node::external(10, 0));
    }

    #[test]
    fn path_length_is_positive() {
        let samples = create_test_samples();
        let mut tree = IsolationTree::new(TreeConfig::default());
        tree.fit(&samples).unwrap();

        for sample in &samples {
            assert!(tree.path_length(sample) > 0.0);
        }
    }

    #[test]
    fn empty_or_mixed_input_is_rejected() {
        let mut tree = IsolationTree::new(TreeConfig::default());
        assert_eq!(tree.fit(&[]), Err(MLError::InsufficientData));

        let mixed = vec![
            Sample::new(&[1.0, 2.0]).unwrap(),
            Sample::new(&[1.0, 2.0, 3.0]).unwrap(),
        ];
        assert_eq!(tree.fit(&mixed), Err(MLError::InvalidFeature));
    }
}
