//! Isolation tree node
//!
//! Nodes live in a flat `Vec` owned by the tree and refer to their children
//! by index, so a tree is a single allocation and cheap to walk.

use crate::{average_path_length, MLError, MLResult, Sample};

/// Node type in the isolation tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeType {
    /// Internal node with split condition
    Internal {
        /// Feature index to split on
        feature: u8,
        /// Values strictly below go left
        split_value: f64,
        /// Left child index
        left: u32,
        /// Right child index
        right: u32,
    },
    /// Leaf node (external)
    External {
        /// Number of training samples that reached this leaf
        size: u32,
    },
}

/// Tree node with its depth from the root
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    /// Node type and data
    pub node_type: NodeType,
    /// Edges from the root
    pub depth: u16,
}

impl Node {
    /// Create an internal node
    pub fn internal(feature: u8, split_value: f64, left: u32, right: u32, depth: u16) -> Self {
        Self {
            node_type: NodeType::Internal {
                feature,
                split_value,
                left,
                right,
            },
            depth,
        }
    }

    /// Create an external (leaf) node
    pub fn external(size: u32, depth: u16) -> Self {
        Self {
            node_type: NodeType::External { size },
            depth,
        }
    }

    /// Check if node is a leaf
    pub fn is_leaf(&self) -> bool {
        matches!(self.node_type, NodeType::External { .. })
    }

    /// Path length credited to a sample ending here
    ///
    /// Depth plus `c(size)`, the expected depth of the subtree that was never grown.
    pub fn path_length(&self) -> f64 {
        match self.node_type {
            NodeType::External { size } => {
                f64::from(self.depth) + average_path_length(size as usize)
            }
            NodeType::Internal { .. } => f64::from(self.depth),
        }
    }

    /// Child index to visit next
    pub fn traverse(&self, sample: &Sample) -> MLResult<u32> {
        match self.node_type {
            NodeType::Internal {
                feature,
                split_value,
                left,
                right,
            } => {
                let value = sample
                    .get_feature(feature as usize)
                    .ok_or(MLError::InvalidFeature)?;

                if value < split_value {
                    Ok(left)
                } else {
                    Ok(right)
                }
            }
            NodeType::External { .. } => Err(MLError::InvalidConfig("cannot traverse from a leaf")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_creation() {
        let internal = Node::internal(0, 25.0, 1, 2, 3);
        assert!(!internal.is_leaf());
        assert_eq!(internal.depth, 3);

        let external = Node::external(10, 5);
        assert!(external.is_leaf());
        assert_eq!(external.depth, 5);
    }

    #[test]
    fn node_traverse() {
        let node = Node::internal(0, 25.0, 1, 2, 0);

        let below = Sample::new(&[20.0]).unwrap();
        assert_eq!(node.traverse(&below).unwrap(), 1);

        // Split value itself goes right
        let at = Sample::new(&[25.0]).unwrap();
        assert_eq!(node.traverse(&at).unwrap(), 2);

        let narrow = Node::internal(4, 0.0, 1, 2, 0);
        assert_eq!(narrow.traverse(&below), Err(MLError::InvalidFeature));
    }

    #[test]
    fn leaf_path_length() {
        assert_eq!(Node::external(1, 4).path_length(), 4.0);
        assert_eq!(Node::external(2, 4).path_length(), 5.0);
        assert!(Node::external(3, 0).path_length() > 1.0);
    }
}
