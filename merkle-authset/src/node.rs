//! Coordinates in a perfect binary tree and the paths between them.
//!
//! A tree of height `h` has `2^h` leaves on layer 0 and a single root on layer
//! `h`. A node is addressed by its layer and its index within that layer:
//!
//! ```markdown
//!                 (3, 0)
//!            /              \
//!        (2, 0)            (2, 1)
//!       /      \          /      \
//!   (1, 0)   (1, 1)   (1, 2)   (1, 3)
//!   /   \    /   \    /   \    /   \
//!  0     1  2     3  4     5  6     7
//! ```
//!
//! Node coordinates carry no digest; see [`HashedNode`] for the materialized
//! form.

use std::fmt::Display;

use arbitrary::Arbitrary;
use serde::Deserialize;
use serde::Serialize;

use crate::error::AuthSetError;
use crate::error::Result;

/// The height of the highest supported tree. Every leaf index of such a tree
/// fits a `u64`, and so does the number of leaves.
pub const MAX_TREE_HEIGHT: u32 = 63;

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Arbitrary,
)]
pub struct Node {
    pub layer: u32,
    pub index: u64,
}

impl Node {
    pub const fn new(layer: u32, index: u64) -> Self {
        Self { layer, index }
    }

    pub const fn leaf(index: u64) -> Self {
        Self::new(0, index)
    }

    pub const fn root(tree_height: u32) -> Self {
        Self::new(tree_height, 0)
    }

    /// The other child of this node's parent. Meaningless for the root.
    pub const fn sibling(self) -> Self {
        Self::new(self.layer, self.index ^ 1)
    }

    pub const fn parent(self) -> Self {
        Self::new(self.layer + 1, self.index >> 1)
    }

    pub const fn is_left_child(self) -> bool {
        self.index & 1 == 0
    }

    /// Check that this node exists in a tree of the given height.
    pub fn validate(self, tree_height: u32) -> Result<()> {
        check_tree_height(tree_height)?;
        let index_is_in_range = self.layer <= tree_height
            && self.index < num_nodes_in_layer(tree_height, self.layer);
        if !index_is_in_range {
            return Err(AuthSetError::InvalidCoordinate {
                layer: self.layer,
                index: self.index,
                height: tree_height,
            });
        }

        Ok(())
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.layer, self.index)
    }
}

impl From<(u32, u64)> for Node {
    fn from((layer, index): (u32, u64)) -> Self {
        Self::new(layer, index)
    }
}

/// A node together with its digest.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Arbitrary)]
pub struct HashedNode<D> {
    pub node: Node,
    pub digest: D,
}

impl<D> HashedNode<D> {
    pub const fn new(node: Node, digest: D) -> Self {
        Self { node, digest }
    }
}

pub(crate) fn check_tree_height(tree_height: u32) -> Result<()> {
    if tree_height > MAX_TREE_HEIGHT {
        return Err(AuthSetError::TreeTooHigh(tree_height));
    }

    Ok(())
}

/// The number of nodes on `layer` of a tree of height `tree_height`.
///
/// # Panics
///
/// Panics if `layer` exceeds `tree_height`.
pub fn num_nodes_in_layer(tree_height: u32, layer: u32) -> u64 {
    assert!(layer <= tree_height, "layer {layer} above root");
    1 << (tree_height - layer)
}

/// The siblings of all nodes on the path from the given leaf up to, but
/// excluding, the root. This is the classical authentication path of a single
/// leaf, ordered from the leaf layer upwards.
pub fn sibling_path(leaf_index: u64, tree_height: u32) -> Vec<Node> {
    let mut node = Node::leaf(leaf_index);
    let mut path = Vec::with_capacity(tree_height as usize);
    while node.layer < tree_height {
        path.push(node.sibling());
        node = node.parent();
    }

    path
}

/// The nodes on the path from the given leaf up to, but excluding, the root.
/// Starts with the leaf itself.
pub fn ancestor_path(leaf_index: u64, tree_height: u32) -> Vec<Node> {
    let mut node = Node::leaf(leaf_index);
    let mut path = Vec::with_capacity(tree_height as usize);
    while node.layer < tree_height {
        path.push(node);
        node = node.parent();
    }

    path
}

/// Like [`sibling_path`], but rejects leaf indices outside the tree.
pub fn checked_sibling_path(leaf_index: u64, tree_height: u32) -> Result<Vec<Node>> {
    Node::leaf(leaf_index).validate(tree_height)?;
    Ok(sibling_path(leaf_index, tree_height))
}

/// Like [`ancestor_path`], but rejects leaf indices outside the tree.
pub fn checked_ancestor_path(leaf_index: u64, tree_height: u32) -> Result<Vec<Node>> {
    Node::leaf(leaf_index).validate(tree_height)?;
    Ok(ancestor_path(leaf_index, tree_height))
}

/// The number of layers between either of the two leaves and their lowest
/// common ancestor. Zero if and only if the leaves are identical.
#[inline]
pub fn half_distance(left_leaf: u64, right_leaf: u64) -> u32 {
    // Halving both indices until they agree strips exactly the bits up to and
    // including the highest differing one.
    u64::BITS - (left_leaf ^ right_leaf).leading_zeros()
}
