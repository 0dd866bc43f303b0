//! Authentication sets: the sibling nodes required, in addition to a set of
//! revealed leaves, to recompute the root of a Merkle tree.
//!
//! ```markdown
//!                ____root____
//!               /            \
//!           (2, 0)          (2, 1)
//!          /      \        /      \
//!      (1, 0)  [(1, 1)]  (1, 2)  [(1, 3)]
//!      /   \     /   \    /   \    /   \
//!     0    [1]  2     3  [4]   5  6     7
//! ```
//!
//! Revealing leaves 0 and 5 requires the bracketed nodes: leaves 1 and 4 as
//! well as (1, 1) and (1, 3). Every other node can be computed from those and
//! the two revealed leaves.

use std::collections::HashSet;

use itertools::Itertools;

use crate::error::Result;
use crate::node::Node;
use crate::node::ancestor_path;
use crate::node::half_distance;
use crate::node::sibling_path;

/// Computes the authentication set for a selection of leaves.
///
/// Leaf indices may be unsorted and may contain duplicates. They must be
/// smaller than `2^tree_height`; use [`checked_auth_set`][Self::checked_auth_set]
/// if that is not guaranteed.
pub trait AuthSetBuilder {
    fn auth_set(leaf_indices: &[u64], tree_height: u32) -> Vec<Node>;

    fn checked_auth_set(leaf_indices: &[u64], tree_height: u32) -> Result<Vec<Node>> {
        for &leaf_index in leaf_indices {
            Node::leaf(leaf_index).validate(tree_height)?;
        }

        Ok(Self::auth_set(leaf_indices, tree_height))
    }
}

/// Path-set difference. Simple, slow, and the reference for [`Efficient`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Naive;

/// Streaming stack merge over the sorted leaves. Produces the nodes in the
/// order in which [`reconstruct_root`](crate::verify::reconstruct_root)
/// consumes them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Efficient;

impl AuthSetBuilder for Naive {
    fn auth_set(leaf_indices: &[u64], tree_height: u32) -> Vec<Node> {
        naive_auth_set(leaf_indices, tree_height)
    }
}

impl AuthSetBuilder for Efficient {
    fn auth_set(leaf_indices: &[u64], tree_height: u32) -> Vec<Node> {
        efficient_auth_set(leaf_indices, tree_height)
    }
}

/// All siblings of all revealed leaves' paths, minus every node on any of
/// those paths. The result is free of duplicates and sorted.
pub fn naive_auth_set(leaf_indices: &[u64], tree_height: u32) -> Vec<Node> {
    let mut siblings = HashSet::new();
    let mut ancestors = HashSet::new();
    for &leaf_index in leaf_indices {
        siblings.extend(sibling_path(leaf_index, tree_height));
        ancestors.extend(ancestor_path(leaf_index, tree_height));
    }

    siblings.difference(&ancestors).copied().sorted().collect()
}

/// The minimal authentication set, in streaming order.
///
/// Every leaf climbs towards the root until it reaches the layer right below
/// its lowest common ancestor with the next leaf. A stack remembers the layer
/// at which each such climb stopped: when a later leaf's climb arrives at that
/// layer from the other side, the two subtrees merge and no node needs to be
/// supplied. The last leaf climbs all the way to the root.
pub fn efficient_auth_set(leaf_indices: &[u64], tree_height: u32) -> Vec<Node> {
    let leaf_indices = leaf_indices.iter().copied().sorted_unstable().dedup().collect_vec();

    let mut auth_set = vec![];
    let mut merge_layers: Vec<u32> = vec![];
    for (i, &leaf_index) in leaf_indices.iter().enumerate() {
        let distance = match leaf_indices.get(i + 1) {
            Some(&next_leaf_index) => half_distance(leaf_index, next_leaf_index),
            None => tree_height + 1,
        };

        let mut node = Node::leaf(leaf_index);
        for layer in 0..distance - 1 {
            if merge_layers.last() == Some(&layer) {
                merge_layers.pop();
            } else {
                auth_set.push(node.sibling());
            }
            node = node.parent();
        }
        merge_layers.push(distance - 1);
    }

    auth_set
}

/// The individual authentication paths of all leaves, concatenated. Nothing is
/// deduplicated or merged, not even repeated leaves. This is what a scheme
/// shipping one authentication path per revealed leaf transmits, before any
/// [trimming](crate::trim::trim).
pub fn separate_auth_paths(leaf_indices: &[u64], tree_height: u32) -> Vec<Node> {
    leaf_indices
        .iter()
        .flat_map(|&leaf_index| sibling_path(leaf_index, tree_height))
        .collect()
}

/// An upper bound on the size of the authentication set of `num_leaves`
/// distinct leaves. The bound is tight: it is attained by leaves spread
/// evenly across the tree.
///
/// # Panics
///
/// Panics if `num_leaves` exceeds `2^tree_height`.
pub fn worst_case_auth_set_size(tree_height: u32, num_leaves: u64) -> u64 {
    if num_leaves == 0 {
        return 0;
    }
    assert!(
        u128::from(num_leaves) <= 1 << tree_height,
        "a tree of height {tree_height} has fewer than {num_leaves} leaves"
    );

    // Spread evenly, the leaves occupy distinct subtrees rooted on layer
    // `tree_height - k`. Each subtree holding one leaf needs its full path
    // below that layer, plus one node on that layer if its sibling subtree
    // holds no leaf.
    let k = u64::BITS - (num_leaves - 1).leading_zeros();
    let num_layers_below = u64::from(tree_height - k);
    let num_empty_subtrees = (1 << k) - num_leaves;

    num_leaves * num_layers_below + num_empty_subtrees
}
