use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::auth_set::AuthSetBuilder;
use crate::auth_set::Efficient;
use crate::error::AuthSetError;
use crate::error::Result;
use crate::node::HashedNode;
use crate::node::MAX_TREE_HEIGHT;
use crate::node::check_tree_height;
use crate::trim::trim;

/// Everything needed to convince a verifier who knows only the root that some
/// leaves belong to a Merkle tree.
///
/// The authentication set is minimal unless the proof was
/// [trimmed](Self::trimmed), in which case it contains the full row of nodes
/// at `trim_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSetProof<D> {
    pub tree_height: u32,

    /// The revealed leaves, sorted by index and free of duplicates.
    pub indexed_leaves: Vec<(u64, D)>,
    pub authentication_set: Vec<HashedNode<D>>,
    pub trim_level: Option<u32>,
}

impl<D> AuthSetProof<D>
where
    D: Clone + Eq + Send + Sync,
{
    /// Reveal the leaves at the given indices of the tree spanned by
    /// `leaf_digests`. The number of leaf digests must be a power of two.
    pub fn generate<F>(leaf_digests: &[D], leaf_indices: &[u64], hash_pair: F) -> Result<Self>
    where
        F: Fn(&D, &D) -> D + Sync,
    {
        let tree_height = tree_height_of(leaf_digests)?;
        let auth_set_nodes = Efficient::checked_auth_set(leaf_indices, tree_height)?;
        let authentication_set =
            crate::materialize::materialize(leaf_digests, tree_height, hash_pair, &auth_set_nodes)?;

        let indexed_leaves = leaf_indices
            .iter()
            .copied()
            .sorted_unstable()
            .dedup()
            .map(|leaf_index| (leaf_index, leaf_digests[leaf_index as usize].clone()))
            .collect();

        Ok(Self {
            tree_height,
            indexed_leaves,
            authentication_set,
            trim_level: None,
        })
    }

    /// Replace the authentication nodes on or above `level` by the full row of
    /// nodes on `level`. The leaf digests must be those the proof was
    /// generated from.
    pub fn trimmed<F>(self, level: u32, leaf_digests: &[D], hash_pair: F) -> Result<Self>
    where
        F: Fn(&D, &D) -> D + Sync,
    {
        check_tree_height(self.tree_height)?;
        if level >= self.tree_height {
            return Ok(self);
        }

        let tree_height = tree_height_of(leaf_digests)?;
        if tree_height != self.tree_height {
            return Err(AuthSetError::LeafCountMismatch {
                expected: 1 << self.tree_height,
                actual: leaf_digests.len(),
            });
        }

        let nodes = self.authentication_set.iter().map(|n| n.node).collect_vec();
        let trimmed_nodes = trim(&nodes, tree_height, level);
        debug!(
            level,
            num_nodes_before = nodes.len(),
            num_nodes_after = trimmed_nodes.len(),
            "trimmed authentication set"
        );
        let authentication_set =
            crate::materialize::materialize(leaf_digests, tree_height, hash_pair, &trimmed_nodes)?;
        let trim_level = self.trim_level.map_or(level, |l| l.min(level));

        Ok(Self {
            authentication_set,
            trim_level: Some(trim_level),
            ..self
        })
    }

    /// Recompute the root. Trimmed proofs are not in streaming order and are
    /// recomputed order-insensitively.
    pub fn reconstruct_root<F>(&self, hash_pair: F) -> Result<D>
    where
        F: Fn(&D, &D) -> D,
    {
        match self.trim_level {
            None => crate::verify::reconstruct_root(
                &self.indexed_leaves,
                &self.authentication_set,
                self.tree_height,
                hash_pair,
            ),
            Some(_) => crate::verify::root_from_unordered(
                &self.indexed_leaves,
                &self.authentication_set,
                self.tree_height,
                hash_pair,
            ),
        }
    }

    pub fn verify<F>(&self, expected_root: &D, hash_pair: F) -> bool
    where
        F: Fn(&D, &D) -> D,
    {
        match self.reconstruct_root(hash_pair) {
            Ok(root) => &root == expected_root,
            Err(err) => {
                debug!(%err, "proof rejected");
                false
            }
        }
    }

    pub fn leaf_indices(&self) -> impl Iterator<Item = u64> + '_ {
        self.indexed_leaves.iter().map(|&(leaf_index, _)| leaf_index)
    }
}

fn tree_height_of<D>(leaf_digests: &[D]) -> Result<u32> {
    let num_leaves = leaf_digests.len();
    if !num_leaves.is_power_of_two() {
        let expected = num_leaves.max(1).next_power_of_two() as u64;
        return Err(AuthSetError::LeafCountMismatch {
            expected,
            actual: num_leaves,
        });
    }

    let tree_height = num_leaves.ilog2();
    if tree_height > MAX_TREE_HEIGHT {
        return Err(AuthSetError::TreeTooHigh(tree_height));
    }

    Ok(tree_height)
}
