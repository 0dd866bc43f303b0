use std::borrow::Cow;
use std::collections::BTreeMap;

use itertools::izip;
use rayon::prelude::*;

use crate::config;
use crate::error::AuthSetError;
use crate::error::Result;
use crate::hasher::MerkleHasher;
use crate::node::HashedNode;
use crate::node::Node;
use crate::node::check_tree_height;

/// Compute the digests of the requested nodes from the complete list of leaf
/// digests.
///
/// The tree is built bottom-up, one layer at a time. A layer is dropped as soon
/// as its parent layer exists, and no layer above the highest requested one is
/// built. The root is never materialized; requesting it is an error like
/// requesting any other node outside the tree. In a tree of height 0, the
/// single leaf can be requested.
///
/// The answer lists the requested nodes in request order.
pub fn materialize<D, F>(
    leaf_digests: &[D],
    tree_height: u32,
    hash_pair: F,
    nodes: &[Node],
) -> Result<Vec<HashedNode<D>>>
where
    D: Clone + Send + Sync,
    F: Fn(&D, &D) -> D + Sync,
{
    check_leaf_count(leaf_digests, tree_height)?;

    let mut requests_by_layer: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (position, &node) in nodes.iter().enumerate() {
        node.validate(tree_height)?;
        if node.layer > 0 && node.layer == tree_height {
            return Err(AuthSetError::InvalidCoordinate {
                layer: node.layer,
                index: node.index,
                height: tree_height,
            });
        }
        requests_by_layer.entry(node.layer).or_default().push(position);
    }

    let mut digests = vec![None; nodes.len()];
    let mut layer_digests = Cow::Borrowed(leaf_digests);
    let mut current_layer = 0;
    while let Some((requested_layer, positions)) = requests_by_layer.pop_first() {
        while current_layer < requested_layer {
            layer_digests = Cow::Owned(parent_layer(&layer_digests, &hash_pair));
            current_layer += 1;
        }
        for position in positions {
            let index = nodes[position].index as usize;
            digests[position] = Some(layer_digests[index].clone());
        }
    }

    izip!(nodes, digests)
        .map(|(&node, digest)| {
            digest
                .map(|digest| HashedNode::new(node, digest))
                .ok_or(AuthSetError::InvalidCoordinate {
                    layer: node.layer,
                    index: node.index,
                    height: tree_height,
                })
        })
        .collect()
}

/// Like [`materialize`], with the pair hash of the given [`MerkleHasher`].
pub fn materialize_with<H: MerkleHasher>(
    leaf_digests: &[H::Digest],
    tree_height: u32,
    nodes: &[Node],
) -> Result<Vec<HashedNode<H::Digest>>> {
    materialize(leaf_digests, tree_height, H::hash_pair, nodes)
}

/// The root of the tree spanned by the given leaf digests.
pub fn root<D, F>(leaf_digests: &[D], tree_height: u32, hash_pair: F) -> Result<D>
where
    D: Clone + Send + Sync,
    F: Fn(&D, &D) -> D + Sync,
{
    check_leaf_count(leaf_digests, tree_height)?;

    let mut layer_digests = Cow::Borrowed(leaf_digests);
    for _ in 0..tree_height {
        layer_digests = Cow::Owned(parent_layer(&layer_digests, &hash_pair));
    }

    Ok(layer_digests[0].clone())
}

fn check_leaf_count<D>(leaf_digests: &[D], tree_height: u32) -> Result<()> {
    check_tree_height(tree_height)?;
    let expected = 1_u64 << tree_height;
    if leaf_digests.len() as u64 != expected {
        return Err(AuthSetError::LeafCountMismatch {
            expected,
            actual: leaf_digests.len(),
        });
    }

    Ok(())
}

fn parent_layer<D, F>(children: &[D], hash_pair: &F) -> Vec<D>
where
    D: Send + Sync,
    F: Fn(&D, &D) -> D + Sync,
{
    let hash_siblings = |siblings: &[D]| hash_pair(&siblings[0], &siblings[1]);

    let num_parents = children.len() / 2;
    if num_parents >= config::materialize_parallelization_cutoff() {
        children.par_chunks_exact(2).map(hash_siblings).collect()
    } else {
        children.chunks_exact(2).map(hash_siblings).collect()
    }
}
