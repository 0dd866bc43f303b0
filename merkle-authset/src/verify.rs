//! Recompute the root of a Merkle tree from revealed leaves and an
//! authentication set.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use tracing::debug;
use tracing::trace;

use crate::error::AuthSetError;
use crate::error::MalformedInput;
use crate::error::Result;
use crate::error::VerificationFailure;
use crate::hasher::MerkleHasher;
use crate::node::HashedNode;
use crate::node::Node;
use crate::node::check_tree_height;

/// Recompute the root from the revealed leaves and an authentication set in
/// streaming order, as produced by
/// [`efficient_auth_set`](crate::auth_set::efficient_auth_set).
///
/// The leaves must be sorted by index and free of duplicates. Every leaf climbs
/// towards the root for as long as the sibling it needs is either the most
/// recently completed subtree or the next node of the authentication set. A
/// leaf that can climb no further leaves its subtree on a stack, waiting for a
/// later leaf to merge with it. After the last leaf, exactly the root must
/// remain, and every authentication node must have been used.
pub fn reconstruct_root<D, F>(
    indexed_leaves: &[(u64, D)],
    auth_set: &[HashedNode<D>],
    tree_height: u32,
    hash_pair: F,
) -> Result<D>
where
    D: Clone,
    F: Fn(&D, &D) -> D,
{
    validate_leaf_order(indexed_leaves, tree_height)?;
    validate_auth_nodes(auth_set, tree_height)?;

    let mut auth_nodes = auth_set.iter().peekable();
    let mut subtrees: Vec<HashedNode<D>> = vec![];
    for (leaf_index, leaf_digest) in indexed_leaves {
        let mut node = Node::leaf(*leaf_index);
        let mut digest = leaf_digest.clone();
        while node.layer < tree_height {
            let sibling = node.sibling();
            let sibling_digest = if subtrees.last().is_some_and(|top| top.node == sibling) {
                subtrees.pop().map(|top| top.digest)
            } else if auth_nodes.peek().is_some_and(|next| next.node == sibling) {
                auth_nodes.next().map(|next| next.digest.clone())
            } else {
                None
            };
            let Some(sibling_digest) = sibling_digest else {
                break;
            };

            digest = if node.is_left_child() {
                hash_pair(&digest, &sibling_digest)
            } else {
                hash_pair(&sibling_digest, &digest)
            };
            node = node.parent();
        }

        subtrees.push(HashedNode::new(node, digest));
        trace!(
            leaf_index,
            subtree = %node,
            num_pending_subtrees = subtrees.len(),
            num_remaining_auth_nodes = auth_nodes.len(),
            "leaf climbed"
        );
    }

    if subtrees.len() > 1 {
        debug!(num_subtrees = subtrees.len(), "subtrees did not merge");
        return Err(VerificationFailure::DanglingSubtrees(subtrees.len()).into());
    }
    let Some(root) = subtrees.pop() else {
        return Err(VerificationFailure::EmptyProof.into());
    };
    if root.node != Node::root(tree_height) {
        debug!(node = %root.node, "reconstruction ended below the root");
        return Err(VerificationFailure::MisplacedRoot {
            layer: root.node.layer,
            index: root.node.index,
        }
        .into());
    }

    let num_unconsumed_auth_nodes = auth_nodes.len();
    if num_unconsumed_auth_nodes > 0 {
        debug!(num_unconsumed_auth_nodes, "authentication set not consumed");
        return Err(MalformedInput::UnconsumedAuthNodes(num_unconsumed_auth_nodes).into());
    }

    Ok(root.digest)
}

/// Like [`reconstruct_root`], with the pair hash of the given [`MerkleHasher`].
pub fn reconstruct_root_with<H: MerkleHasher>(
    indexed_leaves: &[(u64, H::Digest)],
    auth_set: &[HashedNode<H::Digest>],
    tree_height: u32,
) -> Result<H::Digest> {
    reconstruct_root(indexed_leaves, auth_set, tree_height, H::hash_pair)
}

/// Recompute the root and compare it to the expected one.
pub fn verify_root<D, F>(
    expected_root: &D,
    indexed_leaves: &[(u64, D)],
    auth_set: &[HashedNode<D>],
    tree_height: u32,
    hash_pair: F,
) -> Result<()>
where
    D: Clone + Eq,
    F: Fn(&D, &D) -> D,
{
    let root = reconstruct_root(indexed_leaves, auth_set, tree_height, hash_pair)?;
    if &root != expected_root {
        return Err(VerificationFailure::RootMismatch.into());
    }

    Ok(())
}

/// Recompute the root from revealed leaves and any set of nodes that suffices
/// to do so, in any order.
///
/// Unlike [`reconstruct_root`], this accepts [trimmed](crate::trim::trim) sets
/// and surplus nodes. Every supplied node that can also be computed must agree
/// with the computed digest. Leaves may be unsorted and repeated, as long as
/// repetitions agree.
pub fn root_from_unordered<D, F>(
    indexed_leaves: &[(u64, D)],
    auth_nodes: &[HashedNode<D>],
    tree_height: u32,
    hash_pair: F,
) -> Result<D>
where
    D: Clone + Eq,
    F: Fn(&D, &D) -> D,
{
    validate_auth_nodes(auth_nodes, tree_height)?;
    if indexed_leaves.is_empty() {
        return Err(VerificationFailure::EmptyProof.into());
    }

    // Per layer, the known digests by index. The flag marks nodes derived from
    // revealed leaves; only those must reach the root.
    let mut supplied_layers: BTreeMap<u32, BTreeMap<u64, (D, bool)>> = BTreeMap::new();
    for auth_node in auth_nodes {
        let layer = supplied_layers.entry(auth_node.node.layer).or_default();
        insert_consistent(layer, auth_node.node, auth_node.digest.clone(), false)?;
    }

    let mut current_layer = supplied_layers.remove(&0).unwrap_or_default();
    for (leaf_index, leaf_digest) in indexed_leaves {
        let leaf = Node::leaf(*leaf_index);
        leaf.validate(tree_height)?;
        match current_layer.entry(*leaf_index) {
            Entry::Vacant(entry) => {
                entry.insert((leaf_digest.clone(), true));
            }
            Entry::Occupied(mut entry) => {
                let (known_digest, derived) = entry.get_mut();
                if known_digest != leaf_digest && *derived {
                    return Err(MalformedInput::ConflictingLeaf(*leaf_index).into());
                }
                if known_digest != leaf_digest {
                    return Err(VerificationFailure::InconsistentNode {
                        layer: 0,
                        index: *leaf_index,
                    }
                    .into());
                }
                *derived = true;
            }
        }
    }

    for layer in 0..tree_height {
        let mut parent_layer = supplied_layers.remove(&(layer + 1)).unwrap_or_default();
        for (&index, (digest, derived)) in &current_layer {
            let node = Node::new(layer, index);
            let parent = node.parent();
            if !node.is_left_child() && current_layer.contains_key(&(index ^ 1)) {
                // already merged with its left sibling
                continue;
            }

            let Some((sibling_digest, sibling_derived)) = current_layer.get(&(index ^ 1)) else {
                // A surplus node without sibling is harmless, a revealed one is not.
                if *derived {
                    let sibling = node.sibling();
                    debug!(%sibling, "required node missing");
                    return Err(VerificationFailure::MissingNode {
                        layer: sibling.layer,
                        index: sibling.index,
                    }
                    .into());
                }
                continue;
            };

            let parent_digest = if node.is_left_child() {
                hash_pair(digest, sibling_digest)
            } else {
                hash_pair(sibling_digest, digest)
            };
            let parent_derived = *derived || *sibling_derived;
            insert_consistent(&mut parent_layer, parent, parent_digest, parent_derived)?;
        }
        current_layer = parent_layer;
    }

    match current_layer.remove(&0) {
        Some((root, true)) => Ok(root),
        _ => Err(VerificationFailure::MissingNode {
            layer: tree_height,
            index: 0,
        }
        .into()),
    }
}

fn insert_consistent<D: Eq>(
    layer: &mut BTreeMap<u64, (D, bool)>,
    node: Node,
    digest: D,
    derived: bool,
) -> Result<()> {
    match layer.entry(node.index) {
        Entry::Vacant(entry) => {
            entry.insert((digest, derived));
        }
        Entry::Occupied(mut entry) => {
            let (known_digest, known_derived) = entry.get_mut();
            if *known_digest != digest {
                debug!(%node, "supplied node contradicts recomputation");
                return Err(VerificationFailure::InconsistentNode {
                    layer: node.layer,
                    index: node.index,
                }
                .into());
            }
            *known_derived |= derived;
        }
    }

    Ok(())
}

fn validate_leaf_order<D>(indexed_leaves: &[(u64, D)], tree_height: u32) -> Result<()> {
    check_tree_height(tree_height)?;
    for (leaf_index, _) in indexed_leaves {
        Node::leaf(*leaf_index).validate(tree_height)?;
    }
    for window in indexed_leaves.windows(2) {
        let (previous, current) = (window[0].0, window[1].0);
        if previous == current {
            return Err(MalformedInput::DuplicateLeafIndex(current).into());
        }
        if previous > current {
            return Err(MalformedInput::UnsortedLeafIndices { previous, current }.into());
        }
    }

    Ok(())
}

/// Supplying the root itself would make verification vacuous.
fn validate_auth_nodes<D>(auth_nodes: &[HashedNode<D>], tree_height: u32) -> Result<()> {
    check_tree_height(tree_height)?;
    for HashedNode { node, .. } in auth_nodes {
        node.validate(tree_height)?;
        if node.layer == tree_height {
            return Err(AuthSetError::InvalidCoordinate {
                layer: node.layer,
                index: node.index,
                height: tree_height,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use itertools::Itertools;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use test_strategy::proptest;

    use super::*;
    use crate::auth_set::efficient_auth_set;
    use crate::hasher::Digest;
    use crate::hasher::tests::corrupt_digest;
    use crate::materialize::materialize_with;
    use crate::materialize::root;
    use crate::trim::trim;

    type H = blake3::Hasher;

    /// A complete tree, and everything needed to reveal some of its leaves.
    #[derive(Debug, Clone)]
    struct Opening {
        tree_height: u32,
        root: Digest,
        indexed_leaves: Vec<(u64, Digest)>,
        auth_set: Vec<HashedNode<Digest>>,
    }

    impl Opening {
        fn new(tree_height: u32, leaf_indices: &[u64]) -> Self {
            let leaf_digests = (0..1_u64 << tree_height)
                .map(|i| H::hash_leaf(&i.to_be_bytes()))
                .collect_vec();
            let root = root(&leaf_digests, tree_height, H::hash_pair).unwrap();
            let indexed_leaves = leaf_indices
                .iter()
                .copied()
                .sorted()
                .dedup()
                .map(|i| (i, leaf_digests[i as usize]))
                .collect();
            let auth_set_nodes = efficient_auth_set(leaf_indices, tree_height);
            let auth_set = materialize_with::<H>(&leaf_digests, tree_height, &auth_set_nodes).unwrap();

            Self {
                tree_height,
                root,
                indexed_leaves,
                auth_set,
            }
        }

        fn reconstruct(&self) -> Result<Digest> {
            reconstruct_root_with::<H>(&self.indexed_leaves, &self.auth_set, self.tree_height)
        }

        fn reconstruct_unordered(&self) -> Result<Digest> {
            root_from_unordered(
                &self.indexed_leaves,
                &self.auth_set,
                self.tree_height,
                H::hash_pair,
            )
        }

        fn verify(&self) -> Result<()> {
            verify_root(
                &self.root,
                &self.indexed_leaves,
                &self.auth_set,
                self.tree_height,
                H::hash_pair,
            )
        }
    }

    #[test]
    fn two_leaves_diverging_at_root() {
        let opening = Opening::new(3, &[0, 5]);
        assert_eq!(4, opening.auth_set.len());
        assert_eq!(opening.root, opening.reconstruct().unwrap());
        assert!(opening.verify().is_ok());
    }

    #[test]
    fn tree_of_height_zero_has_leaf_as_root() {
        let opening = Opening::new(0, &[0]);
        assert!(opening.auth_set.is_empty());
        assert_eq!(opening.indexed_leaves[0].1, opening.root);
        assert_eq!(opening.root, opening.reconstruct().unwrap());
        assert_eq!(opening.root, opening.reconstruct_unordered().unwrap());
    }

    #[test]
    fn all_leaves_need_no_authentication() {
        let leaf_indices = (0..32).collect_vec();
        let opening = Opening::new(5, &leaf_indices);
        assert!(opening.auth_set.is_empty());
        assert!(opening.verify().is_ok());
    }

    #[proptest(cases = 50)]
    fn revealed_leaves_and_auth_set_recompute_root(
        #[strategy(0_u32..=12)] tree_height: u32,
        #[strategy(vec(0..1_u64 << #tree_height, 1..64))] leaf_indices: Vec<u64>,
    ) {
        let opening = Opening::new(tree_height, &leaf_indices);
        prop_assert_eq!(opening.root, opening.reconstruct()?);
        prop_assert_eq!(opening.root, opening.reconstruct_unordered()?);
    }

    #[proptest(cases = 50)]
    fn trimmed_auth_set_recomputes_root_out_of_order(
        #[strategy(1_u32..=10)] tree_height: u32,
        #[strategy(0..#tree_height)] level: u32,
        #[strategy(vec(0..1_u64 << #tree_height, 1..32))] leaf_indices: Vec<u64>,
    ) {
        let leaf_digests = (0..1_u64 << tree_height)
            .map(|i| H::hash_leaf(&i.to_be_bytes()))
            .collect_vec();
        let expected_root = root(&leaf_digests, tree_height, H::hash_pair)?;
        let indexed_leaves = leaf_indices
            .iter()
            .map(|&i| (i, leaf_digests[i as usize]))
            .collect_vec();

        let auth_set_nodes = efficient_auth_set(&leaf_indices, tree_height);
        let trimmed_nodes = trim(&auth_set_nodes, tree_height, level);
        let trimmed = materialize_with::<H>(&leaf_digests, tree_height, &trimmed_nodes)?;

        let root = root_from_unordered(&indexed_leaves, &trimmed, tree_height, H::hash_pair)?;
        prop_assert_eq!(expected_root, root);
    }

    #[proptest(cases = 30)]
    fn removing_any_node_prevents_reconstruction(
        #[strategy(1_u32..=8)] tree_height: u32,
        #[strategy(vec(0..1_u64 << #tree_height, 2..16))] leaf_indices: Vec<u64>,
    ) {
        let opening = Opening::new(tree_height, &leaf_indices);
        for i in 0..opening.auth_set.len() {
            let mut incomplete = opening.clone();
            incomplete.auth_set.remove(i);
            prop_assert!(matches!(
                incomplete.reconstruct(),
                Err(AuthSetError::VerificationFailure(_))
            ));
            prop_assert!(matches!(
                incomplete.reconstruct_unordered(),
                Err(AuthSetError::VerificationFailure(_))
            ));
        }
    }

    #[proptest(cases = 30)]
    fn corrupting_any_digest_changes_root(
        #[strategy(1_u32..=8)] tree_height: u32,
        #[strategy(vec(0..1_u64 << #tree_height, 1..16))] leaf_indices: Vec<u64>,
    ) {
        let opening = Opening::new(tree_height, &leaf_indices);
        for i in 0..opening.auth_set.len() {
            let mut corrupt = opening.clone();
            corrupt.auth_set[i].digest = corrupt_digest(corrupt.auth_set[i].digest);
            prop_assert_eq!(
                Err(AuthSetError::from(VerificationFailure::RootMismatch)),
                corrupt.verify()
            );
        }
        for i in 0..opening.indexed_leaves.len() {
            let mut corrupt = opening.clone();
            corrupt.indexed_leaves[i].1 = corrupt_digest(corrupt.indexed_leaves[i].1);
            prop_assert_eq!(
                Err(AuthSetError::from(VerificationFailure::RootMismatch)),
                corrupt.verify()
            );
        }
    }

    #[test]
    fn wrong_tree_height_fails() {
        let opening = Opening::new(5, &[0, 3, 17]);
        for tree_height in [4, 6] {
            let wrong_height = Opening {
                tree_height,
                ..opening.clone()
            };
            assert!(wrong_height.reconstruct().is_err());
            assert!(wrong_height.reconstruct_unordered().is_err());
        }
    }

    #[test]
    fn auth_set_in_wrong_order_leaves_dangling_subtrees() {
        let mut opening = Opening::new(3, &[0, 5]);
        opening.auth_set.reverse();
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::DanglingSubtrees(2))),
            opening.reconstruct()
        );
        assert_eq!(opening.root, opening.reconstruct_unordered().unwrap());
    }

    #[test]
    fn surplus_auth_node_is_not_consumed() {
        let mut opening = Opening::new(3, &[0, 5]);
        let surplus = opening.auth_set[0];
        opening.auth_set.push(surplus);
        assert_eq!(
            Err(AuthSetError::from(MalformedInput::UnconsumedAuthNodes(1))),
            opening.reconstruct()
        );
        assert_eq!(opening.root, opening.reconstruct_unordered().unwrap());
    }

    #[test]
    fn missing_auth_node_leaves_dangling_subtrees() {
        // auth set: (0, 1), (1, 1), (0, 4), (1, 3)
        let mut opening = Opening::new(3, &[0, 5]);
        opening.auth_set.pop();
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::DanglingSubtrees(2))),
            opening.reconstruct()
        );
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::MissingNode { layer: 1, index: 3 })),
            opening.reconstruct_unordered()
        );
    }

    #[test]
    fn missing_first_auth_node_is_verification_failure() {
        // auth set: (0, 1), (1, 1), (0, 4), (1, 3)
        let mut opening = Opening::new(3, &[0, 5]);
        opening.auth_set.remove(0);
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::DanglingSubtrees(2))),
            opening.reconstruct()
        );
    }

    #[test]
    fn truncated_auth_path_ends_below_root() {
        let mut opening = Opening::new(3, &[0]);
        opening.auth_set.pop();
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::MisplacedRoot { layer: 2, index: 0 })),
            opening.reconstruct()
        );
    }

    #[test]
    fn no_revealed_leaves_is_empty_proof() {
        let opening = Opening::new(3, &[]);
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::EmptyProof)),
            opening.reconstruct()
        );
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::EmptyProof)),
            opening.reconstruct_unordered()
        );
    }

    #[test]
    fn duplicate_and_unsorted_leaves_are_malformed() {
        let opening = Opening::new(3, &[1, 5]);

        let mut duplicated = opening.clone();
        duplicated.indexed_leaves.insert(0, opening.indexed_leaves[0]);
        assert_eq!(
            Err(AuthSetError::from(MalformedInput::DuplicateLeafIndex(1))),
            duplicated.reconstruct()
        );
        assert_eq!(opening.root, duplicated.reconstruct_unordered().unwrap());

        let mut unsorted = opening.clone();
        unsorted.indexed_leaves.reverse();
        assert_eq!(
            Err(AuthSetError::from(MalformedInput::UnsortedLeafIndices {
                previous: 5,
                current: 1
            })),
            unsorted.reconstruct()
        );
        assert_eq!(opening.root, unsorted.reconstruct_unordered().unwrap());
    }

    #[test]
    fn conflicting_leaves_are_malformed() {
        let mut opening = Opening::new(3, &[1, 5]);
        let (index, digest) = opening.indexed_leaves[0];
        opening.indexed_leaves.push((index, corrupt_digest(digest)));
        assert_eq!(
            Err(AuthSetError::from(MalformedInput::ConflictingLeaf(1))),
            opening.reconstruct_unordered()
        );
    }

    #[test]
    fn contradicting_surplus_node_is_inconsistent() {
        let mut opening = Opening::new(3, &[1, 5]);
        let contradiction = HashedNode::new(Node::new(1, 0), Digest::default());
        opening.auth_set.push(contradiction);
        assert_eq!(
            Err(AuthSetError::from(VerificationFailure::InconsistentNode { layer: 1, index: 0 })),
            opening.reconstruct_unordered()
        );
    }

    #[test]
    fn supplying_the_root_is_rejected() {
        let mut opening = Opening::new(3, &[1, 5]);
        opening.auth_set.push(HashedNode::new(Node::root(3), opening.root));
        let err = AuthSetError::InvalidCoordinate {
            layer: 3,
            index: 0,
            height: 3,
        };
        assert_eq!(Err(err.clone()), opening.reconstruct());
        assert_eq!(Err(err), opening.reconstruct_unordered());
    }

    #[test]
    fn leaves_outside_the_tree_are_rejected() {
        let mut opening = Opening::new(3, &[1, 5]);
        opening.indexed_leaves.push((8, Digest::default()));
        assert!(matches!(
            opening.reconstruct(),
            Err(AuthSetError::InvalidCoordinate { index: 8, .. })
        ));
        assert!(matches!(
            opening.reconstruct_unordered(),
            Err(AuthSetError::InvalidCoordinate { index: 8, .. })
        ));
    }
}
