use crate::node::MAX_TREE_HEIGHT;
use crate::node::Node;

/// Replace every node on or above `level` by the complete row of nodes on
/// `level`.
///
/// Hash-based signature schemes such as SPHINCS cache the full row at a fixed
/// level of their trees. Shipping that row is cheaper than the union of many
/// sparse authentication paths above it, even though the result is no longer
/// minimal. Nodes below `level` keep their relative order; the row is appended
/// in ascending index order. If `level` is not below `tree_height`, the nodes
/// are returned unchanged.
///
/// The result still suffices to recompute the root, but not in streaming
/// order: verify it with [`root_from_unordered`](crate::verify::root_from_unordered).
///
/// # Panics
///
/// Panics if `tree_height` exceeds [`MAX_TREE_HEIGHT`].
pub fn trim(nodes: &[Node], tree_height: u32, level: u32) -> Vec<Node> {
    assert!(
        tree_height <= MAX_TREE_HEIGHT,
        "tree height {tree_height} exceeds the maximum of {MAX_TREE_HEIGHT}"
    );

    let Some(cut) = tree_height.checked_sub(level).filter(|&cut| cut > 0) else {
        return nodes.to_vec();
    };

    let below_level = nodes.iter().copied().filter(|node| node.layer < level);
    let full_row = (0..1_u64 << cut).map(|index| Node::new(level, index));

    below_level.chain(full_row).collect()
}
