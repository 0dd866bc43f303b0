use thiserror::Error;

use crate::hasher::DIGEST_BYTES;
use crate::node::MAX_TREE_HEIGHT;

pub type Result<T> = std::result::Result<T, AuthSetError>;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum AuthSetError {
    #[error("node ({layer}, {index}) does not exist in a tree of height {height}")]
    InvalidCoordinate { layer: u32, index: u64, height: u32 },

    #[error("tree height {0} exceeds the maximum of {MAX_TREE_HEIGHT}")]
    TreeTooHigh(u32),

    #[error("expected {expected} leaf digests, but got {actual}")]
    LeafCountMismatch { expected: u64, actual: usize },

    #[error("verification failed: {0}")]
    VerificationFailure(#[from] VerificationFailure),

    #[error("malformed input: {0}")]
    MalformedInput(#[from] MalformedInput),
}

/// The revealed leaves and the authentication set do not lead to the root.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
#[non_exhaustive]
pub enum VerificationFailure {
    #[error("no leaves were revealed")]
    EmptyProof,

    #[error("{0} subtrees could not be merged into a single root")]
    DanglingSubtrees(usize),

    #[error("reconstruction ended at node ({layer}, {index}) instead of the root")]
    MisplacedRoot { layer: u32, index: u64 },

    #[error("reconstructed root does not match the expected root")]
    RootMismatch,

    #[error("node ({layer}, {index}) is required but was not supplied")]
    MissingNode { layer: u32, index: u64 },

    #[error("supplied node ({layer}, {index}) contradicts the recomputed one")]
    InconsistentNode { layer: u32, index: u64 },
}

/// The input violates a precondition of the reconstructor.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Error)]
#[non_exhaustive]
pub enum MalformedInput {
    #[error("leaf index {0} is revealed more than once")]
    DuplicateLeafIndex(u64),

    #[error("leaf index {current} follows leaf index {previous}; leaves must be sorted")]
    UnsortedLeafIndices { previous: u64, current: u64 },

    #[error("{0} authentication nodes were never consumed")]
    UnconsumedAuthNodes(usize),

    #[error("leaf index {0} is revealed with conflicting digests")]
    ConflictingLeaf(u64),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ParseDigestError {
    #[error("invalid hex")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("expected {DIGEST_BYTES} bytes for digest, but got {0}")]
    InvalidLength(usize),
}
