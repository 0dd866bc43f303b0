pub use crate::auth_set::AuthSetBuilder;
pub use crate::auth_set::Efficient;
pub use crate::auth_set::Naive;
pub use crate::auth_set::efficient_auth_set;
pub use crate::auth_set::naive_auth_set;
pub use crate::auth_set::worst_case_auth_set_size;
pub use crate::error::AuthSetError;
pub use crate::hasher::Digest;
pub use crate::hasher::MerkleHasher;
pub use crate::materialize::materialize;
pub use crate::node::HashedNode;
pub use crate::node::Node;
pub use crate::proof::AuthSetProof;
pub use crate::trim::trim;
pub use crate::verify::reconstruct_root;
pub use crate::verify::root_from_unordered;
pub use crate::verify::verify_root;
