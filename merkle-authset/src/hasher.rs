use std::fmt::Debug;
use std::fmt::Display;
use std::str::FromStr;

use arbitrary::Arbitrary;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ParseDigestError;

pub const DIGEST_BYTES: usize = 32;

/// A two-to-one compression function, the only primitive the tree needs.
///
/// All algorithms of this crate also accept a plain closure in its place; the
/// trait exists so that a hash function can be named as a type parameter.
pub trait MerkleHasher {
    type Digest: Clone + Eq + Debug + Send + Sync;

    /// Hash arbitrary data into a leaf digest.
    fn hash_leaf(data: &[u8]) -> Self::Digest;

    /// Compute the parent digest from the left (even-index) and right
    /// (odd-index) child digests.
    fn hash_pair(left: &Self::Digest, right: &Self::Digest) -> Self::Digest;
}

#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Arbitrary,
)]
pub struct Digest(pub [u8; DIGEST_BYTES]);

impl Digest {
    pub const BYTES: usize = DIGEST_BYTES;

    pub const fn new(bytes: [u8; DIGEST_BYTES]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; DIGEST_BYTES] {
        self.0
    }
}

impl Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Digest {
    type Err = ParseDigestError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(string)?;
        let num_bytes = bytes.len();
        let bytes = bytes
            .try_into()
            .map_err(|_| ParseDigestError::InvalidLength(num_bytes))?;

        Ok(Self(bytes))
    }
}

impl From<[u8; DIGEST_BYTES]> for Digest {
    fn from(bytes: [u8; DIGEST_BYTES]) -> Self {
        Self(bytes)
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl MerkleHasher for blake3::Hasher {
    type Digest = Digest;

    fn hash_leaf(data: &[u8]) -> Digest {
        blake3::hash(data).into()
    }

    fn hash_pair(left: &Digest, right: &Digest) -> Digest {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&left.0);
        hasher.update(&right.0);
        hasher.finalize().into()
    }
}

impl MerkleHasher for sha3::Sha3_256 {
    type Digest = Digest;

    fn hash_leaf(data: &[u8]) -> Digest {
        use sha3::Digest as _;

        Digest(sha3::Sha3_256::digest(data).into())
    }

    fn hash_pair(left: &Digest, right: &Digest) -> Digest {
        use sha3::Digest as _;

        let mut hasher = sha3::Sha3_256::new();
        hasher.update(left.0);
        hasher.update(right.0);
        Digest(hasher.finalize().into())
    }
}
