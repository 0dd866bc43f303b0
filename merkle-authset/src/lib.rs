//! Batch authentication of Merkle tree leaves.
//!
//! Revealing several leaves of a Merkle tree does not require one
//! authentication path per leaf. Paths overlap, and siblings of one leaf's path
//! can often be computed from another revealed leaf. The *authentication set*
//! is the smallest set of nodes that, together with the revealed leaves,
//! determines the root.
//!
//! This crate computes authentication sets, fills them with digests, and
//! recomputes roots from them. See [`proof::AuthSetProof`] for the
//! all-in-one API.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![deny(clippy::shadow_unrelated)]

pub mod auth_set;
pub mod config;
pub mod error;
pub mod hasher;
pub mod materialize;
pub mod node;
pub mod prelude;
pub mod proof;
pub mod trim;
pub mod verify;

pub use error::AuthSetError;
pub use error::MalformedInput;
pub use error::VerificationFailure;
pub use hasher::Digest;

// re-export crates used in our public API
pub use blake3;
pub use sha3;
