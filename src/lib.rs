//! # hypergraph-canon
//!
//! Relabeling-invariant signatures and isomorphism matching for hypergraphs.
//!
//! The crate answers one question:
//!
//! > Given two hypergraphs, can a single refinement pass **prove** how their
//! > nodes and edges correspond?
//!
//! ## Core Contract
//!
//! 1. Canonicalize a hypergraph into one signature per node and per edge
//! 2. Match two hypergraphs by pairing equal signatures, declining on any ambiguity
//! 3. Walk the node/edge incidence structure lazily, breadth- or depth-first
//!
//! ## Architecture
//!
//! ```text
//! Hypergraph → Incidence containers → bounded-horizon hashing → Canon
//!                                                          ↓
//!                                   MatchPolicy → Matcher → Isomorphism
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same hypergraph shape → identical signatures, whatever the labels
//! - Listing order is key order, so positional operations are reproducible
//! - Policy parameters hash canonically, independent of field order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod canonical;
pub mod safe;
pub mod types;
pub mod canon;
pub mod matcher;
pub mod traversal;
pub mod policy;

// Re-exports
pub use types::{Element, ElementKind, Hypergraph, HypergraphError, MatrixStyle};
pub use safe::{
    HashError, SafeContainer, SafeRef, Signature, StructuralHash,
    EMPTY_CONTAINER_HASH, FAILED_HASH, REENTRANT_HASH, UNAVAILABLE_HASH,
};
pub use canon::{canonicalize, canonicalize_with, Canon, Horizon, Incidence, DEFAULT_REFINEMENT_HOPS};
pub use matcher::{Isomorphism, MatchFailure, Matcher, Side};
pub use traversal::{bfs, dfs, Context, FnNeighbors, Neighbors, Order, Traversal};
pub use policy::MatchPolicyV1;
pub use canonical::{to_canonical_bytes, canonical_hash, canonical_hash_hex, stable_hash};

/// Default policy version identifier.
pub const DEFAULT_POLICY_VERSION: &str = "match_policy_v1";
