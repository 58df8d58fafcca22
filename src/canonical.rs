//! Canonical hashing for deterministic signatures.
//!
//! Two flavors are provided:
//!
//! - [`stable_hash`] feeds a `std::hash::Hash` value into xxh64 with a fixed
//!   seed. Unlike `RandomState`, the result is identical across runs, which
//!   keeps signatures reproducible.
//! - [`canonical_hash`] serializes a value to canonical JSON bytes first.
//!   Used for policy parameters and signature-multiset fingerprints.
//!
//! ## Determinism Guarantees
//!
//! - Stable field order: Struct fields serialize in declaration order
//! - Stable Vec order: Vectors serialize in index order
//! - No HashMap allowed: Use BTreeMap for maps in hashed data

use std::hash::{Hash, Hasher};

use serde::Serialize;
use xxhash_rust::xxh64::{xxh64, Xxh64};

/// Seed shared by every hash in the crate.
pub const HASH_SEED: u64 = 0;

/// Hash a `Hash` value with a seeded xxh64 hasher.
pub fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = Xxh64::new(HASH_SEED);
    value.hash(&mut hasher);
    hasher.finish()
}

/// Serialize a value to canonical JSON bytes for hashing.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Compute canonical hash of a serializable value.
///
/// Serialization failures (non-string map keys, for instance) hash the
/// error message instead and log a warning. Distinct unserializable values
/// that fail with the same message share a hash.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    match to_canonical_bytes(value) {
        Ok(bytes) => xxh64(&bytes, HASH_SEED),
        Err(e) => {
            tracing::warn!(
                error = %e,
                value_type = std::any::type_name::<T>(),
                "Canonical serialization failed, hashing error text"
            );
            xxh64(e.to_string().as_bytes(), HASH_SEED)
        }
    }
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}
