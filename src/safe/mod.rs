//! Cycle-safe references and containers.
//!
//! Values that hash through shared substructure (a node's signature depends
//! on its edges, which depend on their nodes) are wrapped in [`SafeRef`]s and
//! collected in [`SafeContainer`]s. Hashing and rendering then terminate even
//! when containers reach themselves.

pub mod reference;
pub mod container;

pub use reference::{
    HashError, SafeRef, Signature, StructuralHash,
    FAILED_HASH, REENTRANT_HASH, UNAVAILABLE_HASH,
};
pub use container::{SafeContainer, EMPTY_CONTAINER_HASH};
