//! Core types for hypergraphs.

pub mod element;
pub mod hypergraph;

pub use element::{Element, ElementKind};
pub use hypergraph::{Hypergraph, HypergraphError, MatrixStyle};
