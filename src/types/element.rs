//! Tagged node/edge elements of a hypergraph.

use serde::Serialize;
use std::fmt;

/// Either side of the node/edge incidence structure.
///
/// Walking a hypergraph over `Element`s alternates between nodes and edges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Element<V, E> {
    /// A node label.
    Node(V),
    /// An edge label.
    Edge(E),
}

impl<V, E> Element<V, E> {
    /// Whether this element is a node.
    pub fn is_node(&self) -> bool {
        matches!(self, Self::Node(_))
    }

    /// Whether this element is an edge.
    pub fn is_edge(&self) -> bool {
        matches!(self, Self::Edge(_))
    }

    /// The node label, if this is a node.
    pub fn as_node(&self) -> Option<&V> {
        match self {
            Self::Node(v) => Some(v),
            Self::Edge(_) => None,
        }
    }

    /// The edge label, if this is an edge.
    pub fn as_edge(&self) -> Option<&E> {
        match self {
            Self::Node(_) => None,
            Self::Edge(e) => Some(e),
        }
    }
}

/// Which side of the incidence structure something refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ElementKind {
    /// Nodes.
    Node,
    /// Edges.
    Edge,
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Edge => write!(f, "edge"),
        }
    }
}

impl<V: fmt::Display, E: fmt::Display> fmt::Display for Element<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(v) => write!(f, "node:{v}"),
            Self::Edge(e) => write!(f, "edge:{e}"),
        }
    }
}
