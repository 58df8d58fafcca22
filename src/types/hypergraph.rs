//! Hypergraph data model.
//!
//! A hypergraph is stored as two mutually consistent incidence maps:
//! node → incident edges and edge → incident nodes. Both use BTree
//! collections, so the listing order of nodes and edges (key order) is
//! deterministic and positional operations such as [`Hypergraph::permute`]
//! are reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::BufRead;

use serde::Serialize;

use super::element::ElementKind;

/// Error type for hypergraph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HypergraphError {
    /// A permutation's length disagrees with the number of elements.
    #[error("{kind} permutation has length {actual}, expected {expected}")]
    PermutationLength {
        /// Which permutation was malformed.
        kind: ElementKind,
        /// Number of elements of that kind.
        expected: usize,
        /// Length of the supplied permutation.
        actual: usize,
    },
    /// A permutation repeats an index or points past the end.
    #[error("{kind} permutation is not a permutation of 0..{len}")]
    NotAPermutation {
        /// Which permutation was malformed.
        kind: ElementKind,
        /// Number of elements of that kind.
        len: usize,
    },
}

/// Glyphs used when rendering an incidence matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatrixStyle {
    /// Glyph for an incident (edge, node) pair.
    pub incident: char,
    /// Glyph for a non-incident pair.
    pub absent: char,
}

impl Default for MatrixStyle {
    fn default() -> Self {
        Self {
            incident: '@',
            absent: ' ',
        }
    }
}

/// Bipartite incidence structure between nodes `V` and edges `E`.
///
/// Invariant: `e ∈ nodes[v] ⟺ v ∈ edges[e]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hypergraph<V, E> {
    nodes: BTreeMap<V, BTreeSet<E>>,
    edges: BTreeMap<E, BTreeSet<V>>,
}

impl<V: Ord, E: Ord> Default for Hypergraph<V, E> {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }
}

impl<V: Ord + Clone, E: Ord + Clone> Hypergraph<V, E> {
    /// Create an empty hypergraph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an `edge → nodes` mapping, deriving `node → edges` by inversion.
    ///
    /// Repeated edge labels merge their node sets.
    pub fn from_edges<I, N>(edges: I) -> Self
    where
        I: IntoIterator<Item = (E, N)>,
        N: IntoIterator<Item = V>,
    {
        let mut hypergraph = Self::new();
        for (edge, members) in edges {
            let entry = hypergraph.edges.entry(edge.clone()).or_default();
            for node in members {
                hypergraph
                    .nodes
                    .entry(node.clone())
                    .or_default()
                    .insert(edge.clone());
                entry.insert(node);
            }
        }
        hypergraph
    }

    /// Node → incident edges.
    pub fn nodes(&self) -> &BTreeMap<V, BTreeSet<E>> {
        &self.nodes
    }

    /// Edge → incident nodes.
    pub fn edges(&self) -> &BTreeMap<E, BTreeSet<V>> {
        &self.edges
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Total number of (node, edge) incidences.
    pub fn incidence_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    /// Largest edge cardinality, or `None` for an edgeless hypergraph.
    pub fn rank(&self) -> Option<usize> {
        self.edges.values().map(BTreeSet::len).max()
    }

    /// Whether there are neither nodes nor edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Whether `node` is present.
    pub fn contains_node(&self, node: &V) -> bool {
        self.nodes.contains_key(node)
    }

    /// Nodes incident to `edge`.
    pub fn edge(&self, edge: &E) -> Option<&BTreeSet<V>> {
        self.edges.get(edge)
    }

    /// Edges incident to `node`.
    pub fn incident_edges(&self, node: &V) -> Option<&BTreeSet<E>> {
        self.nodes.get(node)
    }

    /// Check `e ∈ nodes[v] ⟺ v ∈ edges[e]` over both maps.
    pub fn is_consistent(&self) -> bool {
        let forward = self.nodes.iter().all(|(v, es)| {
            es.iter()
                .all(|e| self.edges.get(e).is_some_and(|vs| vs.contains(v)))
        });
        let backward = self.edges.iter().all(|(e, vs)| {
            vs.iter()
                .all(|v| self.nodes.get(v).is_some_and(|es| es.contains(e)))
        });
        forward && backward
    }

    /// Insert a node with no incident edges. Returns false if it already exists.
    pub fn insert_node(&mut self, node: V) -> bool {
        if self.nodes.contains_key(&node) {
            return false;
        }
        self.nodes.insert(node, BTreeSet::new());
        true
    }

    /// Replace the node set of `edge`, updating the incident-edge sets of
    /// both the old and the new members.
    ///
    /// Former members stay in the hypergraph even if left without edges.
    pub fn set_edge<I: IntoIterator<Item = V>>(&mut self, edge: E, members: I) {
        if let Some(previous) = self.edges.remove(&edge) {
            for node in previous {
                if let Some(incident) = self.nodes.get_mut(&node) {
                    incident.remove(&edge);
                }
            }
        }

        let members: BTreeSet<V> = members.into_iter().collect();
        for node in &members {
            self.nodes
                .entry(node.clone())
                .or_default()
                .insert(edge.clone());
        }
        self.edges.insert(edge, members);
    }

    /// Rebuild with every node label replaced by `f(label)`, keeping incidence.
    pub fn map_nodes<W, F>(&self, mut f: F) -> Hypergraph<W, E>
    where
        W: Ord + Clone,
        F: FnMut(&V) -> W,
    {
        let renamed: BTreeMap<&V, W> = self.nodes.keys().map(|v| (v, f(v))).collect();

        let mut mapped = Hypergraph::from_edges(self.edges.iter().map(|(edge, members)| {
            let members: Vec<W> = members.iter().map(|v| renamed[v].clone()).collect();
            (edge.clone(), members)
        }));
        for (node, incident) in &self.nodes {
            if incident.is_empty() {
                mapped.insert_node(renamed[node].clone());
            }
        }
        mapped
    }

    /// Shuffle which incidence set attaches to which label.
    ///
    /// Positions refer to key order. Output node position `i` holds the
    /// incident edges of the node at position `node_permutation[i]`, with each
    /// edge relabeled the same way through `edge_permutation`; edges are
    /// handled symmetrically. Applying the inverse permutations afterwards
    /// restores the original hypergraph.
    pub fn permute(
        &self,
        node_permutation: &[usize],
        edge_permutation: &[usize],
    ) -> Result<Self, HypergraphError> {
        let node_listing: Vec<&V> = self.nodes.keys().collect();
        let edge_listing: Vec<&E> = self.edges.keys().collect();
        let node_target = relabeling(ElementKind::Node, node_permutation, &node_listing)?;
        let edge_target = relabeling(ElementKind::Edge, edge_permutation, &edge_listing)?;

        let nodes = self
            .nodes
            .iter()
            .map(|(v, incident)| {
                let incident = incident.iter().map(|e| edge_target[e].clone()).collect();
                (node_target[v].clone(), incident)
            })
            .collect();
        let edges = self
            .edges
            .iter()
            .map(|(e, members)| {
                let members = members.iter().map(|v| node_target[v].clone()).collect();
                (edge_target[e].clone(), members)
            })
            .collect();

        Ok(Self { nodes, edges })
    }

    /// Incidence matrix with one row per edge and one column per node.
    pub fn incidence_matrix(&self) -> Vec<Vec<bool>> {
        self.edges
            .values()
            .map(|members| self.nodes.keys().map(|v| members.contains(v)).collect())
            .collect()
    }

    /// Render the incidence matrix with the given glyphs, one line per edge.
    pub fn render_matrix(&self, style: MatrixStyle) -> String {
        self.incidence_matrix()
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&incident| if incident { style.incident } else { style.absent })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Label matrix: one line per edge, the node's label where incident and
    /// blanks of the same width elsewhere.
    pub fn matrix(&self) -> String
    where
        V: fmt::Display,
    {
        let labels: Vec<String> = self.nodes.keys().map(ToString::to_string).collect();
        self.edges
            .values()
            .map(|members| {
                self.nodes
                    .keys()
                    .zip(&labels)
                    .map(|(v, label)| {
                        if members.contains(v) {
                            label.clone()
                        } else {
                            " ".repeat(label.chars().count())
                        }
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Map each label at position `permutation[i]` to the label at position `i`.
fn relabeling<'a, K: Ord>(
    kind: ElementKind,
    permutation: &[usize],
    listing: &[&'a K],
) -> Result<BTreeMap<&'a K, &'a K>, HypergraphError> {
    let len = listing.len();
    if permutation.len() != len {
        return Err(HypergraphError::PermutationLength {
            kind,
            expected: len,
            actual: permutation.len(),
        });
    }

    let mut seen = vec![false; len];
    for &index in permutation {
        if index >= len || std::mem::replace(&mut seen[index], true) {
            return Err(HypergraphError::NotAPermutation { kind, len });
        }
    }

    Ok(permutation
        .iter()
        .enumerate()
        .map(|(position, &source)| (listing[source], listing[position]))
        .collect())
}

impl<T: Ord + Clone> Hypergraph<T, T> {
    /// Whether every node of `candidate` has exactly `candidate` as its
    /// incident-edge set.
    ///
    /// This is a narrow self-describing check, not general edge membership;
    /// it is only expressible when node and edge labels share a type. An
    /// empty candidate is vacuously contained.
    pub fn contains_edge_set(&self, candidate: &BTreeSet<T>) -> bool {
        candidate
            .iter()
            .all(|v| self.nodes.get(v) == Some(candidate))
    }
}

impl Hypergraph<String, usize> {
    /// Read one edge per line, nodes separated by whitespace.
    ///
    /// Edges are numbered by line index. Lines naming fewer than two distinct
    /// nodes are skipped; a line holding a single `-` ends the input.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut edges = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim() == "-" {
                break;
            }
            let words: BTreeSet<String> = line.split_whitespace().map(str::to_owned).collect();
            if words.len() >= 2 {
                edges.push((line_number, words));
            }
        }
        Ok(Self::from_edges(edges))
    }
}

impl<V: Ord + Clone, E: Ord + Clone> fmt::Display for Hypergraph<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_matrix(MatrixStyle::default()))
    }
}
