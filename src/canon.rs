//! Canonicalization: relabeling-invariant signatures for nodes and edges.
//!
//! ## Algorithm
//!
//! 1. Allocate one empty [`Incidence`] container per node and per edge
//! 2. Each node container references the containers of its incident edges
//! 3. Each edge container references the containers of its incident nodes
//! 4. The signature of an element is the hash of its container
//!
//! Hashing a node container walks into edge containers, which walk back into
//! node containers. Each walk is bounded two ways. A container already on the
//! current walk contributes the stand-in [`REENTRANT_HASH`] instead of being
//! entered again, and a container more than [`Horizon::hops`] steps away
//! contributes only a hash of its size. The result depends only on the shape
//! of the incidence structure within that radius, never on labels or
//! iteration order.
//!
//! This is a single refinement pass, not an iteration to a fixpoint.
//! Elements whose neighborhoods look alike within the horizon collide.
//! Recursion depth is at most `hops`, and the work per element is the number
//! of simple walks of at most `hops` steps, so cost is polynomial in the
//! input for a fixed horizon.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::canonical::{canonical_hash_hex, stable_hash};
use crate::safe::{HashError, SafeContainer, Signature, StructuralHash, FAILED_HASH, REENTRANT_HASH};
use crate::types::Hypergraph;

/// Hops explored around each element by [`canonicalize`].
pub const DEFAULT_REFINEMENT_HOPS: usize = 4;

const FRONTIER_TAG: u64 = 0x6672_6f6e_7469_6572;

/// Walk budget shared by the containers of one canonicalization call.
#[derive(Debug)]
pub struct Horizon {
    hops: usize,
    remaining: Cell<usize>,
}

impl Horizon {
    /// Create a horizon of `hops` steps.
    pub fn new(hops: usize) -> Rc<Self> {
        Rc::new(Self {
            hops,
            remaining: Cell::new(hops),
        })
    }

    /// Steps a walk may take from the element being signed.
    pub fn hops(&self) -> usize {
        self.hops
    }
}

/// Marks a container as on the current walk and spends one hop; undone on drop.
struct Step<'a> {
    incidence: &'a Incidence,
    previous: usize,
}

impl<'a> Step<'a> {
    fn enter(incidence: &'a Incidence, remaining: usize) -> Self {
        let previous = incidence.horizon.remaining.replace(remaining);
        incidence.on_walk.set(true);
        Self { incidence, previous }
    }
}

impl Drop for Step<'_> {
    fn drop(&mut self) {
        self.incidence.on_walk.set(false);
        self.incidence.horizon.remaining.set(self.previous);
    }
}

/// Shared container standing for one node or one edge during canonicalization.
pub struct Incidence {
    members: RefCell<SafeContainer<Incidence>>,
    on_walk: Cell<bool>,
    horizon: Rc<Horizon>,
}

impl Incidence {
    /// Create an empty, shareable container walking within `horizon`.
    pub fn new(horizon: &Rc<Horizon>) -> Rc<Self> {
        Rc::new(Self {
            members: RefCell::new(SafeContainer::new()),
            on_walk: Cell::new(false),
            horizon: Rc::clone(horizon),
        })
    }

    /// Reference each of `members` from this container.
    pub fn attach<'a, I>(&self, members: I)
    where
        I: IntoIterator<Item = &'a Rc<Incidence>>,
    {
        let mut container = self.members.borrow_mut();
        for member in members {
            container.insert_shared(member);
        }
    }

    /// Number of referenced containers.
    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Whether nothing is referenced.
    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Hash of the container, walking at most [`Horizon::hops`] steps out.
    pub fn signature(&self) -> Signature {
        let Ok(members) = self.members.try_borrow() else {
            tracing::warn!("Incidence container is mutably borrowed, substituting fallback");
            return FAILED_HASH;
        };
        let _root = Step::enter(self, self.horizon.hops);
        members.signature()
    }
}

impl PartialEq for Incidence {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl StructuralHash for Incidence {
    fn structural_hash(&self) -> Result<Signature, HashError> {
        if self.on_walk.get() {
            return Ok(REENTRANT_HASH);
        }
        let members = self.members.try_borrow().map_err(|_| HashError::Busy)?;
        let remaining = self.horizon.remaining.get();
        if remaining == 0 {
            return Ok(stable_hash(&(FRONTIER_TAG, members.len() as u64)));
        }
        let _step = Step::enter(self, remaining - 1);
        Ok(stable_hash(&members.signature()))
    }
}

impl fmt::Display for Incidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.members.try_borrow() {
            Ok(container) => write!(f, "{container}"),
            Err(_) => f.write_str("<busy>"),
        }
    }
}

/// Signature tables produced by one canonicalization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Canon<V, E> {
    /// Horizon the signatures were computed with.
    pub hops: usize,
    /// Node → signature.
    pub nodes: BTreeMap<V, Signature>,
    /// Edge → signature.
    pub edges: BTreeMap<E, Signature>,
}

impl<V: Ord, E: Ord> Canon<V, E> {
    /// Number of distinct node signatures.
    pub fn distinct_node_signatures(&self) -> usize {
        self.nodes.values().collect::<BTreeSet<_>>().len()
    }

    /// Number of distinct edge signatures.
    pub fn distinct_edge_signatures(&self) -> usize {
        self.edges.values().collect::<BTreeSet<_>>().len()
    }

    /// Whether every node and every edge received its own signature.
    pub fn is_discrete(&self) -> bool {
        self.distinct_node_signatures() == self.nodes.len()
            && self.distinct_edge_signatures() == self.edges.len()
    }

    /// Label-free digest of the horizon and the signature multisets.
    ///
    /// Isomorphic hypergraphs always share a fingerprint; the converse does
    /// not hold.
    pub fn fingerprint(&self) -> String {
        let mut node_signatures: Vec<Signature> = self.nodes.values().copied().collect();
        let mut edge_signatures: Vec<Signature> = self.edges.values().copied().collect();
        node_signatures.sort_unstable();
        edge_signatures.sort_unstable();
        canonical_hash_hex(&(self.hops, node_signatures, edge_signatures))
    }
}

/// Compute node and edge signatures for `hypergraph` with the default horizon.
pub fn canonicalize<V, E>(hypergraph: &Hypergraph<V, E>) -> Canon<V, E>
where
    V: Ord + Clone,
    E: Ord + Clone,
{
    canonicalize_with(hypergraph, DEFAULT_REFINEMENT_HOPS)
}

/// Compute node and edge signatures, walking at most `hops` steps from each
/// element. Stack depth grows with `hops`.
pub fn canonicalize_with<V, E>(hypergraph: &Hypergraph<V, E>, hops: usize) -> Canon<V, E>
where
    V: Ord + Clone,
    E: Ord + Clone,
{
    let horizon = Horizon::new(hops);
    let node_cells: BTreeMap<&V, Rc<Incidence>> = hypergraph
        .nodes()
        .keys()
        .map(|v| (v, Incidence::new(&horizon)))
        .collect();
    let edge_cells: BTreeMap<&E, Rc<Incidence>> = hypergraph
        .edges()
        .keys()
        .map(|e| (e, Incidence::new(&horizon)))
        .collect();

    for (v, incident) in hypergraph.nodes() {
        node_cells[v].attach(incident.iter().filter_map(|e| edge_cells.get(e)));
    }
    for (e, members) in hypergraph.edges() {
        edge_cells[e].attach(members.iter().filter_map(|v| node_cells.get(v)));
    }

    let canon = Canon {
        hops,
        nodes: node_cells
            .iter()
            .map(|(v, cell)| ((*v).clone(), cell.signature()))
            .collect(),
        edges: edge_cells
            .iter()
            .map(|(e, cell)| ((*e).clone(), cell.signature()))
            .collect(),
    };

    tracing::trace!(
        hops,
        nodes = canon.nodes.len(),
        edges = canon.edges.len(),
        distinct_nodes = canon.distinct_node_signatures(),
        distinct_edges = canon.distinct_edge_signatures(),
        "Canonicalized hypergraph"
    );

    canon
}

impl<V: Ord + Clone, E: Ord + Clone> Hypergraph<V, E> {
    /// Node and edge signatures with the default horizon; see [`canonicalize`].
    pub fn canon(&self) -> Canon<V, E> {
        canonicalize(self)
    }

    /// Node and edge signatures within `hops` steps; see [`canonicalize_with`].
    pub fn canon_with(&self, hops: usize) -> Canon<V, E> {
        canonicalize_with(self, hops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe::EMPTY_CONTAINER_HASH;
    use std::time::{Duration, Instant};

    fn asymmetric() -> Hypergraph<char, u8> {
        Hypergraph::from_edges([(0, vec!['a', 'b']), (1, vec!['b'])])
    }

    #[test]
    fn test_single_incidence() {
        let hg: Hypergraph<char, u8> = Hypergraph::from_edges([(0, vec!['a'])]);
        let canon = hg.canon();

        // a -> e0 -> a is cut where the walk returns to a.
        assert_eq!(canon.nodes[&'a'], stable_hash(&REENTRANT_HASH));
        assert_eq!(canon.edges[&0], stable_hash(&REENTRANT_HASH));
        assert!(canon.is_discrete());
    }

    #[test]
    fn test_asymmetric_pair_is_separated() {
        let canon = asymmetric().canon();

        assert_ne!(canon.nodes[&'a'], canon.nodes[&'b']);
        assert_ne!(canon.edges[&0], canon.edges[&1]);
        assert!(canon.is_discrete());
        assert_eq!(canon.hops, DEFAULT_REFINEMENT_HOPS);
    }

    #[test]
    fn test_path_separates_middle_node_only() {
        let hg = Hypergraph::from_edges([(0u8, vec!["A", "B"]), (1, vec!["B", "C"])]);
        let canon = hg.canon();

        assert_eq!(canon.nodes[&"A"], canon.nodes[&"C"]);
        assert_ne!(canon.nodes[&"A"], canon.nodes[&"B"]);
        assert_eq!(canon.edges[&0], canon.edges[&1]);
        assert_eq!(canon.distinct_node_signatures(), 2);
        assert_eq!(canon.distinct_edge_signatures(), 1);
        assert!(!canon.is_discrete());
    }

    #[test]
    fn test_isolated_nodes_collide() {
        let mut hg: Hypergraph<char, u8> = Hypergraph::from_edges([(0, vec!['a'])]);
        hg.insert_node('x');
        hg.insert_node('y');
        let canon = hg.canon();

        assert_eq!(canon.nodes[&'x'], EMPTY_CONTAINER_HASH);
        assert_eq!(canon.nodes[&'y'], EMPTY_CONTAINER_HASH);
        assert!(canon.distinct_node_signatures() < hg.node_count());
    }

    #[test]
    fn test_empty_edge_gets_empty_hash() {
        let hg: Hypergraph<char, u8> =
            Hypergraph::from_edges([(0, vec!['a']), (1, Vec::new())]);
        assert_eq!(hg.canon().edges[&1], EMPTY_CONTAINER_HASH);
    }

    #[test]
    fn test_signatures_ignore_labels() {
        let hg = asymmetric();
        let renamed = hg.map_nodes(|v| v.to_ascii_uppercase());

        let canon = hg.canon();
        let renamed_canon = renamed.canon();
        assert_eq!(canon.nodes[&'a'], renamed_canon.nodes[&'A']);
        assert_eq!(canon.fingerprint(), renamed_canon.fingerprint());
    }

    #[test]
    fn test_canonicalization_is_repeatable() {
        let hg: Hypergraph<u8, u8> =
            Hypergraph::from_edges([(0, vec![1, 2, 3]), (1, vec![3, 4]), (2, vec![4])]);
        assert_eq!(hg.canon(), hg.canon());
    }

    #[test]
    fn test_horizon_limits_what_signatures_see() {
        // Chain 0-1-...-6 with an extra single-node edge on node 0. The middle
        // of the chain only learns where the tail is once the horizon reaches it.
        let mut chain: Hypergraph<u32, u32> = Hypergraph::from_edges((0..6).map(|i| (i, vec![i, i + 1])));
        chain.set_edge(6, vec![0]);

        assert!(!chain.canon_with(0).is_discrete());
        assert!(chain.canon().is_discrete());
        assert!(!chain.canon_with(2).is_discrete());
    }

    #[test]
    fn test_zero_hops_sees_sizes_only() {
        let hg: Hypergraph<char, u8> = Hypergraph::from_edges([(0, vec!['a', 'b']), (1, vec!['c', 'd'])]);
        let canon = hg.canon_with(0);
        assert_eq!(canon.distinct_node_signatures(), 1);
        assert_eq!(canon.distinct_edge_signatures(), 1);
    }

    #[test]
    fn test_long_chain_is_bounded() {
        let chain: Hypergraph<u32, u32> = Hypergraph::from_edges((0..3000).map(|i| (i, vec![i, i + 1])));
        let started = Instant::now();
        let canon = chain.canon();

        assert_eq!(canon.nodes.len(), 3001);
        // Interior nodes look alike once both ends are out of sight.
        assert_eq!(canon.nodes[&1000], canon.nodes[&2000]);
        assert!(started.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn test_incidence_rendering_terminates() {
        let horizon = Horizon::new(DEFAULT_REFINEMENT_HOPS);
        let a = Incidence::new(&horizon);
        let b = Incidence::new(&horizon);
        a.attach([&b]);
        b.attach([&a]);

        let rendered = a.to_string();
        assert!(rendered.contains("<<<"));
        assert_eq!(a.len(), 1);
        assert!(!b.is_empty());
        assert_eq!(horizon.hops(), DEFAULT_REFINEMENT_HOPS);
    }

    #[test]
    fn test_signature_restores_walk_state() {
        let horizon = Horizon::new(2);
        let a = Incidence::new(&horizon);
        let b = Incidence::new(&horizon);
        a.attach([&b]);
        b.attach([&a]);

        let first = a.signature();
        assert_eq!(a.signature(), first);
        assert_eq!(b.signature(), first);
        assert!(!a.on_walk.get());
        assert_eq!(horizon.remaining.get(), 2);
    }
}
