//! Isomorphism matcher.
//!
//! Pairs up the elements of two hypergraphs by their canonical signatures.
//! The matcher verifies rather than searches: it accepts only when both
//! refinements are discrete and every signature of the source finds exactly
//! one counterpart in the target. Symmetric hypergraphs are declined even
//! when an isomorphism exists.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::canon::Canon;
use crate::policy::MatchPolicyV1;
use crate::safe::Signature;
use crate::types::{ElementKind, Hypergraph};

/// Which input of a match a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    /// The hypergraph being mapped from.
    Source,
    /// The hypergraph being mapped to.
    Target,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Target => write!(f, "target"),
        }
    }
}

/// Reason a match was declined.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchFailure {
    /// A hypergraph is too large to canonicalize under the policy.
    #[error("{side} has {incidences} incidences, budget is {budget}")]
    BudgetExceeded {
        /// Offending input.
        side: Side,
        /// Its incidence count.
        incidences: usize,
        /// Policy budget.
        budget: usize,
    },
    /// Refinement did not separate every element of one kind.
    #[error("{side} refinement left {distinct} distinct {kind} signatures for {count} elements")]
    Collision {
        /// Offending input.
        side: Side,
        /// Nodes or edges.
        kind: ElementKind,
        /// Distinct signatures found.
        distinct: usize,
        /// Elements of that kind.
        count: usize,
    },
    /// Node or edge counts differ between the inputs.
    #[error(
        "size mismatch: {source_nodes} nodes and {source_edges} edges \
         against {target_nodes} nodes and {target_edges} edges"
    )]
    SizeMismatch {
        /// Source node count.
        source_nodes: usize,
        /// Source edge count.
        source_edges: usize,
        /// Target node count.
        target_nodes: usize,
        /// Target edge count.
        target_edges: usize,
    },
    /// A source signature has no counterpart in the target.
    #[error("{kind} with signature {signature:016x} has no counterpart")]
    Unmatched {
        /// Nodes or edges.
        kind: ElementKind,
        /// The unmatched signature.
        signature: Signature,
    },
    /// The paired elements do not carry incidence onto incidence.
    #[error("recovered bijection does not preserve incidence")]
    IncidenceNotPreserved,
}

/// Node and edge bijections between two hypergraphs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Isomorphism<V1, E1, V2, E2> {
    /// Source node → target node.
    pub nodes: BTreeMap<V1, V2>,
    /// Source edge → target edge.
    pub edges: BTreeMap<E1, E2>,
}

impl<V1, E1, V2, E2> Isomorphism<V1, E1, V2, E2>
where
    V1: Ord + Clone,
    E1: Ord + Clone,
    V2: Ord + Clone,
    E2: Ord + Clone,
{
    /// The reverse bijection.
    pub fn inverse(&self) -> Isomorphism<V2, E2, V1, E1> {
        Isomorphism {
            nodes: self.nodes.iter().map(|(a, b)| (b.clone(), a.clone())).collect(),
            edges: self.edges.iter().map(|(a, b)| (b.clone(), a.clone())).collect(),
        }
    }

    /// Whether the bijection covers both hypergraphs and maps each node's
    /// incident edges exactly onto its image's incident edges.
    pub fn preserves_incidence(
        &self,
        source: &Hypergraph<V1, E1>,
        target: &Hypergraph<V2, E2>,
    ) -> bool {
        let covers = self.nodes.len() == source.node_count()
            && self.nodes.len() == target.node_count()
            && self.edges.len() == source.edge_count()
            && self.edges.len() == target.edge_count();
        if !covers {
            return false;
        }

        source.nodes().iter().all(|(v, incident)| {
            let Some(image) = self.nodes.get(v) else {
                return false;
            };
            let mapped: Option<BTreeSet<E2>> =
                incident.iter().map(|e| self.edges.get(e).cloned()).collect();
            match (mapped, target.incident_edges(image)) {
                (Some(mapped), Some(expected)) => &mapped == expected,
                _ => false,
            }
        })
    }
}

/// Signature-based matcher configured by a [`MatchPolicyV1`].
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    policy: MatchPolicyV1,
}

impl Matcher {
    /// Create a matcher with the given policy.
    pub fn new(policy: MatchPolicyV1) -> Self {
        Self { policy }
    }

    /// Get the policy.
    pub fn policy(&self) -> &MatchPolicyV1 {
        &self.policy
    }

    /// Try to map `source` onto `target`, reporting why a match is declined.
    pub fn try_match<V1, E1, V2, E2>(
        &self,
        source: &Hypergraph<V1, E1>,
        target: &Hypergraph<V2, E2>,
    ) -> Result<Isomorphism<V1, E1, V2, E2>, MatchFailure>
    where
        V1: Ord + Clone,
        E1: Ord + Clone,
        V2: Ord + Clone,
        E2: Ord + Clone,
    {
        self.check_budget(Side::Source, source.incidence_count())?;
        self.check_budget(Side::Target, target.incidence_count())?;

        let hops = self.policy.refinement_hops;
        let source_canon = source.canon_with(hops);
        check_discrete(Side::Source, &source_canon)?;
        let target_canon = target.canon_with(hops);
        check_discrete(Side::Target, &target_canon)?;

        if source.node_count() != target.node_count() || source.edge_count() != target.edge_count() {
            return Err(MatchFailure::SizeMismatch {
                source_nodes: source.node_count(),
                source_edges: source.edge_count(),
                target_nodes: target.node_count(),
                target_edges: target.edge_count(),
            });
        }

        let nodes = pair_up(ElementKind::Node, &source_canon.nodes, &target_canon.nodes)?;
        let edges = pair_up(ElementKind::Edge, &source_canon.edges, &target_canon.edges)?;
        let isomorphism = Isomorphism { nodes, edges };

        if self.policy.verify_incidence && !isomorphism.preserves_incidence(source, target) {
            return Err(MatchFailure::IncidenceNotPreserved);
        }

        Ok(isomorphism)
    }

    /// Map `source` onto `target`, or `None` when the match is declined.
    ///
    /// The reason for a declined match is logged at debug level.
    pub fn find<V1, E1, V2, E2>(
        &self,
        source: &Hypergraph<V1, E1>,
        target: &Hypergraph<V2, E2>,
    ) -> Option<Isomorphism<V1, E1, V2, E2>>
    where
        V1: Ord + Clone,
        E1: Ord + Clone,
        V2: Ord + Clone,
        E2: Ord + Clone,
    {
        match self.try_match(source, target) {
            Ok(isomorphism) => Some(isomorphism),
            Err(failure) => {
                tracing::debug!(
                    failure = %failure,
                    policy_id = %self.policy.policy_id(),
                    params_hash = %self.policy.params_hash(),
                    "Hypergraph match declined"
                );
                None
            }
        }
    }

    fn check_budget(&self, side: Side, incidences: usize) -> Result<(), MatchFailure> {
        match self.policy.max_incidences {
            Some(budget) if incidences > budget => Err(MatchFailure::BudgetExceeded {
                side,
                incidences,
                budget,
            }),
            _ => Ok(()),
        }
    }
}

fn check_discrete<V: Ord, E: Ord>(side: Side, canon: &Canon<V, E>) -> Result<(), MatchFailure> {
    let distinct = canon.distinct_node_signatures();
    if distinct != canon.nodes.len() {
        return Err(MatchFailure::Collision {
            side,
            kind: ElementKind::Node,
            distinct,
            count: canon.nodes.len(),
        });
    }
    let distinct = canon.distinct_edge_signatures();
    if distinct != canon.edges.len() {
        return Err(MatchFailure::Collision {
            side,
            kind: ElementKind::Edge,
            distinct,
            count: canon.edges.len(),
        });
    }
    Ok(())
}

/// Pair source elements with the target element carrying the same signature.
fn pair_up<A: Ord + Clone, B: Clone>(
    kind: ElementKind,
    source: &BTreeMap<A, Signature>,
    target: &BTreeMap<B, Signature>,
) -> Result<BTreeMap<A, B>, MatchFailure> {
    let mut reverse: BTreeMap<Signature, &B> = BTreeMap::new();
    for (element, signature) in target {
        if reverse.insert(*signature, element).is_some() {
            return Err(MatchFailure::Collision {
                side: Side::Target,
                kind,
                distinct: target.values().collect::<BTreeSet<_>>().len(),
                count: target.len(),
            });
        }
    }

    let mut paired = BTreeMap::new();
    for (element, signature) in source {
        let counterpart = reverse.get(signature).ok_or(MatchFailure::Unmatched {
            kind,
            signature: *signature,
        })?;
        paired.insert(element.clone(), (*counterpart).clone());
    }
    Ok(paired)
}

impl<V1: Ord + Clone, E1: Ord + Clone> Hypergraph<V1, E1> {
    /// Map this hypergraph onto `other` under the default policy, which
    /// applies no incidence budget.
    pub fn map_to<V2, E2>(&self, other: &Hypergraph<V2, E2>) -> Option<Isomorphism<V1, E1, V2, E2>>
    where
        V2: Ord + Clone,
        E2: Ord + Clone,
    {
        Matcher::default().find(self, other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asymmetric() -> Hypergraph<char, u8> {
        Hypergraph::from_edges([(0, vec!['a', 'b']), (1, vec!['b'])])
    }

    #[test]
    fn test_matches_relabeled_copy() {
        let source = asymmetric();
        let target: Hypergraph<String, &str> = Hypergraph::from_edges([
            ("e1", vec!["Q".to_string()]),
            ("e0", vec!["P".to_string(), "Q".to_string()]),
        ]);

        let iso = source.map_to(&target).expect("asymmetric hypergraph should match");
        assert_eq!(iso.nodes[&'a'], "P");
        assert_eq!(iso.nodes[&'b'], "Q");
        assert_eq!(iso.edges[&0], "e0");
        assert_eq!(iso.edges[&1], "e1");
        assert!(iso.preserves_incidence(&source, &target));
    }

    #[test]
    fn test_inverse_matches_reverse_direction() {
        let source = asymmetric();
        let target = source.permute(&[1, 0], &[1, 0]).unwrap();

        let forward = source.map_to(&target).unwrap();
        let backward = target.map_to(&source).unwrap();
        assert_eq!(forward.inverse(), backward);
        assert_eq!(forward.nodes[&'a'], 'b');
        assert_eq!(forward.edges[&0], 1);
    }

    #[test]
    fn test_symmetric_source_is_declined() {
        let path = Hypergraph::from_edges([(0u8, vec!["A", "B"]), (1, vec!["B", "C"])]);
        let result = Matcher::default().try_match(&path, &path);

        assert_eq!(
            result,
            Err(MatchFailure::Collision {
                side: Side::Source,
                kind: ElementKind::Node,
                distinct: 2,
                count: 3,
            })
        );
        assert!(path.map_to(&path).is_none());
    }

    #[test]
    fn test_symmetric_target_is_declined() {
        let mut target: Hypergraph<char, u8> = Hypergraph::from_edges([(0, vec!['a'])]);
        target.insert_node('x');
        target.insert_node('y');

        let result = Matcher::default().try_match(&asymmetric(), &target);
        assert!(matches!(
            result,
            Err(MatchFailure::Collision { side: Side::Target, kind: ElementKind::Node, .. })
        ));
    }

    #[test]
    fn test_size_mismatch() {
        let source = asymmetric();
        let target: Hypergraph<char, u8> =
            Hypergraph::from_edges([(0, vec!['a', 'b']), (1, vec!['b']), (2, vec!['c'])]);

        assert_eq!(
            Matcher::default().try_match(&source, &target),
            Err(MatchFailure::SizeMismatch {
                source_nodes: 2,
                source_edges: 2,
                target_nodes: 3,
                target_edges: 3,
            })
        );
    }

    #[test]
    fn test_unmatched_signature() {
        let mut target: Hypergraph<char, u8> = Hypergraph::from_edges([(0, vec!['a']), (1, vec![])]);
        target.insert_node('b');
        let source = asymmetric();

        assert_eq!(
            Matcher::default().try_match(&source, &target),
            Err(MatchFailure::Unmatched {
                kind: ElementKind::Node,
                signature: source.canon().nodes[&'a'],
            })
        );
    }

    #[test]
    fn test_budget_is_enforced() {
        let matcher = Matcher::new(MatchPolicyV1::default().with_budget(2));
        assert_eq!(
            matcher.try_match(&asymmetric(), &asymmetric()),
            Err(MatchFailure::BudgetExceeded {
                side: Side::Source,
                incidences: 3,
                budget: 2,
            })
        );
    }

    #[test]
    fn test_default_policy_has_no_budget() {
        // 33 edges and 65 incidences; the horizon covers the whole chain.
        let mut chain: Hypergraph<u32, u32> = Hypergraph::from_edges((0..32).map(|i| (i, vec![i, i + 1])));
        chain.set_edge(32, vec![0]);
        let reversed = chain.map_nodes(|v| 32 - v);
        assert!(chain.incidence_count() > 64);

        let matcher = Matcher::new(MatchPolicyV1::default().with_hops(80));
        let iso = matcher.try_match(&chain, &reversed).unwrap();
        assert_eq!(iso.nodes[&0], 32);
        assert_eq!(iso.nodes[&32], 0);

        // The default horizon cannot separate the middle of a long chain,
        // but the refusal is never a budget decision.
        assert!(matches!(
            Matcher::default().try_match(&chain, &reversed),
            Err(MatchFailure::Collision { side: Side::Source, .. })
        ));
    }

    #[test]
    fn test_strict_policy_accepts_true_isomorphism() {
        let matcher = Matcher::new(MatchPolicyV1::strict());
        let source = asymmetric();
        let target = source.map_nodes(|v| v.to_ascii_uppercase());

        let iso = matcher.try_match(&source, &target).unwrap();
        assert_eq!(iso.nodes[&'b'], 'B');
        assert!(matcher.policy().verify_incidence);
    }

    #[test]
    fn test_preserves_incidence_rejects_wrong_pairing() {
        let source = asymmetric();
        let wrong = Isomorphism {
            nodes: BTreeMap::from([('a', 'b'), ('b', 'a')]),
            edges: BTreeMap::from([(0u8, 0u8), (1, 1)]),
        };
        assert!(!wrong.preserves_incidence(&source, &source));

        let partial: Isomorphism<char, u8, char, u8> = Isomorphism {
            nodes: BTreeMap::from([('a', 'a')]),
            edges: BTreeMap::new(),
        };
        assert!(!partial.preserves_incidence(&source, &source));
    }

    #[test]
    fn test_failure_messages() {
        let failure = MatchFailure::Collision {
            side: Side::Target,
            kind: ElementKind::Edge,
            distinct: 1,
            count: 2,
        };
        assert_eq!(
            failure.to_string(),
            "target refinement left 1 distinct edge signatures for 2 elements"
        );
    }
}
