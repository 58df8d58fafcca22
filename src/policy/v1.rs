//! MatchPolicy v1: refinement horizon, optional budget cap and optional
//! incidence verification.
//!
//! The policy is hashed canonically so a declined or accepted match can be
//! tied to the exact parameters that produced it.

use serde::{Deserialize, Serialize};

use crate::canon::DEFAULT_REFINEMENT_HOPS;
use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_POLICY_VERSION;

/// Match policy version 1.
///
/// Controls how the isomorphism matcher treats its inputs.
///
/// ## Parameters
///
/// - `refinement_hops`: How far canonicalization walks from each element
/// - `max_incidences`: Opt-in cap on the incidence count of either
///   hypergraph; larger inputs are declined without canonicalizing
/// - `verify_incidence`: Check that the recovered bijection maps every
///   incidence onto an incidence before accepting it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPolicyV1 {
    /// Policy version identifier.
    pub version: String,
    /// Hops walked from each element when computing signatures.
    pub refinement_hops: usize,
    /// Maximum (node, edge) incidences per hypergraph, if capped.
    pub max_incidences: Option<usize>,
    /// Whether to verify the bijection against both incidence structures.
    pub verify_incidence: bool,
}

impl MatchPolicyV1 {
    /// Create a new policy with custom parameters.
    pub fn new(refinement_hops: usize, max_incidences: Option<usize>, verify_incidence: bool) -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            refinement_hops,
            max_incidences,
            verify_incidence,
        }
    }

    /// Get the policy ID.
    pub fn policy_id(&self) -> &str {
        &self.version
    }

    /// Compute a hash of the policy parameters.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }

    /// Policy that also verifies incidence preservation.
    pub fn strict() -> Self {
        Self {
            verify_incidence: true,
            ..Self::default()
        }
    }

    /// Same policy with a different refinement horizon.
    pub fn with_hops(self, refinement_hops: usize) -> Self {
        Self {
            refinement_hops,
            ..self
        }
    }

    /// Same policy, declining inputs with more than `max_incidences` incidences.
    pub fn with_budget(self, max_incidences: usize) -> Self {
        Self {
            max_incidences: Some(max_incidences),
            ..self
        }
    }
}

impl Default for MatchPolicyV1 {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            refinement_hops: DEFAULT_REFINEMENT_HOPS,
            max_incidences: None,
            verify_incidence: false,
        }
    }
}
