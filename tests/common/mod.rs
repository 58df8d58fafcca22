//! Shared helpers for integration tests.

#![allow(dead_code)]

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Inverse of a permutation array: `inverse(p)[p[i]] == i`.
pub fn inverse(permutation: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; permutation.len()];
    for (position, &index) in permutation.iter().enumerate() {
        inverse[index] = position;
    }
    inverse
}
