//! Blank-node scoping
//!
//! Backends number blank nodes per response, so two responses can both use
//! `_:b0`. Before merging, every body gets its own prefix inserted after the
//! `_:` marker.

use rand::distr::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of per-item blank-node prefixes
pub trait PrefixSource: Send + Sync {
    /// A prefix no other item in the same request will receive
    fn next_prefix(&self) -> String;
}

/// Random alphanumeric prefixes
#[derive(Debug, Clone, Copy)]
pub struct RandomPrefix {
    len: usize,
}

impl RandomPrefix {
    pub fn new(len: usize) -> Self {
        RandomPrefix { len }
    }
}

impl Default for RandomPrefix {
    fn default() -> Self {
        RandomPrefix::new(8)
    }
}

impl PrefixSource for RandomPrefix {
    fn next_prefix(&self) -> String {
        let random: String = rand::rng()
            .sample_iter(Alphanumeric)
            .take(self.len)
            .map(char::from)
            .collect();
        format!("{}_", random)
    }
}

/// Deterministic prefixes `p0_`, `p1_`, ...
#[derive(Debug, Default)]
pub struct SequentialPrefix {
    next: AtomicU64,
}

impl SequentialPrefix {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefixSource for SequentialPrefix {
    fn next_prefix(&self) -> String {
        format!("p{}_", self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Insert `prefix` into every quoted blank-node id in `body`
///
/// Only occurrences of `"_:` are rewritten, which covers ids in both the
/// compact JSON and the hextuple encodings.
pub fn scope_local_ids(body: &str, prefix: &str) -> String {
    body.replace("\"_:", &format!("\"_:{}", prefix))
}
