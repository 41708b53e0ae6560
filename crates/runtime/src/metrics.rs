use std::collections::BTreeMap;

pub const PUBLISHED: &str = "refresh.published";
pub const SUPERSEDED: &str = "refresh.superseded";
pub const TREE_RELOADS: &str = "trees.reloads";
pub const LOAD_ERRORS: &str = "trees.load_errors";

/// Refresh counters.
///
/// Sorted map so snapshots have stable ordering.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<&'static str, u64>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, name: &'static str) {
        *self.counters.entry(name).or_insert(0) += 1;
    }

    pub fn snapshot(&self) -> Vec<(&'static str, u64)> {
        self.counters.iter().map(|(k, v)| (*k, *v)).collect()
    }
}
