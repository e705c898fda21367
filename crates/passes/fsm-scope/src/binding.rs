//! Per-signal write facts collected during lowering

use crate::state::StateId;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

/// One write to a destination signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding<V> {
    /// State in which the write happens
    pub state: StateId,
    /// Value written
    pub source: V,
    /// Guard that must also hold, if any
    pub condition: Option<V>,
}

/// Destination signal name to every write that targets it
///
/// Destinations iterate in first-write order and writes keep their recording
/// order, so code generation over the table is deterministic.
#[derive(Debug, Clone)]
pub struct BindingTable<V> {
    entries: IndexMap<String, Vec<Binding<V>>, FxBuildHasher>,
}

impl<V> Default for BindingTable<V> {
    fn default() -> Self {
        Self {
            entries: IndexMap::default(),
        }
    }
}

impl<V> BindingTable<V> {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write to `destination`
    pub fn record(
        &mut self,
        state: StateId,
        destination: impl Into<String>,
        source: V,
        condition: Option<V>,
    ) {
        self.entries
            .entry(destination.into())
            .or_default()
            .push(Binding {
                state,
                source,
                condition,
            });
    }

    /// Writes recorded for `destination`
    #[must_use]
    pub fn get(&self, destination: &str) -> Option<&[Binding<V>]> {
        self.entries.get(destination).map(Vec::as_slice)
    }

    /// Destination names in first-write order
    pub fn destinations(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    /// Every destination with its writes
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Binding<V>])> + '_ {
        self.entries
            .iter()
            .map(|(dst, writes)| (dst.as_str(), writes.as_slice()))
    }

    /// Number of distinct destinations
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
