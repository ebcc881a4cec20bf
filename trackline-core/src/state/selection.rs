//! Per-curve point selections.
//!
//! Selections are value-semantic: every snapshot handed out is an independent
//! deep copy, and updates build new values instead of mutating shared
//! containers. No caller-owned set is ever retained by reference, and no two
//! snapshots ever share a mutable index set - so mutating one snapshot can
//! never bleed into another.

/// Selected point indices, per curve name. Indices refer to a curve's storage
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionState(hashbrown::HashMap<String, hashbrown::HashSet<usize>>);

impl SelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    /// Borrow a curve's selected set, if it has one. Read-only - mutation goes
    /// through [`Self::set_curve`] so deep-copy discipline holds.
    #[must_use]
    pub fn curve(&self, name: &str) -> Option<&hashbrown::HashSet<usize>> {
        self.0.get(name)
    }
    /// A curve's selected set as an owned copy; empty if none.
    #[must_use]
    pub fn curve_cloned(&self, name: &str) -> hashbrown::HashSet<usize> {
        self.0.get(name).cloned().unwrap_or_default()
    }
    /// Replace a curve's selection with a copy of `indices`. The caller keeps
    /// sole ownership of its container.
    pub fn set_curve(&mut self, name: &str, indices: &hashbrown::HashSet<usize>) {
        if indices.is_empty() {
            self.0.remove(name);
        } else {
            self.0.insert(name.to_owned(), indices.clone());
        }
    }
    /// Drop a curve's selection. Returns whether anything was selected.
    pub fn clear_curve(&mut self, name: &str) -> bool {
        self.0.remove(name).is_some_and(|set| !set.is_empty())
    }
    /// Drop indices no longer valid for a curve of `len` points. Returns
    /// whether anything was removed.
    pub fn retain_below(&mut self, name: &str, len: usize) -> bool {
        let Some(set) = self.0.get_mut(name) else {
            return false;
        };
        let before = set.len();
        set.retain(|&index| index < len);
        let pruned = set.len() != before;
        if set.is_empty() {
            self.0.remove(name);
        }
        pruned
    }
    /// A new snapshot with one curve's selection replaced. `self` is untouched
    /// and shares no containers with the result.
    #[must_use]
    pub fn with_curve_selection(
        &self,
        name: &str,
        indices: &hashbrown::HashSet<usize>,
    ) -> Self {
        let mut next = self.clone();
        next.set_curve(name, indices);
        next
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&str, &hashbrown::HashSet<usize>)> + '_ {
        self.0.iter().map(|(name, set)| (name.as_str(), set))
    }
}
