//! Favorites and compare lists: small id sets independent of the filter pipeline.

use serde::Serialize;

use crate::models::Vehicle;

/// Maximum number of vehicles shown side by side.
pub const COMPARE_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToggleOutcome {
    Added,
    Removed,
    /// The set is full; nothing changed.
    Rejected,
}

impl ToggleOutcome {
    pub fn changed(self) -> bool {
        !matches!(self, ToggleOutcome::Rejected)
    }
}

/// Ordered, duplicate-free set of vehicle ids with an optional capacity.
/// Adding to a full set is refused rather than evicting the oldest member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: Vec<String>,
    capacity: Option<usize>,
}

impl SelectionSet {
    pub fn unbounded() -> Self {
        Self { ids: Vec::new(), capacity: None }
    }

    pub fn bounded(capacity: usize) -> Self {
        Self { ids: Vec::new(), capacity: Some(capacity) }
    }

    pub fn favorites() -> Self {
        Self::unbounded()
    }

    pub fn compare() -> Self {
        Self::bounded(COMPARE_LIMIT)
    }

    /// Rebuilds a set from persisted ids, dropping duplicates and anything past capacity.
    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            let id = id.into();
            if self.is_full() {
                break;
            }
            if !id.is_empty() && !self.is_member(&id) {
                self.ids.push(id);
            }
        }
        self
    }

    pub fn is_member(&self, id: &str) -> bool {
        self.ids.iter().any(|m| m == id)
    }

    pub fn is_full(&self) -> bool {
        self.capacity.is_some_and(|cap| self.ids.len() >= cap)
    }

    pub fn toggle(&mut self, id: &str) -> ToggleOutcome {
        if let Some(pos) = self.ids.iter().position(|m| m == id) {
            self.ids.remove(pos);
            ToggleOutcome::Removed
        } else if self.is_full() {
            ToggleOutcome::Rejected
        } else {
            self.ids.push(id.to_string());
            ToggleOutcome::Added
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Maps ids to vehicles in set order. Ids missing from `vehicles`
    /// (deleted upstream) are skipped.
    pub fn hydrate(&self, vehicles: &[Vehicle]) -> Vec<Vehicle> {
        self.ids
            .iter()
            .filter_map(|id| vehicles.iter().find(|v| &v.id == id))
            .cloned()
            .collect()
    }
}
