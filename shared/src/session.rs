use std::collections::HashMap;

use crate::cache::{ListingCache, ResultsView, ViewFilters};
use crate::model::{DetailId, Field, InterestState, ListingGroup};

/// Displayed value of one control, and whether it is disabled awaiting the
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSlot<V> {
    pub value: V,
    pub in_flight: bool,
}

/// Per-listing control state for one field. Entries override the cache for
/// display until the next results fetch.
#[derive(Debug, Clone)]
pub struct ControlBoard<V> {
    slots: HashMap<DetailId, ControlSlot<V>>,
}

impl<V> Default for ControlBoard<V> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }
}

impl<V: Copy> ControlBoard<V> {
    /// Shows `proposed` and disables the control. Returns false, leaving
    /// everything untouched, when a mutation is already outstanding.
    pub fn begin(&mut self, detail_id: DetailId, proposed: V) -> bool {
        if self.is_in_flight(detail_id) {
            return false;
        }
        self.slots.insert(
            detail_id,
            ControlSlot {
                value: proposed,
                in_flight: true,
            },
        );
        true
    }

    /// Shows `value` and re-enables the control.
    pub fn settle(&mut self, detail_id: DetailId, value: V) {
        self.slots.insert(
            detail_id,
            ControlSlot {
                value,
                in_flight: false,
            },
        );
    }

    #[must_use]
    pub fn get(&self, detail_id: DetailId) -> Option<ControlSlot<V>> {
        self.slots.get(&detail_id).copied()
    }

    #[must_use]
    pub fn is_in_flight(&self, detail_id: DetailId) -> bool {
        self.slots.get(&detail_id).is_some_and(|s| s.in_flight)
    }

    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.slots.values().filter(|s| s.in_flight).count()
    }

    /// Outstanding mutations keep their slot so they still resolve against it.
    pub fn clear_settled(&mut self) {
        self.slots.retain(|_, slot| slot.in_flight);
    }
}

#[derive(Debug, Clone, Default)]
pub struct ControlBoards {
    pub interest: ControlBoard<InterestState>,
    pub contact: ControlBoard<bool>,
}

impl ControlBoards {
    #[must_use]
    pub fn is_in_flight(&self, field: Field, detail_id: DetailId) -> bool {
        match field {
            Field::Interest => self.interest.is_in_flight(detail_id),
            Field::Contact => self.contact.is_in_flight(detail_id),
        }
    }
}

/// Everything one dashboard session knows: the cache, the active filters and
/// the per-listing control state. Created empty by the tracker.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) cache: ListingCache,
    pub(crate) filters: ViewFilters,
    pub(crate) boards: ControlBoards,
}

impl Session {
    #[must_use]
    pub fn cache(&self) -> &ListingCache {
        &self.cache
    }

    #[must_use]
    pub fn filters(&self) -> ViewFilters {
        self.filters
    }

    #[must_use]
    pub fn boards(&self) -> &ControlBoards {
        &self.boards
    }

    /// What the interest controls should show right now.
    #[must_use]
    pub fn observed_interest(&self, detail_id: DetailId) -> InterestState {
        self.boards
            .interest
            .get(detail_id)
            .map(|slot| slot.value)
            .or_else(|| self.cache.find(detail_id).map(|l| l.interest))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn observed_contact(&self, detail_id: DetailId) -> bool {
        self.boards
            .contact
            .get(detail_id)
            .map(|slot| slot.value)
            .or_else(|| self.cache.find(detail_id).map(|l| l.contact))
            .unwrap_or_default()
    }

    #[must_use]
    pub fn view(&self) -> ResultsView {
        self.cache.view(&self.filters)
    }

    pub(crate) fn replace_results(&mut self, groups: Vec<ListingGroup>) {
        self.cache.replace(groups);
        self.boards.interest.clear_settled();
        self.boards.contact.clear_settled();
    }

    pub(crate) fn set_filters(&mut self, filters: ViewFilters) {
        self.filters = filters;
    }
}
