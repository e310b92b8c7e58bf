//! Last fetched result set and the views derived from it.
//!
//! The cache is replaced wholesale by every results fetch and patched in
//! place by committed mutations. Filtered views are always recomputed from it.

use serde::Serialize;

use crate::model::{DetailId, Field, InterestState, Listing, ListingGroup};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingCache {
    groups: Vec<ListingGroup>,
}

impl ListingCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, groups: Vec<ListingGroup>) {
        self.groups = groups;
    }

    #[must_use]
    pub fn groups(&self) -> &[ListingGroup] {
        &self.groups
    }

    pub fn listings(&self) -> impl Iterator<Item = &Listing> {
        self.groups.iter().flat_map(|g| g.results.iter())
    }

    fn listings_mut(&mut self) -> impl Iterator<Item = &mut Listing> {
        self.groups.iter_mut().flat_map(|g| g.results.iter_mut())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listing_count() == 0
    }

    #[must_use]
    pub fn listing_count(&self) -> usize {
        self.groups.iter().map(ListingGroup::len).sum()
    }

    #[must_use]
    pub fn find(&self, detail_id: DetailId) -> Option<&Listing> {
        self.listings().find(|l| l.detail_id == detail_id)
    }

    /// Overwrites `interest` on every occurrence of `detail_id`. Returns how
    /// many listings were patched.
    pub fn patch_interest(&mut self, detail_id: DetailId, interest: InterestState) -> usize {
        let mut patched = 0;
        for listing in self.listings_mut().filter(|l| l.detail_id == detail_id) {
            listing.interest = interest;
            patched += 1;
        }
        patched
    }

    pub fn patch_contact(&mut self, detail_id: DetailId, contact: bool) -> usize {
        let mut patched = 0;
        for listing in self.listings_mut().filter(|l| l.detail_id == detail_id) {
            listing.contact = contact;
            patched += 1;
        }
        patched
    }

    /// Badge figure: cache entries marked interested, duplicates included.
    #[must_use]
    pub fn interested_count(&self) -> usize {
        self.listings()
            .filter(|l| l.interest == InterestState::Interested)
            .count()
    }

    #[must_use]
    pub fn view(&self, filters: &ViewFilters) -> ResultsView {
        let groups: Vec<ListingGroup> = if filters.is_active() {
            self.groups
                .iter()
                .filter_map(|group| {
                    let results: Vec<Listing> = group
                        .results
                        .iter()
                        .filter(|l| filters.admits(l))
                        .cloned()
                        .collect();
                    (!results.is_empty()).then(|| ListingGroup {
                        results,
                        summary: group.summary.clone(),
                    })
                })
                .collect()
        } else {
            self.groups.clone()
        };

        let listing_count = groups.iter().map(ListingGroup::len).sum();
        ResultsView {
            groups,
            listing_count,
            interested_count: self.interested_count(),
        }
    }
}

/// Client-side display filters over the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewFilters {
    show_interested: bool,
    hide_not_interested: bool,
    show_contacted: bool,
}

impl ViewFilters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enabling this clears `hide_not_interested`.
    #[must_use]
    pub fn with_show_interested(mut self, on: bool) -> Self {
        self.show_interested = on;
        if on {
            self.hide_not_interested = false;
        }
        self
    }

    /// Enabling this clears `show_interested`.
    #[must_use]
    pub fn with_hide_not_interested(mut self, on: bool) -> Self {
        self.hide_not_interested = on;
        if on {
            self.show_interested = false;
        }
        self
    }

    #[must_use]
    pub fn with_show_contacted(mut self, on: bool) -> Self {
        self.show_contacted = on;
        self
    }

    #[must_use]
    pub const fn show_interested(&self) -> bool {
        self.show_interested
    }

    #[must_use]
    pub const fn hide_not_interested(&self) -> bool {
        self.hide_not_interested
    }

    #[must_use]
    pub const fn show_contacted(&self) -> bool {
        self.show_contacted
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.show_interested || self.hide_not_interested || self.show_contacted
    }

    /// Whether a change to `field` can change what these filters admit.
    #[must_use]
    pub const fn depends_on(&self, field: Field) -> bool {
        match field {
            Field::Interest => self.show_interested || self.hide_not_interested,
            Field::Contact => self.show_contacted,
        }
    }

    #[must_use]
    pub fn admits(&self, listing: &Listing) -> bool {
        if self.show_interested && listing.interest != InterestState::Interested {
            return false;
        }
        if self.hide_not_interested && listing.interest == InterestState::NotInterested {
            return false;
        }
        if self.show_contacted && !listing.contact {
            return false;
        }
        true
    }
}

/// What the renderer draws: filtered groups plus the badge figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultsView {
    pub groups: Vec<ListingGroup>,
    pub listing_count: usize,
    pub interested_count: usize,
}

impl ResultsView {
    #[must_use]
    pub fn results_label(&self) -> String {
        match self.listing_count {
            0 => String::new(),
            1 => "1 listing".to_string(),
            n => format!("{n} listings"),
        }
    }
}
