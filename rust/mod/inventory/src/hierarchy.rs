//! Hierarchy traversal: search/filter visibility and descendant counts.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{DeviceAttributes, Entity};
use crate::store::EntityStore;

/// Device-only quick filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFilter {
    Sellable,
    Tested,
    Unlocked,
    GradeA,
}

impl DeviceFilter {
    pub fn holds_for(&self, device: &DeviceAttributes) -> bool {
        match self {
            DeviceFilter::Sellable => device.sellable,
            DeviceFilter::Tested => device.tested,
            DeviceFilter::Unlocked => device.is_unlocked(),
            DeviceFilter::GradeA => device.is_grade_a(),
        }
    }
}

/// Search term plus active quick filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    term: String,
    filters: BTreeSet<DeviceFilter>,
}

impl SearchFilter {
    pub fn new(term: &str) -> Self {
        Self {
            term: term.trim().to_lowercase(),
            filters: BTreeSet::new(),
        }
    }

    pub fn with(mut self, filter: DeviceFilter) -> Self {
        self.filters.insert(filter);
        self
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn filters(&self) -> &BTreeSet<DeviceFilter> {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.term.is_empty() && self.filters.is_empty()
    }

    /// Label, barcode or IMEI contains the term (case-insensitive).
    pub fn matches_term(&self, entity: &Entity) -> bool {
        if self.term.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&self.term);
        hit(&entity.label)
            || entity.barcode.as_deref().is_some_and(hit)
            || entity.device().and_then(|d| d.imei()).is_some_and(hit)
    }

    /// All active quick filters hold. Only devices can pass a non-empty
    /// filter set.
    pub fn matches_filters(&self, entity: &Entity) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match entity.device() {
            Some(d) => self.filters.iter().all(|f| f.holds_for(d)),
            None => false,
        }
    }

    /// The entity itself satisfies the term and the filters.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.matches_term(entity) && self.matches_filters(entity)
    }
}

/// How an entity shows up in the explorer for a given filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Matches directly, or nothing is being filtered.
    Match,
    /// Does not match itself but has a matching descendant.
    ContainsMatch,
    Hidden,
}

/// One evaluation pass over the store.
///
/// Results are memoised per id for the lifetime of this value. Build a
/// new `Traversal` after the store changes.
pub struct Traversal<'a> {
    store: &'a EntityStore,
    filter: &'a SearchFilter,
    descendant_hits: HashMap<String, bool>,
    device_counts: HashMap<String, usize>,
}

impl<'a> Traversal<'a> {
    pub fn new(store: &'a EntityStore, filter: &'a SearchFilter) -> Self {
        Self {
            store,
            filter,
            descendant_hits: HashMap::new(),
            device_counts: HashMap::new(),
        }
    }

    pub fn visibility(&mut self, id: &str) -> Visibility {
        let Some(entity) = self.store.get(id) else {
            return Visibility::Hidden;
        };
        if self.filter.is_empty() || self.filter.matches(entity) {
            Visibility::Match
        } else if self.has_visible_descendant(id) {
            Visibility::ContainsMatch
        } else {
            Visibility::Hidden
        }
    }

    pub fn is_visible(&mut self, id: &str) -> bool {
        self.visibility(id) != Visibility::Hidden
    }

    /// Some descendant of `id` matches the filter directly.
    pub fn has_visible_descendant(&mut self, id: &str) -> bool {
        if let Some(hit) = self.descendant_hits.get(id) {
            return *hit;
        }
        let store = self.store;
        let children: Vec<&Entity> = store.children(id);
        let mut hit = false;
        for child in children {
            if self.filter.matches(child) || self.has_visible_descendant(&child.id) {
                hit = true;
                break;
            }
        }
        self.descendant_hits.insert(id.to_string(), hit);
        hit
    }

    /// Devices below `id` that pass the active quick filters.
    pub fn count_matching_devices(&mut self, id: &str) -> usize {
        if let Some(n) = self.device_counts.get(id) {
            return *n;
        }
        let store = self.store;
        let mut total = 0;
        for child in store.children(id) {
            if child.is_device() && self.filter.matches_filters(child) {
                total += 1;
            }
            total += self.count_matching_devices(&child.id);
        }
        self.device_counts.insert(id.to_string(), total);
        total
    }

    /// Path from the root down to `id`, inclusive.
    pub fn ancestor_path(&self, id: &str) -> Vec<&'a Entity> {
        let store = self.store;
        let Some(entity) = store.get(id) else {
            return Vec::new();
        };
        let mut path: Vec<&Entity> = store.ancestors(id);
        path.reverse();
        path.push(entity);
        path
    }
}
