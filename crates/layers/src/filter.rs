//! Consistency across multi-select filters that narrow one organization set.
//!
//! Every criterion keeps a selected subset and an allowed-option set. The
//! allowed set of a criterion is the part of its domain still reachable given
//! every *other* criterion's selection. A criterion with an empty selection
//! places no constraint, so with every selection empty all organizations pass.

use std::collections::{BTreeMap, BTreeSet};

use foundation::ids::CriterionId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::index::EntityIndex;
use crate::layer::LayerSpec;
use crate::org_set::OrgSet;
use crate::query::{CompoundPredicate, PropertyFilter};
use crate::registry::CriterionSpec;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionState {
    pub selected: BTreeSet<String>,
    /// `None` until an entity index is available.
    pub allowed: Option<BTreeSet<String>>,
}

/// Values removed from selections by a recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChange {
    pub dropped: BTreeMap<CriterionId, BTreeSet<String>>,
}

impl FilterChange {
    pub fn is_empty(&self) -> bool {
        self.dropped.is_empty()
    }

    fn record(&mut self, criterion: &CriterionId, values: BTreeSet<String>) {
        if values.is_empty() {
            return;
        }
        self.dropped
            .entry(criterion.clone())
            .or_default()
            .extend(values);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterComposer {
    /// Declaration order; drives the order selections are narrowed in.
    order: Vec<CriterionId>,
    states: BTreeMap<CriterionId, CriterionState>,
}

impl FilterComposer {
    pub fn new(criteria: &[CriterionSpec]) -> Self {
        Self {
            order: criteria.iter().map(|c| c.id.clone()).collect(),
            states: criteria
                .iter()
                .map(|c| (c.id.clone(), CriterionState::default()))
                .collect(),
        }
    }

    pub fn criteria(&self) -> &[CriterionId] {
        &self.order
    }

    pub fn state(&self, criterion: &CriterionId) -> Option<&CriterionState> {
        self.states.get(criterion)
    }

    pub fn selected(&self, criterion: &CriterionId) -> Option<&BTreeSet<String>> {
        self.states.get(criterion).map(|s| &s.selected)
    }

    pub fn allowed(&self, criterion: &CriterionId) -> Option<&BTreeSet<String>> {
        self.states.get(criterion)?.allowed.as_ref()
    }

    /// `true` when no criterion constrains the organization set.
    pub fn is_unconstrained(&self) -> bool {
        self.states.values().all(|s| s.selected.is_empty())
    }

    /// Replaces one criterion's selection and re-derives every other criterion.
    ///
    /// The changed criterion's selection is authoritative: only values unknown
    /// to `index` are removed from it. Other criteria lose selected values
    /// that are no longer allowed; nothing is ever re-added.
    ///
    /// Returns `None` for an unknown criterion.
    pub fn set_selection(
        &mut self,
        index: Option<&EntityIndex>,
        criterion: &CriterionId,
        values: BTreeSet<String>,
    ) -> Option<FilterChange> {
        let state = self.states.get_mut(criterion)?;
        state.selected = values;

        let mut change = FilterChange::default();
        let Some(index) = index else {
            return Some(change);
        };

        let unknown: BTreeSet<String> = state
            .selected
            .iter()
            .filter(|v| index.orgs_with(criterion, v).is_none())
            .cloned()
            .collect();
        state.selected.retain(|v| !unknown.contains(v));
        change.record(criterion, unknown);

        self.narrow(index, Some(criterion), &mut change);
        Some(change)
    }

    /// Re-derives every criterion after an index becomes available.
    pub fn refresh(&mut self, index: &EntityIndex) -> FilterChange {
        let mut change = FilterChange::default();
        for id in &self.order {
            let Some(state) = self.states.get_mut(id) else {
                continue;
            };
            let unknown: BTreeSet<String> = state
                .selected
                .iter()
                .filter(|v| index.orgs_with(id, v).is_none())
                .cloned()
                .collect();
            state.selected.retain(|v| !unknown.contains(v));
            change.record(id, unknown);
        }
        self.narrow(index, None, &mut change);
        change
    }

    /// Organizations passing every non-empty selection, optionally ignoring one criterion.
    pub fn matching_orgs(&self, index: &EntityIndex, except: Option<&CriterionId>) -> OrgSet {
        let mut out = index.all();
        for (id, state) in &self.states {
            if Some(id) == except || state.selected.is_empty() {
                continue;
            }
            out &= &index.orgs_with_any(id, &state.selected);
        }
        out
    }

    /// Compound predicate for an organization-scoped layer.
    pub fn predicate_for(&self, layer: &LayerSpec) -> CompoundPredicate {
        CompoundPredicate::from_groups(layer.filter_fields.iter().filter_map(|(c, field)| {
            let state = self.states.get(c)?;
            Some(PropertyFilter {
                key: field.clone(),
                any_of: state.selected.clone(),
            })
        }))
    }

    fn allowed_for(&self, index: &EntityIndex, criterion: &CriterionId) -> BTreeSet<String> {
        let reachable = self.matching_orgs(index, Some(criterion));
        index
            .values(criterion)
            .filter(|v| {
                index
                    .orgs_with(criterion, v)
                    .is_some_and(|orgs| orgs.overlaps(&reachable))
            })
            .cloned()
            .collect()
    }

    fn narrow(
        &mut self,
        index: &EntityIndex,
        authoritative: Option<&CriterionId>,
        change: &mut FilterChange,
    ) {
        // Selections only shrink, so this reaches a fixpoint.
        loop {
            let mut changed = false;
            for id in self.order.clone() {
                if Some(&id) == authoritative {
                    continue;
                }
                let allowed = self.allowed_for(index, &id);
                let Some(state) = self.states.get_mut(&id) else {
                    continue;
                };
                let dropped: BTreeSet<String> =
                    state.selected.difference(&allowed).cloned().collect();
                if !dropped.is_empty() {
                    debug!(criterion = %id, ?dropped, "narrowed filter selection");
                    state.selected.retain(|v| allowed.contains(v));
                    change.record(&id, dropped);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        for id in self.order.clone() {
            let allowed = self.allowed_for(index, &id);
            if let Some(state) = self.states.get_mut(&id) {
                state.allowed = Some(allowed);
            }
        }
    }
}
