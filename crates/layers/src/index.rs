use std::collections::{BTreeMap, BTreeSet};

use foundation::ids::{CriterionId, OrgId};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::org_set::OrgSet;
use crate::registry::CriterionSpec;
use crate::tokenize::{FilterParseAnomaly, tokenize_entity_list};

/// One organization row of the queried dataset.
///
/// Field values are raw delimited strings (e.g. `"Salmon, Tuna (Skipjack, Yellowfin)"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgRecord {
    pub org: OrgId,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl OrgRecord {
    pub fn new(org: &str) -> Self {
        Self {
            org: OrgId::new(org),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: &str) -> Self {
        self.fields.insert(key.to_string(), value.to_string());
        self
    }

    /// Tokenized values of `field`; `None` when the record lacks it.
    pub fn values(&self, field: &str) -> Option<Vec<String>> {
        self.fields
            .get(field)
            .map(|raw| tokenize_entity_list(raw).tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexAnomaly {
    pub org: OrgId,
    pub criterion: CriterionId,
    pub anomaly: FilterParseAnomaly,
}

/// Read-only map `criterion value -> organizations`, built once per session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityIndex {
    /// Ordinal -> organization, sorted by id.
    orgs: Vec<OrgId>,
    by_criterion: BTreeMap<CriterionId, BTreeMap<String, OrgSet>>,
}

impl EntityIndex {
    /// Builds the index.
    ///
    /// Records missing a criterion's field never match that criterion.
    /// Malformed tokens are skipped and returned alongside the index.
    pub fn build(criteria: &[CriterionSpec], records: &[OrgRecord]) -> (Self, Vec<IndexAnomaly>) {
        let orgs: Vec<OrgId> = records
            .iter()
            .map(|r| r.org.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut by_criterion: BTreeMap<CriterionId, BTreeMap<String, OrgSet>> = criteria
            .iter()
            .map(|c| (c.id.clone(), BTreeMap::new()))
            .collect();
        let mut anomalies = Vec::new();

        for record in records {
            let Ok(ordinal) = orgs.binary_search(&record.org) else {
                continue;
            };
            let ordinal = ordinal as u32;

            for c in criteria {
                let Some(raw) = record.fields.get(&c.field) else {
                    continue;
                };
                let parsed = tokenize_entity_list(raw);
                for anomaly in parsed.anomalies {
                    warn!(org = %record.org, criterion = %c.id, "{anomaly}");
                    anomalies.push(IndexAnomaly {
                        org: record.org.clone(),
                        criterion: c.id.clone(),
                        anomaly,
                    });
                }
                let values = by_criterion.entry(c.id.clone()).or_default();
                for token in parsed.tokens {
                    values.entry(token).or_default().insert(ordinal);
                }
            }
        }

        (
            Self {
                orgs,
                by_criterion,
            },
            anomalies,
        )
    }

    pub fn org_count(&self) -> u32 {
        self.orgs.len() as u32
    }

    pub fn org(&self, ordinal: u32) -> Option<&OrgId> {
        self.orgs.get(ordinal as usize)
    }

    pub fn ordinal(&self, org: &OrgId) -> Option<u32> {
        self.orgs.binary_search(org).ok().map(|i| i as u32)
    }

    pub fn all(&self) -> OrgSet {
        OrgSet::full(self.org_count())
    }

    pub fn has_criterion(&self, criterion: &CriterionId) -> bool {
        self.by_criterion.contains_key(criterion)
    }

    /// Domain of a criterion, sorted.
    pub fn values(&self, criterion: &CriterionId) -> impl Iterator<Item = &String> + '_ {
        self.by_criterion
            .get(criterion)
            .into_iter()
            .flat_map(|m| m.keys())
    }

    pub fn orgs_with(&self, criterion: &CriterionId, value: &str) -> Option<&OrgSet> {
        self.by_criterion.get(criterion)?.get(value)
    }

    /// Union of the organizations holding any of `values`.
    pub fn orgs_with_any<'a>(
        &self,
        criterion: &CriterionId,
        values: impl IntoIterator<Item = &'a String>,
    ) -> OrgSet {
        let mut out = OrgSet::new();
        for v in values {
            if let Some(set) = self.orgs_with(criterion, v) {
                out |= set;
            }
        }
        out
    }

    pub fn org_ids<'a>(&'a self, set: &'a OrgSet) -> impl Iterator<Item = &'a OrgId> + 'a {
        set.iter().filter_map(|i| self.org(i))
    }
}
