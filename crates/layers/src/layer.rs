use std::collections::BTreeMap;

use foundation::ids::{CriterionId, LayerId};
use foundation::time::TimeInterval;
use serde::{Deserialize, Serialize};

/// What a layer represents. Drives the step-interval fallback table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRole {
    Daily,
    Monthly,
    Annual,
    Event,
    Boundary,
    Marker,
    Organization,
}

/// Decided once at registration: either the layer carries a time extent or it never does.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerKind {
    TimeAware {
        /// Step interval known up front; metadata may still override it.
        #[serde(default)]
        declared_step: Option<TimeInterval>,
    },
    Static,
}

impl LayerKind {
    pub fn is_time_aware(&self) -> bool {
        matches!(self, LayerKind::TimeAware { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: LayerId,
    pub title: String,
    pub role: LayerRole,
    pub kind: LayerKind,
    /// Hosted item the rendering surface loads for this layer.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub default_visible: bool,
    /// Attribute names this layer exposes per filter criterion.
    ///
    /// Non-empty means the layer is organization-scoped and receives the
    /// compound filter predicate.
    #[serde(default)]
    pub filter_fields: BTreeMap<CriterionId, String>,
}

impl LayerSpec {
    pub fn new(id: &str, title: &str, role: LayerRole, kind: LayerKind) -> Self {
        Self {
            id: LayerId::new(id),
            title: title.to_string(),
            role,
            kind,
            source: None,
            default_visible: false,
            filter_fields: BTreeMap::new(),
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn visible_by_default(mut self) -> Self {
        self.default_visible = true;
        self
    }

    pub fn with_filter_field(mut self, criterion: &str, field: &str) -> Self {
        self.filter_fields
            .insert(CriterionId::new(criterion), field.to_string());
        self
    }

    pub fn is_time_aware(&self) -> bool {
        self.kind.is_time_aware()
    }

    pub fn is_org_scoped(&self) -> bool {
        !self.filter_fields.is_empty()
    }
}
