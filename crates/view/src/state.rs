use std::collections::{BTreeMap, BTreeSet};

use foundation::ids::{ControlId, LayerId, PanelId, ThemeId};
use layers::filter::FilterComposer;
use layers::{ControlKind, ControlTarget, EffectivePolicy, Registry, VisibilityRule};
use serde::{Deserialize, Serialize};

use crate::temporal::TemporalBinder;

/// Value of one control as the UI reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ControlValue {
    Checkbox(bool),
    /// Selected member of the radio's exclusive group.
    Radio(Option<LayerId>),
    Multiselect(BTreeSet<String>),
}

impl ControlValue {
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlValue::Checkbox(_) => ControlKind::Checkbox,
            ControlValue::Radio(_) => ControlKind::Radio,
            ControlValue::Multiselect(_) => ControlKind::Multiselect,
        }
    }
}

/// Everything the controller reconciles.
///
/// Checkbox and radio values live in `controls`; multiselect selections live
/// in `filters`, which also tracks their allowed options.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub theme: ThemeId,
    pub sub_theme: Option<ThemeId>,
    pub controls: BTreeMap<ControlId, ControlValue>,
    pub filters: FilterComposer,
    pub visible_layers: BTreeSet<LayerId>,
    pub visible_panels: BTreeSet<PanelId>,
    pub temporal: TemporalBinder,
}

impl AppState {
    /// Built-in defaults: the default theme and every control at its declared default.
    pub fn initial(registry: &Registry) -> Self {
        let controls = registry
            .controls()
            .filter_map(|c| {
                let value = match &c.target {
                    ControlTarget::Layer { layer } => ControlValue::Checkbox(
                        registry.layer(layer).is_some_and(|l| l.default_visible),
                    ),
                    ControlTarget::Group { group } => ControlValue::Radio(
                        registry.group(group).and_then(|g| g.default_member.clone()),
                    ),
                    ControlTarget::Criterion { .. } => return None,
                };
                Some((c.id.clone(), value))
            })
            .collect();

        let theme = registry.default_theme().clone();
        let sub_theme = registry
            .theme(&theme)
            .and_then(|t| t.default_sub_theme.clone());

        Self {
            theme,
            sub_theme,
            controls,
            filters: FilterComposer::new(registry.criteria()),
            visible_layers: BTreeSet::new(),
            visible_panels: BTreeSet::new(),
            temporal: TemporalBinder::new(),
        }
    }

    /// Current value of any control, multiselects included.
    pub fn control_value(&self, registry: &Registry, id: &ControlId) -> Option<ControlValue> {
        match &registry.control(id)?.target {
            ControlTarget::Criterion { criterion } => self
                .filters
                .selected(criterion)
                .map(|s| ControlValue::Multiselect(s.clone())),
            _ => self.controls.get(id).cloned(),
        }
    }

    pub fn is_checked(&self, registry: &Registry, layer: &LayerId) -> bool {
        match registry.checkbox_for(layer).and_then(|c| self.controls.get(c)) {
            Some(ControlValue::Checkbox(checked)) => *checked,
            _ => registry.layer(layer).is_some_and(|l| l.default_visible),
        }
    }

    /// Selected member of the group `layer` belongs to, if it is grouped.
    pub fn group_selection(&self, registry: &Registry, layer: &LayerId) -> Option<Option<&LayerId>> {
        let group = registry.group_of(layer)?;
        let selected = registry
            .radio_for(group)
            .and_then(|c| self.controls.get(c))
            .and_then(|v| match v {
                ControlValue::Radio(sel) => sel.as_ref(),
                _ => None,
            });
        Some(selected)
    }

    /// Visibility `layer` should have under `policy`.
    ///
    /// Layers the policy does not mention are hidden. Grouped layers are
    /// visible only as their group's selection.
    pub fn target_visibility(
        &self,
        registry: &Registry,
        policy: &EffectivePolicy<'_>,
        layer: &LayerId,
    ) -> bool {
        let Some(rule) = policy.rule(layer) else {
            return false;
        };
        if let Some(selected) = self.group_selection(registry, layer) {
            return selected == Some(layer);
        }
        match rule {
            VisibilityRule::Shown => true,
            VisibilityRule::Toggle => self.is_checked(registry, layer),
        }
    }
}
