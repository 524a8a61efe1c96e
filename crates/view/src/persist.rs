//! What survives a page reload.
//!
//! A snapshot is applied whole or not at all: [`PersistedState::validate`]
//! rejects anything that does not fit the current registry, and the caller
//! falls back to the built-in defaults.

use std::collections::BTreeSet;

use foundation::ids::{ControlId, LayerId, ThemeId};
use layers::{ControlTarget, Registry};
use serde::{Deserialize, Serialize};
use session::{SnapshotSlot, snapshot_key};
use thiserror::Error;

use crate::state::{AppState, ControlValue};

/// Bump when [`PersistedState`] changes shape; old snapshots then read as absent.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedControl {
    pub id: ControlId,
    pub value: ControlValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersistedState {
    pub active_theme_id: ThemeId,
    #[serde(default)]
    pub active_sub_theme_id: Option<ThemeId>,
    pub control_states: Vec<PersistedControl>,
    #[serde(default)]
    pub active_layer_id: Option<LayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedSnapshot {
    #[error("unknown theme `{0}`")]
    UnknownTheme(ThemeId),
    #[error("`{sub}` is not a sub-theme of `{theme}`")]
    UnknownSubTheme { theme: ThemeId, sub: ThemeId },
    #[error("unknown control `{0}`")]
    UnknownControl(ControlId),
    #[error("control `{0}` appears more than once")]
    DuplicateControl(ControlId),
    #[error("control `{0}` is missing")]
    MissingControl(ControlId),
    #[error("control `{0}` holds a value of the wrong kind")]
    KindMismatch(ControlId),
    #[error("radio `{control}` selects `{layer}` outside its group")]
    NotInGroup { control: ControlId, layer: LayerId },
    #[error("`{0}` is not a time-aware layer")]
    NotTimeAware(LayerId),
    #[error("active layer `{0}` is not the time group's selection")]
    NotSelected(LayerId),
}

impl PersistedState {
    /// Captures the reconcilable part of `state`. Never fails.
    pub fn capture(registry: &Registry, state: &AppState) -> Self {
        Self {
            active_theme_id: state.theme.clone(),
            active_sub_theme_id: state.sub_theme.clone(),
            control_states: registry
                .controls()
                .filter_map(|c| {
                    Some(PersistedControl {
                        id: c.id.clone(),
                        value: state.control_value(registry, &c.id)?,
                    })
                })
                .collect(),
            active_layer_id: state.temporal.target_layer().cloned(),
        }
    }

    pub fn validate(&self, registry: &Registry) -> Result<(), MalformedSnapshot> {
        let theme = registry
            .theme(&self.active_theme_id)
            .ok_or_else(|| MalformedSnapshot::UnknownTheme(self.active_theme_id.clone()))?;
        if let Some(sub) = &self.active_sub_theme_id
            && !theme.sub_themes.iter().any(|s| &s.id == sub)
        {
            return Err(MalformedSnapshot::UnknownSubTheme {
                theme: self.active_theme_id.clone(),
                sub: sub.clone(),
            });
        }

        let mut seen = BTreeSet::new();
        for entry in &self.control_states {
            let spec = registry
                .control(&entry.id)
                .ok_or_else(|| MalformedSnapshot::UnknownControl(entry.id.clone()))?;
            if !seen.insert(&entry.id) {
                return Err(MalformedSnapshot::DuplicateControl(entry.id.clone()));
            }
            if spec.kind() != entry.value.kind() {
                return Err(MalformedSnapshot::KindMismatch(entry.id.clone()));
            }
            if let (ControlTarget::Group { group }, ControlValue::Radio(Some(layer))) =
                (&spec.target, &entry.value)
                && !registry.group(group).is_some_and(|g| g.members.contains(layer))
            {
                return Err(MalformedSnapshot::NotInGroup {
                    control: entry.id.clone(),
                    layer: layer.clone(),
                });
            }
        }
        if let Some(missing) = registry.controls().find(|c| !seen.contains(&c.id)) {
            return Err(MalformedSnapshot::MissingControl(missing.id.clone()));
        }

        if let Some(layer) = &self.active_layer_id {
            if !registry.layer(layer).is_some_and(|l| l.is_time_aware()) {
                return Err(MalformedSnapshot::NotTimeAware(layer.clone()));
            }
            if self.time_group_selection(registry) != Some(layer) {
                return Err(MalformedSnapshot::NotSelected(layer.clone()));
            }
        }
        Ok(())
    }

    /// Layer picked by the radio of the active theme's time group.
    fn time_group_selection(&self, registry: &Registry) -> Option<&LayerId> {
        let policy = registry
            .effective_policy(&self.active_theme_id, self.active_sub_theme_id.as_ref())
            .filter(|p| p.time_aware)?;
        let radio = registry.radio_for(policy.time_group?)?;
        match &self.control_states.iter().find(|c| &c.id == radio)?.value {
            ControlValue::Radio(selected) => selected.as_ref(),
            _ => None,
        }
    }

    /// Seeds a fresh state from a validated snapshot.
    ///
    /// Multiselect values are kept as-is until an entity index is loaded.
    /// The active layer is not restored directly: entering the theme binds
    /// the time group's selection, which validation ties to it.
    pub fn restore(&self, registry: &Registry) -> AppState {
        let mut state = AppState::initial(registry);
        state.theme = self.active_theme_id.clone();
        state.sub_theme = self.active_sub_theme_id.clone();
        for entry in &self.control_states {
            match (&entry.value, registry.control(&entry.id).map(|c| &c.target)) {
                (ControlValue::Multiselect(values), Some(ControlTarget::Criterion { criterion })) => {
                    state.filters.set_selection(None, criterion, values.clone());
                }
                (value, Some(_)) => {
                    state.controls.insert(entry.id.clone(), value.clone());
                }
                (_, None) => {}
            }
        }
        state
    }
}

/// Slot the dashboard's state lives in.
///
/// The key carries the schema version and a fingerprint of the layout, so
/// snapshots written for another layout are never read back.
pub fn slot_for(registry: &Registry) -> SnapshotSlot<PersistedState> {
    let layout = serde_json::to_vec(registry.config()).unwrap_or_default();
    SnapshotSlot::new(snapshot_key(
        &registry.config().storage_key_prefix,
        SCHEMA_VERSION,
        &layout,
    ))
}

#[cfg(test)]
mod tests {
    use super::{MalformedSnapshot, PersistedState, slot_for};
    use crate::state::{AppState, ControlValue};
    use foundation::ids::{ControlId, LayerId, ThemeId};
    use layers::{DashboardConfig, Registry};
    use pretty_assertions::assert_eq;

    fn registry() -> Registry {
        Registry::from_config(DashboardConfig::beci()).unwrap()
    }

    fn set_control(snap: &mut PersistedState, id: &str, value: ControlValue) {
        let entry = snap
            .control_states
            .iter_mut()
            .find(|c| c.id == ControlId::new(id))
            .unwrap();
        entry.value = value;
    }

    #[test]
    fn captured_defaults_validate() {
        let r = registry();
        let snap = PersistedState::capture(&r, &AppState::initial(&r));
        assert_eq!(snap.control_states.len(), r.controls().count());
        assert_eq!(snap.validate(&r), Ok(()));

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["activeThemeId"], "intro");
        assert!(json.get("activeLayerId").is_some());
    }

    #[test]
    fn validation_rejects_what_the_registry_cannot_hold() {
        let r = registry();
        let good = PersistedState::capture(&r, &AppState::initial(&r));

        let mut s = good.clone();
        s.active_theme_id = ThemeId::new("weather");
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::UnknownTheme(_))));

        let mut s = good.clone();
        s.active_sub_theme_id = Some(ThemeId::new("ocean"));
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::UnknownSubTheme { .. })));

        let mut s = good.clone();
        set_control(&mut s, "eezToggle", ControlValue::Radio(None));
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::KindMismatch(_))));

        let mut s = good.clone();
        set_control(
            &mut s,
            "oceanConditionRadio",
            ControlValue::Radio(Some(LayerId::new("mhwMonthly"))),
        );
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::NotInGroup { .. })));

        let mut s = good.clone();
        s.control_states.pop();
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::MissingControl(_))));

        let mut s = good.clone();
        let dup = s.control_states[0].clone();
        s.control_states.push(dup);
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::DuplicateControl(_))));

        let mut s = good;
        s.active_layer_id = Some(LayerId::new("eez"));
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::NotTimeAware(_))));
    }

    #[test]
    fn active_layer_must_be_the_time_group_selection() {
        let r = registry();
        let mut s = PersistedState::capture(&r, &AppState::initial(&r));
        s.active_theme_id = ThemeId::new("ocean-state");
        s.active_sub_theme_id = Some(ThemeId::new("ocean"));
        set_control(
            &mut s,
            "oceanConditionRadio",
            ControlValue::Radio(Some(LayerId::new("sstMonthly"))),
        );

        s.active_layer_id = Some(LayerId::new("sstMonthly"));
        assert_eq!(s.validate(&r), Ok(()));

        s.active_layer_id = Some(LayerId::new("chlAnnual"));
        assert_eq!(
            s.validate(&r),
            Err(MalformedSnapshot::NotSelected(LayerId::new("chlAnnual")))
        );

        // Not time-aware, so nothing may be bound.
        s.active_theme_id = ThemeId::new("governance");
        s.active_sub_theme_id = None;
        s.active_layer_id = Some(LayerId::new("sstMonthly"));
        assert!(matches!(s.validate(&r), Err(MalformedSnapshot::NotSelected(_))));
    }

    #[test]
    fn restore_seeds_controls_and_filters() {
        let r = registry();
        let mut snap = PersistedState::capture(&r, &AppState::initial(&r));
        snap.active_theme_id = ThemeId::new("governance");
        set_control(&mut snap, "eezToggle", ControlValue::Checkbox(false));
        set_control(
            &mut snap,
            "speciesFilter",
            ControlValue::Multiselect(["Salmon".to_string()].into()),
        );

        let state = snap.restore(&r);
        assert_eq!(state.theme, ThemeId::new("governance"));
        assert_eq!(
            state.control_value(&r, &ControlId::new("eezToggle")),
            Some(ControlValue::Checkbox(false))
        );
        assert_eq!(
            state.control_value(&r, &ControlId::new("speciesFilter")),
            Some(ControlValue::Multiselect(["Salmon".to_string()].into()))
        );
    }

    #[test]
    fn slot_key_is_versioned() {
        let r = registry();
        assert!(slot_for(&r).key().starts_with("beci.dashboard.state.v1."));
    }
}
