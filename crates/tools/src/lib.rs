//! Offline tooling for dashboard layouts: validation and scripted replays.

use std::collections::BTreeMap;
use std::sync::Arc;

use foundation::ids::{ControlId, LayerId, ThemeId};
use foundation::time::TimeSpan;
use layers::index::OrgRecord;
use layers::{Registry, RegistryError};
use serde::{Deserialize, Serialize};
use session::InMemorySessionStore;
use tracing::{info, warn};
use view::persist::{PersistedState, slot_for};
use view::temporal::{TemporalBinding, TemporalMetadata};
use view::{ControlValue, Dashboard, DashboardEvent, RecordingSurface, StaticMetadata};

/// One user interaction in a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    SelectTheme(ThemeId),
    SelectSubTheme { parent: ThemeId, sub: ThemeId },
    Control { id: ControlId, value: ControlValue },
    TimeWindow(TimeSpan),
}

/// Fixture data plus the interactions to replay against it.
///
/// Metadata fetches resolve immediately from `metadata`; a layer missing
/// there resolves as unavailable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub metadata: BTreeMap<LayerId, TemporalMetadata>,
    #[serde(default)]
    pub organizations: Vec<OrgRecord>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub storage_key: String,
    pub snapshot: PersistedState,
    pub binding: TemporalBinding,
    pub surface: RecordingSurface,
    pub events: Vec<DashboardEvent>,
    /// Steps the controller rejected, with the reason.
    pub rejected: Vec<String>,
    pub anomalies: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayoutSummary {
    pub themes: usize,
    pub layers: usize,
    pub time_aware_layers: usize,
    pub groups: usize,
    pub controls: usize,
    pub criteria: usize,
    pub storage_key: String,
}

pub fn load_registry(raw: Option<&str>) -> Result<Registry, RegistryError> {
    match raw {
        Some(raw) => Registry::from_json(raw),
        None => Registry::from_config(layers::DashboardConfig::beci()),
    }
}

pub fn summarize(registry: &Registry) -> LayoutSummary {
    LayoutSummary {
        themes: registry.themes().count(),
        layers: registry.layers().count(),
        time_aware_layers: registry.layers().filter(|l| l.is_time_aware()).count(),
        groups: registry.groups().count(),
        controls: registry.controls().count(),
        criteria: registry.criteria().len(),
        storage_key: slot_for(registry).key().to_string(),
    }
}

/// Runs `script` against a recording surface and reports the final state.
pub fn replay(registry: Arc<Registry>, script: &Script) -> ReplayReport {
    let source = StaticMetadata::new(script.metadata.clone());
    let mut dashboard = Dashboard::new(registry, RecordingSurface::new(), InMemorySessionStore::new());
    dashboard.bus_mut().set_recording(true);
    let mut rejected = Vec::new();

    let mut pending = dashboard.start();
    let anomalies = if script.organizations.is_empty() {
        0
    } else {
        dashboard.load_entity_index(&script.organizations).len()
    };

    for (i, step) in script.steps.iter().enumerate() {
        if let Some(ticket) = pending.take() {
            pollster::block_on(dashboard.complete_bind(&source, ticket));
        }
        let outcome = match step.clone() {
            Step::SelectTheme(theme) => dashboard.select_theme(theme.as_str()),
            Step::SelectSubTheme { parent, sub } => {
                dashboard.select_sub_theme(parent.as_str(), sub.as_str())
            }
            Step::Control { id, value } => dashboard.on_control_change(id.as_str(), value),
            Step::TimeWindow(window) => {
                dashboard.on_time_window_changed(window);
                Ok(None)
            }
        };
        match outcome {
            Ok(ticket) => pending = ticket,
            Err(err) => {
                warn!(step = i, "step rejected: {err}");
                rejected.push(format!("step {i}: {err}"));
            }
        }
    }
    if let Some(ticket) = pending.take() {
        pollster::block_on(dashboard.complete_bind(&source, ticket));
    }
    info!(steps = script.steps.len(), rejected = rejected.len(), "replay finished");

    let events = dashboard
        .bus_mut()
        .drain()
        .into_iter()
        .map(|e| e.payload)
        .collect();
    ReplayReport {
        storage_key: slot_for(dashboard.registry()).key().to_string(),
        snapshot: dashboard.snapshot(),
        binding: dashboard.state().temporal.binding().clone(),
        surface: dashboard.surface().clone(),
        events,
        rejected,
        anomalies,
    }
}

#[cfg(test)]
mod tests {
    use super::{Script, load_registry, replay, summarize};
    use foundation::ids::LayerId;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const SCRIPT: &str = r#"{
        "metadata": {
            "sstMonthly": { "full_extent": { "start": 0.0, "end": 100.0 } },
            "sstAnnual": { "full_extent": { "start": 0.0, "end": 50.0 } }
        },
        "organizations": [
            { "org": "OrgA", "fields": { "species": "Salmon", "members": "Canada" } }
        ],
        "steps": [
            { "selectTheme": "ocean-state" },
            { "control": { "id": "oceanConditionRadio", "value": { "kind": "radio", "value": "sstMonthly" } } },
            { "timeWindow": { "start": 10.0, "end": 20.0 } },
            { "selectTheme": "weather" }
        ]
    }"#;

    #[test]
    fn builtin_layout_summary() {
        let r = load_registry(None).unwrap();
        let s = summarize(&r);
        assert_eq!(s.themes, 5);
        assert_eq!(s.time_aware_layers, 5);
        assert!(s.storage_key.starts_with("beci.dashboard.state.v1."));
    }

    #[test]
    fn broken_layout_is_reported() {
        assert!(load_registry(Some("{")).is_err());
    }

    #[test]
    fn replays_a_script() {
        let script: Script = serde_json::from_str(SCRIPT).unwrap();
        let report = replay(Arc::new(load_registry(None).unwrap()), &script);
        assert_eq!(report.binding.active_layer, Some(LayerId::new("sstMonthly")));
        assert_eq!(report.surface.window.map(|w| (w.start.0, w.end.0)), Some((10.0, 20.0)));
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.anomalies, 0);
        assert_eq!(report.snapshot.active_theme_id.as_str(), "ocean-state");
    }
}
