//! Capabilities the controller drives but does not implement.

use std::collections::BTreeMap;

use foundation::ids::{LayerId, PanelId, ThemeId};
use foundation::time::{TimeInterval, TimeSpan};
use layers::index::OrgRecord;
use layers::query::CompoundPredicate;
use serde::Serialize;

use crate::temporal::TemporalMetadata;

/// The map and page the controller reconciles.
///
/// Calls are fire-and-forget and always succeed from the controller's point of view.
pub trait RenderSurface {
    fn set_layer_visible(&mut self, layer: &LayerId, visible: bool);
    fn set_panel_visible(&mut self, panel: &PanelId, visible: bool);
    fn apply_filter_predicate(&mut self, layer: &LayerId, predicate: &CompoundPredicate);
    /// Configures the shared time selector. `step` is `None` when neither the
    /// layer nor its role provides one.
    fn bind_temporal_extent(&mut self, extent: TimeSpan, step: Option<TimeInterval>);
    fn set_time_window(&mut self, window: TimeSpan);
    fn clear_time_window(&mut self);
    fn show_theme_content(&mut self, _title: &str, _content: &str) {}
    fn set_active_tab(&mut self, _theme: &ThemeId) {}
}

/// Resolves a layer's time dimension. `None` means unavailable.
pub trait TemporalMetadataSource {
    fn temporal_metadata(
        &self,
        layer: &LayerId,
    ) -> impl Future<Output = Option<TemporalMetadata>>;
}

/// Fetches the organization dataset the entity index is built from.
pub trait EntityRecordSource {
    fn org_records(&self) -> impl Future<Output = Option<Vec<OrgRecord>>>;
}

/// Fixed metadata table.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    entries: BTreeMap<LayerId, TemporalMetadata>,
}

impl StaticMetadata {
    pub fn new(entries: BTreeMap<LayerId, TemporalMetadata>) -> Self {
        Self { entries }
    }

    pub fn with(mut self, layer: &str, metadata: TemporalMetadata) -> Self {
        self.entries.insert(LayerId::new(layer), metadata);
        self
    }

    pub fn get(&self, layer: &LayerId) -> Option<TemporalMetadata> {
        self.entries.get(layer).copied()
    }
}

impl TemporalMetadataSource for StaticMetadata {
    async fn temporal_metadata(&self, layer: &LayerId) -> Option<TemporalMetadata> {
        self.get(layer)
    }
}

impl EntityRecordSource for Vec<OrgRecord> {
    async fn org_records(&self) -> Option<Vec<OrgRecord>> {
        Some(self.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum SurfaceCall {
    SetLayerVisible { layer: LayerId, visible: bool },
    SetPanelVisible { panel: PanelId, visible: bool },
    ApplyFilterPredicate { layer: LayerId, predicate: CompoundPredicate },
    BindTemporalExtent { extent: TimeSpan, step: Option<TimeInterval> },
    SetTimeWindow { window: TimeSpan },
    ClearTimeWindow,
    ShowThemeContent { title: String },
    SetActiveTab { theme: ThemeId },
}

/// Surface that remembers every call plus the resulting page state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecordingSurface {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<SurfaceCall>,
    pub layers: BTreeMap<LayerId, bool>,
    pub panels: BTreeMap<PanelId, bool>,
    pub predicates: BTreeMap<LayerId, CompoundPredicate>,
    pub extent: Option<TimeSpan>,
    pub step: Option<TimeInterval>,
    pub window: Option<TimeSpan>,
    pub title: Option<String>,
    pub active_tab: Option<ThemeId>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_layer_visible(&self, layer: &str) -> bool {
        self.layers.get(&LayerId::new(layer)).copied().unwrap_or(false)
    }

    pub fn is_panel_visible(&self, panel: &str) -> bool {
        self.panels.get(&PanelId::new(panel)).copied().unwrap_or(false)
    }

    pub fn visible_layers(&self) -> impl Iterator<Item = &LayerId> + '_ {
        self.layers.iter().filter(|(_, v)| **v).map(|(k, _)| k)
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }
}

impl RenderSurface for RecordingSurface {
    fn set_layer_visible(&mut self, layer: &LayerId, visible: bool) {
        self.layers.insert(layer.clone(), visible);
        self.calls.push(SurfaceCall::SetLayerVisible {
            layer: layer.clone(),
            visible,
        });
    }

    fn set_panel_visible(&mut self, panel: &PanelId, visible: bool) {
        self.panels.insert(panel.clone(), visible);
        self.calls.push(SurfaceCall::SetPanelVisible {
            panel: panel.clone(),
            visible,
        });
    }

    fn apply_filter_predicate(&mut self, layer: &LayerId, predicate: &CompoundPredicate) {
        self.predicates.insert(layer.clone(), predicate.clone());
        self.calls.push(SurfaceCall::ApplyFilterPredicate {
            layer: layer.clone(),
            predicate: predicate.clone(),
        });
    }

    fn bind_temporal_extent(&mut self, extent: TimeSpan, step: Option<TimeInterval>) {
        self.extent = Some(extent);
        self.step = step;
        self.calls
            .push(SurfaceCall::BindTemporalExtent { extent, step });
    }

    fn set_time_window(&mut self, window: TimeSpan) {
        self.window = Some(window);
        self.calls.push(SurfaceCall::SetTimeWindow { window });
    }

    fn clear_time_window(&mut self) {
        self.extent = None;
        self.step = None;
        self.window = None;
        self.calls.push(SurfaceCall::ClearTimeWindow);
    }

    fn show_theme_content(&mut self, title: &str, _content: &str) {
        self.title = Some(title.to_string());
        self.calls.push(SurfaceCall::ShowThemeContent {
            title: title.to_string(),
        });
    }

    fn set_active_tab(&mut self, theme: &ThemeId) {
        self.active_tab = Some(theme.clone());
        self.calls.push(SurfaceCall::SetActiveTab {
            theme: theme.clone(),
        });
    }
}
