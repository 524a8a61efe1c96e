use foundation::ids::{ControlId, LayerId, ThemeId};
use foundation::time::TimeSpan;
use runtime::event_bus::BusEvent;
use serde::Serialize;

use crate::state::ControlValue;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DashboardEvent {
    ThemeChanged {
        theme: ThemeId,
        sub_theme: Option<ThemeId>,
    },
    ControlChanged {
        control: ControlId,
        value: ControlValue,
    },
    /// `None` once the selector is cleared.
    TimeWindowChanged { window: Option<TimeSpan> },
    TemporalBindingChanged { layer: Option<LayerId> },
}

impl DashboardEvent {
    pub const THEME_CHANGED: &'static str = "themeChanged";
    pub const CONTROL_CHANGED: &'static str = "controlChanged";
    pub const TIME_WINDOW_CHANGED: &'static str = "timeWindowChanged";
    pub const TEMPORAL_BINDING_CHANGED: &'static str = "temporalBindingChanged";
}

impl BusEvent for DashboardEvent {
    fn name(&self) -> &'static str {
        match self {
            DashboardEvent::ThemeChanged { .. } => Self::THEME_CHANGED,
            DashboardEvent::ControlChanged { .. } => Self::CONTROL_CHANGED,
            DashboardEvent::TimeWindowChanged { .. } => Self::TIME_WINDOW_CHANGED,
            DashboardEvent::TemporalBindingChanged { .. } => Self::TEMPORAL_BINDING_CHANGED,
        }
    }
}
