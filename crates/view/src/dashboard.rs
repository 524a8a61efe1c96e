use std::sync::Arc;

use foundation::ids::{ControlId, ThemeId};
use foundation::time::TimeSpan;
use layers::Registry;
use layers::index::{EntityIndex, IndexAnomaly, OrgRecord};
use runtime::event_bus::EventBus;
use session::{SessionStore, SnapshotSlot};
use tracing::{debug, info, warn};

use crate::event::DashboardEvent;
use crate::persist::{PersistedState, slot_for};
use crate::reducer::{Action, Context, ControllerError, Effect, reduce};
use crate::state::{AppState, ControlValue};
use crate::surface::{EntityRecordSource, RenderSurface, TemporalMetadataSource};
use crate::temporal::{BindTicket, TemporalMetadata};

/// Runs the reducer and carries out its effects.
///
/// Every entry point returns the ticket of a metadata fetch the host has to
/// perform, if the transition started one. The host resolves it with
/// [`Dashboard::resolve_metadata`] whenever the fetch completes.
pub struct Dashboard<S, K> {
    registry: Arc<Registry>,
    index: Option<Arc<EntityIndex>>,
    state: AppState,
    bus: EventBus<DashboardEvent>,
    surface: S,
    store: K,
    slot: SnapshotSlot<PersistedState>,
}

impl<S, K> std::fmt::Debug for Dashboard<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("theme", &self.state.theme)
            .field("sub_theme", &self.state.sub_theme)
            .field("index_loaded", &self.index.is_some())
            .field("slot", &self.slot.key())
            .finish_non_exhaustive()
    }
}

impl<S: RenderSurface, K: SessionStore> Dashboard<S, K> {
    pub fn new(registry: Arc<Registry>, surface: S, store: K) -> Self {
        let state = AppState::initial(&registry);
        let slot = slot_for(&registry);
        Self {
            registry,
            index: None,
            state,
            bus: EventBus::new(),
            surface,
            store,
            slot,
        }
    }

    /// Seeds state from the session (or defaults) and enters the active theme.
    pub fn start(&mut self) -> Option<BindTicket> {
        if let Some(snapshot) = self.restore() {
            info!(theme = %snapshot.active_theme_id, "restoring session state");
            self.state = snapshot.restore(&self.registry);
        }
        let action = match self.state.sub_theme.clone() {
            Some(sub) => Action::SelectSubTheme(self.state.theme.clone(), sub),
            None => Action::SelectTheme(self.state.theme.clone()),
        };
        match self.dispatch(action) {
            Ok(ticket) => ticket,
            Err(_) => {
                self.state = AppState::initial(&self.registry);
                let default = self.registry.default_theme().clone();
                self.dispatch(Action::SelectTheme(default)).ok().flatten()
            }
        }
    }

    /// Reads and validates the stored snapshot.
    pub fn restore(&self) -> Option<PersistedState> {
        let snapshot = self.slot.load(&self.store)?;
        match snapshot.validate(&self.registry) {
            Ok(()) => Some(snapshot),
            Err(err) => {
                warn!(key = self.slot.key(), "discarding session snapshot: {err}");
                None
            }
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState::capture(&self.registry, &self.state)
    }

    /// Applies one action. Failed actions are logged and leave the state untouched.
    pub fn dispatch(&mut self, action: Action) -> Result<Option<BindTicket>, ControllerError> {
        let ctx = Context::new(&self.registry, self.index.as_deref());
        let transition = match reduce(&ctx, &self.state, action) {
            Ok(t) => t,
            Err(err) => {
                warn!("{err}");
                return Err(err);
            }
        };
        self.state = transition.state;

        let mut ticket = None;
        let mut persist = false;
        for effect in transition.effects {
            match effect {
                Effect::SetLayerVisible(layer, visible) => {
                    self.surface.set_layer_visible(&layer, visible)
                }
                Effect::SetPanelVisible(panel, visible) => {
                    self.surface.set_panel_visible(&panel, visible)
                }
                Effect::ShowThemeContent { title, content } => {
                    self.surface.show_theme_content(&title, &content)
                }
                Effect::SetActiveTab(theme) => self.surface.set_active_tab(&theme),
                Effect::ApplyFilter(layer, predicate) => {
                    self.surface.apply_filter_predicate(&layer, &predicate)
                }
                Effect::BindTime(t) => ticket = Some(t),
                Effect::BindTemporalExtent { extent, step } => {
                    self.surface.bind_temporal_extent(extent, step)
                }
                Effect::ClearTime => self.surface.clear_time_window(),
                Effect::SetTimeWindow(window) => self.surface.set_time_window(window),
                Effect::Persist => persist = true,
                Effect::Emit(event) => self.bus.emit(event),
            }
        }
        if persist {
            let snapshot = self.snapshot();
            self.slot.save(&mut self.store, &snapshot);
        }
        Ok(ticket)
    }

    pub fn select_theme(&mut self, theme: &str) -> Result<Option<BindTicket>, ControllerError> {
        self.dispatch(Action::SelectTheme(ThemeId::new(theme)))
    }

    pub fn select_sub_theme(
        &mut self,
        parent: &str,
        sub: &str,
    ) -> Result<Option<BindTicket>, ControllerError> {
        self.dispatch(Action::SelectSubTheme(ThemeId::new(parent), ThemeId::new(sub)))
    }

    pub fn on_control_change(
        &mut self,
        control: &str,
        value: ControlValue,
    ) -> Result<Option<BindTicket>, ControllerError> {
        self.dispatch(Action::ControlChanged(ControlId::new(control), value))
    }

    pub fn on_time_window_changed(&mut self, window: TimeSpan) {
        let _ = self.dispatch(Action::TimeWindowChanged(window));
    }

    pub fn resolve_metadata(&mut self, ticket: BindTicket, metadata: Option<TemporalMetadata>) {
        let _ = self.dispatch(Action::MetadataResolved(ticket, metadata));
    }

    /// Fetches metadata for `ticket` from `source` and resolves it.
    pub async fn complete_bind<M: TemporalMetadataSource + ?Sized>(
        &mut self,
        source: &M,
        ticket: BindTicket,
    ) {
        let metadata = source.temporal_metadata(&ticket.layer).await;
        self.resolve_metadata(ticket, metadata);
    }

    /// Builds the entity index and re-derives every filter against it.
    pub fn load_entity_index(&mut self, records: &[OrgRecord]) -> Vec<IndexAnomaly> {
        let (index, anomalies) = EntityIndex::build(self.registry.criteria(), records);
        debug!(orgs = index.org_count(), anomalies = anomalies.len(), "entity index built");
        self.index = Some(Arc::new(index));
        let _ = self.dispatch(Action::EntityIndexLoaded);
        anomalies
    }

    /// Fetches the organization dataset from `source` and loads it.
    ///
    /// A failed fetch leaves filters working on unvalidated selections.
    pub async fn load_entities<E: EntityRecordSource + ?Sized>(
        &mut self,
        source: &E,
    ) -> Vec<IndexAnomaly> {
        match source.org_records().await {
            Some(records) => self.load_entity_index(&records),
            None => {
                warn!("organization dataset unavailable; filters stay unnarrowed");
                Vec::new()
            }
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn index(&self) -> Option<&EntityIndex> {
        self.index.as_deref()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn bus(&self) -> &EventBus<DashboardEvent> {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus<DashboardEvent> {
        &mut self.bus
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn store(&self) -> &K {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::Dashboard;
    use crate::event::DashboardEvent;
    use crate::surface::RecordingSurface;
    use layers::{DashboardConfig, Registry};
    use runtime::event_bus::BusEvent;
    use session::InMemorySessionStore;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn dashboard() -> Dashboard<RecordingSurface, InMemorySessionStore> {
        let registry = Arc::new(Registry::from_config(DashboardConfig::beci()).unwrap());
        Dashboard::new(registry, RecordingSurface::new(), InMemorySessionStore::new())
    }

    #[test]
    fn start_enters_the_default_theme() {
        let mut d = dashboard();
        assert_eq!(d.start(), None);
        assert_eq!(d.surface().active_tab.as_ref().map(|t| t.as_str()), Some("intro"));
        assert_eq!(d.surface().visible_layers().count(), 0);
        assert_eq!(d.store().len(), 1);
    }

    #[test]
    fn unknown_theme_is_ignored() {
        let mut d = dashboard();
        d.start();
        let calls = d.surface_mut().take_calls().len();
        assert!(calls > 0);
        assert!(d.select_theme("weather").is_err());
        assert!(d.surface().calls.is_empty());
        assert_eq!(d.state().theme.as_str(), "intro");
    }

    #[test]
    fn subscribers_see_theme_changes() {
        let mut d = dashboard();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        d.bus_mut()
            .subscribe(DashboardEvent::THEME_CHANGED, move |ev| {
                sink.borrow_mut().push(ev.payload.clone())
            });
        d.start();
        d.select_theme("governance").unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].name(), "themeChanged");
    }

    #[test]
    fn long_sessions_keep_no_event_log() {
        let mut d = dashboard();
        d.start();
        for i in 0..1000 {
            let theme = if i % 2 == 0 { "governance" } else { "ecosystem" };
            d.select_theme(theme).unwrap();
        }
        assert!(!d.bus().is_recording());
        assert!(d.bus().events().is_empty());
    }
}
