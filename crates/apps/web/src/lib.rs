use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use console_error_panic_hook::set_once;
use foundation::ids::{LayerId, PanelId, ThemeId};
use foundation::time::{TimeInterval, TimeSpan};
use gloo_net::http::Request;
use layers::Registry;
use layers::index::OrgRecord;
use layers::query::CompoundPredicate;
use serde::Deserialize;
use session::{InMemorySessionStore, SessionStorageStore, SessionStore, StoreError};
use view::temporal::{BindTicket, TemporalMetadata};
use view::{ControlValue, Dashboard, RenderSurface, TemporalMetadataSource};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};

mod convert;
use convert::{js_ms_to_time, metadata_from_js, time_to_js_ms};

// Guard against double-initialization during hot reload.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

#[wasm_bindgen]
extern "C" {
    /// Page-side object that owns the map, the panels and the time slider.
    #[derive(Debug, Clone)]
    pub type DashboardHost;

    #[wasm_bindgen(method, js_name = setLayerVisible)]
    fn set_layer_visible(this: &DashboardHost, layer: &str, visible: bool);

    #[wasm_bindgen(method, js_name = setPanelVisible)]
    fn set_panel_visible(this: &DashboardHost, panel: &str, visible: bool);

    #[wasm_bindgen(method, js_name = applyFilterPredicate)]
    fn apply_filter_predicate(this: &DashboardHost, layer: &str, where_clause: &str);

    #[wasm_bindgen(method, js_name = bindTemporalExtent)]
    fn bind_temporal_extent(
        this: &DashboardHost,
        start_ms: f64,
        end_ms: f64,
        step_unit: Option<String>,
        step_value: Option<u32>,
    );

    #[wasm_bindgen(method, js_name = setTimeWindow)]
    fn set_time_window(this: &DashboardHost, start_ms: f64, end_ms: f64);

    #[wasm_bindgen(method, js_name = clearTimeWindow)]
    fn clear_time_window(this: &DashboardHost);

    #[wasm_bindgen(method, js_name = showThemeContent)]
    fn show_theme_content(this: &DashboardHost, title: &str, content: &str);

    #[wasm_bindgen(method, js_name = setActiveTab)]
    fn set_active_tab(this: &DashboardHost, theme: &str);

    /// Resolves to `{fullExtent: [t0, t1], step?: {unit, value}}` (ms) or `null`.
    #[wasm_bindgen(method, catch, js_name = getLayerTemporalMetadata)]
    fn get_layer_temporal_metadata(
        this: &DashboardHost,
        layer: &str,
    ) -> Result<js_sys::Promise, JsValue>;
}

/// [`RenderSurface`] backed by the page's host object.
#[derive(Debug, Clone)]
struct JsSurface {
    host: DashboardHost,
}

impl RenderSurface for JsSurface {
    fn set_layer_visible(&mut self, layer: &LayerId, visible: bool) {
        self.host.set_layer_visible(layer.as_str(), visible);
    }

    fn set_panel_visible(&mut self, panel: &PanelId, visible: bool) {
        self.host.set_panel_visible(panel.as_str(), visible);
    }

    fn apply_filter_predicate(&mut self, layer: &LayerId, predicate: &CompoundPredicate) {
        self.host
            .apply_filter_predicate(layer.as_str(), &predicate.to_where_clause());
    }

    fn bind_temporal_extent(&mut self, extent: TimeSpan, step: Option<TimeInterval>) {
        let unit = step.and_then(|s| {
            serde_json::to_value(s.unit)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
        });
        self.host.bind_temporal_extent(
            time_to_js_ms(extent.start),
            time_to_js_ms(extent.end),
            unit,
            step.map(|s| s.value),
        );
    }

    fn set_time_window(&mut self, window: TimeSpan) {
        self.host
            .set_time_window(time_to_js_ms(window.start), time_to_js_ms(window.end));
    }

    fn clear_time_window(&mut self) {
        self.host.clear_time_window();
    }

    fn show_theme_content(&mut self, title: &str, content: &str) {
        self.host.show_theme_content(title, content);
    }

    fn set_active_tab(&mut self, theme: &ThemeId) {
        self.host.set_active_tab(theme.as_str());
    }
}

impl TemporalMetadataSource for DashboardHost {
    async fn temporal_metadata(&self, layer: &LayerId) -> Option<TemporalMetadata> {
        let promise = match self.get_layer_temporal_metadata(layer.as_str()) {
            Ok(p) => p,
            Err(err) => {
                log_error(&format!("metadata request for {layer} failed: {err:?}"));
                return None;
            }
        };
        match JsFuture::from(promise).await {
            Ok(value) => metadata_from_js(&value),
            Err(err) => {
                log_error(&format!("metadata for {layer} rejected: {err:?}"));
                None
            }
        }
    }
}

/// `sessionStorage` when the page allows it, memory otherwise.
#[derive(Debug)]
enum WebSessionStore {
    Session(SessionStorageStore),
    Memory(InMemorySessionStore),
}

impl WebSessionStore {
    fn new(namespace: &str) -> Self {
        match SessionStorageStore::new(namespace) {
            Ok(s) => WebSessionStore::Session(s),
            Err(_) => WebSessionStore::Memory(InMemorySessionStore::new()),
        }
    }
}

impl SessionStore for WebSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            WebSessionStore::Session(s) => s.get(key),
            WebSessionStore::Memory(s) => s.get(key),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            WebSessionStore::Session(s) => s.set(key, value),
            WebSessionStore::Memory(s) => s.set(key, value),
        }
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        match self {
            WebSessionStore::Session(s) => s.remove(key),
            WebSessionStore::Memory(s) => s.remove(key),
        }
    }
}

type WebDashboard = Dashboard<JsSurface, WebSessionStore>;

thread_local! {
    static DASHBOARD: RefCell<Option<WebDashboard>> = const { RefCell::new(None) };
}

/// Runs `f` against the dashboard.
///
/// Fails instead of panicking when the dashboard is missing or already
/// borrowed (a host callback re-entering the controller synchronously).
fn with_dashboard<R>(f: impl FnOnce(&mut WebDashboard) -> R) -> Result<R, JsValue> {
    DASHBOARD
        .try_with(|cell| {
            let mut guard = cell
                .try_borrow_mut()
                .map_err(|_| JsValue::from_str("dashboard is busy"))?;
            let dashboard = guard
                .as_mut()
                .ok_or_else(|| JsValue::from_str("dashboard not initialized"))?;
            Ok(f(dashboard))
        })
        .map_err(|_| JsValue::from_str("dashboard torn down"))?
}

fn log_error(msg: &str) {
    web_sys::console::error_1(&JsValue::from_str(msg));
}

fn to_js_err(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Fetches metadata for `ticket` off the borrow and resolves it when it lands.
fn spawn_bind(ticket: Option<BindTicket>) {
    let Some(ticket) = ticket else {
        return;
    };
    let host = match with_dashboard(|d| d.surface().host.clone()) {
        Ok(h) => h,
        Err(err) => {
            log_error(&format!("cannot start temporal bind: {err:?}"));
            return;
        }
    };
    spawn_local(async move {
        let metadata = host.temporal_metadata(&ticket.layer).await;
        if let Err(err) = with_dashboard(|d| d.resolve_metadata(ticket, metadata)) {
            log_error(&format!("cannot resolve temporal bind: {err:?}"));
        }
    });
}

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }
    set_once();
    Ok(())
}

/// Creates the dashboard and enters the restored (or default) theme.
///
/// `config_json` overrides the built-in layout. `namespace` keeps several
/// embedded dashboards on one page apart in session storage.
#[wasm_bindgen]
pub fn init_dashboard(
    host: DashboardHost,
    config_json: Option<String>,
    namespace: Option<String>,
) -> Result<(), JsValue> {
    let registry = match config_json {
        Some(raw) => Registry::from_json(&raw),
        None => Registry::from_config(layers::DashboardConfig::beci()),
    }
    .map_err(to_js_err)?;
    let store = WebSessionStore::new(namespace.as_deref().unwrap_or_default());
    let dashboard = Dashboard::new(Arc::new(registry), JsSurface { host }, store);

    DASHBOARD
        .try_with(|cell| {
            let mut guard = cell
                .try_borrow_mut()
                .map_err(|_| JsValue::from_str("dashboard is busy"))?;
            *guard = Some(dashboard);
            Ok::<_, JsValue>(())
        })
        .map_err(|_| JsValue::from_str("dashboard torn down"))??;

    let ticket = with_dashboard(|d| d.start())?;
    spawn_bind(ticket);
    Ok(())
}

#[wasm_bindgen]
pub fn select_theme(theme: &str) -> Result<(), JsValue> {
    let ticket = with_dashboard(|d| d.select_theme(theme))?.map_err(to_js_err)?;
    spawn_bind(ticket);
    Ok(())
}

#[wasm_bindgen]
pub fn select_sub_theme(parent: &str, sub: &str) -> Result<(), JsValue> {
    let ticket = with_dashboard(|d| d.select_sub_theme(parent, sub))?.map_err(to_js_err)?;
    spawn_bind(ticket);
    Ok(())
}

fn control_change(control: &str, value: ControlValue) -> Result<(), JsValue> {
    let ticket = with_dashboard(|d| d.on_control_change(control, value))?.map_err(to_js_err)?;
    spawn_bind(ticket);
    Ok(())
}

#[wasm_bindgen]
pub fn set_checkbox(control: &str, checked: bool) -> Result<(), JsValue> {
    control_change(control, ControlValue::Checkbox(checked))
}

#[wasm_bindgen]
pub fn set_radio(control: &str, layer: Option<String>) -> Result<(), JsValue> {
    control_change(control, ControlValue::Radio(layer.map(LayerId::from)))
}

#[wasm_bindgen]
pub fn set_multiselect(control: &str, values: Vec<String>) -> Result<(), JsValue> {
    control_change(control, ControlValue::Multiselect(values.into_iter().collect()))
}

/// Inbound `onTimeWindowChanged` from the slider, in epoch milliseconds.
#[wasm_bindgen]
pub fn on_time_window_changed(start_ms: f64, end_ms: f64) -> Result<(), JsValue> {
    let window = TimeSpan::new(js_ms_to_time(start_ms), js_ms_to_time(end_ms));
    with_dashboard(|d| d.on_time_window_changed(window))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordsPayload {
    Records(Vec<OrgRecord>),
    Features { features: Vec<FeatureRow> },
}

#[derive(Debug, Deserialize)]
struct FeatureRow {
    attributes: serde_json::Map<String, serde_json::Value>,
}

/// Builds the entity index from a JSON dataset at `url`.
///
/// Accepts either a list of organization records or a feature-service
/// query result whose `attributes` carry the organization fields. `id_field`
/// names the attribute holding the organization id.
#[wasm_bindgen]
pub async fn load_entities(url: String, id_field: Option<String>) -> Result<u32, JsValue> {
    let resp = Request::get(&url)
        .send()
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    if !resp.ok() {
        return Err(JsValue::from_str(&format!("HTTP {} for {url}", resp.status())));
    }
    let text = resp
        .text()
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    let payload: RecordsPayload = serde_json::from_str(&text).map_err(to_js_err)?;
    let records = match payload {
        RecordsPayload::Records(records) => records,
        RecordsPayload::Features { features } => {
            let id_field = id_field.as_deref().unwrap_or("acronym");
            features
                .into_iter()
                .filter_map(|f| convert::record_from_attributes(&f.attributes, id_field))
                .collect()
        }
    };
    let anomalies = with_dashboard(|d| d.load_entity_index(&records))?;
    Ok(anomalies.len() as u32)
}

/// Calls `callback` with each event named `name`, serialized as JSON.
#[wasm_bindgen]
pub fn subscribe(name: &str, callback: js_sys::Function) -> Result<(), JsValue> {
    let name: &'static str = match name {
        view::DashboardEvent::THEME_CHANGED => view::DashboardEvent::THEME_CHANGED,
        view::DashboardEvent::CONTROL_CHANGED => view::DashboardEvent::CONTROL_CHANGED,
        view::DashboardEvent::TIME_WINDOW_CHANGED => view::DashboardEvent::TIME_WINDOW_CHANGED,
        view::DashboardEvent::TEMPORAL_BINDING_CHANGED => {
            view::DashboardEvent::TEMPORAL_BINDING_CHANGED
        }
        other => return Err(JsValue::from_str(&format!("unknown event {other}"))),
    };
    with_dashboard(|d| {
        d.bus_mut().subscribe(name, move |event| {
            let payload = serde_json::to_string(&event.payload).unwrap_or_default();
            if let Err(err) = callback.call1(&JsValue::NULL, &JsValue::from_str(&payload)) {
                log_error(&format!("event subscriber threw: {err:?}"));
            }
        });
    })
}

/// Current persisted-state snapshot as JSON.
#[wasm_bindgen]
pub fn snapshot_json() -> Result<String, JsValue> {
    let snapshot = with_dashboard(|d| d.snapshot())?;
    serde_json::to_string(&snapshot).map_err(to_js_err)
}

#[wasm_bindgen]
pub fn active_time_layer() -> Result<Option<String>, JsValue> {
    with_dashboard(|d| {
        d.state()
            .temporal
            .binding()
            .active_layer
            .as_ref()
            .map(|l| l.to_string())
    })
}

#[wasm_bindgen]
pub fn allowed_options(control: &str) -> Result<Option<Vec<String>>, JsValue> {
    with_dashboard(|d| {
        let spec = d.registry().control(&control.into())?;
        let layers::ControlTarget::Criterion { criterion } = &spec.target else {
            return None;
        };
        d.state()
            .filters
            .allowed(criterion)
            .map(|set| set.iter().cloned().collect())
    })
}
