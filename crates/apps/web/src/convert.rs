//! JS-side shapes. Times cross the boundary as epoch milliseconds.

use foundation::ids::OrgId;
use foundation::time::{Time, TimeInterval, TimeSpan};
use layers::index::OrgRecord;
use serde::Deserialize;
use view::temporal::TemporalMetadata;
use wasm_bindgen::JsValue;

pub fn time_to_js_ms(t: Time) -> f64 {
    t.0 * 1000.0
}

pub fn js_ms_to_time(ms: f64) -> Time {
    Time(ms / 1000.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsTemporalMetadata {
    full_extent: [f64; 2],
    #[serde(default)]
    step: Option<TimeInterval>,
}

pub fn metadata_from_json(raw: &str) -> Option<TemporalMetadata> {
    let parsed: Option<JsTemporalMetadata> = serde_json::from_str(raw).ok()?;
    let meta = parsed?;
    if !meta.full_extent.iter().all(|v| v.is_finite()) {
        return None;
    }
    Some(TemporalMetadata {
        full_extent: TimeSpan::new(
            js_ms_to_time(meta.full_extent[0]),
            js_ms_to_time(meta.full_extent[1]),
        ),
        step: meta.step.filter(|s| s.value > 0),
    })
}

/// `null`, `undefined` and anything unparseable read as unavailable.
pub fn metadata_from_js(value: &JsValue) -> Option<TemporalMetadata> {
    if value.is_null() || value.is_undefined() {
        return None;
    }
    let raw = js_sys::JSON::stringify(value).ok()?.as_string()?;
    metadata_from_json(&raw)
}

/// Flattens feature attributes into an organization record.
///
/// Non-string scalars are stringified; nulls are treated as missing fields.
pub fn record_from_attributes(
    attributes: &serde_json::Map<String, serde_json::Value>,
    id_field: &str,
) -> Option<OrgRecord> {
    let org = attributes.get(id_field)?.as_str()?.trim();
    if org.is_empty() {
        return None;
    }
    let mut record = OrgRecord {
        org: OrgId::new(org),
        fields: Default::default(),
    };
    for (key, value) in attributes {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        record.fields.insert(key.clone(), text);
    }
    Some(record)
}
