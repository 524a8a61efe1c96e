use std::collections::BTreeSet;
use std::sync::Arc;

use foundation::ids::{CriterionId, LayerId, ThemeId};
use foundation::time::{Time, TimeInterval, TimeSpan, TimeUnit};
use layers::index::OrgRecord;
use layers::query::CompoundPredicate;
use layers::{DashboardConfig, Registry};
use pretty_assertions::assert_eq;
use session::{InMemorySessionStore, SessionStore};
use view::persist::slot_for;
use view::temporal::TemporalMetadata;
use view::{ControlValue, Dashboard, RecordingSurface, StaticMetadata};

const YEAR: f64 = 365.2425 * 86_400.0;

fn registry() -> Arc<Registry> {
    Arc::new(Registry::from_config(DashboardConfig::beci()).unwrap())
}

fn years(a: f64, b: f64) -> TimeSpan {
    TimeSpan::new(Time((a - 1970.0) * YEAR), Time((b - 1970.0) * YEAR))
}

fn metadata() -> StaticMetadata {
    StaticMetadata::default()
        .with(
            "sstMonthly",
            TemporalMetadata {
                full_extent: years(1982.0, 2023.0),
                step: None,
            },
        )
        .with(
            "sstAnnual",
            TemporalMetadata {
                full_extent: years(1990.0, 2020.0),
                step: None,
            },
        )
        .with(
            "chlMonthly",
            TemporalMetadata {
                full_extent: years(1998.0, 2022.0),
                step: Some(TimeInterval::new(TimeUnit::Days, 8)),
            },
        )
}

fn dashboard(store: InMemorySessionStore) -> Dashboard<RecordingSurface, InMemorySessionStore> {
    Dashboard::new(registry(), RecordingSurface::new(), store)
}

fn radio(layer: &str) -> ControlValue {
    ControlValue::Radio(Some(LayerId::new(layer)))
}

#[test]
fn ocean_state_with_monthly_sst() {
    let meta = metadata();
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();

    let first = d.select_theme("ocean-state").unwrap().unwrap();
    assert_eq!(first.layer, LayerId::new("sstAnnual"));
    assert!(!d.surface().is_panel_visible("timePanel"));

    let second = d
        .on_control_change("oceanConditionRadio", radio("sstMonthly"))
        .unwrap()
        .unwrap();
    pollster::block_on(d.complete_bind(&meta, first));
    pollster::block_on(d.complete_bind(&meta, second));

    let s = d.surface();
    assert!(s.is_layer_visible("sstMonthly"));
    for sibling in ["sstAnnual", "chlMonthly", "chlAnnual"] {
        assert!(!s.is_layer_visible(sibling), "{sibling} should be hidden");
    }
    assert_eq!(s.window, Some(years(1982.0, 2023.0)));
    assert_eq!(s.extent, Some(years(1982.0, 2023.0)));
    assert_eq!(s.step, Some(TimeInterval::new(TimeUnit::Months, 1)));
    assert!(s.is_panel_visible("timePanel"));
    assert!(s.is_panel_visible("layerPanel"));
    assert_eq!(
        d.state().temporal.binding().active_layer,
        Some(LayerId::new("sstMonthly"))
    );
}

#[test]
fn rebinding_resets_a_narrowed_window() {
    let meta = metadata();
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    let t = d.select_theme("ocean-state").unwrap().unwrap();
    pollster::block_on(d.complete_bind(&meta, t));

    d.on_time_window_changed(years(2000.0, 2001.0));
    assert_eq!(d.surface().window, Some(years(2000.0, 2001.0)));

    let t = d
        .on_control_change("oceanConditionRadio", radio("chlMonthly"))
        .unwrap()
        .unwrap();
    pollster::block_on(d.complete_bind(&meta, t));
    assert_eq!(d.surface().window, Some(years(1998.0, 2022.0)));
    // Declared step wins over the monthly heuristic.
    assert_eq!(d.surface().step, Some(TimeInterval::new(TimeUnit::Days, 8)));
}

#[test]
fn window_outside_the_extent_is_clamped_or_reset() {
    let meta = metadata();
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    let t = d.select_theme("ocean-state").unwrap().unwrap();
    pollster::block_on(d.complete_bind(&meta, t));

    d.on_time_window_changed(years(1980.0, 1995.0));
    assert_eq!(d.surface().window, Some(years(1990.0, 1995.0)));
    d.on_time_window_changed(years(1900.0, 1950.0));
    assert_eq!(d.surface().window, Some(years(1990.0, 2020.0)));
}

#[test]
fn later_bind_wins_whatever_order_fetches_finish_in() {
    let meta = metadata();
    for reversed in [false, true] {
        let mut d = dashboard(InMemorySessionStore::new());
        d.start();
        let a = d.select_theme("ocean-state").unwrap().unwrap();
        let b = d
            .on_control_change("oceanConditionRadio", radio("sstMonthly"))
            .unwrap()
            .unwrap();
        let (first, second) = if reversed { (b, a) } else { (a, b) };
        pollster::block_on(d.complete_bind(&meta, first));
        pollster::block_on(d.complete_bind(&meta, second));

        assert_eq!(
            d.state().temporal.binding().active_layer,
            Some(LayerId::new("sstMonthly"))
        );
        assert_eq!(d.surface().window, Some(years(1982.0, 2023.0)));
    }
}

#[test]
fn leaving_a_time_aware_theme_clears_the_selector() {
    let meta = metadata();
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    let pending = d.select_theme("ocean-state").unwrap().unwrap();
    assert_eq!(d.select_theme("ecosystem").unwrap(), None);

    // The fetch started for ocean-state completes after the user moved on.
    pollster::block_on(d.complete_bind(&meta, pending));
    assert!(!d.state().temporal.is_bound());
    assert_eq!(d.surface().window, None);
    assert!(!d.surface().is_panel_visible("timePanel"));
    assert!(d.surface().is_layer_visible("lmeHealth"));
    assert!(!d.surface().is_layer_visible("sstAnnual"));
}

#[test]
fn unavailable_metadata_degrades_to_unbound() {
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    d.select_theme("ocean-state").unwrap();
    let t = d
        .on_control_change("oceanConditionRadio", radio("chlAnnual"))
        .unwrap()
        .unwrap();
    // No metadata registered for chlAnnual.
    pollster::block_on(d.complete_bind(&metadata(), t));
    assert!(!d.state().temporal.is_bound());
    assert!(!d.surface().is_panel_visible("timePanel"));
    assert!(d.surface().is_layer_visible("chlAnnual"));

    let stored = d.restore().unwrap();
    assert_eq!(stored.active_layer_id, None);
    assert_eq!(stored, d.snapshot());
}

#[test]
fn sub_theme_switch_rebinds_to_its_group() {
    let meta = metadata().with(
        "mhwMonthly",
        TemporalMetadata {
            full_extent: years(1982.0, 2022.0),
            step: None,
        },
    );
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    d.select_theme("ocean-state").unwrap();
    let t = d
        .select_sub_theme("ocean-state", "extreme-events")
        .unwrap()
        .unwrap();
    assert_eq!(t.layer, LayerId::new("mhwMonthly"));
    pollster::block_on(d.complete_bind(&meta, t));
    assert!(d.surface().is_layer_visible("mhwMonthly"));
    assert!(!d.surface().is_layer_visible("sstAnnual"));
    assert_eq!(d.surface().title.as_deref(), Some("Extreme Events"));

    // Re-selecting the parent tab keeps the sub-theme.
    assert_eq!(d.select_theme("ocean-state").unwrap(), None);
    assert_eq!(d.state().sub_theme, Some(ThemeId::new("extreme-events")));
}

fn orgs() -> Vec<OrgRecord> {
    vec![
        OrgRecord::new("OrgA")
            .with_field("species", "Salmon, Pollock")
            .with_field("members", "Canada, USA")
            .with_field("acronym", "NPAFC"),
        OrgRecord::new("OrgB")
            .with_field("species", "Tuna (Skipjack, Yellowfin)")
            .with_field("members", "Japan, Korea (Republic of)")
            .with_field("acronym", "WCPFC"),
        OrgRecord::new("OrgC")
            .with_field("species", "Salmon")
            .with_field("members", "Japan, Russia")
            .with_field("acronym", "NPFC"),
    ]
}

#[test]
fn salmon_narrows_member_nations() {
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    d.select_theme("governance").unwrap();
    assert!(d.load_entity_index(&orgs()).is_empty());
    assert_eq!(
        d.surface().predicates.get(&LayerId::new("rfmo")),
        Some(&CompoundPredicate::All)
    );

    d.on_control_change(
        "speciesFilter",
        ControlValue::Multiselect(["Salmon".to_string()].into()),
    )
    .unwrap();

    let members = d
        .state()
        .filters
        .allowed(&CriterionId::new("memberNation"))
        .unwrap()
        .clone();
    let expected: BTreeSet<String> = ["Canada", "Japan", "Russia", "USA"]
        .into_iter()
        .map(String::from)
        .collect();
    assert_eq!(members, expected);

    let rfmo = d.surface().predicates.get(&LayerId::new("rfmo")).unwrap();
    assert!(rfmo.to_where_clause().starts_with("(species = 'Salmon' OR "));
    assert!(orgs().iter().filter(|o| rfmo.matches(o)).count() == 2);
}

#[test]
fn selections_made_before_the_index_loads_are_validated_on_load() {
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    d.on_control_change(
        "memberFilter",
        ControlValue::Multiselect(["Atlantis".to_string(), "Japan".to_string()].into()),
    )
    .unwrap();
    d.load_entity_index(&orgs());
    let japan: BTreeSet<String> = ["Japan".to_string()].into();
    assert_eq!(
        d.state().filters.selected(&CriterionId::new("memberNation")),
        Some(&japan)
    );
}

#[test]
fn state_survives_a_reload() {
    let meta = metadata();
    let mut d = dashboard(InMemorySessionStore::new());
    d.start();
    d.select_theme("ocean-state").unwrap();
    let t = d
        .on_control_change("oceanConditionRadio", radio("chlMonthly"))
        .unwrap()
        .unwrap();
    pollster::block_on(d.complete_bind(&meta, t));
    d.on_control_change("eezToggle", ControlValue::Checkbox(false))
        .unwrap();
    d.on_control_change(
        "speciesFilter",
        ControlValue::Multiselect(["Salmon".to_string()].into()),
    )
    .unwrap();
    let before = d.snapshot();
    assert_eq!(before.active_layer_id, Some(LayerId::new("chlMonthly")));

    let mut reloaded = dashboard(d.store().clone());
    let ticket = reloaded.start().unwrap();
    assert_eq!(ticket.layer, LayerId::new("chlMonthly"));
    pollster::block_on(reloaded.complete_bind(&meta, ticket));
    assert_eq!(reloaded.snapshot(), before);
    assert!(reloaded.surface().is_layer_visible("chlMonthly"));
}

#[test]
fn malformed_snapshots_fall_back_to_defaults() {
    let r = registry();
    let key = slot_for(&r).key().to_string();

    let mut store = InMemorySessionStore::new();
    store.set(&key, "{\"activeThemeId\": ").unwrap();
    let mut d = dashboard(store);
    d.start();
    assert_eq!(d.state().theme, ThemeId::new("intro"));

    let mut store = InMemorySessionStore::new();
    store
        .set(
            &key,
            r#"{"activeThemeId":"weather","controlStates":[],"activeLayerId":null}"#,
        )
        .unwrap();
    let mut d = dashboard(store);
    assert_eq!(d.restore(), None);
    d.start();
    assert_eq!(d.state().theme, ThemeId::new("intro"));
    assert_eq!(d.snapshot().validate(&r), Ok(()));
}
