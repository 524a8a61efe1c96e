//! Pure state transitions.
//!
//! [`reduce`] never touches the page. It returns the next [`AppState`] plus
//! the ordered list of [`Effect`]s that bring the rendering surface, the
//! event bus and session storage in line with it.

use std::collections::BTreeSet;

use foundation::ids::{ControlId, GroupId, LayerId, PanelId, ThemeId};
use foundation::time::{TimeInterval, TimeSpan};
use layers::filter::FilterChange;
use layers::index::EntityIndex;
use layers::query::CompoundPredicate;
use layers::{ControlKind, ControlTarget, Registry};
use thiserror::Error;
use tracing::debug;

use crate::event::DashboardEvent;
use crate::state::{AppState, ControlValue};
use crate::temporal::{BindOutcome, BindTicket, TemporalMetadata};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectTheme(ThemeId),
    SelectSubTheme(ThemeId, ThemeId),
    ControlChanged(ControlId, ControlValue),
    TimeWindowChanged(TimeSpan),
    MetadataResolved(BindTicket, Option<TemporalMetadata>),
    /// The entity index in [`Context`] just became available.
    EntityIndexLoaded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    SetLayerVisible(LayerId, bool),
    SetPanelVisible(PanelId, bool),
    ShowThemeContent { title: String, content: String },
    SetActiveTab(ThemeId),
    ApplyFilter(LayerId, CompoundPredicate),
    /// Fetch metadata for the ticket's layer and dispatch `MetadataResolved`.
    BindTime(BindTicket),
    BindTemporalExtent {
        extent: TimeSpan,
        step: Option<TimeInterval>,
    },
    ClearTime,
    SetTimeWindow(TimeSpan),
    Persist,
    Emit(DashboardEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: AppState,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("unknown theme `{0}`")]
    UnknownTheme(ThemeId),
    #[error("unknown sub-theme `{sub}` of theme `{parent}`")]
    UnknownSubTheme { parent: ThemeId, sub: ThemeId },
    #[error("unknown control `{0}`")]
    UnknownControl(ControlId),
    #[error("control `{control}` expects a {expected:?} value")]
    InvalidControlValue {
        control: ControlId,
        expected: ControlKind,
    },
    #[error("`{layer}` is not a member of the group behind `{control}`")]
    NotInGroup { control: ControlId, layer: LayerId },
    #[error("entity index is not loaded")]
    IndexNotLoaded,
}

/// Read-only inputs of a transition.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub registry: &'a Registry,
    pub index: Option<&'a EntityIndex>,
}

impl<'a> Context<'a> {
    pub fn new(registry: &'a Registry, index: Option<&'a EntityIndex>) -> Self {
        Self { registry, index }
    }
}

pub fn reduce(ctx: &Context<'_>, state: &AppState, action: Action) -> Result<Transition, ControllerError> {
    let mut next = state.clone();
    let mut effects = Vec::new();

    match action {
        Action::SelectTheme(theme) => {
            let spec = ctx
                .registry
                .theme(&theme)
                .ok_or_else(|| ControllerError::UnknownTheme(theme.clone()))?;
            // Re-selecting the active tab keeps its sub-theme.
            let sub = if state.theme == theme && state.sub_theme.is_some() {
                state.sub_theme.clone()
            } else {
                spec.default_sub_theme.clone()
            };
            enter_theme(ctx, &mut next, &mut effects, theme, sub);
        }
        Action::SelectSubTheme(parent, sub) => {
            if ctx.registry.theme(&parent).is_none() {
                return Err(ControllerError::UnknownTheme(parent));
            }
            if ctx.registry.sub_theme(&parent, &sub).is_none() {
                return Err(ControllerError::UnknownSubTheme { parent, sub });
            }
            enter_theme(ctx, &mut next, &mut effects, parent, Some(sub));
        }
        Action::ControlChanged(control, value) => {
            control_changed(ctx, &mut next, &mut effects, control, value)?;
        }
        Action::TimeWindowChanged(window) => match next.temporal.set_window(window) {
            Some(applied) => {
                effects.push(Effect::SetTimeWindow(applied));
                effects.push(Effect::Emit(DashboardEvent::TimeWindowChanged {
                    window: Some(applied),
                }));
            }
            None => debug!("time window changed while no layer is bound; ignored"),
        },
        Action::MetadataResolved(ticket, metadata) => {
            let fallback = fallback_step(ctx.registry, &ticket.layer);
            match next.temporal.resolve(&ticket, metadata, fallback) {
                BindOutcome::Bound(binding) => {
                    if let Some(extent) = binding.full_extent {
                        effects.push(Effect::BindTemporalExtent {
                            extent,
                            step: binding.step,
                        });
                        effects.push(Effect::SetTimeWindow(extent));
                    }
                    set_time_panel(ctx.registry, &mut next, &mut effects, true);
                    effects.push(Effect::Emit(DashboardEvent::TemporalBindingChanged {
                        layer: binding.active_layer.clone(),
                    }));
                    effects.push(Effect::Emit(DashboardEvent::TimeWindowChanged {
                        window: binding.window,
                    }));
                    effects.push(Effect::Persist);
                }
                BindOutcome::Unavailable => {
                    effects.push(Effect::ClearTime);
                    set_time_panel(ctx.registry, &mut next, &mut effects, false);
                    effects.push(Effect::Emit(DashboardEvent::TemporalBindingChanged {
                        layer: None,
                    }));
                    effects.push(Effect::Persist);
                }
                BindOutcome::Stale => {}
            }
        }
        Action::EntityIndexLoaded => {
            let index = ctx.index.ok_or(ControllerError::IndexNotLoaded)?;
            let change = next.filters.refresh(index);
            announce_dropped(ctx.registry, &next, &mut effects, &change);
            apply_filters(ctx.registry, &next, &mut effects);
            effects.push(Effect::Persist);
        }
    }

    Ok(Transition {
        state: next,
        effects,
    })
}

fn enter_theme(
    ctx: &Context<'_>,
    next: &mut AppState,
    effects: &mut Vec<Effect>,
    theme: ThemeId,
    sub: Option<ThemeId>,
) {
    next.theme = theme;
    next.sub_theme = sub;
    let registry = ctx.registry;
    let Some(policy) = registry.effective_policy(&next.theme, next.sub_theme.as_ref()) else {
        return;
    };

    effects.push(Effect::SetActiveTab(next.theme.clone()));
    effects.push(Effect::ShowThemeContent {
        title: policy.title.to_string(),
        content: policy.content.to_string(),
    });

    if policy.time_aware
        && let Some(group) = policy.time_group
        && let Some(default) = policy.default_time_layer
        && let Some(radio) = registry.radio_for(group)
        && matches!(next.controls.get(radio), None | Some(ControlValue::Radio(None)))
    {
        debug!(group = %group, layer = %default, "selecting default time layer");
        next.controls
            .insert(radio.clone(), ControlValue::Radio(Some(default.clone())));
    }

    next.visible_layers = BTreeSet::new();
    for layer in registry.layers() {
        let visible = next.target_visibility(registry, &policy, &layer.id);
        if visible {
            next.visible_layers.insert(layer.id.clone());
        }
        effects.push(Effect::SetLayerVisible(layer.id.clone(), visible));
    }

    next.visible_panels = BTreeSet::new();
    for panel in registry.panels() {
        if Some(panel) == registry.time_panel() {
            continue;
        }
        let visible = policy.panels.contains(panel);
        if visible {
            next.visible_panels.insert(panel.clone());
        }
        effects.push(Effect::SetPanelVisible(panel.clone(), visible));
    }

    apply_filters(registry, next, effects);

    let target = active_time_layer(ctx.registry, next, policy.time_aware, policy.time_group);
    rebind(ctx.registry, next, effects, target, false);

    effects.push(Effect::Emit(DashboardEvent::ThemeChanged {
        theme: next.theme.clone(),
        sub_theme: next.sub_theme.clone(),
    }));
    effects.push(Effect::Persist);
}

fn control_changed(
    ctx: &Context<'_>,
    next: &mut AppState,
    effects: &mut Vec<Effect>,
    control: ControlId,
    value: ControlValue,
) -> Result<(), ControllerError> {
    let registry = ctx.registry;
    let spec = registry
        .control(&control)
        .ok_or_else(|| ControllerError::UnknownControl(control.clone()))?;
    let invalid = || ControllerError::InvalidControlValue {
        control: control.clone(),
        expected: spec.kind(),
    };

    match (&spec.target, value) {
        (ControlTarget::Layer { layer }, value @ ControlValue::Checkbox(_)) => {
            next.controls.insert(control.clone(), value);
            set_layers(ctx, next, effects, std::slice::from_ref(layer));
        }
        (ControlTarget::Group { group }, ControlValue::Radio(selected)) => {
            let members = registry.group(group).map(|g| g.members.as_slice()).unwrap_or_default();
            if let Some(layer) = &selected
                && !members.contains(layer)
            {
                return Err(ControllerError::NotInGroup {
                    control: control.clone(),
                    layer: layer.clone(),
                });
            }
            next.controls
                .insert(control.clone(), ControlValue::Radio(selected));
            set_layers(ctx, next, effects, members);

            let policy = registry.effective_policy(&next.theme, next.sub_theme.as_ref());
            if let Some(policy) = policy
                && policy.time_aware
                && policy.time_group == Some(group)
            {
                let target = active_time_layer(registry, next, true, Some(group));
                rebind(registry, next, effects, target, true);
            }
        }
        (ControlTarget::Criterion { criterion }, ControlValue::Multiselect(values)) => {
            let change = next
                .filters
                .set_selection(ctx.index, criterion, values)
                .ok_or_else(invalid)?;
            announce_dropped(registry, next, effects, &change);
            apply_filters(registry, next, effects);
        }
        _ => return Err(invalid()),
    }

    if let Some(value) = next.control_value(registry, &control) {
        effects.push(Effect::Emit(DashboardEvent::ControlChanged { control, value }));
    }
    effects.push(Effect::Persist);
    Ok(())
}

/// Re-derives visibility of `layers` under the current theme.
fn set_layers(ctx: &Context<'_>, next: &mut AppState, effects: &mut Vec<Effect>, layers: &[LayerId]) {
    let registry = ctx.registry;
    let Some(policy) = registry.effective_policy(&next.theme, next.sub_theme.as_ref()) else {
        return;
    };
    for layer in layers {
        let visible = next.target_visibility(registry, &policy, layer);
        if visible {
            next.visible_layers.insert(layer.clone());
        } else {
            next.visible_layers.remove(layer);
        }
        effects.push(Effect::SetLayerVisible(layer.clone(), visible));
    }
}

/// Selected, visible member of the theme's time group.
fn active_time_layer(
    registry: &Registry,
    state: &AppState,
    time_aware: bool,
    time_group: Option<&GroupId>,
) -> Option<LayerId> {
    if !time_aware {
        return None;
    }
    let radio = registry.radio_for(time_group?)?;
    match state.controls.get(radio) {
        Some(ControlValue::Radio(Some(layer))) if state.visible_layers.contains(layer) => {
            Some(layer.clone())
        }
        _ => None,
    }
}

/// Points the binder at `target`.
///
/// Unless `force` is set, a binder already bound (or binding) to `target`
/// is left alone.
fn rebind(
    registry: &Registry,
    next: &mut AppState,
    effects: &mut Vec<Effect>,
    target: Option<LayerId>,
    force: bool,
) {
    match target {
        Some(layer) => {
            if !force && next.temporal.target_layer() == Some(&layer) {
                let bound = next.temporal.is_bound();
                set_time_panel(registry, next, effects, bound);
                return;
            }
            let ticket = next.temporal.begin(layer);
            effects.push(Effect::ClearTime);
            set_time_panel(registry, next, effects, false);
            effects.push(Effect::BindTime(ticket));
        }
        None => {
            if next.temporal.clear() {
                effects.push(Effect::ClearTime);
                effects.push(Effect::Emit(DashboardEvent::TemporalBindingChanged {
                    layer: None,
                }));
                effects.push(Effect::Emit(DashboardEvent::TimeWindowChanged {
                    window: None,
                }));
            }
            set_time_panel(registry, next, effects, false);
        }
    }
}

fn set_time_panel(registry: &Registry, next: &mut AppState, effects: &mut Vec<Effect>, visible: bool) {
    let Some(panel) = registry.time_panel() else {
        return;
    };
    if visible {
        next.visible_panels.insert(panel.clone());
    } else {
        next.visible_panels.remove(panel);
    }
    effects.push(Effect::SetPanelVisible(panel.clone(), visible));
}

fn apply_filters(registry: &Registry, next: &AppState, effects: &mut Vec<Effect>) {
    for layer in registry.layers().filter(|l| l.is_org_scoped()) {
        effects.push(Effect::ApplyFilter(
            layer.id.clone(),
            next.filters.predicate_for(layer),
        ));
    }
}

fn announce_dropped(registry: &Registry, next: &AppState, effects: &mut Vec<Effect>, change: &FilterChange) {
    for criterion in change.dropped.keys() {
        let Some(control) = registry.control_for_criterion(criterion) else {
            continue;
        };
        if let Some(selected) = next.filters.selected(criterion) {
            effects.push(Effect::Emit(DashboardEvent::ControlChanged {
                control: control.clone(),
                value: ControlValue::Multiselect(selected.clone()),
            }));
        }
    }
}

/// Step used when a layer's metadata declares none: the layer's declared
/// step first, then the role heuristic.
pub fn fallback_step(registry: &Registry, layer: &LayerId) -> Option<TimeInterval> {
    let spec = registry.layer(layer)?;
    match spec.kind {
        layers::LayerKind::TimeAware {
            declared_step: Some(step),
        } => Some(step),
        _ => registry.heuristics().step_for(spec.role),
    }
}
