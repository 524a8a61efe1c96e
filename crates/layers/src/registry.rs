//! Static registry of every layer, panel, control, theme and filter criterion.
//!
//! The registry is built once from a [`DashboardConfig`], validated, and is
//! read-only afterwards. All maps are sorted so iteration (and therefore the
//! order of rendering-surface calls) is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use foundation::ids::{ControlId, CriterionId, GroupId, LayerId, PanelId, ThemeId};
use foundation::time::{TimeInterval, TimeUnit};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layer::{LayerKind, LayerRole, LayerSpec};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate {kind} id `{id}`")]
    Duplicate { kind: &'static str, id: String },
    #[error("{context} references unknown {kind} `{id}`")]
    Unknown {
        kind: &'static str,
        id: String,
        context: String,
    },
    #[error("exclusive group `{0}` has no members")]
    EmptyGroup(GroupId),
    #[error("layer `{layer}` belongs to both `{first}` and `{second}`")]
    LayerInTwoGroups {
        layer: LayerId,
        first: GroupId,
        second: GroupId,
    },
    #[error("default member `{layer}` is not part of group `{group}`")]
    DefaultNotInGroup { group: GroupId, layer: LayerId },
    #[error("group `{0}` has no radio control")]
    MissingRadio(GroupId),
    #[error("{target} is bound to more than one control")]
    SharedTarget { target: String },
    #[error("checkbox `{control}` targets layer `{layer}` which belongs to an exclusive group")]
    CheckboxOnGroupedLayer { control: ControlId, layer: LayerId },
    #[error("theme `{theme}` toggles layer `{layer}` which has no checkbox")]
    MissingCheckbox { theme: ThemeId, layer: LayerId },
    #[error("theme `{theme}` uses `{layer}` as time layer but it is not time-aware")]
    NotTimeAware { theme: ThemeId, layer: LayerId },
    #[error("invalid dashboard config: {0}")]
    Json(String),
}

/// How a theme treats one layer. Layers a theme does not mention are hidden.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilityRule {
    /// Visible while the theme is active. Exclusive-group members are only
    /// visible while they are the group's selected member.
    Shown,
    /// Visible while the theme is active and the layer's checkbox is checked.
    Toggle,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Checkbox,
    Radio,
    Multiselect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlTarget {
    /// Checkbox overlay toggle.
    Layer { layer: LayerId },
    /// Radio set choosing one member of an exclusive group.
    Group { group: GroupId },
    /// Multi-select filter.
    Criterion { criterion: CriterionId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSpec {
    pub id: ControlId,
    #[serde(default)]
    pub label: String,
    pub target: ControlTarget,
}

impl ControlSpec {
    pub fn kind(&self) -> ControlKind {
        match self.target {
            ControlTarget::Layer { .. } => ControlKind::Checkbox,
            ControlTarget::Group { .. } => ControlKind::Radio,
            ControlTarget::Criterion { .. } => ControlKind::Multiselect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: GroupId,
    pub members: Vec<LayerId>,
    #[serde(default)]
    pub default_member: Option<LayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionSpec {
    pub id: CriterionId,
    #[serde(default)]
    pub label: String,
    /// Field of the organization dataset holding this criterion's values.
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubThemeSpec {
    pub id: ThemeId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub panels: BTreeSet<PanelId>,
    /// Overrides the parent's flag when set.
    #[serde(default)]
    pub time_aware: Option<bool>,
    #[serde(default)]
    pub time_group: Option<GroupId>,
    #[serde(default)]
    pub default_time_layer: Option<LayerId>,
    #[serde(default)]
    pub layers: BTreeMap<LayerId, VisibilityRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeSpec {
    pub id: ThemeId,
    pub title: String,
    /// Opaque markup shown in the theme description area.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub panels: BTreeSet<PanelId>,
    #[serde(default)]
    pub time_aware: bool,
    /// Exclusive group whose selected member drives the time selector.
    #[serde(default)]
    pub time_group: Option<GroupId>,
    /// Selected in `time_group` on entry when the group has no selection.
    #[serde(default)]
    pub default_time_layer: Option<LayerId>,
    #[serde(default)]
    pub layers: BTreeMap<LayerId, VisibilityRule>,
    #[serde(default)]
    pub sub_themes: Vec<SubThemeSpec>,
    #[serde(default)]
    pub default_sub_theme: Option<ThemeId>,
}

/// Fallback step interval per layer role, used when metadata declares none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepHeuristics(pub BTreeMap<LayerRole, TimeInterval>);

impl StepHeuristics {
    pub fn step_for(&self, role: LayerRole) -> Option<TimeInterval> {
        self.0.get(&role).copied()
    }
}

impl Default for StepHeuristics {
    fn default() -> Self {
        Self(BTreeMap::from([
            (LayerRole::Daily, TimeInterval::new(TimeUnit::Days, 1)),
            (LayerRole::Monthly, TimeInterval::new(TimeUnit::Months, 1)),
            (LayerRole::Annual, TimeInterval::new(TimeUnit::Years, 1)),
        ]))
    }
}

fn default_storage_prefix() -> String {
    "beci.dashboard.state".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_storage_prefix")]
    pub storage_key_prefix: String,
    pub default_theme: ThemeId,
    /// Panel shown only while a time-aware layer is bound.
    #[serde(default)]
    pub time_panel: Option<PanelId>,
    #[serde(default)]
    pub panels: Vec<PanelId>,
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
    #[serde(default)]
    pub criteria: Vec<CriterionSpec>,
    /// Tab order.
    pub themes: Vec<ThemeSpec>,
    #[serde(default)]
    pub step_heuristics: StepHeuristics,
}

/// Theme policy with a sub-theme (if any) folded over its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectivePolicy<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub panels: BTreeSet<&'a PanelId>,
    pub time_aware: bool,
    pub time_group: Option<&'a GroupId>,
    pub default_time_layer: Option<&'a LayerId>,
    pub layers: BTreeMap<&'a LayerId, VisibilityRule>,
}

impl EffectivePolicy<'_> {
    pub fn rule(&self, layer: &LayerId) -> Option<VisibilityRule> {
        self.layers.get(layer).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    config: DashboardConfig,
    layers: BTreeMap<LayerId, LayerSpec>,
    panels: BTreeSet<PanelId>,
    groups: BTreeMap<GroupId, GroupSpec>,
    layer_group: BTreeMap<LayerId, GroupId>,
    controls: BTreeMap<ControlId, ControlSpec>,
    layer_checkbox: BTreeMap<LayerId, ControlId>,
    group_radio: BTreeMap<GroupId, ControlId>,
    criterion_control: BTreeMap<CriterionId, ControlId>,
    criteria: Vec<CriterionSpec>,
    themes: BTreeMap<ThemeId, ThemeSpec>,
}

impl Registry {
    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let config = serde_json::from_str::<DashboardConfig>(raw)
            .map_err(|e| RegistryError::Json(e.to_string()))?;
        Self::from_config(config)
    }

    pub fn from_config(config: DashboardConfig) -> Result<Self, RegistryError> {
        let mut layers = BTreeMap::new();
        for l in &config.layers {
            if layers.insert(l.id.clone(), l.clone()).is_some() {
                return Err(duplicate("layer", l.id.as_str()));
            }
        }

        let mut panels = BTreeSet::new();
        for p in &config.panels {
            if !panels.insert(p.clone()) {
                return Err(duplicate("panel", p.as_str()));
            }
        }
        if let Some(p) = &config.time_panel {
            require(panels.contains(p), "panel", p.as_str(), "time_panel")?;
        }

        let mut criteria_ids = BTreeSet::new();
        for c in &config.criteria {
            if !criteria_ids.insert(c.id.clone()) {
                return Err(duplicate("criterion", c.id.as_str()));
            }
        }
        for l in layers.values() {
            for criterion in l.filter_fields.keys() {
                let ctx = format!("layer `{}`", l.id);
                require(
                    criteria_ids.contains(criterion),
                    "criterion",
                    criterion.as_str(),
                    &ctx,
                )?;
            }
        }

        let mut groups = BTreeMap::new();
        let mut layer_group: BTreeMap<LayerId, GroupId> = BTreeMap::new();
        for g in &config.groups {
            if g.members.is_empty() {
                return Err(RegistryError::EmptyGroup(g.id.clone()));
            }
            for m in &g.members {
                let ctx = format!("group `{}`", g.id);
                require(layers.contains_key(m), "layer", m.as_str(), &ctx)?;
                if let Some(first) = layer_group.insert(m.clone(), g.id.clone()) {
                    return Err(RegistryError::LayerInTwoGroups {
                        layer: m.clone(),
                        first,
                        second: g.id.clone(),
                    });
                }
            }
            if let Some(d) = &g.default_member
                && !g.members.contains(d)
            {
                return Err(RegistryError::DefaultNotInGroup {
                    group: g.id.clone(),
                    layer: d.clone(),
                });
            }
            if groups.insert(g.id.clone(), g.clone()).is_some() {
                return Err(duplicate("group", g.id.as_str()));
            }
        }

        let mut controls = BTreeMap::new();
        let mut layer_checkbox = BTreeMap::new();
        let mut group_radio = BTreeMap::new();
        let mut criterion_control = BTreeMap::new();
        for c in &config.controls {
            let ctx = format!("control `{}`", c.id);
            let taken = match &c.target {
                ControlTarget::Layer { layer } => {
                    require(layers.contains_key(layer), "layer", layer.as_str(), &ctx)?;
                    if layer_group.contains_key(layer) {
                        return Err(RegistryError::CheckboxOnGroupedLayer {
                            control: c.id.clone(),
                            layer: layer.clone(),
                        });
                    }
                    layer_checkbox.insert(layer.clone(), c.id.clone()).is_some()
                }
                ControlTarget::Group { group } => {
                    require(groups.contains_key(group), "group", group.as_str(), &ctx)?;
                    group_radio.insert(group.clone(), c.id.clone()).is_some()
                }
                ControlTarget::Criterion { criterion } => {
                    require(
                        criteria_ids.contains(criterion),
                        "criterion",
                        criterion.as_str(),
                        &ctx,
                    )?;
                    criterion_control
                        .insert(criterion.clone(), c.id.clone())
                        .is_some()
                }
            };
            if taken {
                return Err(RegistryError::SharedTarget {
                    target: format!("{:?}", c.target),
                });
            }
            if controls.insert(c.id.clone(), c.clone()).is_some() {
                return Err(duplicate("control", c.id.as_str()));
            }
        }
        for g in groups.keys() {
            if !group_radio.contains_key(g) {
                return Err(RegistryError::MissingRadio(g.clone()));
            }
        }

        let mut themes = BTreeMap::new();
        let mut theme_ids = BTreeSet::new();
        for t in &config.themes {
            if !theme_ids.insert(t.id.clone()) {
                return Err(duplicate("theme", t.id.as_str()));
            }
            for s in &t.sub_themes {
                if !theme_ids.insert(s.id.clone()) {
                    return Err(duplicate("theme", s.id.as_str()));
                }
            }
            validate_theme(t, &layers, &panels, &groups, &layer_checkbox)?;
            themes.insert(t.id.clone(), t.clone());
        }
        require(
            themes.contains_key(&config.default_theme),
            "theme",
            config.default_theme.as_str(),
            "default_theme",
        )?;

        let criteria = config.criteria.clone();
        Ok(Self {
            config,
            layers,
            panels,
            groups,
            layer_group,
            controls,
            layer_checkbox,
            group_radio,
            criterion_control,
            criteria,
            themes,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn default_theme(&self) -> &ThemeId {
        &self.config.default_theme
    }

    pub fn time_panel(&self) -> Option<&PanelId> {
        self.config.time_panel.as_ref()
    }

    pub fn heuristics(&self) -> &StepHeuristics {
        &self.config.step_heuristics
    }

    pub fn layer(&self, id: &LayerId) -> Option<&LayerSpec> {
        self.layers.get(id)
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerSpec> + '_ {
        self.layers.values()
    }

    pub fn panels(&self) -> impl Iterator<Item = &PanelId> + '_ {
        self.panels.iter()
    }

    pub fn group(&self, id: &GroupId) -> Option<&GroupSpec> {
        self.groups.get(id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupSpec> + '_ {
        self.groups.values()
    }

    pub fn group_of(&self, layer: &LayerId) -> Option<&GroupId> {
        self.layer_group.get(layer)
    }

    pub fn control(&self, id: &ControlId) -> Option<&ControlSpec> {
        self.controls.get(id)
    }

    pub fn controls(&self) -> impl Iterator<Item = &ControlSpec> + '_ {
        self.controls.values()
    }

    pub fn checkbox_for(&self, layer: &LayerId) -> Option<&ControlId> {
        self.layer_checkbox.get(layer)
    }

    pub fn radio_for(&self, group: &GroupId) -> Option<&ControlId> {
        self.group_radio.get(group)
    }

    pub fn control_for_criterion(&self, criterion: &CriterionId) -> Option<&ControlId> {
        self.criterion_control.get(criterion)
    }

    /// Criteria in declaration order.
    pub fn criteria(&self) -> &[CriterionSpec] {
        &self.criteria
    }

    pub fn theme(&self, id: &ThemeId) -> Option<&ThemeSpec> {
        self.themes.get(id)
    }

    /// Themes in tab order.
    pub fn themes(&self) -> impl Iterator<Item = &ThemeSpec> + '_ {
        self.config.themes.iter()
    }

    pub fn sub_theme(&self, parent: &ThemeId, sub: &ThemeId) -> Option<&SubThemeSpec> {
        self.themes
            .get(parent)?
            .sub_themes
            .iter()
            .find(|s| &s.id == sub)
    }

    /// Folds `sub` (when given) over `theme`.
    ///
    /// Returns `None` if either id is unknown or `sub` is not nested under `theme`.
    pub fn effective_policy(
        &self,
        theme: &ThemeId,
        sub: Option<&ThemeId>,
    ) -> Option<EffectivePolicy<'_>> {
        let t = self.themes.get(theme)?;
        let mut policy = EffectivePolicy {
            title: &t.title,
            content: &t.content,
            panels: t.panels.iter().collect(),
            time_aware: t.time_aware,
            time_group: t.time_group.as_ref(),
            default_time_layer: t.default_time_layer.as_ref(),
            layers: t.layers.iter().map(|(k, v)| (k, *v)).collect(),
        };

        if let Some(sub) = sub {
            let s = self.sub_theme(theme, sub)?;
            policy.title = &s.title;
            if !s.content.is_empty() {
                policy.content = &s.content;
            }
            policy.panels.extend(s.panels.iter());
            if let Some(flag) = s.time_aware {
                policy.time_aware = flag;
            }
            if s.time_group.is_some() {
                policy.time_group = s.time_group.as_ref();
                policy.default_time_layer = s.default_time_layer.as_ref();
            }
            for (k, v) in &s.layers {
                policy.layers.insert(k, *v);
            }
        }

        Some(policy)
    }
}

fn duplicate(kind: &'static str, id: &str) -> RegistryError {
    RegistryError::Duplicate {
        kind,
        id: id.to_string(),
    }
}

fn require(ok: bool, kind: &'static str, id: &str, context: &str) -> Result<(), RegistryError> {
    if ok {
        return Ok(());
    }
    Err(RegistryError::Unknown {
        kind,
        id: id.to_string(),
        context: context.to_string(),
    })
}

fn validate_theme(
    t: &ThemeSpec,
    layers: &BTreeMap<LayerId, LayerSpec>,
    panels: &BTreeSet<PanelId>,
    groups: &BTreeMap<GroupId, GroupSpec>,
    layer_checkbox: &BTreeMap<LayerId, ControlId>,
) -> Result<(), RegistryError> {
    struct Part<'a> {
        id: &'a ThemeId,
        panels: &'a BTreeSet<PanelId>,
        time_group: Option<&'a GroupId>,
        default_time_layer: Option<&'a LayerId>,
        layers: &'a BTreeMap<LayerId, VisibilityRule>,
    }

    let mut parts = vec![Part {
        id: &t.id,
        panels: &t.panels,
        time_group: t.time_group.as_ref(),
        default_time_layer: t.default_time_layer.as_ref(),
        layers: &t.layers,
    }];
    for s in &t.sub_themes {
        parts.push(Part {
            id: &s.id,
            panels: &s.panels,
            time_group: s.time_group.as_ref(),
            default_time_layer: s.default_time_layer.as_ref(),
            layers: &s.layers,
        });
    }

    for part in parts {
        let ctx = format!("theme `{}`", part.id);
        for p in part.panels {
            require(panels.contains(p), "panel", p.as_str(), &ctx)?;
        }
        for (layer, rule) in part.layers {
            require(layers.contains_key(layer), "layer", layer.as_str(), &ctx)?;
            let grouped = groups.values().any(|g| g.members.contains(layer));
            if *rule == VisibilityRule::Toggle && !grouped && !layer_checkbox.contains_key(layer) {
                return Err(RegistryError::MissingCheckbox {
                    theme: part.id.clone(),
                    layer: layer.clone(),
                });
            }
        }
        if let Some(g) = part.time_group {
            let group = groups.get(g).ok_or_else(|| RegistryError::Unknown {
                kind: "group",
                id: g.to_string(),
                context: ctx.clone(),
            })?;
            for m in &group.members {
                if !layers[m].is_time_aware() {
                    return Err(RegistryError::NotTimeAware {
                        theme: part.id.clone(),
                        layer: m.clone(),
                    });
                }
            }
            if let Some(d) = part.default_time_layer
                && !group.members.contains(d)
            {
                return Err(RegistryError::DefaultNotInGroup {
                    group: g.clone(),
                    layer: d.clone(),
                });
            }
        } else if let Some(d) = part.default_time_layer {
            return Err(RegistryError::Unknown {
                kind: "time group",
                id: d.to_string(),
                context: ctx,
            });
        }
    }

    if let Some(d) = &t.default_sub_theme
        && !t.sub_themes.iter().any(|s| &s.id == d)
    {
        return Err(RegistryError::Unknown {
            kind: "sub-theme",
            id: d.to_string(),
            context: format!("theme `{}`", t.id),
        });
    }
    Ok(())
}

impl DashboardConfig {
    /// Built-in layout of the BECI dashboard.
    pub fn beci() -> Self {
        let time_aware = LayerKind::TimeAware {
            declared_step: None,
        };
        let layers = vec![
            LayerSpec::new("sstMonthly", "SST (Monthly)", LayerRole::Monthly, time_aware)
                .with_source("8c551d176e0e48ddaec623545f4899f2"),
            LayerSpec::new("sstAnnual", "SST (Annual)", LayerRole::Annual, time_aware)
                .with_source("91743c7b6f354494acc8c822e2a40df6")
                .visible_by_default(),
            LayerSpec::new(
                "chlMonthly",
                "Chlorophyll-a (Monthly)",
                LayerRole::Monthly,
                time_aware,
            )
            .with_source("908f4c3f5dd24035b72ef6b0a3551855"),
            LayerSpec::new(
                "chlAnnual",
                "Chlorophyll-a (Annual)",
                LayerRole::Annual,
                time_aware,
            ),
            LayerSpec::new(
                "mhwMonthly",
                "Marine Heatwaves (Monthly)",
                LayerRole::Monthly,
                time_aware,
            )
            .with_source("3eb9dc4649204d0498760ead24c58afc"),
            LayerSpec::new(
                "lmeHealth",
                "LME Health",
                LayerRole::Boundary,
                LayerKind::Static,
            )
            .with_source("3ca4c0dfea2c4212b15c4dba53eb4189")
            .visible_by_default(),
            LayerSpec::new(
                "lmeBoundaries",
                "Large Marine Ecosystems",
                LayerRole::Boundary,
                LayerKind::Static,
            )
            .with_source("21a5a136aa154717a4f77b819dff91c7")
            .visible_by_default(),
            LayerSpec::new(
                "eez",
                "Exclusive Economic Zones",
                LayerRole::Boundary,
                LayerKind::Static,
            )
            .with_source("b8b8751d007d4425bc80368505a74f06")
            .visible_by_default(),
            LayerSpec::new("rfmo", "RFMOs", LayerRole::Organization, LayerKind::Static)
                .with_source("b7a44afd535344368d66f884bc06ecec")
                .visible_by_default()
                .with_filter_field("species", "species")
                .with_filter_field("memberNation", "members")
                .with_filter_field("organization", "acronym"),
            LayerSpec::new(
                "impactMap",
                "Fisheries Impacts",
                LayerRole::Boundary,
                LayerKind::Static,
            )
            .with_source("5a820135359e42ac9fe107e3043e5a33")
            .visible_by_default(),
            LayerSpec::new(
                "stockStatus",
                "Stock Status",
                LayerRole::Marker,
                LayerKind::Static,
            )
            .with_source("7ac11d00696c4760bd80666254ca2c6f")
            .visible_by_default()
            .with_filter_field("species", "species")
            .with_filter_field("organization", "rfmo"),
            LayerSpec::new(
                "speciesCollection",
                "Species Distributions",
                LayerRole::Marker,
                LayerKind::Static,
            )
            .with_source("f97d35b2f30c4c1fb29df6c7df9030d5")
            .with_filter_field("species", "common_name"),
        ];

        let groups = vec![
            GroupSpec {
                id: GroupId::new("oceanConditions"),
                members: ["sstMonthly", "sstAnnual", "chlMonthly", "chlAnnual"]
                    .into_iter()
                    .map(LayerId::new)
                    .collect(),
                default_member: Some(LayerId::new("sstAnnual")),
            },
            GroupSpec {
                id: GroupId::new("extremeEvents"),
                members: vec![LayerId::new("mhwMonthly")],
                default_member: Some(LayerId::new("mhwMonthly")),
            },
        ];

        let checkbox = |id: &str, layer: &str, label: &str| ControlSpec {
            id: ControlId::new(id),
            label: label.to_string(),
            target: ControlTarget::Layer {
                layer: LayerId::new(layer),
            },
        };
        let controls = vec![
            ControlSpec {
                id: ControlId::new("oceanConditionRadio"),
                label: "Ocean condition".to_string(),
                target: ControlTarget::Group {
                    group: GroupId::new("oceanConditions"),
                },
            },
            ControlSpec {
                id: ControlId::new("extremeEventRadio"),
                label: "Extreme event".to_string(),
                target: ControlTarget::Group {
                    group: GroupId::new("extremeEvents"),
                },
            },
            checkbox("lmeHealthToggle", "lmeHealth", "LME health"),
            checkbox("lmeToggle", "lmeBoundaries", "LME boundaries"),
            checkbox("eezToggle", "eez", "EEZ boundaries"),
            checkbox("rfmoToggle", "rfmo", "RFMO areas"),
            checkbox("impactToggle", "impactMap", "Fisheries impacts"),
            checkbox("stockToggle", "stockStatus", "Stock status"),
            checkbox("speciesToggle", "speciesCollection", "Species distributions"),
            ControlSpec {
                id: ControlId::new("speciesFilter"),
                label: "Species".to_string(),
                target: ControlTarget::Criterion {
                    criterion: CriterionId::new("species"),
                },
            },
            ControlSpec {
                id: ControlId::new("memberFilter"),
                label: "Member nation".to_string(),
                target: ControlTarget::Criterion {
                    criterion: CriterionId::new("memberNation"),
                },
            },
            ControlSpec {
                id: ControlId::new("orgFilter"),
                label: "Organization".to_string(),
                target: ControlTarget::Criterion {
                    criterion: CriterionId::new("organization"),
                },
            },
        ];

        let criteria = vec![
            CriterionSpec {
                id: CriterionId::new("species"),
                label: "Species".to_string(),
                field: "species".to_string(),
            },
            CriterionSpec {
                id: CriterionId::new("memberNation"),
                label: "Member nation".to_string(),
                field: "members".to_string(),
            },
            CriterionSpec {
                id: CriterionId::new("organization"),
                label: "Organization".to_string(),
                field: "acronym".to_string(),
            },
        ];

        let panels = |ids: &[&str]| {
            ids.iter()
                .map(|p| PanelId::new(*p))
                .collect::<BTreeSet<_>>()
        };
        let rules = |pairs: &[(&str, VisibilityRule)]| {
            pairs
                .iter()
                .map(|(l, r)| (LayerId::new(*l), *r))
                .collect::<BTreeMap<_, _>>()
        };
        use VisibilityRule::{Shown, Toggle};

        let themes = vec![
            ThemeSpec {
                id: ThemeId::new("intro"),
                title: "Introduction".to_string(),
                content: "<p>The Basin Events to Coastal Impacts (BECI) dashboard aggregates \
                          ocean and fisheries intelligence to support decision makers.</p>"
                    .to_string(),
                panels: BTreeSet::new(),
                time_aware: false,
                time_group: None,
                default_time_layer: None,
                layers: BTreeMap::new(),
                sub_themes: Vec::new(),
                default_sub_theme: None,
            },
            ThemeSpec {
                id: ThemeId::new("ocean-state"),
                title: "Ocean State".to_string(),
                content: "<p>Toggle monthly and annual ocean conditions and use the time \
                          slider.</p>"
                    .to_string(),
                panels: panels(&["layerPanel"]),
                time_aware: true,
                time_group: None,
                default_time_layer: None,
                layers: BTreeMap::new(),
                sub_themes: vec![
                    SubThemeSpec {
                        id: ThemeId::new("ocean"),
                        title: "Ocean Conditions".to_string(),
                        content: String::new(),
                        panels: BTreeSet::new(),
                        time_aware: None,
                        time_group: Some(GroupId::new("oceanConditions")),
                        default_time_layer: Some(LayerId::new("sstAnnual")),
                        layers: rules(&[
                            ("sstMonthly", Shown),
                            ("sstAnnual", Shown),
                            ("chlMonthly", Shown),
                            ("chlAnnual", Shown),
                        ]),
                    },
                    SubThemeSpec {
                        id: ThemeId::new("extreme-events"),
                        title: "Extreme Events".to_string(),
                        content: "<p>Marine heatwave occurrence by month.</p>".to_string(),
                        panels: BTreeSet::new(),
                        time_aware: None,
                        time_group: Some(GroupId::new("extremeEvents")),
                        default_time_layer: Some(LayerId::new("mhwMonthly")),
                        layers: rules(&[("mhwMonthly", Shown)]),
                    },
                ],
                default_sub_theme: Some(ThemeId::new("ocean")),
            },
            ThemeSpec {
                id: ThemeId::new("ecosystem"),
                title: "Ecosystem Status".to_string(),
                content: "<p>Health status of Large Marine Ecosystems.</p>".to_string(),
                panels: panels(&["layerPanel", "legendPanel"]),
                time_aware: false,
                time_group: None,
                default_time_layer: None,
                layers: rules(&[("lmeHealth", Toggle), ("lmeBoundaries", Toggle)]),
                sub_themes: Vec::new(),
                default_sub_theme: None,
            },
            ThemeSpec {
                id: ThemeId::new("governance"),
                title: "Management Jurisdictions".to_string(),
                content: "<p>Maritime boundaries, EEZs and regional fisheries management \
                          organizations.</p>"
                    .to_string(),
                panels: panels(&["layerPanel", "filterPanel"]),
                time_aware: false,
                time_group: None,
                default_time_layer: None,
                layers: rules(&[("eez", Toggle), ("rfmo", Toggle)]),
                sub_themes: Vec::new(),
                default_sub_theme: None,
            },
            ThemeSpec {
                id: ThemeId::new("fish"),
                title: "Fish Impacts".to_string(),
                content: "<p>Stock assessments and fisheries impacts.</p>".to_string(),
                panels: panels(&["layerPanel", "filterPanel", "legendPanel"]),
                time_aware: false,
                time_group: None,
                default_time_layer: None,
                layers: rules(&[
                    ("impactMap", Toggle),
                    ("stockStatus", Toggle),
                    ("speciesCollection", Toggle),
                ]),
                sub_themes: Vec::new(),
                default_sub_theme: None,
            },
        ];

        Self {
            storage_key_prefix: default_storage_prefix(),
            default_theme: ThemeId::new("intro"),
            time_panel: Some(PanelId::new("timePanel")),
            panels: ["layerPanel", "timePanel", "filterPanel", "legendPanel"]
                .into_iter()
                .map(PanelId::new)
                .collect(),
            layers,
            groups,
            controls,
            criteria,
            themes,
            step_heuristics: StepHeuristics::default(),
        }
    }
}
