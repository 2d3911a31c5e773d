use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::data::{
    BuildMethod, Choices, Connectivity, Controller, Feature, Features, Firmware, FormFactor,
    SwitchType,
};

const BUILTIN_CATALOG: &str = include_str!("../data/assembly-steps.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyPhase {
    pub id: String,
    pub title: String,
    pub order: u32,
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub estimated_time: String,
    pub steps: Vec<AssemblyStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyStep {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub estimated_time: Option<String>,
    pub order: u32,
    pub content: String,
    #[serde(default)]
    pub requirements: Option<StepRequirements>,
    #[serde(default)]
    pub variations: Vec<StepVariation>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
    #[serde(default)]
    pub required_tools: Vec<String>,
    #[serde(default)]
    pub external_links: Vec<ExternalLink>,
    #[serde(default)]
    pub completion_criteria: Vec<String>,
}

/// Per-field allow-lists. `None` leaves the field unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepRequirements {
    pub build_method: Option<Vec<BuildMethod>>,
    pub layout: Option<LayoutRequirement>,
    pub controller: Option<Vec<Controller>>,
    pub firmware: Option<Vec<Firmware>>,
    pub connectivity: Option<Vec<Connectivity>>,
    pub switch_type: Option<Vec<SwitchType>>,
    /// Only `true` entries gate visibility.
    pub features: Option<BTreeMap<Feature, bool>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutRequirement {
    pub form_factor: Option<Vec<FormFactor>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepVariation {
    pub condition: BTreeMap<ChoicePath, Expected>,
    #[serde(default)]
    pub additional_content: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
}

/// Expected value of a condition path: one value, or any of several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expected {
    AnyOf(Vec<Value>),
    Exactly(Value),
}

impl Expected {
    fn matches(&self, actual: &Value) -> bool {
        match self {
            Expected::AnyOf(values) => values.iter().any(|v| same_value(v, actual)),
            Expected::Exactly(value) => same_value(value, actual),
        }
    }
}

/// JSON equality, except numbers compare by value (`60` equals `60.0`).
fn same_value(expected: &Value, actual: &Value) -> bool {
    match (expected.as_f64(), actual.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => expected == actual,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: LinkKind,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Article,
    Video,
    Tool,
    Docs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TroubleshootingIssue {
    pub id: String,
    pub symptom: String,
    pub possible_causes: Vec<String>,
    pub solutions: Vec<String>,
    #[serde(default)]
    pub related_steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Troubleshooting {
    #[serde(default)]
    pub common_issues: Vec<TroubleshootingIssue>,
}

/// The static assembly instructions: phases of steps plus troubleshooting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyCatalog {
    pub phases: Vec<AssemblyPhase>,
    #[serde(default)]
    pub troubleshooting: Troubleshooting,
}

impl AssemblyCatalog {
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG).context("Built-in assembly catalog is invalid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read assembly catalog: {:?}", path))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid assembly catalog: {:?}", path))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let catalog: AssemblyCatalog = serde_json::from_str(content)?;
        Ok(catalog)
    }
}

/// A choice field addressable from a variation condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChoicePath {
    BuildMethod,
    FormFactor,
    KeyCount,
    Controller,
    SwitchType,
    Connectivity,
    Firmware,
    Keycaps,
    Feature(Feature),
}

impl ChoicePath {
    /// Current value at this path, `null` when unset.
    pub fn resolve(&self, choices: &Choices) -> Value {
        fn id<T: std::fmt::Display>(value: Option<T>) -> Value {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        }

        match self {
            ChoicePath::BuildMethod => id(choices.build_method),
            ChoicePath::FormFactor => id(choices.layout.form_factor),
            ChoicePath::KeyCount => Value::from(choices.layout.key_count),
            ChoicePath::Controller => id(choices.controller),
            ChoicePath::SwitchType => id(choices.switch_type),
            ChoicePath::Connectivity => id(choices.connectivity),
            ChoicePath::Firmware => id(choices.firmware),
            ChoicePath::Keycaps => id(choices.keycaps.as_deref()),
            ChoicePath::Feature(feature) => Value::Bool(choices.features.get(*feature)),
        }
    }
}

impl std::str::FromStr for ChoicePath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let path = match s {
            "buildMethod" => ChoicePath::BuildMethod,
            "layout.formFactor" => ChoicePath::FormFactor,
            "layout.keyCount" => ChoicePath::KeyCount,
            "controller" => ChoicePath::Controller,
            "switchType" => ChoicePath::SwitchType,
            "connectivity" => ChoicePath::Connectivity,
            "firmware" => ChoicePath::Firmware,
            "keycaps" => ChoicePath::Keycaps,
            _ => match s.strip_prefix("features.") {
                Some(name) => ChoicePath::Feature(name.parse()?),
                None => anyhow::bail!("Unknown choice path: {}", s),
            },
        };
        Ok(path)
    }
}

impl TryFrom<String> for ChoicePath {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ChoicePath> for String {
    fn from(path: ChoicePath) -> Self {
        match path {
            ChoicePath::BuildMethod => "buildMethod".into(),
            ChoicePath::FormFactor => "layout.formFactor".into(),
            ChoicePath::KeyCount => "layout.keyCount".into(),
            ChoicePath::Controller => "controller".into(),
            ChoicePath::SwitchType => "switchType".into(),
            ChoicePath::Connectivity => "connectivity".into(),
            ChoicePath::Firmware => "firmware".into(),
            ChoicePath::Keycaps => "keycaps".into(),
            ChoicePath::Feature(feature) => format!("features.{}", feature),
        }
    }
}

/// Phases and steps that apply to this build, with variations applied.
/// Ordering is preserved; phases left without steps are dropped.
pub fn relevant_steps(choices: &Choices, phases: &[AssemblyPhase]) -> Vec<AssemblyPhase> {
    let filtered: Vec<AssemblyPhase> = phases
        .iter()
        .filter_map(|phase| {
            let steps: Vec<AssemblyStep> = phase
                .steps
                .iter()
                .filter(|step| is_step_relevant(step, choices))
                .map(|step| apply_step_variations(step, choices))
                .collect();

            if steps.is_empty() {
                return None;
            }
            Some(AssemblyPhase {
                id: phase.id.clone(),
                title: phase.title.clone(),
                order: phase.order,
                description: phase.description.clone(),
                icon: phase.icon.clone(),
                estimated_time: phase.estimated_time.clone(),
                steps,
            })
        })
        .collect();

    tracing::debug!(
        phases = filtered.len(),
        steps = total_steps(&filtered),
        "Filtered assembly plan"
    );
    filtered
}

fn allowed<T: PartialEq + Copy>(allow_list: &Option<Vec<T>>, value: Option<T>) -> bool {
    match allow_list {
        None => true,
        Some(list) => value.is_some_and(|v| list.contains(&v)),
    }
}

fn features_satisfied(required: &Option<BTreeMap<Feature, bool>>, features: &Features) -> bool {
    required.as_ref().map_or(true, |required| {
        required
            .iter()
            .all(|(feature, needed)| !needed || features.get(*feature))
    })
}

/// A step is shown when every constrained field is set and allowed.
pub fn is_step_relevant(step: &AssemblyStep, choices: &Choices) -> bool {
    let Some(req) = &step.requirements else {
        return true;
    };

    let form_factor_allowed = req
        .layout
        .as_ref()
        .map_or(true, |layout| allowed(&layout.form_factor, choices.layout.form_factor));

    allowed(&req.build_method, choices.build_method)
        && form_factor_allowed
        && allowed(&req.controller, choices.controller)
        && allowed(&req.firmware, choices.firmware)
        && allowed(&req.connectivity, choices.connectivity)
        && allowed(&req.switch_type, choices.switch_type)
        && features_satisfied(&req.features, &choices.features)
}

pub fn matches_condition(condition: &BTreeMap<ChoicePath, Expected>, choices: &Choices) -> bool {
    condition
        .iter()
        .all(|(path, expected)| expected.matches(&path.resolve(choices)))
}

/// Copy of `step` with every matching variation appended, in declared order.
pub fn apply_step_variations(step: &AssemblyStep, choices: &Choices) -> AssemblyStep {
    let mut enhanced = step.clone();

    for variation in &step.variations {
        if !matches_condition(&variation.condition, choices) {
            continue;
        }
        if let Some(extra) = &variation.additional_content {
            enhanced.content.push_str("\n\n");
            enhanced.content.push_str(extra);
        }
        enhanced.warnings.extend(variation.warnings.iter().cloned());
        enhanced.tips.extend(variation.tips.iter().cloned());
    }

    enhanced
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BuildHashInput<'a> {
    build_method: Option<BuildMethod>,
    layout: Option<FormFactor>,
    controller: Option<Controller>,
    firmware: Option<Firmware>,
    connectivity: Option<Connectivity>,
    features: &'a Features,
}

/// Fingerprint of the choices that decide which steps are shown.
pub fn build_hash(choices: &Choices) -> String {
    let input = BuildHashInput {
        build_method: choices.build_method,
        layout: choices.layout.form_factor,
        controller: choices.controller,
        firmware: choices.firmware,
        connectivity: choices.connectivity,
        features: &choices.features,
    };
    // Plain enums and bools always serialize
    serde_json::to_string(&input).unwrap_or_default()
}

pub fn total_steps(phases: &[AssemblyPhase]) -> usize {
    phases.iter().map(|phase| phase.steps.len()).sum()
}

pub fn estimated_total_time(phases: &[AssemblyPhase]) -> String {
    phases
        .iter()
        .map(|phase| phase.estimated_time.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn phase_by_id<'a>(phases: &'a [AssemblyPhase], phase_id: &str) -> Option<&'a AssemblyPhase> {
    phases.iter().find(|phase| phase.id == phase_id)
}

pub fn phase_step_ids(phases: &[AssemblyPhase], phase_id: &str) -> Vec<String> {
    phase_by_id(phases, phase_id)
        .map(|phase| phase.steps.iter().map(|step| step.id.clone()).collect())
        .unwrap_or_default()
}

/// Issues that are general or tied to at least one visible step.
pub fn relevant_troubleshooting<'a>(
    catalog: &'a AssemblyCatalog,
    phases: &[AssemblyPhase],
) -> Vec<&'a TroubleshootingIssue> {
    let visible: BTreeSet<&str> = phases
        .iter()
        .flat_map(|phase| phase.steps.iter().map(|step| step.id.as_str()))
        .collect();

    catalog
        .troubleshooting
        .common_issues
        .iter()
        .filter(|issue| {
            issue.related_steps.is_empty()
                || issue
                    .related_steps
                    .iter()
                    .any(|id| visible.contains(id.as_str()))
        })
        .collect()
}
