//! Status workflow configuration: flows, per-tag flow selection, terminal
//! and emergency statuses, and the global validation toggles. Parsed from
//! YAML and compiled once into an immutable [`WorkflowIndex`] consulted by
//! [`engine`] on every transition.

pub mod engine;

pub use engine::{CascadeEvent, NextStatus, WorkflowEngine};

use crate::domain::{EntityType, Status};
use crate::error::{ConfigError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One entity kind's flow configuration, as it appears in the YAML document.
#[derive(Debug, Clone, Deserialize)]
pub struct KindConfig {
    /// Named flows; each a finite ordered sequence of statuses.
    pub flows: HashMap<String, Vec<String>>,
    /// The flow used when no `flow_mappings` entry matches.
    pub default_flow: String,
    /// Tag-set to flow selection rules, tried top-to-bottom.
    #[serde(default)]
    pub flow_mappings: Vec<FlowMapping>,
    /// Statuses reachable from any current status when `allow_emergency`.
    #[serde(default)]
    pub emergency_transitions: Vec<String>,
    /// Statuses from which no further transition is valid.
    #[serde(default)]
    pub terminal_statuses: Vec<String>,
}

/// One `flow_mappings` entry: if the entity's tags are a superset of `tags`,
/// `flow` is selected.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowMapping {
    /// Tags that must all be present on the entity.
    pub tags: Vec<String>,
    /// The flow to select.
    pub flow: String,
}

/// Global status-validation toggles.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusValidation {
    /// Reject transitions that skip an intermediate flow position.
    pub enforce_sequential: bool,
    /// Allow transitions to an earlier flow position.
    pub allow_backward: bool,
    /// Allow `emergency_transitions` regardless of flow position.
    pub allow_emergency: bool,
    /// Evaluate prerequisite predicates (child-state gates, summary gate).
    pub validate_prerequisites: bool,
}

/// Top-level `status_progression` + `status_validation` document.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Per-kind flow configuration.
    pub status_progression: StatusProgression,
    /// Global validation toggles.
    pub status_validation: StatusValidation,
}

/// The three entity kinds that carry a status workflow.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusProgression {
    /// Task flow configuration.
    pub tasks: KindConfig,
    /// Feature flow configuration.
    pub features: KindConfig,
    /// Project flow configuration.
    pub projects: KindConfig,
}

impl WorkflowConfig {
    /// Parse a workflow config document from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed YAML, or
    /// [`ConfigError::Invalid`] if a flow is empty, a `flow_mappings` entry
    /// names an unknown flow, or `default_flow` names an unknown flow.
    pub fn from_yaml_str(path: &str, yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and parse a workflow config file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or the same
    /// errors as [`WorkflowConfig::from_yaml_str`] on invalid content.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&path_ref.display().to_string(), &contents)
    }

    fn validate(&self) -> Result<()> {
        for (label, kind) in [
            ("tasks", &self.status_progression.tasks),
            ("features", &self.status_progression.features),
            ("projects", &self.status_progression.projects),
        ] {
            validate_kind(label, kind)?;
        }
        Ok(())
    }
}

fn validate_kind(label: &str, kind: &KindConfig) -> Result<()> {
    if !kind.flows.contains_key(&kind.default_flow) {
        return Err(ConfigError::Invalid(format!(
            "{label}: default_flow '{}' is not one of the declared flows",
            kind.default_flow
        ))
        .into());
    }
    for flow in kind.flows.values() {
        if flow.is_empty() {
            return Err(ConfigError::Invalid(format!("{label}: a flow is empty")).into());
        }
    }
    for mapping in &kind.flow_mappings {
        if !kind.flows.contains_key(&mapping.flow) {
            return Err(ConfigError::Invalid(format!(
                "{label}: flow_mappings entry names unknown flow '{}'",
                mapping.flow
            ))
            .into());
        }
    }
    Ok(())
}

/// Compiled per-kind flow data: position lookups and status sets, built once
/// from a [`KindConfig`] so the engine never re-parses configuration on the
/// hot path.
#[derive(Debug, Clone)]
pub struct CompiledKind {
    flows: HashMap<String, Vec<Status>>,
    default_flow: String,
    flow_mappings: Vec<(Vec<String>, String)>,
    emergency_transitions: Vec<Status>,
    terminal_statuses: Vec<Status>,
}

impl CompiledKind {
    fn compile(config: &KindConfig) -> Self {
        Self {
            flows: config
                .flows
                .iter()
                .map(|(name, statuses)| {
                    (
                        name.clone(),
                        statuses.iter().map(|s| Status::new(s.clone())).collect(),
                    )
                })
                .collect(),
            default_flow: config.default_flow.clone(),
            flow_mappings: config
                .flow_mappings
                .iter()
                .map(|m| (m.tags.clone(), m.flow.clone()))
                .collect(),
            emergency_transitions: config
                .emergency_transitions
                .iter()
                .map(|s| Status::new(s.clone()))
                .collect(),
            terminal_statuses: config
                .terminal_statuses
                .iter()
                .map(|s| Status::new(s.clone()))
                .collect(),
        }
    }

    /// Select the active flow name for an entity carrying `tags`, per the
    /// "first matching `flow_mappings` entry, top-to-bottom" rule.
    #[must_use]
    pub fn select_flow(&self, tags: &crate::domain::Tags) -> &str {
        for (required, flow) in &self.flow_mappings {
            if tags.contains_all(required) {
                return flow;
            }
        }
        &self.default_flow
    }

    /// The `flow_mappings` tag set that selected the active flow for
    /// `tags`, if any (as opposed to falling through to `default_flow`).
    #[must_use]
    pub fn matched_mapping_tags(&self, tags: &crate::domain::Tags) -> Option<Vec<String>> {
        self.flow_mappings
            .iter()
            .find(|(required, _)| tags.contains_all(required))
            .map(|(required, _)| required.clone())
    }

    /// The ordered status sequence for `flow_name`, or the default flow's if
    /// the name is unrecognized.
    #[must_use]
    pub fn flow_sequence(&self, flow_name: &str) -> &[Status] {
        self.flows
            .get(flow_name)
            .or_else(|| self.flows.get(&self.default_flow))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub(crate) fn is_terminal(&self, status: &Status) -> bool {
        self.terminal_statuses.contains(status)
    }

    #[must_use]
    pub(crate) fn terminal_statuses(&self) -> &[Status] {
        &self.terminal_statuses
    }

    #[must_use]
    pub(crate) fn is_emergency(&self, status: &Status) -> bool {
        self.emergency_transitions.contains(status)
    }
}

/// Compiled, immutable snapshot of a full [`WorkflowConfig`], swapped
/// atomically behind `Arc` on reload.
#[derive(Debug, Clone)]
pub struct WorkflowIndex {
    tasks: CompiledKind,
    features: CompiledKind,
    projects: CompiledKind,
    validation: StatusValidation,
}

impl WorkflowIndex {
    /// Compile a parsed [`WorkflowConfig`] into an index.
    #[must_use]
    pub fn compile(config: &WorkflowConfig) -> Self {
        Self {
            tasks: CompiledKind::compile(&config.status_progression.tasks),
            features: CompiledKind::compile(&config.status_progression.features),
            projects: CompiledKind::compile(&config.status_progression.projects),
            validation: config.status_validation,
        }
    }

    pub(crate) fn kind(&self, entity_type: EntityType) -> &CompiledKind {
        match entity_type {
            EntityType::Task => &self.tasks,
            EntityType::Feature => &self.features,
            EntityType::Project | EntityType::Template => &self.projects,
        }
    }

    pub(crate) fn validation(&self) -> StatusValidation {
        self.validation
    }

    /// A permissive default index (sequential `backlog -> in-progress ->
    /// completed` flow for every kind, `allow_emergency` only), used by
    /// tests and as a fallback when no config file is supplied.
    #[must_use]
    pub fn permissive_default() -> Self {
        let kind = CompiledKind {
            flows: HashMap::from([(
                "default".to_string(),
                vec![
                    Status::new("backlog"),
                    Status::new("in-progress"),
                    Status::new("completed"),
                ],
            )]),
            default_flow: "default".to_string(),
            flow_mappings: Vec::new(),
            emergency_transitions: vec![Status::new("cancelled"), Status::new("blocked")],
            terminal_statuses: vec![Status::new("completed"), Status::new("cancelled")],
        };
        Self {
            tasks: kind.clone(),
            features: kind.clone(),
            projects: kind,
            validation: StatusValidation {
                enforce_sequential: true,
                allow_backward: false,
                allow_emergency: true,
                validate_prerequisites: true,
            },
        }
    }
}
