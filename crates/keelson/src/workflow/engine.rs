//! Transition validation, next-status recommendation, and cascade-event
//! derivation over a compiled [`WorkflowIndex`].
//!
//! The engine never touches the store directly: callers that already know
//! an entity's current status/tags, and (for prerequisite checks) its
//! children's statuses, pass that in via [`PrerequisiteContext`]. This keeps
//! the engine a pure, easily testable function set, mirroring the same
//! "caller supplies the predicate/context" shape used by
//! [`crate::store::IsTerminal`].

use crate::domain::{EntityType, Status, Tags};
use crate::error::WorkflowError;
use crate::id::EntityId;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::WorkflowIndex;

/// Context needed to evaluate step 7 (prerequisite predicates) of transition
/// validation. Gathered by the caller, since it requires store queries the
/// engine itself does not perform.
#[derive(Debug, Clone, Default)]
pub enum PrerequisiteContext {
    /// No prerequisite predicate applies to this entity kind/transition.
    #[default]
    None,
    /// Task reaching a terminal status: the summary-length gate and whether
    /// any upstream BLOCKS dependency remains unresolved.
    Task {
        /// Whether the task's summary is in the required length range.
        summary_ok: bool,
        /// Human-readable descriptions of unresolved upstream blockers.
        blockers: Vec<String>,
    },
    /// Feature entering `in-development` or a terminal status.
    Feature {
        /// Whether the feature has at least one child task.
        has_children: bool,
        /// Whether every child task is in a terminal status.
        all_children_terminal: bool,
    },
}

/// Outcome of [`WorkflowEngine::next_status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NextStatus {
    /// A next status is available and its prerequisites (if any) are met.
    Ready {
        /// The recommended next status.
        recommended_status: Status,
        /// The full active flow sequence.
        flow_sequence: Vec<Status>,
        /// Position of the current status within the sequence.
        position: usize,
        /// Tags that selected this flow via `flow_mappings`, if any.
        matched_tags: Vec<String>,
        /// Human-readable justification.
        reason: String,
    },
    /// A next status exists but its prerequisites are unmet.
    Blocked {
        /// The entity's current status.
        current_status: Status,
        /// Human-readable descriptions of each unmet prerequisite.
        blockers: Vec<String>,
        /// The full active flow sequence.
        flow_sequence: Vec<Status>,
        /// Position of the current status within the sequence.
        position: usize,
    },
    /// The entity is already in a terminal status.
    Terminal {
        /// The terminal status.
        terminal_status: Status,
        /// Human-readable justification.
        reason: String,
    },
}

/// A suggested follow-on status change to a related entity, emitted after a
/// successful status write. `automatic` only hints; the caller decides
/// whether to apply it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeEvent {
    /// Short event name, e.g. `"feature-ready-for-development"`.
    pub event: String,
    /// The kind of entity the suggestion targets.
    pub target_type: EntityType,
    /// The id of the entity the suggestion targets.
    pub target_id: EntityId,
    /// That entity's current status.
    pub current_status: Status,
    /// The status suggested for it.
    pub suggested_status: Status,
    /// Whether this suggestion is safe to auto-apply.
    pub automatic: bool,
    /// Human-readable justification.
    pub reason: String,
    /// The active flow name the suggestion was derived from.
    pub flow: String,
}

/// Holds a hot-swappable compiled workflow snapshot. Reads take a read
/// lock; reloads replace the whole `Arc` under a write lock, so in-flight
/// reads observe a consistent snapshot throughout.
pub struct WorkflowEngine {
    index: RwLock<Arc<WorkflowIndex>>,
}

impl WorkflowEngine {
    /// Build an engine from an already-compiled index.
    #[must_use]
    pub fn new(index: WorkflowIndex) -> Self {
        Self {
            index: RwLock::new(Arc::new(index)),
        }
    }

    /// Atomically replace the compiled snapshot, e.g. after a config reload.
    pub async fn reload(&self, index: WorkflowIndex) {
        *self.index.write().await = Arc::new(index);
    }

    async fn snapshot(&self) -> Arc<WorkflowIndex> {
        self.index.read().await.clone()
    }

    /// Whether `status` is terminal for `entity_type` under the active
    /// configuration. Used by callers (e.g. the export pipeline) that only
    /// need a terminal-status check, not the full transition machinery.
    pub async fn is_terminal(&self, entity_type: EntityType, status: &Status) -> bool {
        self.snapshot().await.kind(entity_type).is_terminal(status)
    }

    /// Snapshot of `entity_type`'s terminal statuses, for callers (the
    /// dependency graph, the export pipeline's batch/blocker queries) that
    /// need a synchronous [`crate::store::IsTerminal`] predicate rather than
    /// an async check per status.
    pub async fn terminal_statuses(&self, entity_type: EntityType) -> Vec<Status> {
        self.snapshot().await.kind(entity_type).terminal_statuses().to_vec()
    }

    /// The first status of the active flow selected by `tags`, used to seed
    /// a newly created entity. Falls back to `"backlog"` if the active flow
    /// is empty (a misconfigured flow that validation should have rejected).
    pub async fn initial_status(&self, entity_type: EntityType, tags: &Tags) -> Status {
        let snapshot = self.snapshot().await;
        let kind = snapshot.kind(entity_type);
        let flow_name = kind.select_flow(tags);
        kind.flow_sequence(flow_name)
            .first()
            .cloned()
            .unwrap_or_else(|| Status::new("backlog"))
    }

    /// Run the full 7-step transition validation for `current -> proposed`.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`WorkflowError`] variant per the
    /// documented step order.
    pub async fn validate_transition(
        &self,
        entity_type: EntityType,
        tags: &Tags,
        current: &Status,
        proposed: &Status,
        ctx: &PrerequisiteContext,
    ) -> std::result::Result<(), WorkflowError> {
        let snapshot = self.snapshot().await;
        let kind = snapshot.kind(entity_type);
        let validation = snapshot.validation();
        let flow_name = kind.select_flow(tags);
        let sequence = kind.flow_sequence(flow_name);

        // Step 1: terminal destination always proceeds to prerequisite check.
        if kind.is_terminal(proposed) {
            return check_prerequisites(entity_type, proposed, ctx);
        }
        // Step 2: emergency transition bypasses flow-position checks.
        if kind.is_emergency(proposed) && validation.allow_emergency {
            return Ok(());
        }
        // Step 3: a terminal current status accepts nothing further (steps
        // 1-2 already gave emergency/terminal destinations a chance).
        if kind.is_terminal(current) {
            return Err(WorkflowError::Terminal {
                status: current.to_string(),
            });
        }
        // Step 4: both statuses must appear in the active flow.
        let current_pos = sequence.iter().position(|s| s == current);
        let proposed_pos = sequence.iter().position(|s| s == proposed);
        let (current_pos, proposed_pos) = match (current_pos, proposed_pos) {
            (Some(c), Some(p)) => (c, p),
            _ => {
                let missing = if current_pos.is_none() { current } else { proposed };
                return Err(WorkflowError::NotInFlow {
                    status: missing.to_string(),
                });
            }
        };
        // Step 5: backward transitions need explicit permission.
        if proposed_pos < current_pos && !validation.allow_backward {
            return Err(WorkflowError::BackwardBlocked {
                from: current.to_string(),
                to: proposed.to_string(),
            });
        }
        // Step 6: sequential flows forbid skipping an intermediate status.
        if proposed_pos > current_pos + 1 && validation.enforce_sequential {
            return Err(WorkflowError::SkipBlocked {
                from: current.to_string(),
                to: proposed.to_string(),
                expected: sequence[current_pos + 1].to_string(),
            });
        }
        // Step 7: prerequisite predicates.
        if validation.validate_prerequisites {
            check_prerequisites(entity_type, proposed, ctx)
        } else {
            Ok(())
        }
    }

    /// Compute the next-status recommendation for an entity currently at
    /// `current`, given its `tags` (for flow selection) and prerequisite
    /// `ctx` for the candidate next status.
    pub async fn next_status(
        &self,
        entity_type: EntityType,
        tags: &Tags,
        current: &Status,
        ctx: &PrerequisiteContext,
    ) -> NextStatus {
        let snapshot = self.snapshot().await;
        let kind = snapshot.kind(entity_type);
        let flow_name = kind.select_flow(tags);
        let sequence = kind.flow_sequence(flow_name).to_vec();
        let matched_tags = matched_flow_tags(kind, tags);

        if kind.is_terminal(current) {
            return NextStatus::Terminal {
                terminal_status: current.clone(),
                reason: "entity is already in a terminal status".to_string(),
            };
        }

        let Some(position) = sequence.iter().position(|s| s == current) else {
            return NextStatus::Blocked {
                current_status: current.clone(),
                blockers: vec!["current status is not recognized in the active flow".to_string()],
                flow_sequence: sequence,
                position: 0,
            };
        };

        let Some(recommended) = sequence.get(position + 1).cloned() else {
            return NextStatus::Terminal {
                terminal_status: current.clone(),
                reason: "no further status in the active flow".to_string(),
            };
        };

        match check_prerequisites(entity_type, &recommended, ctx) {
            Ok(()) => NextStatus::Ready {
                recommended_status: recommended,
                flow_sequence: sequence,
                position,
                matched_tags,
                reason: "prerequisites satisfied for the next flow status".to_string(),
            },
            Err(WorkflowError::PrerequisitesNotMet { blockers }) => NextStatus::Blocked {
                current_status: current.clone(),
                blockers,
                flow_sequence: sequence,
                position,
            },
            Err(_) => NextStatus::Blocked {
                current_status: current.clone(),
                blockers: vec!["prerequisites could not be evaluated".to_string()],
                flow_sequence: sequence,
                position,
            },
        }
    }

    /// Cascade suggestion for a task leaving backlog/pending, per spec:
    /// "Task enters a non-backlog state from backlog/pending -> suggest
    /// Feature in-development if Feature is in planning or draft."
    pub async fn task_left_backlog_cascade(
        &self,
        old_task_status: &Status,
        new_task_status: &Status,
        feature_id: EntityId,
        feature_status: &Status,
        feature_tags: &Tags,
    ) -> Option<CascadeEvent> {
        if !is_backlog_like(old_task_status) || is_backlog_like(new_task_status) {
            return None;
        }
        if !is_planning_like(feature_status) {
            return None;
        }
        let snapshot = self.snapshot().await;
        let kind = snapshot.kind(EntityType::Feature);
        let flow_name = kind.select_flow(feature_tags).to_string();
        let sequence = kind.flow_sequence(&flow_name);
        let suggested = sequence
            .iter()
            .find(|s| normalize(s.as_str()) == "indevelopment")
            .cloned()
            .unwrap_or_else(|| Status::new("in-development"));
        Some(CascadeEvent {
            event: "feature-ready-for-development".to_string(),
            target_type: EntityType::Feature,
            target_id: feature_id,
            current_status: feature_status.clone(),
            suggested_status: suggested,
            automatic: false,
            reason: "a child task left backlog while the feature is still in planning".to_string(),
            flow: flow_name,
        })
    }

    /// Cascade suggestion once every task in a feature reaches a terminal
    /// status: suggest the feature's own next terminal-adjacent status.
    pub async fn feature_tasks_all_terminal_cascade(
        &self,
        feature_id: EntityId,
        feature_status: &Status,
        feature_tags: &Tags,
        all_tasks_terminal: bool,
    ) -> Option<CascadeEvent> {
        if !all_tasks_terminal {
            return None;
        }
        let snapshot = self.snapshot().await;
        let kind = snapshot.kind(EntityType::Feature);
        if kind.is_terminal(feature_status) {
            return None;
        }
        let flow_name = kind.select_flow(feature_tags).to_string();
        let sequence = kind.flow_sequence(&flow_name);
        let suggested = sequence
            .iter()
            .find(|s| {
                let n = normalize(s.as_str());
                n == "testing" || n == "completed"
            })
            .cloned()?;
        Some(CascadeEvent {
            event: "feature-tasks-complete".to_string(),
            target_type: EntityType::Feature,
            target_id: feature_id,
            current_status: feature_status.clone(),
            suggested_status: suggested,
            automatic: false,
            reason: "every child task has reached a terminal status".to_string(),
            flow: flow_name,
        })
    }

    /// Cascade suggestion once every feature in a project reaches a
    /// terminal status: suggest the project's completed status.
    pub async fn project_features_all_terminal_cascade(
        &self,
        project_id: EntityId,
        project_status: &Status,
        project_tags: &Tags,
        all_features_terminal: bool,
    ) -> Option<CascadeEvent> {
        if !all_features_terminal {
            return None;
        }
        let snapshot = self.snapshot().await;
        let kind = snapshot.kind(EntityType::Project);
        if kind.is_terminal(project_status) {
            return None;
        }
        let flow_name = kind.select_flow(project_tags).to_string();
        let sequence = kind.flow_sequence(&flow_name);
        let suggested = sequence
            .iter()
            .find(|s| kind.is_terminal(s))
            .cloned()?;
        Some(CascadeEvent {
            event: "project-features-complete".to_string(),
            target_type: EntityType::Project,
            target_id: project_id,
            current_status: project_status.clone(),
            suggested_status: suggested,
            automatic: false,
            reason: "every feature has reached a terminal status".to_string(),
            flow: flow_name,
        })
    }
}

fn matched_flow_tags(kind: &super::CompiledKind, tags: &Tags) -> Vec<String> {
    kind.matched_mapping_tags(tags).unwrap_or_default()
}

fn check_prerequisites(
    entity_type: EntityType,
    proposed: &Status,
    ctx: &PrerequisiteContext,
) -> std::result::Result<(), WorkflowError> {
    match (entity_type, ctx) {
        (EntityType::Task, PrerequisiteContext::Task { summary_ok, blockers }) => {
            let mut problems = blockers.clone();
            if !summary_ok {
                problems.push(
                    "summary must be between 300 and 500 characters to complete".to_string(),
                );
            }
            if problems.is_empty() {
                Ok(())
            } else {
                Err(WorkflowError::PrerequisitesNotMet { blockers: problems })
            }
        }
        (EntityType::Feature, PrerequisiteContext::Feature { has_children, all_children_terminal }) => {
            let normalized = normalize(proposed.as_str());
            if normalized == "indevelopment" && !has_children {
                return Err(WorkflowError::PrerequisitesNotMet {
                    blockers: vec!["feature has no child tasks".to_string()],
                });
            }
            if normalized == "completed" && !all_children_terminal {
                return Err(WorkflowError::PrerequisitesNotMet {
                    blockers: vec!["not all child tasks are in a terminal status".to_string()],
                });
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn normalize(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_lowercase()
}

fn is_backlog_like(status: &Status) -> bool {
    matches!(normalize(status.as_str()).as_str(), "backlog" | "pending")
}

fn is_planning_like(status: &Status) -> bool {
    matches!(normalize(status.as_str()).as_str(), "planning" | "draft")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::WorkflowConfig;

    const SAMPLE: &str = r"
status_progression:
  tasks:
    default_flow: standard
    flows:
      standard: [backlog, in-progress, completed]
    terminal_statuses: [completed]
    emergency_transitions: [cancelled]
  features:
    default_flow: standard
    flows:
      standard: [planning, in-development, testing, completed]
    terminal_statuses: [completed]
  projects:
    default_flow: standard
    flows:
      standard: [planning, active, completed]
    terminal_statuses: [completed]
status_validation:
  enforce_sequential: true
  allow_backward: false
  allow_emergency: true
  validate_prerequisites: true
";

    fn engine() -> WorkflowEngine {
        let config = WorkflowConfig::from_yaml_str("t.yaml", SAMPLE).unwrap();
        WorkflowEngine::new(WorkflowIndex::compile(&config))
    }

    #[tokio::test]
    async fn sequential_forward_transition_succeeds() {
        let engine = engine();
        let tags = Tags::new();
        let result = engine
            .validate_transition(
                EntityType::Task,
                &tags,
                &Status::new("backlog"),
                &Status::new("in-progress"),
                &PrerequisiteContext::None,
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn skip_ahead_is_blocked_when_sequential() {
        let engine = engine();
        let tags = Tags::new();
        let result = engine
            .validate_transition(
                EntityType::Task,
                &tags,
                &Status::new("backlog"),
                &Status::new("completed"),
                &PrerequisiteContext::Task {
                    summary_ok: true,
                    blockers: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::SkipBlocked { .. })));
    }

    #[tokio::test]
    async fn backward_transition_blocked_by_default() {
        let engine = engine();
        let tags = Tags::new();
        let result = engine
            .validate_transition(
                EntityType::Task,
                &tags,
                &Status::new("in-progress"),
                &Status::new("backlog"),
                &PrerequisiteContext::None,
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::BackwardBlocked { .. })));
    }

    #[tokio::test]
    async fn terminal_current_status_rejects_further_transitions() {
        let engine = engine();
        let tags = Tags::new();
        let result = engine
            .validate_transition(
                EntityType::Task,
                &tags,
                &Status::new("completed"),
                &Status::new("in-progress"),
                &PrerequisiteContext::None,
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::Terminal { .. })));
    }

    #[tokio::test]
    async fn emergency_transition_bypasses_flow_position() {
        let engine = engine();
        let tags = Tags::new();
        let result = engine
            .validate_transition(
                EntityType::Task,
                &tags,
                &Status::new("backlog"),
                &Status::new("cancelled"),
                &PrerequisiteContext::None,
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn task_completion_requires_summary_gate() {
        let engine = engine();
        let tags = Tags::new();
        let result = engine
            .validate_transition(
                EntityType::Task,
                &tags,
                &Status::new("in-progress"),
                &Status::new("completed"),
                &PrerequisiteContext::Task {
                    summary_ok: false,
                    blockers: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::PrerequisitesNotMet { .. })));
    }

    #[tokio::test]
    async fn feature_in_development_requires_children() {
        let engine = engine();
        let tags = Tags::new();
        let result = engine
            .validate_transition(
                EntityType::Feature,
                &tags,
                &Status::new("planning"),
                &Status::new("in-development"),
                &PrerequisiteContext::Feature {
                    has_children: false,
                    all_children_terminal: false,
                },
            )
            .await;
        assert!(matches!(result, Err(WorkflowError::PrerequisitesNotMet { .. })));
    }

    #[tokio::test]
    async fn next_status_reports_ready_when_unblocked() {
        let engine = engine();
        let tags = Tags::new();
        let rec = engine
            .next_status(
                EntityType::Task,
                &tags,
                &Status::new("backlog"),
                &PrerequisiteContext::None,
            )
            .await;
        assert!(matches!(rec, NextStatus::Ready { .. }));
    }

    #[tokio::test]
    async fn next_status_reports_terminal_at_end_of_flow() {
        let engine = engine();
        let tags = Tags::new();
        let rec = engine
            .next_status(
                EntityType::Task,
                &tags,
                &Status::new("completed"),
                &PrerequisiteContext::None,
            )
            .await;
        assert!(matches!(rec, NextStatus::Terminal { .. }));
    }

    #[tokio::test]
    async fn task_leaving_backlog_suggests_feature_in_development() {
        let engine = engine();
        let tags = Tags::new();
        let event = engine
            .task_left_backlog_cascade(
                &Status::new("backlog"),
                &Status::new("in-progress"),
                EntityId::new(),
                &Status::new("planning"),
                &tags,
            )
            .await;
        assert!(event.is_some());
        assert_eq!(event.unwrap().suggested_status, Status::new("in-development"));
    }
}
