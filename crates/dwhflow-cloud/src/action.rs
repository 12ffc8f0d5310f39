//! Planned and applied actions

use crate::provisioner::ResourceKind;
use dwhflow_config::ConfigStore;
use serde::{Deserialize, Serialize};

/// Represents a planned action for one resource family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: ResourceKind,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Description of the action
    pub description: String,

    /// Identifier fields the action will write or remove
    pub pending: Vec<String>,
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create (or finish creating) a resource family
    Create,
    /// Delete (or finish deleting) a resource family
    Delete,
    /// No changes needed
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Outcome of running one provisioner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub kind: ResourceKind,
    /// `NoOp` when the step was already satisfied
    pub action: ActionType,
    pub message: String,
}

/// Result of running a pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub steps: Vec<StepOutcome>,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: StepOutcome) {
        self.steps.push(step);
    }

    /// Number of steps that called the remote API
    pub fn changed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.action != ActionType::NoOp)
            .count()
    }
}

/// Plan containing all actions of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    /// Build pipeline against the current store
    pub fn for_build(store: &ConfigStore) -> Self {
        let actions = ResourceKind::BUILD_ORDER
            .into_iter()
            .map(|kind| {
                let missing = kind.missing_fields(store);
                if missing.is_empty() {
                    Action {
                        kind,
                        action_type: ActionType::NoOp,
                        description: format!("{} already exists", kind.display_name()),
                        pending: Vec::new(),
                    }
                } else {
                    Action {
                        kind,
                        action_type: ActionType::Create,
                        description: format!("create {}", kind.display_name()),
                        pending: missing.iter().map(ToString::to_string).collect(),
                    }
                }
            })
            .collect();
        Self::new(actions)
    }

    /// Teardown pipeline against the current store
    pub fn for_teardown(store: &ConfigStore) -> Self {
        let actions = ResourceKind::TEARDOWN_ORDER
            .into_iter()
            .map(|kind| {
                let present = kind.present_fields(store);
                if present.is_empty() {
                    Action {
                        kind,
                        action_type: ActionType::NoOp,
                        description: format!("{} does not exist", kind.display_name()),
                        pending: Vec::new(),
                    }
                } else {
                    Action {
                        kind,
                        action_type: ActionType::Delete,
                        description: format!("delete {}", kind.display_name()),
                        pending: present.iter().map(ToString::to_string).collect(),
                    }
                }
            })
            .collect();
        Self::new(actions)
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub create: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to delete, {} unchanged",
            self.create, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::fields;
    use dwhflow_config::Template;

    #[test]
    fn test_build_plan_from_template() {
        let store = ConfigStore::from_template(&Template::standard("admin"));
        let plan = Plan::for_build(&store);

        assert!(plan.has_changes);
        assert_eq!(plan.summary().to_string(), "3 to create, 0 to delete, 0 unchanged");
        assert_eq!(plan.actions[0].kind, ResourceKind::Network);
        assert!(plan.actions[0].pending.contains(&"network.vpc.id".to_string()));
    }

    #[test]
    fn test_partial_family_is_planned_both_ways() {
        let mut store = ConfigStore::from_template(&Template::standard("admin"));
        store.set(fields::ROLE_ARN.section, fields::ROLE_ARN.key, "arn:aws:iam::1:role/r");

        let build = Plan::for_build(&store);
        let iam = build
            .actions
            .iter()
            .find(|a| a.kind == ResourceKind::IamRole)
            .unwrap();
        assert_eq!(iam.action_type, ActionType::Create);
        assert_eq!(iam.pending, vec!["iam.role.attached_policy".to_string()]);

        let teardown = Plan::for_teardown(&store);
        assert_eq!(
            teardown.summary().to_string(),
            "0 to create, 1 to delete, 2 unchanged"
        );
        assert_eq!(teardown.actions[0].kind, ResourceKind::Cluster);
    }

    #[test]
    fn test_run_report_counts_changes() {
        let mut report = RunReport::new();
        report.push(StepOutcome {
            kind: ResourceKind::Network,
            action: ActionType::NoOp,
            message: "already exists".to_string(),
        });
        report.push(StepOutcome {
            kind: ResourceKind::IamRole,
            action: ActionType::Create,
            message: "created".to_string(),
        });
        assert_eq!(report.changed(), 1);
    }
}
