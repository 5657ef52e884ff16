//! Plan row actions and form action types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::types::{Plan, PlanStatus, PlanType};

const ALLOW_CLONE_STATUS: &[PlanStatus] = &[
    PlanStatus::Available,
    PlanStatus::Cloning,
    PlanStatus::Finished,
];
const ALLOW_MIGRATE_STATUS: &[PlanStatus] = &[
    PlanStatus::Available,
    PlanStatus::Migrating,
    PlanStatus::Finished,
];
const ALLOW_MODIFY_STATUS: &[PlanStatus] = &[
    PlanStatus::Initiating,
    PlanStatus::Available,
    PlanStatus::Finished,
];
const NOT_ALLOW_EXPORT_STATUS: &[PlanStatus] = &[
    PlanStatus::Creating,
    PlanStatus::Error,
    PlanStatus::Initiating,
];

/// Actions offered on a plan row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowAction {
    Clone,
    Migrate,
    GenerateTemplate,
    Modify,
    Export,
    Delete,
}

impl RowAction {
    pub const ALL: [RowAction; 6] = [
        RowAction::Clone,
        RowAction::Migrate,
        RowAction::GenerateTemplate,
        RowAction::Modify,
        RowAction::Export,
        RowAction::Delete,
    ];

    pub fn allowed(&self, plan: &Plan) -> bool {
        let status = plan.plan_status;
        match self {
            RowAction::Clone => {
                plan.plan_type == PlanType::Clone && ALLOW_CLONE_STATUS.contains(&status)
            }
            RowAction::Migrate => {
                plan.plan_type == PlanType::Migrate && ALLOW_MIGRATE_STATUS.contains(&status)
            }
            RowAction::GenerateTemplate => status == PlanStatus::Initiating,
            RowAction::Modify => {
                plan.plan_type == PlanType::Clone && ALLOW_MODIFY_STATUS.contains(&status)
            }
            RowAction::Export => !NOT_ALLOW_EXPORT_STATUS.contains(&status),
            RowAction::Delete => true,
        }
    }

    pub fn verbose_name(&self) -> &'static str {
        match self {
            RowAction::Clone => "Clone",
            RowAction::Migrate => "Migrate",
            RowAction::GenerateTemplate => "Generate Template",
            RowAction::Modify => "Modify",
            RowAction::Export => "Download",
            RowAction::Delete => "Delete Plan",
        }
    }
}

/// Row actions available for `plan`, in table order.
pub fn allowed_actions(plan: &Plan) -> Vec<RowAction> {
    RowAction::ALL
        .iter()
        .copied()
        .filter(|a| a.allowed(plan))
        .collect()
}

/// Case-insensitive substring match on the plan name.
pub fn filter_plans_by_name(plans: Vec<Plan>, filter: &str) -> Vec<Plan> {
    let q = filter.to_lowercase();
    plans
        .into_iter()
        .filter(|p| p.display_name().to_lowercase().contains(&q))
        .collect()
}

/// Whether the status column has settled (no more row polling needed).
pub fn is_status_final(plan: &Plan) -> bool {
    matches!(
        plan.plan_status,
        PlanStatus::Available | PlanStatus::Error | PlanStatus::Finished
    ) && matches!(plan.task_status.as_deref(), None | Some("") | Some("none"))
}

/// What the clone and migrate forms were submitted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormAction {
    Clone,
    Migrate,
    Save,
    Cancel,
}

impl FormAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormAction::Clone => "clone",
            FormAction::Migrate => "migrate",
            FormAction::Save => "save",
            FormAction::Cancel => "cancel",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FormAction::Clone => "Clone",
            FormAction::Migrate => "Migrate",
            FormAction::Save => "Save",
            FormAction::Cancel => "Cancel",
        }
    }

    /// Parses the action type of a form for a plan of `plan_type`: the
    /// plan's own execution mode, save or cancel.
    pub fn parse_for(plan_type: PlanType, raw: &str) -> Result<Self> {
        let action = match (plan_type, raw) {
            (PlanType::Clone, "clone") => FormAction::Clone,
            (PlanType::Migrate, "migrate") => FormAction::Migrate,
            (_, "save") => FormAction::Save,
            (_, "cancel") => FormAction::Cancel,
            _ => {
                return Err(Error::validation(format!(
                    "action type only supports {}, save or cancel for a {} plan, got '{}'",
                    plan_type, plan_type, raw
                )))
            }
        };
        Ok(action)
    }
}

impl fmt::Display for FormAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(plan_type: PlanType, status: PlanStatus) -> Plan {
        Plan {
            plan_id: "p1".to_string(),
            plan_name: Some("Web Tier".to_string()),
            plan_type,
            plan_status: status,
            task_status: None,
            plan_level: "atomic".to_string(),
            created_at: None,
            sys_clone: false,
            copy_data: true,
        }
    }

    #[test]
    fn test_clone_plan_actions() {
        let p = plan(PlanType::Clone, PlanStatus::Available);
        assert_eq!(
            allowed_actions(&p),
            vec![
                RowAction::Clone,
                RowAction::Modify,
                RowAction::Export,
                RowAction::Delete
            ]
        );
    }

    #[test]
    fn test_initiating_plan_actions() {
        let p = plan(PlanType::Migrate, PlanStatus::Initiating);
        assert_eq!(
            allowed_actions(&p),
            vec![RowAction::GenerateTemplate, RowAction::Delete]
        );
    }

    #[test]
    fn test_migrating_plan_actions() {
        let p = plan(PlanType::Migrate, PlanStatus::Migrating);
        assert_eq!(
            allowed_actions(&p),
            vec![RowAction::Migrate, RowAction::Export, RowAction::Delete]
        );
    }

    #[test]
    fn test_error_plan_only_deletes() {
        let p = plan(PlanType::Clone, PlanStatus::Error);
        assert_eq!(allowed_actions(&p), vec![RowAction::Delete]);
    }

    #[test]
    fn test_filter_plans_by_name() {
        let mut other = plan(PlanType::Clone, PlanStatus::Available);
        other.plan_name = Some("database".to_string());
        let plans = vec![plan(PlanType::Clone, PlanStatus::Available), other];

        let hits = filter_plans_by_name(plans, "web");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].display_name(), "Web Tier");
    }

    #[test]
    fn test_status_final() {
        let mut p = plan(PlanType::Clone, PlanStatus::Available);
        assert!(is_status_final(&p));
        p.task_status = Some("deploying".to_string());
        assert!(!is_status_final(&p));
        p.task_status = None;
        p.plan_status = PlanStatus::Cloning;
        assert!(!is_status_final(&p));
    }

    #[test]
    fn test_form_action_parse() {
        assert_eq!(
            FormAction::parse_for(PlanType::Clone, "clone").unwrap(),
            FormAction::Clone
        );
        assert_eq!(
            FormAction::parse_for(PlanType::Migrate, "save").unwrap(),
            FormAction::Save
        );
        assert!(matches!(
            FormAction::parse_for(PlanType::Clone, "migrate"),
            Err(Error::Validation(_))
        ));
        assert!(FormAction::parse_for(PlanType::Migrate, "clone").is_err());
        assert!(FormAction::parse_for(PlanType::Clone, "destroy").is_err());
    }
}
