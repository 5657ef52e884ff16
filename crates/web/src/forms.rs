//! Plan form handlers
//!
//! Forms submit the plan id, what to do with it and, for editing forms, the
//! resource edits as collected by the editors. Edits are normalized before
//! anything reaches the backend.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use conveyor_common::normalize::{normalize_update_value, parse_bool_str};
use conveyor_common::{
    available_zone_names, Error, FormAction, NormalizedResource, PlanType, RowAction,
};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Context, FormOutcome, PanelError};
use crate::server::SharedState;

/// Accepts JSON booleans and the usual textual spellings; absent is false.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(false),
        Some(Raw::Bool(b)) => Ok(b),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(false),
        Some(Raw::Text(s)) => {
            parse_bool_str(&s).ok_or_else(|| D::Error::custom(format!("invalid boolean '{}'", s)))
        }
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn normalize_field(field: &str, value: Option<Value>) -> conveyor_common::Result<Vec<NormalizedResource>> {
    let resources = normalize_update_value(field, value)?;
    debug!(field, count = resources.len(), "normalized resource updates");
    Ok(resources)
}

fn require_az(az: &str) -> conveyor_common::Result<&str> {
    let az = az.trim();
    if az.is_empty() {
        return Err(Error::validation("a target availability zone is required"));
    }
    Ok(az)
}

// ============================================================================
// Clone and migrate
// ============================================================================

fn default_clone() -> String {
    "clone".to_string()
}

fn default_migrate() -> String {
    "migrate".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CloneForm {
    pub plan_id: String,
    #[serde(default = "default_clone")]
    pub action_type: String,
    /// Target availability zone
    #[serde(default)]
    pub az: String,
    #[serde(default, deserialize_with = "flag")]
    pub sys_clone: bool,
    /// Resource edits: JSON text or a list of records
    #[serde(default)]
    pub update_resource: Option<Value>,
}

pub async fn clone_handler(
    State(state): State<SharedState>,
    form: Result<Json<CloneForm>, JsonRejection>,
) -> Result<FormOutcome, PanelError> {
    let Json(form) = form?;
    let plan_id = form.plan_id.as_str();
    info!(%plan_id, action_type = %form.action_type, sys_clone = form.sys_clone, "clone plan form");
    let failed = format!("{} plan {} failed.", title_case(&form.action_type), plan_id);

    let action = FormAction::parse_for(PlanType::Clone, &form.action_type).context(&failed)?;
    let resources = normalize_field("update_resource", form.update_resource).context(&failed)?;

    match action {
        FormAction::Clone | FormAction::Migrate => {
            let az = require_az(&form.az).context(&failed)?;
            state
                .api
                .export_template_and_clone(plan_id, az, &resources, form.sys_clone)
                .await
                .context(&failed)?;
        }
        FormAction::Save => {
            if !resources.is_empty() {
                state
                    .api
                    .update_plan_resource(plan_id, &resources)
                    .await
                    .context(&failed)?;
            }
            state
                .api
                .export_clone_template(plan_id, form.sys_clone)
                .await
                .context(&failed)?;
        }
        FormAction::Cancel => {
            state.api.plan_delete(plan_id).await.context(&failed)?;
        }
    }

    Ok(FormOutcome::done(format!(
        "{} plan {} successfully.",
        action.title(),
        plan_id
    )))
}

#[derive(Debug, Deserialize)]
pub struct MigrateForm {
    pub plan_id: String,
    #[serde(default = "default_migrate")]
    pub action_type: String,
    #[serde(default)]
    pub az: String,
}

pub async fn migrate_handler(
    State(state): State<SharedState>,
    form: Result<Json<MigrateForm>, JsonRejection>,
) -> Result<FormOutcome, PanelError> {
    let Json(form) = form?;
    let plan_id = form.plan_id.as_str();
    info!(%plan_id, action_type = %form.action_type, "migrate plan form");
    let failed = format!("{} plan {} failed.", title_case(&form.action_type), plan_id);

    let action = FormAction::parse_for(PlanType::Migrate, &form.action_type).context(&failed)?;
    match action {
        FormAction::Migrate | FormAction::Clone => {
            let az = require_az(&form.az).context(&failed)?;
            state.api.migrate(plan_id, az).await.context(&failed)?;
        }
        FormAction::Save => {
            state
                .api
                .export_migrate_template(plan_id)
                .await
                .context(&failed)?;
        }
        FormAction::Cancel => {
            state.api.plan_delete(plan_id).await.context(&failed)?;
        }
    }

    Ok(FormOutcome::done(format!(
        "{} plan {} successfully.",
        action.title(),
        plan_id
    )))
}

// ============================================================================
// Save, modify and destination
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SaveForm {
    #[serde(default, deserialize_with = "flag")]
    pub sys_clone: bool,
    #[serde(default)]
    pub resources: Option<Value>,
}

pub async fn save_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
    form: Result<Json<SaveForm>, JsonRejection>,
) -> Result<FormOutcome, PanelError> {
    let Json(form) = form?;
    info!(%plan_id, sys_clone = form.sys_clone, "save plan form");
    let failed = format!("Save plan {} failed.", plan_id);

    let resources = normalize_field("resources", form.resources).context(&failed)?;
    if !resources.is_empty() {
        state
            .api
            .update_plan_resource(&plan_id, &resources)
            .await
            .context(&failed)?;
    }
    state
        .api
        .export_clone_template(&plan_id, form.sys_clone)
        .await
        .context(&failed)?;

    Ok(FormOutcome::done(format!("Save plan {} successfully.", plan_id)))
}

/// Modify form; only the resource edits are read
#[derive(Debug, Default, Deserialize)]
pub struct UpdateResourceForm {
    #[serde(default, alias = "resources")]
    pub update_resource: Option<Value>,
}

async fn update_resources(
    state: &SharedState,
    plan_id: &str,
    update_resource: Option<Value>,
) -> Result<FormOutcome, PanelError> {
    let failed = format!("Update plan {} failed.", plan_id);
    let resources = normalize_field("update_resource", update_resource).context(&failed)?;
    if !resources.is_empty() {
        state
            .api
            .update_plan_resource(plan_id, &resources)
            .await
            .context(&failed)?;
    }
    Ok(FormOutcome::done(format!(
        "Update plan {} successfully.",
        plan_id
    )))
}

pub async fn modify_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
    form: Result<Json<UpdateResourceForm>, JsonRejection>,
) -> Result<FormOutcome, PanelError> {
    let Json(form) = form?;
    info!(%plan_id, "modify plan form");
    update_resources(&state, &plan_id, form.update_resource).await
}

pub async fn update_resource_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
    form: Result<Json<UpdateResourceForm>, JsonRejection>,
) -> Result<FormOutcome, PanelError> {
    let Json(form) = form?;
    info!(%plan_id, "update plan resources");
    update_resources(&state, &plan_id, form.update_resource).await
}

#[derive(Debug, Deserialize)]
pub struct DestinationForm {
    pub plan_type: String,
    pub az: String,
    #[serde(default, deserialize_with = "flag")]
    pub sys_clone: bool,
}

pub async fn destination_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
    form: Result<Json<DestinationForm>, JsonRejection>,
) -> Result<FormOutcome, PanelError> {
    let Json(form) = form?;
    info!(%plan_id, plan_type = %form.plan_type, az = %form.az, "destination form");

    let plan_type = form.plan_type.parse::<PlanType>().context("Unsupported plan type.")?;
    let failed = format!("{} plan {} failed.", plan_type.title(), plan_id);

    let az = require_az(&form.az).context(&failed)?;
    let zones = state
        .api
        .availability_zone_list()
        .await
        .context("Unable to retrieve availability zones.")?;
    if !available_zone_names(&zones).iter().any(|z| z == az) {
        return Err(PanelError::new(
            Error::validation(format!("'{}' is not an available zone", az)),
            failed,
        ));
    }

    match plan_type {
        PlanType::Clone => {
            state
                .api
                .export_template_and_clone(&plan_id, az, &[], form.sys_clone)
                .await
                .context(&failed)?;
        }
        PlanType::Migrate => {
            state.api.migrate(&plan_id, az).await.context(&failed)?;
        }
    }

    Ok(FormOutcome::done(format!(
        "{} plan {} successfully.",
        plan_type.title(),
        plan_id
    )))
}

// ============================================================================
// Import, cancel, generate template and delete
// ============================================================================

/// Body is the template document, JSON or YAML.
pub async fn import_handler(
    State(state): State<SharedState>,
    body: String,
) -> Result<FormOutcome, PanelError> {
    let failed = "Unable to import plan.";
    if body.trim().is_empty() {
        return Err(PanelError::new(
            Error::validation("plan template is empty"),
            failed,
        ));
    }
    // YAML is a superset of JSON, so one parser covers both uploads.
    let template: Value = serde_yaml::from_str(&body)
        .map_err(Error::from)
        .context(failed)?;
    if !template.is_object() {
        return Err(PanelError::new(
            Error::validation("plan template must be a mapping"),
            failed,
        ));
    }
    debug!(bytes = body.len(), "importing plan template");

    let plan = state
        .api
        .create_plan_by_template(template)
        .await
        .context(failed)?;
    info!(plan_id = %plan.plan_id, "imported plan");
    Ok(FormOutcome::done(format!(
        "Successfully imported plan: {}",
        plan.plan_id
    )))
}

pub async fn cancel_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<FormOutcome, PanelError> {
    info!(%plan_id, "cancel plan");
    state
        .api
        .plan_delete(&plan_id)
        .await
        .context(format!("Cancel plan {} failed.", plan_id))?;
    Ok(FormOutcome::done(format!(
        "Cancel plan {} successfully.",
        plan_id
    )))
}

pub async fn generate_template_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<FormOutcome, PanelError> {
    let failed = format!("Generate template for plan {} failed.", plan_id);
    let plan = state.api.plan_get_brief(&plan_id).await.context(&failed)?;
    if !RowAction::GenerateTemplate.allowed(&plan) {
        return Err(PanelError::new(
            Error::validation(format!(
                "plan {} is {}, templates are generated while initiating",
                plan_id, plan.plan_status
            )),
            failed,
        ));
    }

    info!(%plan_id, plan_type = %plan.plan_type, "generating plan template");
    match plan.plan_type {
        PlanType::Clone => {
            state
                .api
                .export_clone_template(&plan_id, plan.sys_clone)
                .await
                .context(&failed)?;
        }
        PlanType::Migrate => {
            state
                .api
                .export_migrate_template(&plan_id)
                .await
                .context(&failed)?;
        }
    }

    Ok(FormOutcome::done(format!(
        "Generate template for plan {} successfully.",
        plan_id
    )))
}

pub async fn delete_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<FormOutcome, PanelError> {
    info!(%plan_id, "delete plan");
    state
        .api
        .plan_delete(&plan_id)
        .await
        .context(format!("Unable to delete plan {}.", plan_id))?;
    Ok(FormOutcome::done(format!("Deleted plan {}.", plan_id)))
}
