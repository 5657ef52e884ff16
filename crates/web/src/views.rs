//! Read-only panel views
//!
//! Each handler assembles what one page of the plan panel needs: the plan,
//! its dependency table, topology data and the actions an operator may take.

use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use conveyor_common::actions::{allowed_actions, filter_plans_by_name, is_status_final};
use conveyor_common::deps::{dependency_rows, fetch_plan_deps, filter_plan_deps, DependencyRow};
use conveyor_common::plan_ref::{parse_param_string, parse_resource_ids, required_param};
use conveyor_common::{
    available_zone_names, D3Graph, DependencyMap, DisplayFlags, Error, Plan, PlanType, RowAction,
    SearchOpts, SortDir,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Context, PanelError};
use crate::server::SharedState;

// ============================================================================
// Index and detail
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub marker: Option<String>,
    #[serde(default)]
    pub sort_dir: SortDir,
    /// Case-insensitive plan name filter
    pub filter: Option<String>,
}

/// A plan table row
#[derive(Debug, Serialize)]
pub struct PlanRow {
    #[serde(flatten)]
    pub plan: Plan,
    pub display_name: String,
    pub task_display: String,
    pub actions: Vec<RowAction>,
    pub status_final: bool,
}

impl From<Plan> for PlanRow {
    fn from(plan: Plan) -> Self {
        Self {
            display_name: plan.display_name().to_string(),
            task_display: plan.task_display().to_string(),
            actions: allowed_actions(&plan),
            status_final: is_status_final(&plan),
            plan,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub plans: Vec<PlanRow>,
    pub has_more: bool,
    pub has_prev: bool,
    /// Marker for the next (older) page
    pub next_marker: Option<String>,
    /// Marker for the previous (newer) page, used with `sort_dir=asc`
    pub prev_marker: Option<String>,
    pub table_actions: Vec<&'static str>,
}

pub async fn index_handler(
    State(state): State<SharedState>,
    query: Result<Query<IndexQuery>, QueryRejection>,
) -> Result<Json<IndexResponse>, PanelError> {
    let Query(query) = query?;
    let opts = SearchOpts {
        marker: query.marker,
        sort_dir: query.sort_dir,
        ..SearchOpts::default()
    };
    let page = state
        .api
        .plan_list(&opts)
        .await
        .context("Unable to retrieve plan list.")?;

    let plans = match query.filter.as_deref().filter(|f| !f.is_empty()) {
        Some(filter) => filter_plans_by_name(page.plans, filter),
        None => page.plans,
    };
    debug!(count = plans.len(), "listing plans");

    let next_marker = page
        .has_more
        .then(|| plans.last().map(|p| p.plan_id.clone()))
        .flatten();
    let prev_marker = page
        .has_prev
        .then(|| plans.first().map(|p| p.plan_id.clone()))
        .flatten();

    Ok(Json(IndexResponse {
        plans: plans.into_iter().map(PlanRow::from).collect(),
        has_more: page.has_more,
        has_prev: page.has_prev,
        next_marker,
        prev_marker,
        table_actions: vec!["import"],
    }))
}

pub async fn detail_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanRow>, PanelError> {
    let plan = state
        .api
        .plan_get_brief(&plan_id)
        .await
        .context(format!("Unable to retrieve details for plan {}.", plan_id))?;
    Ok(Json(PlanRow::from(plan)))
}

// ============================================================================
// Clone and migrate
// ============================================================================

/// Either `ids` (create a new plan from selected resources) or `plan_id`
#[derive(Debug, Default, Deserialize)]
pub struct PlanQuery {
    pub ids: Option<String>,
    pub plan_level: Option<String>,
    pub plan_id: Option<String>,
}

/// Everything the clone and migrate pages render
#[derive(Debug, Serialize)]
pub struct PlanContext {
    pub header: String,
    pub plan_id: String,
    pub plan_type: PlanType,
    pub is_original: bool,
    pub plan: Plan,
    pub dependencies: Vec<DependencyRow>,
    pub d3_data: D3Graph,
}

async fn load_or_create_plan(
    state: &SharedState,
    plan_type: PlanType,
    query: PlanQuery,
) -> Result<(Plan, bool), PanelError> {
    if let Some(ids) = query.ids {
        let resources = parse_resource_ids(&ids).context("Query string is not a correct format.")?;
        let plan_level = query
            .plan_level
            .unwrap_or_else(|| state.config.web.default_plan_level.clone());
        info!(%plan_type, resources = resources.len(), %plan_level, "creating plan");
        let plan = state
            .api
            .plan_create(plan_type, &resources, &plan_level)
            .await
            .context("Unable to create plan.")?;
        return Ok((plan, true));
    }

    if let Some(plan_id) = query.plan_id {
        let plan = state
            .api
            .plan_get_brief(&plan_id)
            .await
            .context("Unable to retrieve plan details.")?;
        return Ok((plan, false));
    }

    Err(PanelError::new(
        Error::validation("query string contains neither plan_id nor resource ids"),
        "Query string is not a correct format.",
    ))
}

async fn plan_context(
    state: &SharedState,
    plan_type: PlanType,
    plan: Plan,
    is_original: bool,
    header: String,
) -> Result<PlanContext, PanelError> {
    let deps = fetch_plan_deps(state.api.as_ref(), &plan.plan_id, plan_type)
        .await
        .context("Unable to retrieve plan resource dependencies.")?;
    debug!(plan_id = %plan.plan_id, resources = deps.len(), "loaded plan dependencies");

    Ok(PlanContext {
        header,
        plan_id: plan.plan_id.clone(),
        plan_type,
        is_original,
        dependencies: dependency_rows(&deps),
        d3_data: D3Graph::from(&deps),
        plan,
    })
}

async fn plan_view(
    state: SharedState,
    plan_type: PlanType,
    query: Result<Query<PlanQuery>, QueryRejection>,
) -> Result<Json<PlanContext>, PanelError> {
    let Query(query) = query?;
    let (plan, is_original) = load_or_create_plan(&state, plan_type, query).await?;
    let header = format!("{} Plan {}", plan_type.title(), plan.plan_id);
    Ok(Json(
        plan_context(&state, plan_type, plan, is_original, header).await?,
    ))
}

pub async fn clone_handler(
    State(state): State<SharedState>,
    query: Result<Query<PlanQuery>, QueryRejection>,
) -> Result<Json<PlanContext>, PanelError> {
    plan_view(state, PlanType::Clone, query).await
}

pub async fn migrate_handler(
    State(state): State<SharedState>,
    query: Result<Query<PlanQuery>, QueryRejection>,
) -> Result<Json<PlanContext>, PanelError> {
    plan_view(state, PlanType::Migrate, query).await
}

async fn incremental_view(
    state: SharedState,
    plan_type: PlanType,
    plan_id: String,
) -> Result<Json<PlanContext>, PanelError> {
    let failed = "Unable to create incremental plan.";
    let source = state.api.plan_get_brief(&plan_id).await.context(failed)?;
    let plan_name = format!("increment-of-{}", plan_id);
    info!(%plan_id, %plan_name, "creating incremental plan");
    let plan = state
        .api
        .create_increment_plan(&plan_id, source.plan_type, &plan_name)
        .await
        .context(failed)?;

    let header = format!("Increment Plan {}", plan.plan_id);
    Ok(Json(
        plan_context(&state, plan_type, plan, true, header).await?,
    ))
}

pub async fn incremental_clone_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanContext>, PanelError> {
    incremental_view(state, PlanType::Clone, plan_id).await
}

pub async fn incremental_migrate_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanContext>, PanelError> {
    incremental_view(state, PlanType::Migrate, plan_id).await
}

// ============================================================================
// Save, modify and destination
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SaveContext {
    pub plan_id: String,
    pub plan_type: PlanType,
    pub sys_clone: bool,
    pub copy_data: bool,
    #[serde(flatten)]
    pub flags: DisplayFlags,
}

async fn plan_with_deps(
    state: &SharedState,
    plan_id: &str,
) -> Result<(Plan, DependencyMap), PanelError> {
    let plan = state
        .api
        .plan_get_brief(plan_id)
        .await
        .context("Unable to retrieve plan information.")?;
    let deps = fetch_plan_deps(state.api.as_ref(), plan_id, plan.plan_type)
        .await
        .context("Unable to retrieve plan resource dependencies.")?;
    Ok((plan, deps))
}

pub async fn save_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<Json<SaveContext>, PanelError> {
    let (plan, deps) = plan_with_deps(&state, &plan_id).await?;
    Ok(Json(SaveContext {
        plan_id: plan.plan_id,
        plan_type: plan.plan_type,
        sys_clone: plan.sys_clone,
        copy_data: plan.copy_data,
        flags: DisplayFlags::from_deps(&deps),
    }))
}

pub async fn modify_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<Json<PlanContext>, PanelError> {
    let plan = state
        .api
        .plan_get_brief(&plan_id)
        .await
        .context("Unable to retrieve plan details.")?;
    let header = format!("Modify Plan {}", plan.plan_id);
    Ok(Json(
        plan_context(&state, PlanType::Clone, plan, false, header).await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct DestinationContext {
    pub header: &'static str,
    pub submit_label: &'static str,
    pub plan_id: String,
    pub plan_type: PlanType,
    pub sys_clone: bool,
    pub copy_data: bool,
    #[serde(flatten)]
    pub flags: DisplayFlags,
    /// Zones the plan's source resources live in
    pub src_azs: Vec<String>,
    /// Selectable target zones
    pub availability_zones: Vec<String>,
}

pub async fn destination_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<Json<DestinationContext>, PanelError> {
    let (plan, deps) = plan_with_deps(&state, &plan_id).await?;
    let src_azs = state
        .api
        .list_plan_resource_availability_zones(&plan_id)
        .await
        .context("Unable to retrieve availability zones for plan resource.")?;

    // The page still renders without choices when zones cannot be listed.
    let availability_zones = match state.api.availability_zone_list().await {
        Ok(zones) => available_zone_names(&zones),
        Err(e) => {
            warn!(%plan_id, error = %e, "unable to retrieve availability zones");
            Vec::new()
        }
    };

    let header = match plan.plan_type {
        PlanType::Clone => "Clone Destination",
        PlanType::Migrate => "Migrate Destination",
    };
    Ok(Json(DestinationContext {
        header,
        submit_label: plan.plan_type.title(),
        plan_id: plan.plan_id,
        plan_type: plan.plan_type,
        sys_clone: plan.sys_clone,
        copy_data: plan.copy_data,
        flags: DisplayFlags::from_deps(&deps),
        src_azs,
        availability_zones,
    }))
}

// ============================================================================
// Export
// ============================================================================

pub async fn export_handler(
    State(state): State<SharedState>,
    Path(plan_id): Path<String>,
) -> Result<Response, PanelError> {
    let failed = "Unable to export plan.";
    let template = state.api.download_template(&plan_id).await.context(failed)?;
    let body = serde_yaml::to_string(&template)
        .map_err(Error::from)
        .context(failed)?;
    info!(%plan_id, bytes = body.len(), "exported plan template");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-yaml".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=plan-{}", plan_id),
            ),
        ],
        body,
    )
        .into_response())
}

// ============================================================================
// Topology
// ============================================================================

/// Posted by the topology widget
#[derive(Debug, Deserialize)]
pub struct TopologyForm {
    /// `plan_id=…&plan_type=…[&res_id=…]`
    pub param: String,
    /// JSON dependency delta with unsaved edits
    #[serde(default)]
    pub deps: String,
}

struct TopologyRequest {
    plan_id: String,
    plan_type: PlanType,
    res_id: Option<String>,
    delta: DependencyMap,
}

fn parse_topology_form(form: TopologyForm, needs_focal: bool) -> conveyor_common::Result<TopologyRequest> {
    let params = parse_param_string(&form.param)?;
    let plan_id = required_param(&params, "plan_id")?.to_string();
    let plan_type = required_param(&params, "plan_type")?.parse()?;
    let res_id = if needs_focal {
        Some(required_param(&params, "res_id")?.to_string())
    } else {
        None
    };
    let delta = if form.deps.trim().is_empty() {
        DependencyMap::new()
    } else {
        serde_json::from_str(&form.deps)?
    };
    Ok(TopologyRequest {
        plan_id,
        plan_type,
        res_id,
        delta,
    })
}

async fn topology(
    state: SharedState,
    form: Result<Form<TopologyForm>, FormRejection>,
    needs_focal: bool,
) -> Result<Json<D3Graph>, PanelError> {
    let Form(form) = form?;
    let failed = "Unable to build plan topology.";
    let req = parse_topology_form(form, needs_focal).context(failed)?;
    let deps = filter_plan_deps(
        state.api.as_ref(),
        &req.plan_id,
        req.plan_type,
        req.delta,
        req.res_id.as_deref(),
    )
    .await
    .context(failed)?;
    debug!(plan_id = %req.plan_id, resources = deps.len(), "topology slice");
    Ok(Json(D3Graph::from_deps(&deps, req.res_id.as_deref())))
}

pub async fn local_topology_handler(
    State(state): State<SharedState>,
    form: Result<Form<TopologyForm>, FormRejection>,
) -> Result<Json<D3Graph>, PanelError> {
    topology(state, form, true).await
}

pub async fn global_topology_handler(
    State(state): State<SharedState>,
    form: Result<Form<TopologyForm>, FormRejection>,
) -> Result<Json<D3Graph>, PanelError> {
    topology(state, form, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_common::ResourceAction;

    #[test]
    fn test_parse_local_topology_form() {
        let form = TopologyForm {
            param: "plan_id=p1&plan_type=clone&res_id=server_0".to_string(),
            deps: r#"{"net_0": {"type": "OS::Neutron::Net", "dependencies": [], "action": "delete"}}"#
                .to_string(),
        };
        let req = parse_topology_form(form, true).unwrap();
        assert_eq!(req.plan_id, "p1");
        assert_eq!(req.plan_type, PlanType::Clone);
        assert_eq!(req.res_id.as_deref(), Some("server_0"));
        assert_eq!(req.delta["net_0"].action, Some(ResourceAction::Delete));
    }

    #[test]
    fn test_parse_topology_form_errors() {
        let missing_focal = TopologyForm {
            param: "plan_id=p1&plan_type=migrate".to_string(),
            deps: String::new(),
        };
        assert!(matches!(
            parse_topology_form(missing_focal, true),
            Err(Error::Validation(_))
        ));

        let bad_type = TopologyForm {
            param: "plan_id=p1&plan_type=backup".to_string(),
            deps: String::new(),
        };
        assert!(parse_topology_form(bad_type, false).is_err());

        let bad_deps = TopologyForm {
            param: "plan_id=p1&plan_type=clone".to_string(),
            deps: "{not json".to_string(),
        };
        assert!(matches!(
            parse_topology_form(bad_deps, false),
            Err(Error::Serialization(_))
        ));
    }
}
