//! In-memory [`ConveyorApi`] for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::api::ConveyorApi;
use crate::deps::DependencyMap;
use crate::error::{Error, Result};
use crate::normalize::NormalizedResource;
use crate::types::{
    AvailabilityZone, Plan, PlanPage, PlanStatus, PlanType, ResourceRef, SearchOpts,
};

/// A recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    PlanCreate {
        plan_type: PlanType,
        resources: Vec<ResourceRef>,
        plan_level: String,
    },
    CreatePlanByTemplate(Value),
    PlanGet(String),
    PlanGetBrief(String),
    PlanList(Option<String>),
    PlanDelete(String),
    UpdatePlanResource {
        plan_id: String,
        resources: Vec<Value>,
    },
    ExportCloneTemplate {
        plan_id: String,
        sys_clone: bool,
    },
    ExportMigrateTemplate(String),
    DownloadTemplate(String),
    ExportTemplateAndClone {
        plan_id: String,
        destination: String,
        resources: Vec<Value>,
        sys_clone: bool,
    },
    Migrate {
        plan_id: String,
        destination: String,
    },
    UpdateDependencies(String),
    OriginalDependencies(String),
    CreateIncrementPlan {
        plan_id: String,
        plan_type: PlanType,
        plan_name: String,
    },
    AvailabilityZoneList,
    ListPlanResourceAvailabilityZones(String),
}

impl MockCall {
    /// Operation name, as accepted by [`MockConveyorApi::fail`].
    pub fn op(&self) -> &'static str {
        match self {
            MockCall::PlanCreate { .. } => "plan_create",
            MockCall::CreatePlanByTemplate(_) => "create_plan_by_template",
            MockCall::PlanGet(_) => "plan_get",
            MockCall::PlanGetBrief(_) => "plan_get_brief",
            MockCall::PlanList(_) => "plan_list",
            MockCall::PlanDelete(_) => "plan_delete",
            MockCall::UpdatePlanResource { .. } => "update_plan_resource",
            MockCall::ExportCloneTemplate { .. } => "export_clone_template",
            MockCall::ExportMigrateTemplate(_) => "export_migrate_template",
            MockCall::DownloadTemplate(_) => "download_template",
            MockCall::ExportTemplateAndClone { .. } => "export_template_and_clone",
            MockCall::Migrate { .. } => "migrate",
            MockCall::UpdateDependencies(_) => "update_dependencies",
            MockCall::OriginalDependencies(_) => "original_dependencies",
            MockCall::CreateIncrementPlan { .. } => "create_increment_plan",
            MockCall::AvailabilityZoneList => "availability_zone_list",
            MockCall::ListPlanResourceAvailabilityZones(_) => {
                "list_plan_resource_availability_zones"
            }
        }
    }
}

#[derive(Default)]
struct MockState {
    plans: BTreeMap<String, Plan>,
    updated_deps: HashMap<String, DependencyMap>,
    original_deps: HashMap<String, DependencyMap>,
    templates: HashMap<String, Value>,
    zones: Vec<AvailabilityZone>,
    plan_zones: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    calls: Vec<MockCall>,
    next_id: u32,
}

/// Backend double that keeps plans in memory and records every call
#[derive(Default)]
pub struct MockConveyorApi {
    state: Mutex<MockState>,
}

/// Builds a plan with the usual defaults.
pub fn sample_plan(plan_id: &str, plan_type: PlanType, plan_status: PlanStatus) -> Plan {
    Plan {
        plan_id: plan_id.to_string(),
        plan_name: Some(format!("{}-name", plan_id)),
        plan_type,
        plan_status,
        task_status: None,
        plan_level: "atomic".to_string(),
        created_at: None,
        sys_clone: false,
        copy_data: true,
    }
}

impl MockConveyorApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(self, plan: Plan) -> Self {
        self.state.lock().plans.insert(plan.plan_id.clone(), plan);
        self
    }

    pub fn with_update_dependencies(self, plan_id: &str, deps: DependencyMap) -> Self {
        self.state
            .lock()
            .updated_deps
            .insert(plan_id.to_string(), deps);
        self
    }

    pub fn with_original_dependencies(self, plan_id: &str, deps: DependencyMap) -> Self {
        self.state
            .lock()
            .original_deps
            .insert(plan_id.to_string(), deps);
        self
    }

    pub fn with_template(self, plan_id: &str, template: Value) -> Self {
        self.state
            .lock()
            .templates
            .insert(plan_id.to_string(), template);
        self
    }

    pub fn with_zones(self, zones: Vec<AvailabilityZone>) -> Self {
        self.state.lock().zones = zones;
        self
    }

    pub fn with_plan_zones(self, plan_id: &str, zones: Vec<String>) -> Self {
        self.state
            .lock()
            .plan_zones
            .insert(plan_id.to_string(), zones);
        self
    }

    /// Make every later call of `op` fail with a backend 500.
    pub fn fail(&self, op: &str) {
        self.state.lock().failing.insert(op.to_string());
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    pub fn call_ops(&self) -> Vec<&'static str> {
        self.state.lock().calls.iter().map(MockCall::op).collect()
    }

    pub fn plan(&self, plan_id: &str) -> Option<Plan> {
        self.state.lock().plans.get(plan_id).cloned()
    }

    fn record(&self, call: MockCall) -> Result<()> {
        let mut state = self.state.lock();
        let op = call.op();
        state.calls.push(call);
        if state.failing.contains(op) {
            return Err(Error::Api {
                status: 500,
                message: format!("{} failed", op),
            });
        }
        Ok(())
    }

    fn lookup(&self, plan_id: &str) -> Result<Plan> {
        self.state
            .lock()
            .plans
            .get(plan_id)
            .cloned()
            .ok_or_else(|| missing(plan_id))
    }

    fn insert_new(&self, plan_type: PlanType, plan_name: Option<String>, plan_level: &str) -> Plan {
        let mut state = self.state.lock();
        state.next_id += 1;
        let plan_id = format!("plan-{}", state.next_id);
        let mut plan = sample_plan(&plan_id, plan_type, PlanStatus::Initiating);
        plan.plan_name = plan_name;
        plan.plan_level = plan_level.to_string();
        state.plans.insert(plan_id, plan.clone());
        plan
    }
}

fn missing(plan_id: &str) -> Error {
    Error::Api {
        status: 404,
        message: format!("Plan {} could not be found", plan_id),
    }
}

fn to_values(resources: &[NormalizedResource]) -> Result<Vec<Value>> {
    resources
        .iter()
        .map(|r| r.to_value().map_err(Error::from))
        .collect()
}

#[async_trait]
impl ConveyorApi for MockConveyorApi {
    async fn plan_create(
        &self,
        plan_type: PlanType,
        resources: &[ResourceRef],
        plan_level: &str,
    ) -> Result<Plan> {
        self.record(MockCall::PlanCreate {
            plan_type,
            resources: resources.to_vec(),
            plan_level: plan_level.to_string(),
        })?;
        Ok(self.insert_new(plan_type, None, plan_level))
    }

    async fn create_plan_by_template(&self, template: Value) -> Result<Plan> {
        let plan_type = template
            .get("plan_type")
            .and_then(Value::as_str)
            .unwrap_or("clone")
            .parse()?;
        self.record(MockCall::CreatePlanByTemplate(template))?;
        Ok(self.insert_new(plan_type, None, "atomic"))
    }

    async fn plan_get(&self, plan_id: &str) -> Result<Plan> {
        self.record(MockCall::PlanGet(plan_id.to_string()))?;
        self.lookup(plan_id)
    }

    async fn plan_get_brief(&self, plan_id: &str) -> Result<Plan> {
        self.record(MockCall::PlanGetBrief(plan_id.to_string()))?;
        self.lookup(plan_id)
    }

    async fn plan_list(&self, opts: &SearchOpts) -> Result<PlanPage> {
        self.record(MockCall::PlanList(opts.marker.clone()))?;
        let plans = self.state.lock().plans.values().rev().cloned().collect();
        Ok(PlanPage {
            plans,
            has_more: false,
            has_prev: opts.marker.is_some(),
        })
    }

    async fn plan_delete(&self, plan_id: &str) -> Result<()> {
        self.record(MockCall::PlanDelete(plan_id.to_string()))?;
        self.state
            .lock()
            .plans
            .remove(plan_id)
            .map(|_| ())
            .ok_or_else(|| missing(plan_id))
    }

    async fn update_plan_resource(
        &self,
        plan_id: &str,
        resources: &[NormalizedResource],
    ) -> Result<()> {
        self.record(MockCall::UpdatePlanResource {
            plan_id: plan_id.to_string(),
            resources: to_values(resources)?,
        })
    }

    async fn export_clone_template(&self, plan_id: &str, sys_clone: bool) -> Result<()> {
        self.record(MockCall::ExportCloneTemplate {
            plan_id: plan_id.to_string(),
            sys_clone,
        })
    }

    async fn export_migrate_template(&self, plan_id: &str) -> Result<()> {
        self.record(MockCall::ExportMigrateTemplate(plan_id.to_string()))
    }

    async fn download_template(&self, plan_id: &str) -> Result<Value> {
        self.record(MockCall::DownloadTemplate(plan_id.to_string()))?;
        self.state
            .lock()
            .templates
            .get(plan_id)
            .cloned()
            .ok_or_else(|| missing(plan_id))
    }

    async fn export_template_and_clone(
        &self,
        plan_id: &str,
        destination: &str,
        resources: &[NormalizedResource],
        sys_clone: bool,
    ) -> Result<()> {
        self.record(MockCall::ExportTemplateAndClone {
            plan_id: plan_id.to_string(),
            destination: destination.to_string(),
            resources: to_values(resources)?,
            sys_clone,
        })
    }

    async fn migrate(&self, plan_id: &str, destination: &str) -> Result<()> {
        self.record(MockCall::Migrate {
            plan_id: plan_id.to_string(),
            destination: destination.to_string(),
        })
    }

    async fn update_dependencies(&self, plan_id: &str) -> Result<DependencyMap> {
        self.record(MockCall::UpdateDependencies(plan_id.to_string()))?;
        Ok(self
            .state
            .lock()
            .updated_deps
            .get(plan_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn original_dependencies(&self, plan_id: &str) -> Result<DependencyMap> {
        self.record(MockCall::OriginalDependencies(plan_id.to_string()))?;
        Ok(self
            .state
            .lock()
            .original_deps
            .get(plan_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_increment_plan(
        &self,
        plan_id: &str,
        plan_type: PlanType,
        plan_name: &str,
    ) -> Result<Plan> {
        self.record(MockCall::CreateIncrementPlan {
            plan_id: plan_id.to_string(),
            plan_type,
            plan_name: plan_name.to_string(),
        })?;
        let source = self.lookup(plan_id)?;
        Ok(self.insert_new(plan_type, Some(plan_name.to_string()), &source.plan_level))
    }

    async fn availability_zone_list(&self) -> Result<Vec<AvailabilityZone>> {
        self.record(MockCall::AvailabilityZoneList)?;
        Ok(self.state.lock().zones.clone())
    }

    async fn list_plan_resource_availability_zones(&self, plan_id: &str) -> Result<Vec<String>> {
        self.record(MockCall::ListPlanResourceAvailabilityZones(
            plan_id.to_string(),
        ))?;
        Ok(self
            .state
            .lock()
            .plan_zones
            .get(plan_id)
            .cloned()
            .unwrap_or_default())
    }
}
