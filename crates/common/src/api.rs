//! Backend plan API boundary
//!
//! Everything the panel asks of the Conveyor service goes through
//! [`ConveyorApi`]. The HTTP implementation lives in [`crate::client`]; tests
//! use the in-memory mock.

use async_trait::async_trait;
use serde_json::Value;

use crate::deps::DependencyMap;
use crate::error::Result;
use crate::normalize::NormalizedResource;
use crate::types::{AvailabilityZone, Plan, PlanPage, PlanType, ResourceRef, SearchOpts};

#[async_trait]
pub trait ConveyorApi: Send + Sync {
    /// Create a plan over the selected resources.
    async fn plan_create(
        &self,
        plan_type: PlanType,
        resources: &[ResourceRef],
        plan_level: &str,
    ) -> Result<Plan>;

    /// Create a plan from an exported template document.
    async fn create_plan_by_template(&self, template: Value) -> Result<Plan>;

    async fn plan_get(&self, plan_id: &str) -> Result<Plan>;

    async fn plan_get_brief(&self, plan_id: &str) -> Result<Plan>;

    async fn plan_list(&self, opts: &SearchOpts) -> Result<PlanPage>;

    async fn plan_delete(&self, plan_id: &str) -> Result<()>;

    async fn update_plan_resource(
        &self,
        plan_id: &str,
        resources: &[NormalizedResource],
    ) -> Result<()>;

    async fn export_clone_template(&self, plan_id: &str, sys_clone: bool) -> Result<()>;

    async fn export_migrate_template(&self, plan_id: &str) -> Result<()>;

    /// The plan's template document.
    async fn download_template(&self, plan_id: &str) -> Result<Value>;

    async fn export_template_and_clone(
        &self,
        plan_id: &str,
        destination: &str,
        resources: &[NormalizedResource],
        sys_clone: bool,
    ) -> Result<()>;

    async fn migrate(&self, plan_id: &str, destination: &str) -> Result<()>;

    /// Dependency map including local edits (clone plans).
    async fn update_dependencies(&self, plan_id: &str) -> Result<DependencyMap>;

    /// Dependency map as discovered (migrate plans).
    async fn original_dependencies(&self, plan_id: &str) -> Result<DependencyMap>;

    async fn create_increment_plan(
        &self,
        plan_id: &str,
        plan_type: PlanType,
        plan_name: &str,
    ) -> Result<Plan>;

    async fn availability_zone_list(&self) -> Result<Vec<AvailabilityZone>>;

    /// Availability zones the plan's source resources live in.
    async fn list_plan_resource_availability_zones(&self, plan_id: &str) -> Result<Vec<String>>;
}
