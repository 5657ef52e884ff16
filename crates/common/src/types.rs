//! Core types for the plan panel

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Plan execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Clone,
    Migrate,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Clone => "clone",
            PlanType::Migrate => "migrate",
        }
    }

    /// Capitalized form used in titles and submit labels.
    pub fn title(&self) -> &'static str {
        match self {
            PlanType::Clone => "Clone",
            PlanType::Migrate => "Migrate",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clone" => Ok(PlanType::Clone),
            "migrate" => Ok(PlanType::Migrate),
            other => Err(crate::Error::validation(format!(
                "unsupported plan type: {}",
                other
            ))),
        }
    }
}

/// Plan lifecycle status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Initiating,
    Creating,
    Available,
    Cloning,
    Migrating,
    Finished,
    Deleting,
    Deleted,
    Error,
    ErrorDeleting,
    #[serde(other)]
    Unknown,
}

impl Default for PlanStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Initiating => "initiating",
            PlanStatus::Creating => "creating",
            PlanStatus::Available => "available",
            PlanStatus::Cloning => "cloning",
            PlanStatus::Migrating => "migrating",
            PlanStatus::Finished => "finished",
            PlanStatus::Deleting => "deleting",
            PlanStatus::Deleted => "deleted",
            PlanStatus::Error => "error",
            PlanStatus::ErrorDeleting => "error_deleting",
            PlanStatus::Unknown => "unknown",
        }
    }

    /// Human readable label for the status column.
    pub fn display(&self) -> &'static str {
        match self {
            PlanStatus::Initiating => "Initiating",
            PlanStatus::Creating => "Creating",
            PlanStatus::Available => "Available",
            PlanStatus::Cloning => "Cloning",
            PlanStatus::Migrating => "Migrating",
            PlanStatus::Finished => "Finished",
            PlanStatus::Deleting => "Deleting",
            PlanStatus::Deleted => "Deleted",
            PlanStatus::Error => "Error",
            PlanStatus::ErrorDeleting => "Error Deleting",
            PlanStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_plan_level() -> String {
    "atomic".to_string()
}

/// A plan as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    #[serde(default)]
    pub plan_name: Option<String>,
    pub plan_type: PlanType,
    #[serde(default)]
    pub plan_status: PlanStatus,
    #[serde(default)]
    pub task_status: Option<String>,
    #[serde(default = "default_plan_level")]
    pub plan_level: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub sys_clone: bool,
    #[serde(default = "default_true")]
    pub copy_data: bool,
}

fn default_true() -> bool {
    true
}

impl Plan {
    /// Name shown in titles, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.plan_name.as_deref().unwrap_or(&self.plan_id)
    }

    /// Task status label; empty and "none" read as "None".
    pub fn task_display(&self) -> &str {
        match self.task_status.as_deref() {
            None | Some("") | Some("none") => "None",
            Some("deploying") => "Deploying",
            Some("finished") => "Finished",
            Some("failed") => "Failed",
            Some(other) => other,
        }
    }
}

/// One page of the plan listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanPage {
    pub plans: Vec<Plan>,
    pub has_more: bool,
    pub has_prev: bool,
}

/// Sort direction for paged listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDir {
    #[default]
    Desc,
    Asc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Desc => "desc",
            SortDir::Asc => "asc",
        }
    }
}

/// Search options for `plan_list`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOpts {
    #[serde(default)]
    pub marker: Option<String>,
    #[serde(default)]
    pub sort_dir: SortDir,
    #[serde(default)]
    pub filters: std::collections::BTreeMap<String, String>,
}

/// Resource vocabulary of the backend (Heat resource type strings)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    Server,
    KeyPair,
    Flavor,
    Volume,
    VolumeType,
    Qos,
    Net,
    Subnet,
    Port,
    Router,
    RouterInterface,
    FloatingIp,
    SecurityGroup,
    Other(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::Server => "OS::Nova::Server",
            ResourceType::KeyPair => "OS::Nova::KeyPair",
            ResourceType::Flavor => "OS::Nova::Flavor",
            ResourceType::Volume => "OS::Cinder::Volume",
            ResourceType::VolumeType => "OS::Cinder::VolumeType",
            ResourceType::Qos => "OS::Cinder::Qos",
            ResourceType::Net => "OS::Neutron::Net",
            ResourceType::Subnet => "OS::Neutron::Subnet",
            ResourceType::Port => "OS::Neutron::Port",
            ResourceType::Router => "OS::Neutron::Router",
            ResourceType::RouterInterface => "OS::Neutron::RouterInterface",
            ResourceType::FloatingIp => "OS::Neutron::FloatingIP",
            ResourceType::SecurityGroup => "OS::Neutron::SecurityGroup",
            ResourceType::Other(s) => s,
        }
    }

    /// Short label for tables and graph nodes.
    pub fn short_name(&self) -> &str {
        self.as_str().rsplit("::").next().unwrap_or_default()
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        match s {
            "OS::Nova::Server" => ResourceType::Server,
            "OS::Nova::KeyPair" => ResourceType::KeyPair,
            "OS::Nova::Flavor" => ResourceType::Flavor,
            "OS::Cinder::Volume" => ResourceType::Volume,
            "OS::Cinder::VolumeType" => ResourceType::VolumeType,
            "OS::Cinder::Qos" => ResourceType::Qos,
            "OS::Neutron::Net" => ResourceType::Net,
            "OS::Neutron::Subnet" => ResourceType::Subnet,
            "OS::Neutron::Port" => ResourceType::Port,
            "OS::Neutron::Router" => ResourceType::Router,
            "OS::Neutron::RouterInterface" => ResourceType::RouterInterface,
            "OS::Neutron::FloatingIP" => ResourceType::FloatingIp,
            "OS::Neutron::SecurityGroup" => ResourceType::SecurityGroup,
            other => ResourceType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ResourceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResourceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ResourceType::from(s.as_str()))
    }
}

/// Edit action carried by resource records and dependency entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    Add,
    Edit,
    Delete,
}

impl ResourceAction {
    pub const KEY: &'static str = "action";

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceAction::Add => "add",
            ResourceAction::Edit => "edit",
            ResourceAction::Delete => "delete",
        }
    }

    /// Parses the raw tag; anything that is not add or delete reads as edit.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("add") => ResourceAction::Add,
            Some("delete") => ResourceAction::Delete,
            _ => ResourceAction::Edit,
        }
    }
}

impl fmt::Display for ResourceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a resource a new plan is created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub id: String,
}

/// Availability zone as listed by the compute service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityZone {
    #[serde(rename = "zoneName")]
    pub zone_name: String,
    #[serde(rename = "zoneState", default)]
    pub zone_state: ZoneState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneState {
    #[serde(default)]
    pub available: bool,
}

/// Zone names usable as a destination, deduplicated in first-seen order.
pub fn available_zone_names(zones: &[AvailabilityZone]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for zone in zones.iter().filter(|z| z.zone_state.available) {
        if !names.contains(&zone.zone_name) {
            names.push(zone.zone_name.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_roundtrip_and_other() {
        assert_eq!(ResourceType::from("OS::Neutron::Subnet"), ResourceType::Subnet);
        assert_eq!(ResourceType::Subnet.short_name(), "Subnet");

        let custom = ResourceType::from("OS::Heat::Stack");
        assert_eq!(custom, ResourceType::Other("OS::Heat::Stack".to_string()));
        assert_eq!(
            serde_json::to_value(&custom).unwrap(),
            serde_json::json!("OS::Heat::Stack")
        );
    }

    #[test]
    fn test_plan_deserialize_defaults() {
        let plan: Plan = serde_json::from_value(serde_json::json!({
            "plan_id": "p1",
            "plan_type": "clone",
            "plan_status": "something_new",
        }))
        .unwrap();

        assert_eq!(plan.plan_status, PlanStatus::Unknown);
        assert_eq!(plan.plan_level, "atomic");
        assert!(plan.copy_data);
        assert!(!plan.sys_clone);
        assert_eq!(plan.display_name(), "p1");
        assert_eq!(plan.task_display(), "None");
    }

    #[test]
    fn test_action_tag_defaults_to_edit() {
        assert_eq!(ResourceAction::from_tag(None), ResourceAction::Edit);
        assert_eq!(ResourceAction::from_tag(Some("")), ResourceAction::Edit);
        assert_eq!(ResourceAction::from_tag(Some("add")), ResourceAction::Add);
        assert_eq!(ResourceAction::from_tag(Some("delete")), ResourceAction::Delete);
    }

    #[test]
    fn test_available_zone_names() {
        let zone = |name: &str, available: bool| AvailabilityZone {
            zone_name: name.to_string(),
            zone_state: ZoneState { available },
        };
        let zones = vec![zone("az1", true), zone("az2", false), zone("az1", true), zone("az3", true)];
        assert_eq!(available_zone_names(&zones), vec!["az1", "az3"]);
    }
}
