//! Plan dependency maps
//!
//! The backend computes, per plan, which resources reference which. The panel
//! only merges local edits over that map, prunes deleted entries and slices
//! out the neighbourhood of one resource for the topology view.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::api::ConveyorApi;
use crate::error::{Error, Result};
use crate::types::{PlanType, ResourceAction, ResourceType};

/// One resource in a plan's dependency graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEntry {
    /// Delta entries may omit the type when they only carry a delete tag.
    #[serde(rename = "type", default = "untyped")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_action"
    )]
    pub action: Option<ResourceAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_in_template: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DependencyEntry {
    pub fn new(resource_type: ResourceType, dependencies: Vec<String>) -> Self {
        Self {
            resource_type,
            dependencies,
            action: None,
            id: None,
            name: None,
            name_in_template: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_action(mut self, action: ResourceAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.action == Some(ResourceAction::Delete)
    }

    /// Name shown to operators: name, then template name, then the given key.
    pub fn label<'a>(&'a self, key: &'a str) -> &'a str {
        self.name
            .as_deref()
            .or(self.name_in_template.as_deref())
            .unwrap_or(key)
    }
}

fn untyped() -> ResourceType {
    ResourceType::Other(String::new())
}

/// Unknown or empty action tags read as untagged.
fn lenient_action<'de, D>(deserializer: D) -> std::result::Result<Option<ResourceAction>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let tag: Option<String> = Option::deserialize(deserializer)?;
    Ok(match tag.as_deref() {
        Some("add") => Some(ResourceAction::Add),
        Some("edit") => Some(ResourceAction::Edit),
        Some("delete") => Some(ResourceAction::Delete),
        _ => None,
    })
}

/// Resource id to dependency entry
pub type DependencyMap = BTreeMap<String, DependencyEntry>;

/// Merges `delta` over `base`, prunes deleted entries and optionally narrows
/// the result to `focal` and its one-hop neighbours in either direction.
pub fn filter_deps(
    base: DependencyMap,
    delta: DependencyMap,
    focal: Option<&str>,
) -> Result<DependencyMap> {
    let mut merged = base;
    merged.extend(delta);
    merged.retain(|_, entry| !entry.is_deleted());

    let Some(focal) = focal else {
        return Ok(merged);
    };

    let focal_entry = merged
        .get(focal)
        .ok_or_else(|| Error::not_found("resource", focal))?;

    let local = merged
        .iter()
        .filter(|(key, entry)| {
            key.as_str() == focal
                || focal_entry.dependencies.iter().any(|d| d == *key)
                || entry.dependencies.iter().any(|d| d == focal)
        })
        .map(|(key, entry)| (key.clone(), entry.clone()))
        .collect();
    Ok(local)
}

/// Fetches the dependency map that matches a plan's type: the edited map
/// for clone plans, the original one for migrate plans.
pub async fn fetch_plan_deps(
    api: &dyn ConveyorApi,
    plan_id: &str,
    plan_type: PlanType,
) -> Result<DependencyMap> {
    match plan_type {
        PlanType::Clone => api.update_dependencies(plan_id).await,
        PlanType::Migrate => api.original_dependencies(plan_id).await,
    }
}

/// Fetches the plan's map and applies [`filter_deps`].
pub async fn filter_plan_deps(
    api: &dyn ConveyorApi,
    plan_id: &str,
    plan_type: PlanType,
    delta: DependencyMap,
    focal: Option<&str>,
) -> Result<DependencyMap> {
    let base = fetch_plan_deps(api, plan_id, plan_type).await?;
    filter_deps(base, delta, focal)
}

/// Which optional destination fields a plan's resources call for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFlags {
    pub show_az: bool,
    pub show_sys_clone: bool,
    pub show_copy_data: bool,
}

impl DisplayFlags {
    pub fn from_deps(deps: &DependencyMap) -> Self {
        let mut flags = DisplayFlags::default();
        for entry in deps.values() {
            match entry.resource_type {
                ResourceType::Server => {
                    return DisplayFlags {
                        show_az: true,
                        show_sys_clone: true,
                        show_copy_data: true,
                    };
                }
                ResourceType::Volume => {
                    flags.show_az = true;
                    flags.show_copy_data = true;
                }
                _ => {}
            }
        }
        flags
    }
}

/// Row of the plan dependency table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRow {
    pub res_id: String,
    pub res_type: ResourceType,
    pub name: String,
    pub dependencies: Vec<String>,
    pub action: Option<ResourceAction>,
}

/// Flattens a dependency map into table rows ordered by resource id.
pub fn dependency_rows(deps: &DependencyMap) -> Vec<DependencyRow> {
    deps.iter()
        .map(|(key, entry)| DependencyRow {
            res_id: key.clone(),
            res_type: entry.resource_type.clone(),
            name: entry.label(key).to_string(),
            dependencies: entry.dependencies.clone(),
            action: entry.action,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(deps: &[&str]) -> DependencyEntry {
        DependencyEntry::new(
            ResourceType::Other("OS::Test::Thing".to_string()),
            deps.iter().map(|d| d.to_string()).collect(),
        )
    }

    fn sample() -> DependencyMap {
        let mut map = DependencyMap::new();
        map.insert("A".to_string(), entry(&["B"]));
        map.insert("B".to_string(), entry(&[]));
        map.insert("C".to_string(), entry(&[]));
        map
    }

    fn keys(map: &DependencyMap) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_focal_slice_is_one_hop_neighbourhood() {
        let local = filter_deps(sample(), DependencyMap::new(), Some("A")).unwrap();
        assert_eq!(keys(&local), vec!["A", "B"]);
    }

    #[test]
    fn test_focal_slice_includes_dependents() {
        let local = filter_deps(sample(), DependencyMap::new(), Some("B")).unwrap();
        assert_eq!(keys(&local), vec!["A", "B"]);

        let local = filter_deps(sample(), DependencyMap::new(), Some("C")).unwrap();
        assert_eq!(keys(&local), vec!["C"]);
    }

    #[test]
    fn test_untyped_delete_delta_removes_entry() {
        let delta: DependencyMap =
            serde_json::from_str(r#"{"B": {"dependencies": ["A"], "action": "delete"}}"#).unwrap();
        assert!(delta["B"].is_deleted());

        let all = filter_deps(sample(), delta.clone(), None).unwrap();
        assert_eq!(keys(&all), vec!["A", "C"]);

        let local = filter_deps(sample(), delta, Some("A")).unwrap();
        assert_eq!(keys(&local), vec!["A"]);
    }

    #[test]
    fn test_no_focal_returns_everything_left() {
        let all = filter_deps(sample(), DependencyMap::new(), None).unwrap();
        assert_eq!(keys(&all), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_deleted_focal_is_not_found() {
        let mut base = sample();
        base.get_mut("A").unwrap().action = Some(ResourceAction::Delete);

        let err = filter_deps(base, DependencyMap::new(), Some("A")).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id, .. } if id == "A"));
    }

    #[test]
    fn test_missing_focal_is_not_found() {
        let err = filter_deps(sample(), DependencyMap::new(), Some("Z")).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_delta_delete_removes_entry_regardless_of_focal() {
        let mut delta = DependencyMap::new();
        delta.insert(
            "B".to_string(),
            entry(&["A"]).with_action(ResourceAction::Delete),
        );

        let all = filter_deps(sample(), delta.clone(), None).unwrap();
        assert_eq!(keys(&all), vec!["A", "C"]);

        let local = filter_deps(sample(), delta, Some("A")).unwrap();
        assert_eq!(keys(&local), vec!["A"]);
    }

    #[test]
    fn test_delta_overrides_base_entry() {
        let mut delta = DependencyMap::new();
        delta.insert("C".to_string(), entry(&["A"]));

        let local = filter_deps(sample(), delta, Some("A")).unwrap();
        assert_eq!(keys(&local), vec!["A", "B", "C"]);
        assert_eq!(local["C"].dependencies, vec!["A".to_string()]);
    }

    #[test]
    fn test_entry_deserializes_backend_shape() {
        let map: DependencyMap = serde_json::from_value(serde_json::json!({
            "server_0": {
                "type": "OS::Nova::Server",
                "id": "6d1c",
                "name_in_template": "server_0",
                "dependencies": ["volume_0"],
                "is_cloned": false
            },
            "volume_0": {"type": "OS::Cinder::Volume", "action": "edit"},
            "net_0": {"type": "OS::Neutron::Net", "action": ""}
        }))
        .unwrap();

        assert_eq!(map["server_0"].resource_type, ResourceType::Server);
        assert_eq!(map["server_0"].label("server_0"), "server_0");
        assert_eq!(map["server_0"].extra["is_cloned"], serde_json::json!(false));
        assert_eq!(map["volume_0"].action, Some(ResourceAction::Edit));
        assert!(map["volume_0"].dependencies.is_empty());
        assert_eq!(map["net_0"].action, None);
    }

    #[test]
    fn test_display_flags() {
        let mut deps = DependencyMap::new();
        deps.insert("net".to_string(), DependencyEntry::new(ResourceType::Net, vec![]));
        assert_eq!(DisplayFlags::from_deps(&deps), DisplayFlags::default());

        deps.insert("vol".to_string(), DependencyEntry::new(ResourceType::Volume, vec![]));
        let flags = DisplayFlags::from_deps(&deps);
        assert!(flags.show_az && flags.show_copy_data && !flags.show_sys_clone);

        deps.insert("srv".to_string(), DependencyEntry::new(ResourceType::Server, vec![]));
        let flags = DisplayFlags::from_deps(&deps);
        assert!(flags.show_az && flags.show_copy_data && flags.show_sys_clone);
    }

    #[test]
    fn test_dependency_rows_sorted_by_id() {
        let rows = dependency_rows(&sample());
        let ids: Vec<&str> = rows.iter().map(|r| r.res_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
        assert_eq!(rows[0].dependencies, vec!["B".to_string()]);
        assert_eq!(rows[0].name, "A");
    }
}
