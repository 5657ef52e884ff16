//! d3 payloads for the plan topology view

use serde::{Deserialize, Serialize};

use crate::deps::DependencyMap;
use crate::types::{ResourceAction, ResourceType};

/// Force-directed graph payload consumed by the topology widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct D3Graph {
    pub nodes: Vec<D3Node>,
    pub links: Vec<D3Link>,
    pub metadata: D3Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct D3Node {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub group: String,
    pub image: String,
    pub focal: bool,
    pub action: Option<ResourceAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct D3Link {
    /// The dependent resource.
    pub source: String,
    /// The resource it depends on.
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct D3Metadata {
    pub total_nodes: usize,
    pub total_links: usize,
    /// Dependencies pointing outside the map (pruned or sliced away).
    pub dangling_links: usize,
}

fn group_for(resource_type: &ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Server | ResourceType::KeyPair | ResourceType::Flavor => "compute",
        ResourceType::Volume | ResourceType::VolumeType | ResourceType::Qos => "storage",
        ResourceType::Net
        | ResourceType::Subnet
        | ResourceType::Port
        | ResourceType::Router
        | ResourceType::RouterInterface
        | ResourceType::FloatingIp => "network",
        ResourceType::SecurityGroup => "security",
        ResourceType::Other(_) => "other",
    }
}

impl D3Graph {
    /// Builds the graph for `deps`, marking `focal` when given.
    pub fn from_deps(deps: &DependencyMap, focal: Option<&str>) -> Self {
        let mut nodes = Vec::with_capacity(deps.len());
        let mut links = Vec::new();
        let mut dangling_links = 0;

        for (id, entry) in deps {
            nodes.push(D3Node {
                id: id.clone(),
                name: entry.label(id).to_string(),
                resource_type: entry.resource_type.clone(),
                group: group_for(&entry.resource_type).to_string(),
                image: entry.resource_type.short_name().to_ascii_lowercase(),
                focal: focal == Some(id.as_str()),
                action: entry.action,
            });

            for dep in &entry.dependencies {
                if deps.contains_key(dep) {
                    links.push(D3Link {
                        source: id.clone(),
                        target: dep.clone(),
                    });
                } else {
                    dangling_links += 1;
                }
            }
        }

        D3Graph {
            metadata: D3Metadata {
                total_nodes: nodes.len(),
                total_links: links.len(),
                dangling_links,
            },
            nodes,
            links,
        }
    }
}

impl From<&DependencyMap> for D3Graph {
    fn from(deps: &DependencyMap) -> Self {
        D3Graph::from_deps(deps, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::{filter_deps, DependencyEntry};

    fn deps() -> DependencyMap {
        let mut map = DependencyMap::new();
        map.insert(
            "server_0".to_string(),
            DependencyEntry::new(
                ResourceType::Server,
                vec!["port_0".to_string(), "volume_0".to_string()],
            ),
        );
        map.insert(
            "port_0".to_string(),
            DependencyEntry::new(ResourceType::Port, vec!["net_0".to_string()]),
        );
        map.insert(
            "volume_0".to_string(),
            DependencyEntry::new(ResourceType::Volume, vec![]),
        );
        map.insert(
            "net_0".to_string(),
            DependencyEntry::new(ResourceType::Net, vec![]),
        );
        map
    }

    #[test]
    fn test_d3_graph_from_full_map() {
        let graph = D3Graph::from(&deps());
        assert_eq!(graph.metadata.total_nodes, 4);
        assert_eq!(graph.metadata.total_links, 3);
        assert_eq!(graph.metadata.dangling_links, 0);

        let server = graph.nodes.iter().find(|n| n.id == "server_0").unwrap();
        assert_eq!(server.group, "compute");
        assert_eq!(server.image, "server");
        assert!(!server.focal);
    }

    #[test]
    fn test_d3_graph_from_slice_counts_dangling() {
        let local = filter_deps(deps(), DependencyMap::new(), Some("port_0")).unwrap();
        let graph = D3Graph::from_deps(&local, Some("port_0"));

        let ids: Vec<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["net_0", "port_0", "server_0"]);
        assert!(graph.nodes.iter().find(|n| n.id == "port_0").unwrap().focal);
        // server_0 -> volume_0 falls outside the slice
        assert_eq!(graph.metadata.dangling_links, 1);
        assert_eq!(
            graph.links,
            vec![
                D3Link { source: "port_0".into(), target: "net_0".into() },
                D3Link { source: "server_0".into(), target: "port_0".into() },
            ]
        );
    }
}
