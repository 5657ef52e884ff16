//! Router tests for the read-only plan views.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{get, post_form, router, send};
use conveyor_common::mock::{sample_plan, MockCall, MockConveyorApi};
use conveyor_common::{
    AvailabilityZone, DependencyEntry, DependencyMap, PlanStatus, PlanType, ResourceRef,
    ResourceType, ZoneState,
};
use serde_json::json;
use std::sync::Arc;

fn server_deps() -> DependencyMap {
    let mut deps = DependencyMap::new();
    deps.insert(
        "server_0".to_string(),
        DependencyEntry::new(
            ResourceType::Server,
            vec!["port_0".to_string(), "volume_0".to_string()],
        ),
    );
    deps.insert(
        "port_0".to_string(),
        DependencyEntry::new(ResourceType::Port, vec!["net_0".to_string()]),
    );
    deps.insert(
        "volume_0".to_string(),
        DependencyEntry::new(ResourceType::Volume, vec![]),
    );
    deps.insert(
        "net_0".to_string(),
        DependencyEntry::new(ResourceType::Net, vec![]),
    );
    deps
}

fn zone(name: &str, available: bool) -> AvailabilityZone {
    AvailabilityZone {
        zone_name: name.to_string(),
        zone_state: ZoneState { available },
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = router(Arc::new(MockConveyorApi::new()));
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let resp = send(&app, request).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "ok");
}

#[tokio::test]
async fn test_plan_api_requires_token() {
    let app = router(Arc::new(MockConveyorApi::new()));

    let request = Request::builder()
        .uri("/api/plans")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/plans")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&app, request).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_index_lists_plans_with_actions() {
    let api = Arc::new(
        MockConveyorApi::new()
            .with_plan(sample_plan("p1", PlanType::Clone, PlanStatus::Available))
            .with_plan(sample_plan("p2", PlanType::Migrate, PlanStatus::Initiating)),
    );
    let app = router(api.clone());

    let resp = get(&app, "/api/plans").await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let plans = body["plans"].as_array().unwrap();
    assert_eq!(plans.len(), 2);

    let p2 = plans.iter().find(|p| p["plan_id"] == "p2").unwrap();
    assert_eq!(p2["actions"], json!(["generate_template", "delete"]));
    assert_eq!(p2["display_name"], "p2-name");
    assert_eq!(body["table_actions"], json!(["import"]));

    let resp = get(&app, "/api/plans?filter=P1").await;
    let body = resp.json();
    assert_eq!(body["plans"].as_array().unwrap().len(), 1);
    assert_eq!(body["plans"][0]["plan_id"], "p1");
}

#[tokio::test]
async fn test_detail_backend_failure_hides_details() {
    let api = Arc::new(MockConveyorApi::new());
    api.fail("plan_get_brief");
    let app = router(api);

    let resp = get(&app, "/api/plans/p9").await;
    assert_eq!(resp.status, StatusCode::BAD_GATEWAY);
    let body = resp.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unable to retrieve details for plan p9.");
    assert_eq!(body["redirect"], "/plans");
}

#[tokio::test]
async fn test_clone_view_creates_plan_from_ids() {
    let api = Arc::new(MockConveyorApi::new().with_update_dependencies("plan-1", server_deps()));
    let app = router(api.clone());

    let resp = get(
        &app,
        "/api/plans/clone?ids=OS::Nova::Server*s1,s2**OS::Cinder::Volume*v1",
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["plan_id"], "plan-1");
    assert_eq!(body["is_original"], true);
    assert_eq!(body["header"], "Clone Plan plan-1");
    assert_eq!(body["dependencies"].as_array().unwrap().len(), 4);
    assert_eq!(body["d3_data"]["metadata"]["total_links"], 3);

    let calls = api.calls();
    assert_eq!(
        calls[0],
        MockCall::PlanCreate {
            plan_type: PlanType::Clone,
            resources: vec![
                ResourceRef {
                    resource_type: ResourceType::Server,
                    id: "s1".to_string()
                },
                ResourceRef {
                    resource_type: ResourceType::Server,
                    id: "s2".to_string()
                },
                ResourceRef {
                    resource_type: ResourceType::Volume,
                    id: "v1".to_string()
                },
            ],
            plan_level: "atomic".to_string(),
        }
    );
    assert_eq!(calls[1], MockCall::UpdateDependencies("plan-1".to_string()));
}

#[tokio::test]
async fn test_clone_view_rejects_bad_query() {
    let api = Arc::new(MockConveyorApi::new());
    let app = router(api.clone());

    let resp = get(&app, "/api/plans/clone?ids=OS::Nova::Server").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["error"]
        .as_str()
        .unwrap()
        .starts_with("Query string is not a correct format."));

    let resp = get(&app, "/api/plans/clone").await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_migrate_view_loads_existing_plan() {
    let api = Arc::new(
        MockConveyorApi::new()
            .with_plan(sample_plan("p2", PlanType::Migrate, PlanStatus::Available))
            .with_original_dependencies("p2", server_deps()),
    );
    let app = router(api.clone());

    let resp = get(&app, "/api/plans/migrate?plan_id=p2").await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_original"], false);
    assert_eq!(body["plan_type"], "migrate");
    assert_eq!(
        api.call_ops(),
        vec!["plan_get_brief", "original_dependencies"]
    );
}

#[tokio::test]
async fn test_incremental_clone_names_new_plan() {
    let api = Arc::new(
        MockConveyorApi::new().with_plan(sample_plan("p1", PlanType::Clone, PlanStatus::Finished)),
    );
    let app = router(api.clone());

    let resp = get(&app, "/api/plans/p1/incremental_clone").await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["is_original"], true);
    assert_eq!(body["plan"]["plan_name"], "increment-of-p1");
    assert!(body["header"].as_str().unwrap().starts_with("Increment Plan "));
    assert!(api.calls().contains(&MockCall::CreateIncrementPlan {
        plan_id: "p1".to_string(),
        plan_type: PlanType::Clone,
        plan_name: "increment-of-p1".to_string(),
    }));
}

#[tokio::test]
async fn test_save_view_reports_display_flags() {
    let mut deps = DependencyMap::new();
    deps.insert(
        "volume_0".to_string(),
        DependencyEntry::new(ResourceType::Volume, vec![]),
    );
    let api = Arc::new(
        MockConveyorApi::new()
            .with_plan(sample_plan("p1", PlanType::Clone, PlanStatus::Initiating))
            .with_update_dependencies("p1", deps),
    );
    let app = router(api);

    let body = get(&app, "/api/plans/p1/save").await.json();
    assert_eq!(body["show_az"], true);
    assert_eq!(body["show_copy_data"], true);
    assert_eq!(body["show_sys_clone"], false);
    assert_eq!(body["copy_data"], true);
}

#[tokio::test]
async fn test_destination_view_offers_available_zones() {
    let api = Arc::new(
        MockConveyorApi::new()
            .with_plan(sample_plan("p1", PlanType::Clone, PlanStatus::Available))
            .with_update_dependencies("p1", server_deps())
            .with_plan_zones("p1", vec!["az-1".to_string()])
            .with_zones(vec![
                zone("az-1", true),
                zone("az-2", false),
                zone("az-3", true),
                zone("az-1", true),
            ]),
    );
    let app = router(api);

    let resp = get(&app, "/api/plans/p1/destination").await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["header"], "Clone Destination");
    assert_eq!(body["submit_label"], "Clone");
    assert_eq!(body["src_azs"], json!(["az-1"]));
    assert_eq!(body["availability_zones"], json!(["az-1", "az-3"]));
    assert_eq!(body["show_sys_clone"], true);
}

#[tokio::test]
async fn test_export_serves_yaml_attachment() {
    let api = Arc::new(MockConveyorApi::new().with_template(
        "p1",
        json!({"heat_template_version": "2013-05-23", "resources": {"server_0": {"type": "OS::Nova::Server"}}}),
    ));
    let app = router(api);

    let resp = get(&app, "/api/plans/p1/export").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(
        resp.headers[header::CONTENT_DISPOSITION],
        "attachment; filename=plan-p1"
    );
    let yaml: serde_yaml::Value = serde_yaml::from_str(&resp.text()).unwrap();
    assert_eq!(yaml["resources"]["server_0"]["type"], "OS::Nova::Server");
}

#[tokio::test]
async fn test_local_topology_applies_unsaved_edits() {
    let api = Arc::new(MockConveyorApi::new().with_update_dependencies("p1", server_deps()));
    let app = router(api);

    let deps = json!({
        "volume_0": {"type": "OS::Cinder::Volume", "dependencies": [], "action": "delete"}
    })
    .to_string();
    let resp = post_form(
        &app,
        "/api/plans/topology/local",
        &[
            ("param", "plan_id=p1&plan_type=clone&res_id=server_0"),
            ("deps", &deps),
        ],
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let ids: Vec<&str> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["port_0", "server_0"]);
    // server_0 -> volume_0 was deleted, port_0 -> net_0 lies outside the slice
    assert_eq!(body["metadata"]["dangling_links"], 2);
    assert_eq!(body["nodes"][1]["focal"], true);
}

#[tokio::test]
async fn test_local_topology_unknown_focal_is_not_found() {
    let api = Arc::new(MockConveyorApi::new().with_original_dependencies("p2", server_deps()));
    let app = router(api);

    let resp = post_form(
        &app,
        "/api/plans/topology/local",
        &[("param", "plan_id=p2&plan_type=migrate&res_id=router_9"), ("deps", "{}")],
    )
    .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.json()["success"], false);
}

#[tokio::test]
async fn test_global_topology_accepts_untyped_delete() {
    let api = Arc::new(MockConveyorApi::new().with_update_dependencies("p1", server_deps()));
    let app = router(api);

    let resp = post_form(
        &app,
        "/api/plans/topology/global",
        &[
            ("param", "plan_id=p1&plan_type=clone"),
            ("deps", r#"{"port_0": {"dependencies": ["server_0"], "action": "delete"}}"#),
        ],
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    let ids: Vec<&str> = body["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["net_0", "server_0", "volume_0"]);
}

#[tokio::test]
async fn test_global_topology_returns_whole_map() {
    let api = Arc::new(MockConveyorApi::new().with_original_dependencies("p2", server_deps()));
    let app = router(api);

    let resp = post_form(
        &app,
        "/api/plans/topology/global",
        &[("param", "plan_id=p2&plan_type=migrate"), ("deps", "")],
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["metadata"]["total_nodes"], 4);
}
