//! HTTP client for the Conveyor backend

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::ConveyorApi;
use crate::config::BackendConfig;
use crate::deps::DependencyMap;
use crate::error::{Error, Result};
use crate::normalize::NormalizedResource;
use crate::types::{
    AvailabilityZone, Plan, PlanPage, PlanType, ResourceRef, SearchOpts, SortDir,
};

/// [`ConveyorApi`] over the backend's REST interface
#[derive(Debug, Clone)]
pub struct HttpConveyorApi {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
    page_size: usize,
}

#[derive(Deserialize)]
struct PlanEnvelope {
    plan: Plan,
}

#[derive(Deserialize)]
struct PlansEnvelope {
    #[serde(default)]
    plans: Vec<Plan>,
}

#[derive(Deserialize)]
struct DependenciesEnvelope {
    #[serde(default)]
    dependencies: DependencyMap,
}

#[derive(Deserialize)]
struct TemplateEnvelope {
    template: Value,
}

#[derive(Deserialize)]
struct ZonesEnvelope<T> {
    #[serde(default = "Vec::new")]
    availability_zones: Vec<T>,
}

impl HttpConveyorApi {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(Error::InvalidConfig(
                "backend.page_size must be at least 1".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
            page_size: config.page_size,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.endpoint, path);
        debug!(%method, %url, "backend request");
        let builder = self.http.request(method, url);
        match &self.auth_token {
            Some(token) => builder.header("X-Auth-Token", token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        warn!(status = status.as_u16(), %message, "backend request failed");
        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        Ok(response.json().await?)
    }

    async fn post_action(&self, path: &str, body: &Value) -> Result<()> {
        self.send(self.request(Method::POST, path).json(body))
            .await?;
        Ok(())
    }

    async fn dependencies(&self, plan_id: &str, source: &str) -> Result<DependencyMap> {
        let env: DependenciesEnvelope = self
            .get_json(&format!("/plans/{}/dependencies?source={}", plan_id, source))
            .await?;
        Ok(env.dependencies)
    }
}

/// Pulls a readable message out of a backend error body.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        // Either {"message": …}, {"error": …} or one level of nesting
        // such as {"badRequest": {"message": …}}.
        let nested = value.as_object().into_iter().flat_map(|m| m.values());
        for v in std::iter::once(&value).chain(nested) {
            for key in ["message", "error"] {
                if let Some(msg) = v.get(key).and_then(Value::as_str) {
                    return msg.to_string();
                }
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Turns a `page_size + 1` fetch into a page. Ascending fetches walk
/// backwards from the marker and are reversed into newest-first order.
fn page_from_rows(
    mut plans: Vec<Plan>,
    page_size: usize,
    sort_dir: SortDir,
    has_marker: bool,
) -> PlanPage {
    let has_extra = plans.len() > page_size;
    plans.truncate(page_size);
    match sort_dir {
        SortDir::Desc => PlanPage {
            plans,
            has_more: has_extra,
            has_prev: has_marker,
        },
        SortDir::Asc => {
            plans.reverse();
            PlanPage {
                plans,
                has_more: has_marker,
                has_prev: has_extra,
            }
        }
    }
}

#[async_trait]
impl ConveyorApi for HttpConveyorApi {
    async fn plan_create(
        &self,
        plan_type: PlanType,
        resources: &[ResourceRef],
        plan_level: &str,
    ) -> Result<Plan> {
        let body = json!({
            "plan": {
                "type": plan_type,
                "resources": resources,
                "plan_level": plan_level,
            }
        });
        let env: PlanEnvelope = self.post_json("/plans", &body).await?;
        Ok(env.plan)
    }

    async fn create_plan_by_template(&self, template: Value) -> Result<Plan> {
        let body = json!({ "plan": { "template": template } });
        let env: PlanEnvelope = self
            .post_json("/plans/create_plan_by_template", &body)
            .await?;
        Ok(env.plan)
    }

    async fn plan_get(&self, plan_id: &str) -> Result<Plan> {
        let env: PlanEnvelope = self.get_json(&format!("/plans/{}", plan_id)).await?;
        Ok(env.plan)
    }

    async fn plan_get_brief(&self, plan_id: &str) -> Result<Plan> {
        let env: PlanEnvelope = self
            .get_json(&format!("/plans/{}/brief", plan_id))
            .await?;
        Ok(env.plan)
    }

    async fn plan_list(&self, opts: &SearchOpts) -> Result<PlanPage> {
        let limit = (self.page_size + 1).to_string();
        let mut query: Vec<(&str, &str)> = vec![
            ("sort_dir", opts.sort_dir.as_str()),
            ("limit", limit.as_str()),
        ];
        if let Some(marker) = &opts.marker {
            query.push(("marker", marker.as_str()));
        }
        for (key, value) in &opts.filters {
            query.push((key.as_str(), value.as_str()));
        }

        let response = self
            .send(self.request(Method::GET, "/plans/detail").query(&query))
            .await?;
        let env: PlansEnvelope = response.json().await?;
        debug!(rows = env.plans.len(), "fetched plan page");
        Ok(page_from_rows(
            env.plans,
            self.page_size,
            opts.sort_dir,
            opts.marker.is_some(),
        ))
    }

    async fn plan_delete(&self, plan_id: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/plans/{}", plan_id)))
            .await?;
        Ok(())
    }

    async fn update_plan_resource(
        &self,
        plan_id: &str,
        resources: &[NormalizedResource],
    ) -> Result<()> {
        let body = json!({ "update_plan_resources": { "resources": resources } });
        self.post_action(&format!("/plans/{}/action", plan_id), &body)
            .await
    }

    async fn export_clone_template(&self, plan_id: &str, sys_clone: bool) -> Result<()> {
        let body = json!({ "export_clone_template": { "sys_clone": sys_clone } });
        self.post_action(&format!("/clone/{}/action", plan_id), &body)
            .await
    }

    async fn export_migrate_template(&self, plan_id: &str) -> Result<()> {
        let body = json!({ "export_migrate_template": {} });
        self.post_action(&format!("/migrate/{}/action", plan_id), &body)
            .await
    }

    async fn download_template(&self, plan_id: &str) -> Result<Value> {
        let body = json!({ "download_template": {} });
        let env: TemplateEnvelope = self
            .post_json(&format!("/plans/{}/action", plan_id), &body)
            .await?;
        Ok(env.template)
    }

    async fn export_template_and_clone(
        &self,
        plan_id: &str,
        destination: &str,
        resources: &[NormalizedResource],
        sys_clone: bool,
    ) -> Result<()> {
        let body = json!({
            "export_template_and_clone": {
                "destination": destination,
                "resources": resources,
                "sys_clone": sys_clone,
            }
        });
        self.post_action(&format!("/clone/{}/action", plan_id), &body)
            .await
    }

    async fn migrate(&self, plan_id: &str, destination: &str) -> Result<()> {
        let body = json!({ "migrate": { "destination": destination } });
        self.post_action(&format!("/migrate/{}/action", plan_id), &body)
            .await
    }

    async fn update_dependencies(&self, plan_id: &str) -> Result<DependencyMap> {
        self.dependencies(plan_id, "updated").await
    }

    async fn original_dependencies(&self, plan_id: &str) -> Result<DependencyMap> {
        self.dependencies(plan_id, "original").await
    }

    async fn create_increment_plan(
        &self,
        plan_id: &str,
        plan_type: PlanType,
        plan_name: &str,
    ) -> Result<Plan> {
        let body = json!({
            "create_increment_plan": {
                "plan_type": plan_type,
                "plan_name": plan_name,
            }
        });
        let env: PlanEnvelope = self
            .post_json(&format!("/plans/{}/action", plan_id), &body)
            .await?;
        Ok(env.plan)
    }

    async fn availability_zone_list(&self) -> Result<Vec<AvailabilityZone>> {
        let env: ZonesEnvelope<AvailabilityZone> = self.get_json("/availability_zones").await?;
        Ok(env.availability_zones)
    }

    async fn list_plan_resource_availability_zones(&self, plan_id: &str) -> Result<Vec<String>> {
        let body = json!({ "list_plan_resource_availability_zones": {} });
        let env: ZonesEnvelope<String> = self
            .post_json(&format!("/plans/{}/action", plan_id), &body)
            .await?;
        Ok(env.availability_zones)
    }
}
