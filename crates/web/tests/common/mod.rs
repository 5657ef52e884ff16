//! Shared helpers for the panel router tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use conveyor_common::mock::MockConveyorApi;
use conveyor_common::PanelConfig;
use conveyor_web::WebServer;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const TOKEN: &str = "panel-secret";

/// Router over `api` with the bearer token enabled.
pub fn router(api: Arc<MockConveyorApi>) -> Router {
    let mut config = PanelConfig::default();
    config.web.auth_token = Some(TOKEN.to_string());
    WebServer::new(api, config).router()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router call failed");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body")
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

fn authorized(method: Method, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, authorized(Method::GET, uri).body(Body::empty()).unwrap()).await
}

pub async fn delete(router: &Router, uri: &str) -> TestResponse {
    send(router, authorized(Method::DELETE, uri).body(Body::empty()).unwrap()).await
}

pub async fn post_json(router: &Router, uri: &str, body: Value) -> TestResponse {
    let request = authorized(Method::POST, uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

pub async fn post_form(router: &Router, uri: &str, fields: &[(&str, &str)]) -> TestResponse {
    let encoded = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, form_escape(v)))
        .collect::<Vec<_>>()
        .join("&");
    let request = authorized(Method::POST, uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(encoded))
        .unwrap();
    send(router, request).await
}

pub async fn post_text(router: &Router, uri: &str, text: &str) -> TestResponse {
    let request = authorized(Method::POST, uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(text.to_string()))
        .unwrap();
    send(router, request).await
}

/// Percent-encodes everything outside the unreserved set.
fn form_escape(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}
