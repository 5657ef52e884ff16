//! Resource update normalization
//!
//! Operators edit plan resources in free-form editors: pools and routes come
//! in as newline separated text, rules as JSON text, flags as strings. Before
//! an update reaches the backend each record is rebuilt into the typed shape
//! the backend expects. Records tagged `add` or `delete` are dropped and every
//! survivor is tagged `edit`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{ResourceAction, ResourceType};

/// A raw resource record as submitted by the editor.
pub type Record = Map<String, Value>;

const TYPE_KEY: &str = "type";

/// Data-format failures while reshaping resource records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error("field '{field}' has an invalid type, expected {expected}")]
    InvalidType { field: String, expected: &'static str },

    #[error("field '{field}' is not a boolean: {value}")]
    InvalidBool { field: String, value: String },

    #[error("field '{field}' is not an integer: {value}")]
    InvalidInteger { field: String, value: String },

    #[error("field '{field}' line {line}: expected two comma separated values, got '{value}'")]
    MalformedPair {
        field: String,
        line: usize,
        value: String,
    },

    #[error("field '{field}' is not valid JSON: {reason}")]
    InvalidJson { field: String, reason: String },
}

// ============================================================================
// Typed records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPool {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRoute {
    pub destination: String,
    pub nexthop: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerUpdate {
    /// Base64 of the UTF-8 user data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubnetUpdate {
    /// `Some(None)` clears the gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_pools: Option<Vec<AllocationPool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_routes: Option<Vec<HostRoute>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_nameservers: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Record,
}

/// Provider attributes extracted from a network's `value_specs`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkValueSpecs {
    #[serde(rename = "router:external", skip_serializing_if = "Option::is_none")]
    pub router_external: Option<bool>,
    #[serde(
        rename = "provider:segmentation_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub segmentation_id: Option<i64>,
    #[serde(
        rename = "provider:physical_network",
        skip_serializing_if = "Option::is_none"
    )]
    pub physical_network: Option<String>,
    #[serde(
        rename = "provider:network_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NetworkUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_specs: Option<NetworkValueSpecs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_state_up: Option<bool>,
    #[serde(flatten)]
    pub extra: Record,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityGroupUpdate {
    /// Rules without their `id` keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Record>>,
    #[serde(flatten)]
    pub extra: Record,
}

/// A record ready for the backend update API. The action is always `edit`.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedResource {
    Server(ServerUpdate),
    Subnet(SubnetUpdate),
    Network(NetworkUpdate),
    SecurityGroup(SecurityGroupUpdate),
    Other {
        resource_type: ResourceType,
        fields: Record,
    },
}

impl NormalizedResource {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            NormalizedResource::Server(_) => ResourceType::Server,
            NormalizedResource::Subnet(_) => ResourceType::Subnet,
            NormalizedResource::Network(_) => ResourceType::Net,
            NormalizedResource::SecurityGroup(_) => ResourceType::SecurityGroup,
            NormalizedResource::Other { resource_type, .. } => resource_type.clone(),
        }
    }

    pub fn action(&self) -> ResourceAction {
        ResourceAction::Edit
    }

    /// The record as a plain JSON mapping.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    resource_type: &'a ResourceType,
    action: ResourceAction,
    #[serde(flatten)]
    body: &'a T,
}

impl Serialize for NormalizedResource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let resource_type = self.resource_type();
        let action = self.action();
        match self {
            NormalizedResource::Server(body) => Envelope {
                resource_type: &resource_type,
                action,
                body,
            }
            .serialize(serializer),
            NormalizedResource::Subnet(body) => Envelope {
                resource_type: &resource_type,
                action,
                body,
            }
            .serialize(serializer),
            NormalizedResource::Network(body) => Envelope {
                resource_type: &resource_type,
                action,
                body,
            }
            .serialize(serializer),
            NormalizedResource::SecurityGroup(body) => Envelope {
                resource_type: &resource_type,
                action,
                body,
            }
            .serialize(serializer),
            NormalizedResource::Other { fields, .. } => Envelope {
                resource_type: &resource_type,
                action,
                body: fields,
            }
            .serialize(serializer),
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Rebuilds editor records into backend update records.
pub fn normalize_update_resources(
    records: Vec<Record>,
) -> Result<Vec<NormalizedResource>, NormalizeError> {
    let mut out = Vec::with_capacity(records.len());
    for (index, mut record) in records.into_iter().enumerate() {
        let action = ResourceAction::from_tag(
            record.get(ResourceAction::KEY).and_then(Value::as_str),
        );
        if action != ResourceAction::Edit {
            continue;
        }
        record.remove(ResourceAction::KEY);

        let resource_type = match record.remove(TYPE_KEY) {
            Some(Value::String(t)) => ResourceType::from(t.as_str()),
            Some(_) => {
                return Err(NormalizeError::InvalidType {
                    field: TYPE_KEY.to_string(),
                    expected: "a resource type string",
                })
            }
            None => {
                return Err(NormalizeError::MissingField {
                    index,
                    field: TYPE_KEY,
                })
            }
        };

        out.push(normalize_record(resource_type, record)?);
    }
    Ok(out)
}

/// Normalizes a submitted `field` holding either JSON text or a list of
/// records. A missing field counts as no updates.
pub fn normalize_update_value(
    field: &str,
    value: Option<Value>,
) -> Result<Vec<NormalizedResource>, NormalizeError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(text)) => {
            let value = serde_json::from_str(&text).map_err(|e| NormalizeError::InvalidJson {
                field: field.to_string(),
                reason: e.to_string(),
            })?;
            normalize_update_resources(records_from_value(field, value)?)
        }
        Some(value) => normalize_update_resources(records_from_value(field, value)?),
    }
}

/// Normalizes one record whose `type` and `action` keys were already taken.
pub fn normalize_record(
    resource_type: ResourceType,
    record: Record,
) -> Result<NormalizedResource, NormalizeError> {
    Ok(match resource_type {
        ResourceType::Server => NormalizedResource::Server(normalize_server(record)?),
        ResourceType::Subnet => NormalizedResource::Subnet(normalize_subnet(record)?),
        ResourceType::Net => NormalizedResource::Network(normalize_network(record)?),
        ResourceType::SecurityGroup => {
            NormalizedResource::SecurityGroup(normalize_security_group(record)?)
        }
        resource_type => NormalizedResource::Other {
            resource_type,
            fields: record,
        },
    })
}

fn normalize_server(mut extra: Record) -> Result<ServerUpdate, NormalizeError> {
    let user_data = match extra.remove("user_data") {
        Some(Value::String(text)) if !text.is_empty() => Some(BASE64.encode(text.as_bytes())),
        // Empty values are left for the backend untouched.
        Some(v @ (Value::String(_) | Value::Null | Value::Bool(false))) => {
            extra.insert("user_data".to_string(), v);
            None
        }
        Some(_) => {
            return Err(NormalizeError::InvalidType {
                field: "user_data".to_string(),
                expected: "text",
            })
        }
        None => None,
    };
    Ok(ServerUpdate { user_data, extra })
}

fn normalize_subnet(mut extra: Record) -> Result<SubnetUpdate, NormalizeError> {
    extra.remove("from_network_id");

    let mut gateway_ip = match extra.remove("gateway_ip") {
        Some(Value::String(ip)) => Some(Some(ip)),
        Some(Value::Null) => Some(None),
        Some(_) => {
            return Err(NormalizeError::InvalidType {
                field: "gateway_ip".to_string(),
                expected: "an IP address string",
            })
        }
        None => None,
    };
    if let Some(flag) = extra.remove("no_gateway") {
        if !flag.is_null() && coerce_bool("no_gateway", &flag)? {
            gateway_ip = Some(None);
        }
    }

    let allocation_pools = take_pairs(&mut extra, "allocation_pools", |start, end| {
        AllocationPool { start, end }
    })?;
    let host_routes = take_pairs(&mut extra, "host_routes", |destination, nexthop| HostRoute {
        destination,
        nexthop,
    })?;
    let dns_nameservers = match extra.remove("dns_nameservers") {
        Some(Value::String(text)) => Some(non_blank_lines(&text).map(str::to_string).collect()),
        Some(Value::Null) => {
            extra.insert("dns_nameservers".to_string(), Value::Null);
            None
        }
        Some(other) => Some(structured("dns_nameservers", other, "a list of strings")?),
        None => None,
    };

    Ok(SubnetUpdate {
        gateway_ip,
        allocation_pools,
        host_routes,
        dns_nameservers,
        extra,
    })
}

fn normalize_network(mut extra: Record) -> Result<NetworkUpdate, NormalizeError> {
    let value_specs = match extra.remove("value_specs") {
        Some(Value::Object(specs)) => Some(extract_value_specs(&specs)?),
        Some(_) => {
            return Err(NormalizeError::InvalidType {
                field: "value_specs".to_string(),
                expected: "a mapping",
            })
        }
        None => None,
    };

    let admin_state_up = match extra.remove("admin_state_up") {
        // An unset field reads as down.
        Some(Value::Null) => Some(false),
        Some(v) => Some(coerce_bool("admin_state_up", &v)?),
        None => None,
    };

    Ok(NetworkUpdate {
        value_specs,
        admin_state_up,
        extra,
    })
}

fn extract_value_specs(specs: &Record) -> Result<NetworkValueSpecs, NormalizeError> {
    let text = |key: &str| -> Result<Option<String>, NormalizeError> {
        match specs.get(key) {
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Null) | None => Ok(None),
            Some(_) => Err(NormalizeError::InvalidType {
                field: format!("value_specs.{}", key),
                expected: "text",
            }),
        }
    };

    Ok(NetworkValueSpecs {
        router_external: specs
            .get("router_external")
            .map(|v| coerce_bool("value_specs.router_external", v))
            .transpose()?,
        segmentation_id: specs
            .get("segmentation_id")
            .map(|v| coerce_int("value_specs.segmentation_id", v))
            .transpose()?,
        physical_network: text("physical_network")?,
        network_type: text("network_type")?,
    })
}

fn normalize_security_group(mut extra: Record) -> Result<SecurityGroupUpdate, NormalizeError> {
    let rules = match extra.remove("rules") {
        Some(Value::String(text)) => {
            let parsed: Value =
                serde_json::from_str(&text).map_err(|e| NormalizeError::InvalidJson {
                    field: "rules".to_string(),
                    reason: e.to_string(),
                })?;
            Some(strip_rule_ids(records_from_value("rules", parsed)?))
        }
        Some(value) => Some(strip_rule_ids(records_from_value("rules", value)?)),
        None => None,
    };
    Ok(SecurityGroupUpdate { rules, extra })
}

fn strip_rule_ids(rules: Vec<Record>) -> Vec<Record> {
    rules
        .into_iter()
        .map(|mut rule| {
            rule.remove("id");
            rule
        })
        .collect()
}

// ============================================================================
// Coercions
// ============================================================================

/// Parses the usual textual spellings of a boolean.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "on" | "y" | "yes" => Some(true),
        "0" | "f" | "false" | "off" | "n" | "no" => Some(false),
        _ => None,
    }
}

fn coerce_bool(field: &str, value: &Value) -> Result<bool, NormalizeError> {
    let invalid = || NormalizeError::InvalidBool {
        field: field.to_string(),
        value: value.to_string(),
    };
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_bool_str(s).ok_or_else(invalid),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(invalid()),
        },
        _ => Err(invalid()),
    }
}

fn coerce_int(field: &str, value: &Value) -> Result<i64, NormalizeError> {
    let invalid = || NormalizeError::InvalidInteger {
        field: field.to_string(),
        value: value.to_string(),
    };
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn non_blank_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn parse_pairs<T>(
    field: &str,
    text: &str,
    build: impl Fn(String, String) -> T,
) -> Result<Vec<T>, NormalizeError> {
    non_blank_lines(text)
        .enumerate()
        .map(|(i, line)| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            match parts.as_slice() {
                [a, b] if !a.is_empty() && !b.is_empty() => {
                    Ok(build(a.to_string(), b.to_string()))
                }
                _ => Err(NormalizeError::MalformedPair {
                    field: field.to_string(),
                    line: i + 1,
                    value: line.to_string(),
                }),
            }
        })
        .collect()
}

fn take_pairs<T: for<'de> Deserialize<'de>>(
    extra: &mut Record,
    field: &str,
    build: impl Fn(String, String) -> T,
) -> Result<Option<Vec<T>>, NormalizeError> {
    match extra.remove(field) {
        Some(Value::String(text)) => parse_pairs(field, &text, build).map(Some),
        Some(Value::Null) => {
            extra.insert(field.to_string(), Value::Null);
            Ok(None)
        }
        Some(other) => structured(field, other, "a list of pairs").map(Some),
        None => Ok(None),
    }
}

fn structured<T: for<'de> Deserialize<'de>>(
    field: &str,
    value: Value,
    expected: &'static str,
) -> Result<T, NormalizeError> {
    serde_json::from_value(value).map_err(|_| NormalizeError::InvalidType {
        field: field.to_string(),
        expected,
    })
}

fn records_from_value(field: &str, value: Value) -> Result<Vec<Record>, NormalizeError> {
    structured(field, value, "a list of mappings")
}
