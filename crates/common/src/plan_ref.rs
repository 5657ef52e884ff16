//! Query-string encodings used by the panel
//!
//! Resource tables hand selected resources to the clone/migrate views as
//! `type*id1,id2**type*id3`; the topology widget posts its parameters as a
//! single `key=value&key=value` string.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::types::{ResourceRef, ResourceType};

/// Parses `type*id1,id2**type*id3` into resource references in input order.
pub fn parse_resource_ids(ids: &str) -> Result<Vec<ResourceRef>> {
    let mut refs = Vec::new();
    for segment in ids.split("**") {
        let (resource_type, id_list) = segment.split_once('*').ok_or_else(|| {
            Error::validation(format!("resource segment '{}' has no type separator", segment))
        })?;
        if resource_type.is_empty() {
            return Err(Error::validation(format!(
                "resource segment '{}' has an empty type",
                segment
            )));
        }

        for id in id_list.split(',') {
            if id.is_empty() {
                return Err(Error::validation(format!(
                    "resource segment '{}' has an empty id",
                    segment
                )));
            }
            refs.push(ResourceRef {
                resource_type: ResourceType::from(resource_type),
                id: id.to_string(),
            });
        }
    }
    Ok(refs)
}

/// Parses `a=1&b=2`. Every pair must contain `=`; later keys win.
pub fn parse_param_string(param: &str) -> Result<BTreeMap<String, String>> {
    param
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| Error::validation(format!("malformed parameter '{}'", pair)))
        })
        .collect()
}

/// Looks up a required parameter.
pub fn required_param<'a>(params: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::validation(format!("missing parameter '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resource_ids() {
        let refs =
            parse_resource_ids("OS::Nova::Server*s1,s2**OS::Cinder::Volume*v1").unwrap();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].resource_type, ResourceType::Server);
        assert_eq!(refs[1].id, "s2");
        assert_eq!(refs[2].resource_type, ResourceType::Volume);
        assert_eq!(refs[2].id, "v1");
    }

    #[test]
    fn test_parse_resource_ids_rejects_malformed() {
        assert!(matches!(
            parse_resource_ids("OS::Nova::Server"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            parse_resource_ids("OS::Nova::Server*s1,"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(parse_resource_ids("*s1"), Err(Error::Validation(_))));
        assert!(matches!(parse_resource_ids(""), Err(Error::Validation(_))));
    }

    #[test]
    fn test_parse_param_string() {
        let params = parse_param_string("plan_id=p1&plan_type=clone&res_id=server_0").unwrap();
        assert_eq!(required_param(&params, "plan_id").unwrap(), "p1");
        assert_eq!(required_param(&params, "res_id").unwrap(), "server_0");
        assert!(matches!(
            required_param(&params, "missing"),
            Err(Error::Validation(_))
        ));
        assert!(parse_param_string("plan_id").is_err());
    }
}
