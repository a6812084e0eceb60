use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::types::service::ServiceDefinition;

use super::error::{BrokerError, BrokerResult};
use super::pattern;
use super::tier::resolve_actions;

pub const POLICY_VERSION: &str = "2012-10-17";

const S3_ARN_PREFIX: &str = "arn:aws:s3:::";

/// IAM-style permission document attached to issued credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,

    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Effect")]
    pub effect: String,

    #[serde(rename = "Action")]
    pub action: Vec<String>,

    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
}

impl PolicyDocument {
    /// All actions granted by the document.
    pub fn actions(&self) -> Vec<&str> {
        self.statement
            .iter()
            .flat_map(|s| s.action.iter().map(String::as_str))
            .collect()
    }

    /// All resource ARNs the document is scoped to.
    pub fn resources(&self) -> Vec<&str> {
        self.statement
            .iter()
            .flat_map(|s| s.resource.iter().map(String::as_str))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("encode policy document")
    }
}

/// Builds the least-privilege document for `def`.
///
/// Without a target the scope is every pattern of the service. With a target
/// the scope narrows to the patterns that cover it; a target covered by none
/// of them is rejected. An optional `prefix` further narrows object access to
/// keys below it.
pub fn build_policy(
    def: &ServiceDefinition,
    target: Option<&str>,
    prefix: Option<&str>,
) -> BrokerResult<PolicyDocument> {
    let patterns: Vec<&str> = match target {
        Some(target) => {
            let matched = pattern::matching_patterns(&def.bucket_patterns, target);
            if matched.is_empty() {
                return Err(BrokerError::ResourceNotAuthorized {
                    service: def.name.clone(),
                    resource: target.to_string(),
                });
            }
            matched
        }
        None => def.bucket_patterns.iter().map(String::as_str).collect(),
    };

    if let Some(prefix) = prefix {
        validate_prefix(def, prefix)?;
    }

    let mut resource = Vec::with_capacity(patterns.len() * 2);
    for pattern in patterns {
        resource.push(format!("{S3_ARN_PREFIX}{pattern}"));
        match prefix {
            Some(prefix) => resource.push(format!("{S3_ARN_PREFIX}{pattern}/{prefix}*")),
            None => resource.push(format!("{S3_ARN_PREFIX}{pattern}/*")),
        }
    }

    let action = resolve_actions(def.permission)
        .iter()
        .map(|a| a.to_string())
        .collect();

    Ok(PolicyDocument {
        version: String::from(POLICY_VERSION),
        statement: vec![PolicyStatement {
            effect: String::from("Allow"),
            action,
            resource,
        }],
    })
}

// A prefix may only narrow the grant, so wildcards and path tricks are out.
fn validate_prefix(def: &ServiceDefinition, prefix: &str) -> BrokerResult<()> {
    let invalid = prefix.is_empty()
        || prefix.starts_with('/')
        || prefix.contains(['*', '?'])
        || prefix.split('/').any(|seg| seg == "..")
        || prefix.chars().any(|c| c.is_control());
    if invalid {
        return Err(BrokerError::ResourceNotAuthorized {
            service: def.name.clone(),
            resource: prefix.to_string(),
        });
    }
    Ok(())
}
