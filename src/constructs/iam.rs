// Copyright (c) 2025 - Cowboy AI, Inc.
//! IAM roles and policy documents

use serde_json::json;

use crate::domain::Tags;
use crate::graph::kinds::{IamRole, IamRolePolicyAttachment};
use crate::graph::{Block, GraphError, ResourceRef, Stack, Value};

/// Trust policy letting `service` assume a role
pub fn assume_role_policy(service: &str) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Sid": "",
            "Principal": { "Service": service },
        }],
    })
}

/// Policy allowing `actions` on every resource
pub fn allow_policy(actions: &[&str]) -> serde_json::Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Action": actions,
            "Resource": "*",
        }],
    })
}

/// ARN of an AWS-managed policy
pub fn managed_policy_arn(policy: &str) -> String {
    format!("arn:aws:iam::aws:policy/{}", policy)
}

/// Role assumable only by `service`, optionally with one inline policy
pub fn declare_service_role(
    stack: &mut Stack,
    name: &str,
    service: &str,
    inline_policy: Option<(&str, &[&str])>,
    tags: &Tags,
) -> Result<ResourceRef<IamRole>, GraphError> {
    let mut block = Block::new()
        .attr("name", name)
        .attr("assume_role_policy", Value::encoded(assume_role_policy(service)))
        .tags(tags);

    if let Some((policy_name, actions)) = inline_policy {
        block = block.attr(
            "inline_policy",
            Value::list([Value::map([
                ("name", Value::from(policy_name)),
                ("policy", Value::encoded(allow_policy(actions))),
            ])]),
        );
    }

    stack.declare::<IamRole>(name, block)
}

/// Attach an AWS-managed policy to `role`
pub fn attach_managed_policy(
    stack: &mut Stack,
    role: &ResourceRef<IamRole>,
    policy: &str,
) -> Result<ResourceRef<IamRolePolicyAttachment>, GraphError> {
    stack.declare::<IamRolePolicyAttachment>(
        format!("{}-{}", role.name(), policy),
        Block::new()
            .attr("role", role.attr("name"))
            .attr("policy_arn", managed_policy_arn(policy)),
    )
}
