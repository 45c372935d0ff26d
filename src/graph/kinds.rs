// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource kinds
//!
//! Zero-sized markers that tie a [`ResourceRef`](super::ResourceRef) to the
//! engine type it was declared as, so a subnet reference cannot be passed
//! where a security group is expected.

/// Engine type of a declarable block
pub trait ResourceKind {
    /// Engine type name, e.g. `aws_vpc`
    const TYPE: &'static str;
    /// Whether the block is a data source rather than a managed resource
    const DATA: bool = false;
}

macro_rules! resource_kinds {
    ($($(#[$meta:meta])* $name:ident => $ty:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub enum $name {}

            impl ResourceKind for $name {
                const TYPE: &'static str = $ty;
            }
        )*
    };
}

macro_rules! data_kinds {
    ($($(#[$meta:meta])* $name:ident => $ty:literal),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub enum $name {}

            impl ResourceKind for $name {
                const TYPE: &'static str = $ty;
                const DATA: bool = true;
            }
        )*
    };
}

resource_kinds! {
    // Network
    Vpc => "aws_vpc",
    Subnet => "aws_subnet",
    InternetGateway => "aws_internet_gateway",
    RouteTable => "aws_route_table",
    RouteTableAssociation => "aws_route_table_association",
    Eip => "aws_eip",
    NatGateway => "aws_nat_gateway",
    SecurityGroup => "aws_security_group",

    // Compute
    LaunchTemplate => "aws_launch_template",
    AutoscalingGroup => "aws_autoscaling_group",
    EcsCluster => "aws_ecs_cluster",
    EcsCapacityProvider => "aws_ecs_capacity_provider",
    EcsClusterCapacityProviders => "aws_ecs_cluster_capacity_providers",
    EcsTaskDefinition => "aws_ecs_task_definition",
    EcsService => "aws_ecs_service",
    EksCluster => "aws_eks_cluster",

    // Identity and logging
    IamRole => "aws_iam_role",
    IamRolePolicyAttachment => "aws_iam_role_policy_attachment",
    IamOpenidConnectProvider => "aws_iam_openid_connect_provider",
    CloudwatchLogGroup => "aws_cloudwatch_log_group",

    // Registry
    EcrRepository => "aws_ecr_repository",

    // Load balancing
    Lb => "aws_lb",
    LbListener => "aws_lb_listener",
    LbTargetGroup => "aws_lb_target_group",
    LbListenerRule => "aws_lb_listener_rule",

    // State backend
    S3Bucket => "aws_s3_bucket",
    S3BucketVersioning => "aws_s3_bucket_versioning",
    DynamodbTable => "aws_dynamodb_table",

    /// Provisioning step with no cloud counterpart (runs local commands)
    NullResource => "null_resource",
}

data_kinds! {
    /// Short-lived registry credential
    EcrAuthorizationToken => "aws_ecr_authorization_token",
    /// TLS certificate chain of a remote endpoint
    TlsCertificate => "tls_certificate",
}
