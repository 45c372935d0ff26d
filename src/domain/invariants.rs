// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Domain Invariants
//!
//! Every rule that must hold before a resource is declared lives here.
//! All functions are pure (no side effects) and return detailed validation
//! results, so a failing check never leaves a half-built stack behind.
//!
//! # Invariant Categories
//!
//! 1. **Structural Invariants**: identifiers, CIDR syntax, ranges
//! 2. **Topology Invariants**: subnet pairing, containment, overlap, zone capacity
//! 3. **Routing Invariants**: listener priorities and path patterns

use std::fmt;

use super::network::{Ipv4Cidr, NetworkError};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Which half of the network a subnet belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubnetTier {
    /// Routed to the internet gateway
    Public,
    /// Routed through a NAT gateway
    Private,
}

impl SubnetTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for SubnetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation error with context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// CIDR could not be parsed
    #[error("Invalid network block: {0}")]
    Network(#[from] NetworkError),

    /// Identifier not usable as a stack or resource label
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Public/private CIDR lists differ in length
    #[error("Subnet count mismatch: {public} public CIDRs but {private} private CIDRs")]
    MismatchedSubnetCounts { public: usize, private: usize },

    /// A subnet tier has no CIDRs at all
    #[error("No {tier} subnets specified")]
    EmptySubnetTier { tier: SubnetTier },

    /// More subnets per tier than availability zones
    #[error("{required} subnets per tier need {required} availability zones, only {available} configured")]
    InsufficientZones { required: usize, available: usize },

    /// Subnet not contained in the VPC block
    #[error("Subnet {subnet} is outside VPC block {vpc}")]
    SubnetOutsideVpc { subnet: Ipv4Cidr, vpc: Ipv4Cidr },

    /// Two subnets share addresses
    #[error("Subnets {first} and {second} overlap")]
    OverlappingSubnets { first: Ipv4Cidr, second: Ipv4Cidr },

    /// Scaling bounds out of order
    #[error("Invalid scaling bounds: min {min}, desired {desired}, max {max}")]
    InvalidScalingBounds { min: u32, desired: u32, max: u32 },

    /// Host and container ports differ where the task owns its interface
    #[error("Port mapping {host_port} -> {container_port} is not usable with awsvpc networking")]
    InvalidPortMapping { container_port: u16, host_port: u16 },

    /// Task CPU/memory not usable
    #[error("Invalid resource shape: cpu {cpu}, memory {memory} MiB")]
    InvalidResourceShape { cpu: u32, memory: u32 },

    /// Log retention not one of the accepted values
    #[error("Unsupported log retention period: {0} days")]
    InvalidRetention(u32),

    /// Route path prefix malformed
    #[error("Invalid path prefix: {0:?} (must start with '/' and contain no '*')")]
    InvalidPathPrefix(String),

    /// Listener rule priority out of range
    #[error("Listener priority {0} out of range 1-50000")]
    PriorityOutOfRange(u32),

    /// Listener rule priority already used
    #[error("Listener priority {0} is already taken")]
    DuplicatePriority(u32),

    /// Path pattern already routed on the listener
    #[error("Path pattern {0:?} is already routed on this listener")]
    DuplicatePathPattern(String),

    /// Required value missing
    #[error("Required field is empty: {0}")]
    EmptyField(&'static str),
}

/// Network shape after all invariants have been checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedNetwork {
    pub vpc: Ipv4Cidr,
    pub public: Vec<Ipv4Cidr>,
    pub private: Vec<Ipv4Cidr>,
}

/// Validate a requested network layout
///
/// # Rules
/// - Every block parses as a canonical IPv4 CIDR
/// - Both tiers are non-empty and equally long
/// - No tier has more subnets than there are availability zones
/// - Every subnet lies inside the VPC block
/// - No two subnets overlap, across tiers as well as within one
pub fn validate_network_spec(
    cidr_block: &str,
    public_cidrs: &[String],
    private_cidrs: &[String],
    zone_count: usize,
) -> Result<ValidatedNetwork, ValidationError> {
    let vpc = Ipv4Cidr::new(cidr_block)?;
    let public = parse_blocks(public_cidrs)?;
    let private = parse_blocks(private_cidrs)?;

    if public.is_empty() {
        return Err(ValidationError::EmptySubnetTier {
            tier: SubnetTier::Public,
        });
    }
    if private.is_empty() {
        return Err(ValidationError::EmptySubnetTier {
            tier: SubnetTier::Private,
        });
    }

    if public.len() != private.len() {
        return Err(ValidationError::MismatchedSubnetCounts {
            public: public.len(),
            private: private.len(),
        });
    }

    if public.len() > zone_count {
        return Err(ValidationError::InsufficientZones {
            required: public.len(),
            available: zone_count,
        });
    }

    let all: Vec<Ipv4Cidr> = public.iter().chain(private.iter()).copied().collect();
    for subnet in &all {
        if !vpc.contains(subnet) {
            return Err(ValidationError::SubnetOutsideVpc {
                subnet: *subnet,
                vpc,
            });
        }
    }

    for (i, first) in all.iter().enumerate() {
        for second in &all[i + 1..] {
            if first.overlaps(second) {
                return Err(ValidationError::OverlappingSubnets {
                    first: *first,
                    second: *second,
                });
            }
        }
    }

    Ok(ValidatedNetwork {
        vpc,
        public,
        private,
    })
}

fn parse_blocks(cidrs: &[String]) -> Result<Vec<Ipv4Cidr>, ValidationError> {
    cidrs
        .iter()
        .map(|cidr| Ipv4Cidr::new(cidr).map_err(ValidationError::from))
        .collect()
}

/// Validate autoscaling bounds
///
/// # Rules
/// - `min <= desired <= max`
/// - `max` is at least 1
pub fn validate_scaling_bounds(min: u32, desired: u32, max: u32) -> ValidationResult {
    if max == 0 || min > desired || desired > max {
        return Err(ValidationError::InvalidScalingBounds { min, desired, max });
    }
    Ok(())
}

/// Validate task CPU units and memory
///
/// # Rules
/// - CPU is one of the task-level sizes (256 .. 16384 units)
/// - Memory is non-zero and at least 512 MiB per vCPU below 1024 units,
///   2 GiB per vCPU above
pub fn validate_resource_shape(cpu: u32, memory: u32) -> ValidationResult {
    const CPU_SIZES: [u32; 7] = [256, 512, 1024, 2048, 4096, 8192, 16384];

    if !CPU_SIZES.contains(&cpu) {
        return Err(ValidationError::InvalidResourceShape { cpu, memory });
    }

    let minimum_memory = match cpu {
        256 => 512,
        512 => 1024,
        other => other * 2,
    };

    if memory < minimum_memory {
        return Err(ValidationError::InvalidResourceShape { cpu, memory });
    }
    Ok(())
}

/// Validate a container port mapping under `awsvpc` networking
///
/// # Rules
/// - Ports are non-zero
/// - The host port equals the container port, since each task owns its
///   network interface
pub fn validate_port_mapping(container_port: u16, host_port: u16) -> ValidationResult {
    if container_port == 0 || host_port != container_port {
        return Err(ValidationError::InvalidPortMapping {
            container_port,
            host_port,
        });
    }
    Ok(())
}

/// Validate log retention
///
/// # Rules
/// - One of the retention periods the log service accepts; 0 keeps forever
pub fn validate_log_retention(days: u32) -> ValidationResult {
    const ALLOWED: [u32; 23] = [
        0, 1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557,
        2922, 3288, 3653,
    ];

    if !ALLOWED.contains(&days) {
        return Err(ValidationError::InvalidRetention(days));
    }
    Ok(())
}

/// Validate a routing path prefix and return the listener path pattern
///
/// # Rules
/// - Starts with `/`
/// - Contains no wildcard; the trailing `*` is appended here
pub fn path_pattern_for(prefix: &str) -> Result<String, ValidationError> {
    if !prefix.starts_with('/') || prefix.contains('*') || prefix.contains(char::is_whitespace) {
        return Err(ValidationError::InvalidPathPrefix(prefix.to_string()));
    }
    Ok(format!("{prefix}*"))
}

/// Validate a listener rule priority
pub fn validate_listener_priority(priority: u32) -> ValidationResult {
    if !(1..=50_000).contains(&priority) {
        return Err(ValidationError::PriorityOutOfRange(priority));
    }
    Ok(())
}

/// Validate a required string
pub fn validate_non_empty(value: &str, field: &'static str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_network_spec_valid() {
        let network = validate_network_spec(
            "10.0.0.0/16",
            &strings(&["10.0.96.0/19", "10.0.128.0/19", "10.0.160.0/19"]),
            &strings(&["10.0.0.0/19", "10.0.32.0/19", "10.0.64.0/19"]),
            3,
        )
        .unwrap();

        assert_eq!(network.public.len(), 3);
        assert_eq!(network.private[2].to_string(), "10.0.64.0/19");
    }

    #[test]
    fn test_validate_network_spec_mismatch() {
        let result = validate_network_spec(
            "10.0.0.0/16",
            &strings(&["10.0.96.0/19", "10.0.128.0/19", "10.0.160.0/19"]),
            &strings(&["10.0.0.0/19", "10.0.32.0/19"]),
            3,
        );
        assert_eq!(
            result.unwrap_err(),
            ValidationError::MismatchedSubnetCounts {
                public: 3,
                private: 2
            }
        );
    }

    #[test]
    fn test_validate_network_spec_zone_capacity() {
        let result = validate_network_spec(
            "10.0.0.0/16",
            &strings(&["10.0.96.0/19", "10.0.128.0/19"]),
            &strings(&["10.0.0.0/19", "10.0.32.0/19"]),
            1,
        );
        assert!(matches!(
            result,
            Err(ValidationError::InsufficientZones {
                required: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn test_validate_network_spec_overlap_across_tiers() {
        let result = validate_network_spec(
            "10.0.0.0/16",
            &strings(&["10.0.0.0/19"]),
            &strings(&["10.0.16.0/20"]),
            3,
        );
        assert!(matches!(
            result,
            Err(ValidationError::OverlappingSubnets { .. })
        ));
    }

    #[test]
    fn test_validate_network_spec_outside_vpc() {
        let result = validate_network_spec(
            "192.168.0.0/16",
            &strings(&["192.168.0.0/18"]),
            &strings(&["10.0.0.0/18"]),
            3,
        );
        assert!(matches!(
            result,
            Err(ValidationError::SubnetOutsideVpc { .. })
        ));
    }

    #[test]
    fn test_validate_network_spec_empty_tier() {
        let result = validate_network_spec("10.0.0.0/16", &[], &[], 3);
        assert_eq!(
            result.unwrap_err(),
            ValidationError::EmptySubnetTier {
                tier: SubnetTier::Public
            }
        );
    }

    #[test]
    fn test_validate_scaling_bounds() {
        assert!(validate_scaling_bounds(1, 1, 1).is_ok());
        assert!(validate_scaling_bounds(1, 2, 3).is_ok());
        assert!(validate_scaling_bounds(2, 1, 3).is_err());
        assert!(validate_scaling_bounds(1, 4, 3).is_err());
        assert!(validate_scaling_bounds(0, 0, 0).is_err());
    }

    #[test_case(256, 512, true ; "smallest task")]
    #[test_case(512, 1024, true ; "half vcpu")]
    #[test_case(1024, 2048, true ; "one vcpu")]
    #[test_case(256, 256, false ; "too little memory")]
    #[test_case(300, 1024, false ; "odd cpu size")]
    #[test_case(3_000_000_000, 1024, false ; "cpu beyond any size")]
    #[test_case(u32::MAX, u32::MAX, false ; "maximum cpu")]
    fn test_validate_resource_shape(cpu: u32, memory: u32, ok: bool) {
        assert_eq!(validate_resource_shape(cpu, memory).is_ok(), ok);
    }

    #[test_case(8080, 8080, true ; "matching ports")]
    #[test_case(8080, 80, false ; "host port differs")]
    #[test_case(0, 0, false ; "zero port")]
    fn test_validate_port_mapping(container_port: u16, host_port: u16, ok: bool) {
        assert_eq!(validate_port_mapping(container_port, host_port).is_ok(), ok);
    }

    #[test]
    fn test_validate_log_retention() {
        assert!(validate_log_retention(30).is_ok());
        assert!(validate_log_retention(0).is_ok());
        assert_eq!(
            validate_log_retention(31).unwrap_err(),
            ValidationError::InvalidRetention(31)
        );
    }

    #[test_case("/", "/*" ; "root")]
    #[test_case("/api", "/api*" ; "prefix")]
    #[test_case("/api/v1/", "/api/v1/*" ; "nested")]
    fn test_path_pattern_for(prefix: &str, expected: &str) {
        assert_eq!(path_pattern_for(prefix).unwrap(), expected);
    }

    #[test]
    fn test_path_pattern_rejects_malformed() {
        assert!(path_pattern_for("api").is_err());
        assert!(path_pattern_for("/api*").is_err());
        assert!(path_pattern_for("").is_err());
    }

    #[test]
    fn test_validate_listener_priority() {
        assert!(validate_listener_priority(1).is_ok());
        assert!(validate_listener_priority(50_000).is_ok());
        assert!(validate_listener_priority(0).is_err());
        assert!(validate_listener_priority(50_001).is_err());
    }
}
