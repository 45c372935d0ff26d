// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid IPv4 address format: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32)")]
    InvalidPrefixLength(u8),

    #[error("CIDR {cidr} has host bits set (network address is {network})")]
    HostBitsSet { cidr: String, network: String },

    #[error("No availability zones configured")]
    NoZones,

    #[error("Invalid availability zone name: {0:?}")]
    InvalidZone(String),

    #[error("Availability zone {0} listed more than once")]
    DuplicateZone(String),

    #[error("Availability zone {zone} is not in region {region}")]
    ZoneOutsideRegion { zone: String, region: String },
}

/// Validate an ordered list of availability zones
///
/// # Rules
/// - At least one zone
/// - Names are non-empty ASCII alphanumerics and hyphens
/// - No zone appears twice
/// - With a `region`, every zone is the region name plus a suffix
///
/// ```rust
/// use cim_infrastructure_aws::domain::network::{validate_zones, NetworkError};
///
/// let zones = vec!["us-east-1a".to_string(), "us-east-1b".to_string()];
/// assert!(validate_zones(&zones, Some("us-east-1")).is_ok());
/// assert!(matches!(
///     validate_zones(&zones, Some("eu-west-1")),
///     Err(NetworkError::ZoneOutsideRegion { .. })
/// ));
/// ```
pub fn validate_zones(zones: &[String], region: Option<&str>) -> Result<(), NetworkError> {
    if zones.is_empty() {
        return Err(NetworkError::NoZones);
    }

    let mut seen = BTreeSet::new();
    for zone in zones {
        if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(NetworkError::InvalidZone(zone.clone()));
        }
        if !seen.insert(zone.as_str()) {
            return Err(NetworkError::DuplicateZone(zone.clone()));
        }
        if let Some(region) = region {
            let in_region = zone
                .strip_prefix(region)
                .is_some_and(|suffix| !suffix.is_empty());
            if !in_region {
                return Err(NetworkError::ZoneOutsideRegion {
                    zone: zone.clone(),
                    region: region.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// IPv4 network block in CIDR notation
///
/// Invariants:
/// - Valid dotted-quad address
/// - Prefix length 0-32
/// - Canonical form: host bits are zero, so `10.0.1.0/16` is rejected
///
/// # Examples
///
/// ```rust
/// use cim_infrastructure_aws::domain::Ipv4Cidr;
///
/// let vpc = Ipv4Cidr::new("10.0.0.0/16").unwrap();
/// let subnet = Ipv4Cidr::new("10.0.96.0/19").unwrap();
/// assert!(vpc.contains(&subnet));
/// assert_eq!(subnet.address_count(), 8192);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ipv4Cidr {
    network: Ipv4Addr,
    prefix_length: u8,
}

impl Ipv4Cidr {
    /// Parse a CIDR block such as `10.0.0.0/16`
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref().trim();

        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidIpAddress(addr_str.to_string()))?;

        let prefix_length = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        let block = Self::from_parts(address, prefix_length)?;
        if block.network != address {
            return Err(NetworkError::HostBitsSet {
                cidr: cidr.to_string(),
                network: block.to_string(),
            });
        }

        Ok(block)
    }

    /// Create from an address and prefix, masking away host bits
    pub fn from_parts(address: Ipv4Addr, prefix_length: u8) -> Result<Self, NetworkError> {
        if prefix_length > 32 {
            return Err(NetworkError::InvalidPrefixLength(prefix_length));
        }

        let network = Ipv4Addr::from(u32::from(address) & Self::mask(prefix_length));
        Ok(Self {
            network,
            prefix_length,
        })
    }

    fn mask(prefix_length: u8) -> u32 {
        if prefix_length == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_length))
        }
    }

    /// Network address
    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    /// Prefix length
    pub fn prefix_length(&self) -> u8 {
        self.prefix_length
    }

    fn first(&self) -> u32 {
        u32::from(self.network)
    }

    fn last(&self) -> u32 {
        self.first() | !Self::mask(self.prefix_length)
    }

    /// Last address of the block (broadcast address for IPv4)
    pub fn last_address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.last())
    }

    /// Number of addresses covered by the block
    pub fn address_count(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_length))
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &Ipv4Cidr) -> bool {
        other.prefix_length >= self.prefix_length
            && (other.first() & Self::mask(self.prefix_length)) == self.first()
    }

    /// Whether the two blocks share at least one address
    pub fn overlaps(&self, other: &Ipv4Cidr) -> bool {
        self.first() <= other.last() && other.first() <= self.last()
    }

    /// Whether a single address falls in the block
    pub fn contains_address(&self, address: Ipv4Addr) -> bool {
        (u32::from(address) & Self::mask(self.prefix_length)) == self.first()
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_length)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ipv4Cidr {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ipv4Cidr> for String {
    fn from(value: Ipv4Cidr) -> Self {
        value.to_string()
    }
}

/// The default route, `0.0.0.0/0`
pub const ANY_IPV4: &str = "0.0.0.0/0";

/// The IPv6 default route, `::/0`
pub const ANY_IPV6: &str = "::/0";
