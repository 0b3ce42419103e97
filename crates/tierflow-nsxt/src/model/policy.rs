//! Policy (declarative) API objects

use super::Tag;
use serde::{Deserialize, Serialize};

/// Minimal view of a pre-existing policy object resolved by display name
///
/// Used for tier-0 gateways, transport zones, edge clusters and IP pools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyObject {
    pub id: String,

    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// Tier-1 gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tier1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier0_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failover_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_allocation: Option<String>,

    #[serde(default)]
    pub route_advertisement_types: Vec<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Locale services binding a tier-1 gateway to an edge cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocaleServices {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cluster_path: Option<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Segment attached to a tier-1 gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectivity_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_zone_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_config_path: Option<String>,

    #[serde(default)]
    pub subnets: Vec<SegmentSubnet>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentSubnet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_address: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dhcp_ranges: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_config: Option<SegmentDhcpV4Config>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentDhcpV4Config {
    /// Always `SegmentDhcpV4Config`
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
}

/// IP address allocation from a policy IP pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpAddressAllocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Requested address; left empty to let the pool choose
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_ip: Option<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// NAT rule under `/infra/tier-1s/<id>/nat/USER`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyNatRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_network: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firewall_match: Option<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Policy DHCP server config (3.0 and later)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cluster_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_addresses: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time: Option<i64>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// Entry of `/infra/realized-state/realized-entities`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default)]
    pub extended_attributes: Vec<AttributeVal>,
}

impl RealizedEntity {
    /// First value of an extended attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.extended_attributes
            .iter()
            .find(|a| a.key == key)
            .and_then(|a| a.values.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeVal {
    pub key: String,

    #[serde(default)]
    pub values: Vec<String>,
}

/// Load-balancer object kinds owned by the cloud-controller-manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbKind {
    VirtualServer,
    Pool,
    Service,
}

impl LbKind {
    pub fn collection(&self) -> &'static str {
        match self {
            LbKind::VirtualServer => "lb-virtual-servers",
            LbKind::Pool => "lb-pools",
            LbKind::Service => "lb-services",
        }
    }
}

impl std::fmt::Display for LbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection())
    }
}
