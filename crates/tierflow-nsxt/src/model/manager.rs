//! Manager (advanced) API objects used for DHCP before 3.0

use super::Tag;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalSwitch {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// DHCP server profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cluster_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalDhcpServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_profile_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_dhcp_server: Option<Ipv4DhcpServer>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ipv4DhcpServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_server_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_nameservers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_switch_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<LogicalPortAttachment>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogicalPortAttachment {
    pub attachment_type: String,

    pub id: String,
}

/// IP pool of a logical DHCP server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpIpPool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default)]
    pub allocation_ranges: Vec<IpPoolRange>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_time: Option<i64>,

    #[serde(default)]
    pub tags: Vec<Tag>,

    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpPoolRange {
    pub start: String,

    pub end: String,
}
