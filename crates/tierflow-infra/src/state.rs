//! Accumulated references of one cluster's infrastructure
//!
//! Every reference is a weak pointer into the control plane: the object is
//! owned remotely and the state only remembers how to find it again. Fields
//! fill up in pipeline order, so a state left behind by a failed run is
//! always a prefix of a converged one.

use serde::{Deserialize, Serialize};

/// Schema version written next to every checkpoint
pub const STATE_VERSION: &str = "1.0";

/// Id and path of a remote object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    pub path: String,
}

impl Reference {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Set once a reconcile got past credential validation
    #[serde(default)]
    pub creation_started: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier0_gateway_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_cluster_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_zone_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snat_ip_pool_ref: Option<Reference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier1_gateway_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_service_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_server_config_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snat_ip_address_alloc_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snat_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snat_rule_ref: Option<Reference>,

    /// DHCP objects of the manager API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced_dhcp: Option<AdvancedDhcpState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedDhcpState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_switch_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_ref: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_pool_ref: Option<Reference>,
}

impl AdvancedDhcpState {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl State {
    pub fn new() -> Self {
        Self {
            version: Some(STATE_VERSION.to_string()),
            ..Self::default()
        }
    }

    /// Advanced DHCP sub-state, created on first use
    pub fn advanced_dhcp_mut(&mut self) -> &mut AdvancedDhcpState {
        self.advanced_dhcp.get_or_insert_with(AdvancedDhcpState::default)
    }

    /// Drop the advanced DHCP sub-state once all its references are gone.
    pub fn prune_advanced_dhcp(&mut self) {
        if self.advanced_dhcp.as_ref().is_some_and(AdvancedDhcpState::is_empty) {
            self.advanced_dhcp = None;
        }
    }

    /// Whether no remote object is referenced anymore
    pub fn holds_no_references(&self) -> bool {
        let refs = [
            &self.tier0_gateway_ref,
            &self.edge_cluster_ref,
            &self.transport_zone_ref,
            &self.snat_ip_pool_ref,
            &self.tier1_gateway_ref,
            &self.locale_service_ref,
            &self.dhcp_server_config_ref,
            &self.segment_ref,
            &self.snat_ip_address_alloc_ref,
            &self.snat_rule_ref,
        ];
        refs.iter().all(|r| r.is_none())
            && self.segment_name.is_none()
            && self.snat_ip_address.is_none()
            && self.advanced_dhcp.as_ref().is_none_or(AdvancedDhcpState::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape() {
        let mut state = State::new();
        state.tier1_gateway_ref = Some(Reference::new("t1", "/infra/tier-1s/t1"));
        state.snat_ip_address = Some("192.0.2.10".to_string());

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "version": "1.0",
                "creationStarted": false,
                "tier1GatewayRef": {"id": "t1", "path": "/infra/tier-1s/t1"},
                "snatIpAddress": "192.0.2.10",
            })
        );

        let parsed: State = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, state);
    }

    #[test]
    fn test_advanced_dhcp_pruning() {
        let mut state = State::new();
        assert!(state.holds_no_references());

        state.advanced_dhcp_mut().profile_ref = Some(Reference::new("p", "/api/v1/p"));
        assert!(!state.holds_no_references());

        state.advanced_dhcp_mut().profile_ref = None;
        state.prune_advanced_dhcp();
        assert!(state.advanced_dhcp.is_none());
        assert!(state.holds_no_references());
    }
}
