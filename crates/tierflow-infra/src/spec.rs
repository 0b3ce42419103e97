//! Desired state of one cluster's network infrastructure

use crate::cidr::AddressPlan;
use crate::error::{InfraError, Result};
use crate::tags::ClusterIdentity;
use serde::{Deserialize, Serialize};

/// Input of a reconcile, never mutated by the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    /// Display name of the pre-existing tier-0 gateway
    pub tier0_gateway_name: String,
    pub edge_cluster_name: String,
    pub transport_zone_name: String,
    /// Display name of the IP pool SNAT addresses are allocated from
    pub snat_ip_pool_name: String,

    pub garden_id: String,
    pub garden_name: String,
    pub cluster_name: String,

    /// CIDR of the workers network, e.g. `10.250.0.0/16`
    pub workers_network: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

impl Spec {
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("tier0GatewayName", &self.tier0_gateway_name),
            ("edgeClusterName", &self.edge_cluster_name),
            ("transportZoneName", &self.transport_zone_name),
            ("snatIpPoolName", &self.snat_ip_pool_name),
            ("gardenId", &self.garden_id),
            ("gardenName", &self.garden_name),
            ("clusterName", &self.cluster_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(InfraError::InvalidSpec(format!("{} must not be empty", field)));
            }
        }
        self.address_plan().map(|_| ())
    }

    pub fn identity(&self) -> ClusterIdentity {
        ClusterIdentity::new(&self.garden_id, &self.cluster_name)
    }

    /// Base display name of the objects created for this cluster
    pub fn object_name(&self) -> String {
        format!("{}--{}", self.garden_name, self.cluster_name)
    }

    pub fn segment_name(&self) -> String {
        format!("{}--workers", self.object_name())
    }

    pub fn address_plan(&self) -> Result<AddressPlan> {
        AddressPlan::from_cidr(&self.workers_network)
    }
}

#[cfg(test)]
pub(crate) fn sample() -> Spec {
    Spec {
        tier0_gateway_name: "tier0-gw".to_string(),
        edge_cluster_name: "edge-cluster-1".to_string(),
        transport_zone_name: "tz-overlay".to_string(),
        snat_ip_pool_name: "snat-pool".to_string(),
        garden_id: "garden-eu1".to_string(),
        garden_name: "eu1".to_string(),
        cluster_name: "shoot--dev--app".to_string(),
        workers_network: "10.250.0.0/16".to_string(),
        dns_servers: vec!["10.0.0.53".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let mut spec = sample();
        spec.edge_cluster_name = " ".to_string();
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("edgeClusterName"));

        let mut spec = sample();
        spec.workers_network = "10.250.0.0".to_string();
        assert!(matches!(spec.validate(), Err(InfraError::Cidr(_))));
    }

    #[test]
    fn test_names() {
        let spec = sample();
        assert_eq!(spec.object_name(), "eu1--shoot--dev--app");
        assert_eq!(spec.segment_name(), "eu1--shoot--dev--app--workers");
    }
}
