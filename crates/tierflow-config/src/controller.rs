//! Controller configuration document

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    pub regions: Vec<RegionConfig>,

    /// Adopt tagged objects when a cluster's state was lost
    #[serde(default)]
    pub recovery_enabled: bool,

    /// Retries of transient control-plane errors per request
    #[serde(default = "default_api_retries")]
    pub api_retries: u32,

    #[serde(default)]
    pub realization: RealizationSettings,

    #[serde(default)]
    pub load_balancer: LoadBalancerSettings,
}

fn default_api_retries() -> u32 {
    3
}

/// One NSX-T manager and the vSphere placement of its clusters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionConfig {
    pub name: String,

    pub nsxt_host: String,
    #[serde(default)]
    pub nsxt_insecure_ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nsxt_ca_file: Option<PathBuf>,
    /// Use the identity-provider backed `Remote` authorization scheme
    #[serde(default)]
    pub nsxt_remote_auth: bool,
    /// Host exchanging API tokens for access tokens (VMware Cloud)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmc_auth_host: Option<String>,

    pub tier0_gateway_name: String,
    pub edge_cluster_name: String,
    pub transport_zone_name: String,
    pub snat_ip_pool_name: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,

    #[serde(flatten)]
    pub placement: Placement,

    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
}

/// vSphere placement of cluster machines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore_cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
}

impl Placement {
    /// Values of `self`, falling back to `defaults` field by field
    pub fn or(&self, defaults: &Placement) -> Placement {
        let pick = |own: &Option<String>, fallback: &Option<String>| {
            own.clone().or_else(|| fallback.clone())
        };
        Placement {
            datacenter: pick(&self.datacenter, &defaults.datacenter),
            datastore: pick(&self.datastore, &defaults.datastore),
            datastore_cluster: pick(&self.datastore_cluster, &defaults.datastore_cluster),
            compute_cluster: pick(&self.compute_cluster, &defaults.compute_cluster),
            resource_pool: pick(&self.resource_pool, &defaults.resource_pool),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneConfig {
    pub name: String,

    #[serde(flatten)]
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealizationSettings {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RealizationSettings {
    fn default() -> Self {
        Self {
            initial_interval_ms: 100,
            max_interval_ms: 1000,
            timeout_seconds: 15,
        }
    }
}

impl RealizationSettings {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSettings {
    /// Tag scope the load-balancer controller marks its objects with
    pub cluster_tag_scope: String,
}

impl Default for LoadBalancerSettings {
    fn default() -> Self {
        Self {
            cluster_tag_scope: "owner".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ControllerConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn region(&self, name: &str) -> Result<&RegionConfig> {
        self.regions
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| ConfigError::UnknownRegion(name.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            return Err(ConfigError::Invalid("no regions configured".to_string()));
        }

        let mut region_names = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() {
                return Err(ConfigError::Invalid("region without name".to_string()));
            }
            if !region_names.insert(region.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate region '{}'",
                    region.name
                )));
            }
            region.validate()?;
        }

        let r = &self.realization;
        if r.initial_interval_ms == 0 || r.max_interval_ms == 0 || r.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "realization intervals and timeout must be positive".to_string(),
            ));
        }
        if r.initial_interval_ms > r.max_interval_ms {
            return Err(ConfigError::Invalid(
                "realization initial interval exceeds the maximum interval".to_string(),
            ));
        }
        if self.load_balancer.cluster_tag_scope.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "loadBalancer.clusterTagScope must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl RegionConfig {
    fn validate(&self) -> Result<()> {
        let required = [
            ("nsxtHost", &self.nsxt_host),
            ("tier0GatewayName", &self.tier0_gateway_name),
            ("edgeClusterName", &self.edge_cluster_name),
            ("transportZoneName", &self.transport_zone_name),
            ("snatIpPoolName", &self.snat_ip_pool_name),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "region '{}': {} must be set",
                    self.name, field
                )));
            }
        }

        let mut zone_names = HashSet::new();
        for zone in &self.zones {
            if !zone_names.insert(zone.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "region '{}': duplicate zone '{}'",
                    self.name, zone.name
                )));
            }
        }
        Ok(())
    }

    pub fn zone(&self, name: &str) -> Option<&ZoneConfig> {
        self.zones.iter().find(|z| z.name == name)
    }
}
