//! Status derived from state and published for downstream consumers

use crate::error::{ActuatorError, PublishError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tierflow_config::RegionConfig;
use tierflow_infra::State;
use tierflow_nsxt::RetryConfig;

/// vSphere placement of one zone after falling back to region values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneStatus {
    pub datacenter: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datastore_cluster: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_cluster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfrastructureStatus {
    pub nsxt: State,

    #[serde(default)]
    pub zone_config: BTreeMap<String, ZoneStatus>,
}

impl InfrastructureStatus {
    pub fn new(state: &State, zone_config: BTreeMap<String, ZoneStatus>) -> Self {
        Self {
            nsxt: state.clone(),
            zone_config,
        }
    }
}

/// Resolve every zone's placement against the region defaults.
pub fn zone_placements(region: &RegionConfig) -> Result<BTreeMap<String, ZoneStatus>> {
    let mut zone_config = BTreeMap::new();
    for zone in &region.zones {
        let placement = zone.placement.or(&region.placement);
        let datacenter = placement.datacenter.ok_or_else(|| {
            ActuatorError::Config(format!(
                "zone '{}' of region '{}' has no datacenter",
                zone.name, region.name
            ))
        })?;
        if placement.datastore.is_none() && placement.datastore_cluster.is_none() {
            return Err(ActuatorError::Config(format!(
                "zone '{}' of region '{}' has neither datastore nor datastoreCluster",
                zone.name, region.name
            )));
        }
        zone_config.insert(
            zone.name.clone(),
            ZoneStatus {
                datacenter,
                datastore: placement.datastore,
                datastore_cluster: placement.datastore_cluster,
                compute_cluster: placement.compute_cluster,
                resource_pool: placement.resource_pool,
            },
        );
    }
    Ok(zone_config)
}

/// Where a cluster's status ends up
#[async_trait]
pub trait StatusPublisher: Send + Sync {
    async fn publish(
        &self,
        namespace: &str,
        status: &InfrastructureStatus,
    ) -> std::result::Result<(), PublishError>;
}

/// Publish, retrying while the publisher reports a conflict.
pub async fn publish_with_retry(
    publisher: &dyn StatusPublisher,
    retry: &RetryConfig,
    namespace: &str,
    status: &InfrastructureStatus,
) -> std::result::Result<(), PublishError> {
    let mut attempt = 0;
    loop {
        match publisher.publish(namespace, status).await {
            Ok(()) => return Ok(()),
            Err(PublishError::Conflict(reason)) if attempt + 1 < retry.max_attempts => {
                let delay = retry.delay_for_attempt(attempt);
                tracing::debug!(
                    namespace,
                    "Status conflict ({}), retrying in {:?}",
                    reason,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
