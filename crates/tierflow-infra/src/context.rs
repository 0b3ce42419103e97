//! Collaborators handed to every task of a run

use crate::tags::ClusterIdentity;
use std::sync::Arc;
use std::time::Duration;
use tierflow_nsxt::{ManagerApi, PolicyApi};

/// Polling schedule of the SNAT address realization wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealizationConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub timeout: Duration,
}

impl Default for RealizationConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(15),
        }
    }
}

pub struct EnsurerContext {
    pub policy: Arc<dyn PolicyApi>,
    pub manager: Arc<dyn ManagerApi>,
    pub identity: ClusterIdentity,
    /// Adopt tagged objects when a reference is missing
    pub recovery_enabled: bool,
    pub realization: RealizationConfig,
}

impl EnsurerContext {
    pub fn new(
        policy: Arc<dyn PolicyApi>,
        manager: Arc<dyn ManagerApi>,
        identity: ClusterIdentity,
    ) -> Self {
        Self {
            policy,
            manager,
            identity,
            recovery_enabled: false,
            realization: RealizationConfig::default(),
        }
    }

    pub fn with_recovery(mut self, enabled: bool) -> Self {
        self.recovery_enabled = enabled;
        self
    }

    pub fn with_realization(mut self, realization: RealizationConfig) -> Self {
        self.realization = realization;
        self
    }
}
