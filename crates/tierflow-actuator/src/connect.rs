//! Opening control-plane connections

use async_trait::async_trait;
use std::sync::Arc;
use tierflow_nsxt::{ApiGeneration, Connector, ConnectorConfig, ManagerApi, PolicyApi, TokenCache};

/// An established connection to one NSX-T manager
#[derive(Clone)]
pub struct Connection {
    pub policy: Arc<dyn PolicyApi>,
    pub manager: Arc<dyn ManagerApi>,
    pub generation: ApiGeneration,
}

/// Seam between the actuator and connector bootstrap
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn connect(&self, config: &ConnectorConfig) -> tierflow_nsxt::Result<Connection>;
}

/// Connects over HTTPS, sharing API-token exchanges across clusters
#[derive(Default)]
pub struct NsxtConnectorFactory {
    tokens: TokenCache,
}

impl NsxtConnectorFactory {
    pub fn new(tokens: TokenCache) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl ConnectorFactory for NsxtConnectorFactory {
    async fn connect(&self, config: &ConnectorConfig) -> tierflow_nsxt::Result<Connection> {
        let connector = Connector::connect(config, &self.tokens).await?;
        tracing::debug!(
            host = %config.host,
            version = %connector.version().product_version,
            "Connected to NSX-T"
        );
        Ok(Connection {
            policy: connector.policy(),
            manager: connector.manager(),
            generation: connector.generation(),
        })
    }
}
