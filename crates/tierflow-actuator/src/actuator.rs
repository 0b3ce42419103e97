//! Reconcile and delete of one cluster's network infrastructure

use crate::connect::{Connection, ConnectorFactory};
use crate::error::{ActuatorError, Result};
use crate::lb::cleanup_load_balancers;
use crate::request::ClusterRequest;
use crate::status::{InfrastructureStatus, StatusPublisher, publish_with_retry, zone_placements};
use std::sync::Arc;
use tierflow_config::{ControllerConfig, RegionConfig};
use tierflow_infra::{
    ClusterIdentity, Ensurer, EnsurerContext, RealizationConfig, State, StateStore,
};
use tierflow_nsxt::RetryConfig;

pub struct Actuator {
    config: ControllerConfig,
    store: StateStore,
    connectors: Arc<dyn ConnectorFactory>,
    publisher: Arc<dyn StatusPublisher>,
    publish_retry: RetryConfig,
}

impl Actuator {
    pub fn new(
        config: ControllerConfig,
        store: StateStore,
        connectors: Arc<dyn ConnectorFactory>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        Self {
            config,
            store,
            connectors,
            publisher,
            publish_retry: RetryConfig::default(),
        }
    }

    pub fn with_publish_retry(mut self, retry: RetryConfig) -> Self {
        self.publish_retry = retry;
        self
    }

    /// Create or repair the cluster's infrastructure and publish its status.
    ///
    /// Zone placement is resolved before anything is touched. State is saved
    /// after the pipeline ran, whether it failed or not. A pipeline error
    /// wins over a save error.
    pub async fn reconcile(&self, request: &ClusterRequest) -> Result<InfrastructureStatus> {
        let region = self.config.region(&request.region)?;
        let zone_config = zone_placements(region)?;
        let spec = request.spec(region);
        let connection = self.connect(request, region).await?;

        let mut state = self
            .store
            .load(&request.namespace)
            .await?
            .unwrap_or_else(State::new);
        state.creation_started = true;

        tracing::info!(
            namespace = %request.namespace,
            cluster = %request.cluster_name,
            generation = %connection.generation,
            "Reconciling infrastructure"
        );
        let ctx = self.context(&connection, request);
        let ensured = Ensurer::new(connection.generation)
            .ensure_infrastructure(&ctx, &spec, &mut state)
            .await;

        let saved = self.store.save(&request.namespace, &state).await;
        match (ensured, saved) {
            (Err(e), Err(save_error)) => {
                tracing::error!(
                    namespace = %request.namespace,
                    "Saving state after failed reconcile: {}",
                    save_error
                );
                return Err(e.into());
            }
            (Err(e), Ok(())) => return Err(e.into()),
            (Ok(_), Err(save_error)) => return Err(save_error.into()),
            (Ok(outcomes), Ok(())) => {
                let changed = outcomes.iter().filter(|o| o.action.is_change()).count();
                tracing::info!(
                    namespace = %request.namespace,
                    tasks = outcomes.len(),
                    changed,
                    "Infrastructure reconciled"
                );
            }
        }

        let status = InfrastructureStatus::new(&state, zone_config);
        publish_with_retry(
            self.publisher.as_ref(),
            &self.publish_retry,
            &request.namespace,
            &status,
        )
        .await?;
        Ok(status)
    }

    /// Tear the cluster's infrastructure down.
    ///
    /// Nothing happens when no state exists or creation never started, so a
    /// cluster whose credentials never worked is deleted without a call.
    pub async fn delete(&self, request: &ClusterRequest) -> Result<()> {
        let mut state = match self.store.load(&request.namespace).await? {
            Some(state) if state.creation_started => state,
            _ => {
                tracing::info!(
                    namespace = %request.namespace,
                    "No infrastructure was created, nothing to delete"
                );
                return Ok(());
            }
        };

        let region = self.config.region(&request.region)?;
        let connection = self.connect(request, region).await?;

        if let Err(e) = cleanup_load_balancers(
            connection.policy.as_ref(),
            &self.config.load_balancer.cluster_tag_scope,
            &request.cluster_name,
        )
        .await
        {
            tracing::warn!(
                namespace = %request.namespace,
                cluster = %request.cluster_name,
                "Load-balancer cleanup failed: {}",
                e
            );
        }

        tracing::info!(
            namespace = %request.namespace,
            cluster = %request.cluster_name,
            "Deleting infrastructure"
        );
        let ctx = self.context(&connection, request);
        let deleted = Ensurer::for_teardown(connection.generation, &state)
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await;

        let saved = self.store.save(&request.namespace, &state).await;
        match (deleted, saved) {
            (Err(e), Err(save_error)) => {
                tracing::error!(
                    namespace = %request.namespace,
                    "Saving state after failed delete: {}",
                    save_error
                );
                Err(e.into())
            }
            (Err(e), Ok(())) => Err(e.into()),
            (Ok(_), Err(save_error)) => Err(save_error.into()),
            (Ok(_), Ok(())) if !state.holds_no_references() => {
                Err(ActuatorError::TeardownIncomplete(request.namespace.clone()))
            }
            (Ok(labels), Ok(())) => {
                self.store.delete(&request.namespace).await?;
                tracing::info!(
                    namespace = %request.namespace,
                    deleted = labels.len(),
                    "Infrastructure deleted"
                );
                Ok(())
            }
        }
    }

    async fn connect(&self, request: &ClusterRequest, region: &RegionConfig) -> Result<Connection> {
        let config = request.connector_config(region, self.config.api_retries)?;
        self.connectors
            .connect(&config)
            .await
            .map_err(ActuatorError::Connect)
    }

    fn context(&self, connection: &Connection, request: &ClusterRequest) -> EnsurerContext {
        let settings = &self.config.realization;
        EnsurerContext::new(
            connection.policy.clone(),
            connection.manager.clone(),
            ClusterIdentity::new(&request.garden_id, &request.cluster_name),
        )
        .with_recovery(self.config.recovery_enabled)
        .with_realization(RealizationConfig {
            initial_interval: settings.initial_interval(),
            max_interval: settings.max_interval(),
            timeout: settings.timeout(),
        })
    }
}
