use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tierflow_actuator::{
    Actuator, ClusterRequest, Connection, ConnectorFactory, InfrastructureStatus, NsxtSecret,
    PublishError, StatusPublisher,
};
use tierflow_config::ControllerConfig;
use tierflow_infra::{MemoryBackend, State, StateStore};
use tierflow_nsxt::fake::FakeNsxt;
use tierflow_nsxt::{ApiGeneration, ConnectorConfig, NsxtError, RetryConfig};

pub const NAMESPACE: &str = "shoot--dev--app";

pub const CONFIG: &str = r#"
regions:
  - name: eu-1
    nsxtHost: nsx.eu-1.example.com
    tier0GatewayName: tier0-gw
    edgeClusterName: edge-cluster-1
    transportZoneName: tz-overlay
    snatIpPoolName: snat-pool
    dnsServers: [10.0.0.53]
    datacenter: dc1
    datastore: ds-shared
    zones:
      - name: eu-1a
      - name: eu-1b
        datastoreCluster: dsc-b
recoveryEnabled: true
realization:
  initialIntervalMs: 1
  maxIntervalMs: 5
  timeoutSeconds: 2
loadBalancer:
  clusterTagScope: owner
"#;

/// Hands out connections to one shared fake control plane
pub struct FakeFactory {
    pub fake: Arc<FakeNsxt>,
    pub generation: Mutex<ApiGeneration>,
    pub unreachable: AtomicBool,
    pub connects: AtomicU32,
}

#[async_trait]
impl ConnectorFactory for FakeFactory {
    async fn connect(&self, config: &ConnectorConfig) -> tierflow_nsxt::Result<Connection> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(NsxtError::AuthenticationFailed(format!(
                "{} rejected the credentials",
                config.host
            )));
        }
        Ok(Connection {
            policy: self.fake.clone(),
            manager: self.fake.clone(),
            generation: *self.generation.lock().unwrap(),
        })
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub conflicts: Mutex<u32>,
    pub published: Mutex<Vec<(String, InfrastructureStatus)>>,
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(
        &self,
        namespace: &str,
        status: &InfrastructureStatus,
    ) -> Result<(), PublishError> {
        let mut conflicts = self.conflicts.lock().unwrap();
        if *conflicts > 0 {
            *conflicts -= 1;
            return Err(PublishError::Conflict("resource version changed".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((namespace.to_string(), status.clone()));
        Ok(())
    }
}

pub struct Harness {
    pub fake: Arc<FakeNsxt>,
    pub factory: Arc<FakeFactory>,
    pub publisher: Arc<RecordingPublisher>,
    pub store: StateStore,
    pub actuator: Actuator,
}

impl Harness {
    pub fn new(generation: ApiGeneration) -> Self {
        Self::with_config(generation, CONFIG)
    }

    pub fn with_config(generation: ApiGeneration, config: &str) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();

        let fake = Arc::new(FakeNsxt::with_region());
        let factory = Arc::new(FakeFactory {
            fake: fake.clone(),
            generation: Mutex::new(generation),
            unreachable: AtomicBool::new(false),
            connects: AtomicU32::new(0),
        });
        let publisher = Arc::new(RecordingPublisher::default());
        let backend = Arc::new(MemoryBackend::new());

        let config = ControllerConfig::from_yaml(config).unwrap();
        let actuator = Actuator::new(
            config,
            StateStore::new(backend.clone()),
            factory.clone(),
            publisher.clone(),
        )
        .with_publish_retry(RetryConfig {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
        });

        Self {
            fake,
            factory,
            publisher,
            store: StateStore::new(backend),
            actuator,
        }
    }

    pub async fn stored_state(&self) -> Option<State> {
        self.store.load(NAMESPACE).await.unwrap()
    }

    pub fn connects(&self) -> u32 {
        self.factory.connects.load(Ordering::SeqCst)
    }
}

pub fn request() -> ClusterRequest {
    ClusterRequest {
        namespace: NAMESPACE.to_string(),
        region: "eu-1".to_string(),
        garden_id: "garden-eu1".to_string(),
        garden_name: "eu1".to_string(),
        cluster_name: "shoot--dev--app".to_string(),
        workers_network: "10.250.0.0/16".to_string(),
        secret: NsxtSecret::UserPassword {
            username: "admin".to_string(),
            password: "secret".to_string(),
        },
    }
}
