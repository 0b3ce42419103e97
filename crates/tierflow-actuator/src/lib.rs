//! tierflow actuator
//!
//! Entry points the cluster-lifecycle operator calls per cluster:
//!
//! ```text
//! reconcile:  config ─► connect ─► load state ─► Ensurer ─► save ─► status ─► publish
//! delete:     load state ─► connect ─► LB cleanup ─► Ensurer (reverse) ─► drop state
//! ```

pub mod actuator;
pub mod connect;
pub mod error;
pub mod lb;
pub mod request;
pub mod status;

pub use actuator::Actuator;
pub use connect::{Connection, ConnectorFactory, NsxtConnectorFactory};
pub use error::{ActuatorError, PublishError, Result};
pub use request::{ClusterRequest, NsxtSecret};
pub use status::{InfrastructureStatus, StatusPublisher, ZoneStatus, zone_placements};
