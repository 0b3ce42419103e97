//! Actuator error types

use thiserror::Error;
use tierflow_config::ConfigError;
use tierflow_infra::{InfraError, StoreError};
use tierflow_nsxt::NsxtError;

#[derive(Error, Debug)]
pub enum ActuatorError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config error: {0}")]
    ConfigFile(#[from] ConfigError),

    #[error("Failed to connect to NSX-T: {0}")]
    Connect(#[source] NsxtError),

    #[error("Infrastructure error: {0}")]
    Infra(#[from] InfraError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// Teardown finished but the state still references objects
    #[error("State of '{0}' still holds references after teardown")]
    TeardownIncomplete(String),

    #[error("Publishing status failed: {0}")]
    Publish(#[from] PublishError),
}

/// Failure reported by a [`StatusPublisher`](crate::status::StatusPublisher)
#[derive(Error, Debug)]
pub enum PublishError {
    /// The status object changed since it was read
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ActuatorError>;
