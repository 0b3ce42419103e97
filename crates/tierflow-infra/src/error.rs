//! Pipeline and state store error types

use std::time::Duration;
use thiserror::Error;
use tierflow_nsxt::NsxtError;

/// Errors raised while converging or tearing down infrastructure
#[derive(Error, Debug)]
pub enum InfraError {
    #[error("Task {task} failed: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: Box<InfraError>,
    },

    #[error("No {kind} named '{name}' found")]
    LookupNotFound { kind: &'static str, name: String },

    #[error("Task {task} requires {dependency}, which is not set")]
    MissingDependency {
        task: &'static str,
        dependency: &'static str,
    },

    #[error("IP allocation {path} was not realized within {timeout:?}")]
    RealizationTimeout { path: String, timeout: Duration },

    #[error("CIDR error: {0}")]
    Cidr(String),

    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    #[error("NSX-T error: {0}")]
    Nsxt(#[from] NsxtError),
}

impl InfraError {
    /// Whether the underlying control-plane error is a "not found".
    pub fn is_not_found(&self) -> bool {
        match self {
            InfraError::Nsxt(e) => e.is_not_found(),
            InfraError::Task { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Wrap the error with the label of the task that raised it.
    pub fn in_task(self, task: &'static str) -> Self {
        match self {
            InfraError::Task { .. } => self,
            other => InfraError::Task {
                task,
                source: Box::new(other),
            },
        }
    }
}

/// State store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State of '{namespace}' has version {found}, expected {expected}")]
    VersionMismatch {
        namespace: String,
        found: String,
        expected: &'static str,
    },

    #[error("Concurrent modification of the state object (expected revision {expected:?})")]
    Conflict { expected: Option<u64> },

    #[error("Gave up saving state of '{namespace}' after {attempts} conflicting attempts")]
    RetriesExhausted { namespace: String, attempts: u32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InfraError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_through_task_wrapper() {
        let err = InfraError::from(NsxtError::NotFound("/infra/tier-1s/x".into())).in_task("tier1");
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Task tier1 failed: NSX-T error: Object not found: /infra/tier-1s/x"
        );

        let err = InfraError::Cidr("bad".into()).in_task("segment");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_in_task_does_not_nest() {
        let err = InfraError::Cidr("bad".into())
            .in_task("segment")
            .in_task("ensurer");
        assert!(matches!(err, InfraError::Task { task: "segment", .. }));
    }
}
