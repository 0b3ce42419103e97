//! Reconciliation tasks
//!
//! A task converges exactly one kind of remote object. It holds no data of
//! its own; everything it needs comes from the [`Spec`] and from references
//! written into the state by earlier tasks.

mod advanced_dhcp;
mod dhcp_config;
mod gateway;
mod lookup;
mod segment;
mod snat;

pub use advanced_dhcp::{
    DhcpIpPoolTask, DhcpPortTask, DhcpProfileTask, DhcpServerTask, LogicalSwitchLookupTask,
};
pub use dhcp_config::DhcpServerConfigTask;
pub use gateway::{LocaleServiceTask, Tier1GatewayTask};
pub use lookup::LookupTask;
pub use segment::SegmentTask;
pub use snat::{SnatIpAllocationTask, SnatIpRealizationTask, SnatRuleTask};

use crate::action::Action;
use crate::context::EnsurerContext;
use crate::error::{InfraError, Result};
use crate::spec::Spec;
use crate::state::{Reference, State};
use async_trait::async_trait;
use std::future::Future;
use tierflow_nsxt::paths;

/// One idempotent step of the pipeline
#[async_trait]
pub trait Task: Send + Sync {
    /// Short name used in logs and errors
    fn label(&self) -> &'static str;

    /// Make the remote object match the [`Spec`].
    async fn ensure(&self, ctx: &EnsurerContext, spec: &Spec, state: &mut State)
    -> Result<Action>;

    /// Delete the remote object and clear its reference.
    ///
    /// Returns `false` when there was nothing to delete.
    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool>;

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference>;

    fn as_recoverable(&self) -> Option<&dyn Recoverable> {
        None
    }
}

/// Capability of adopting an existing object by its identity tags
#[async_trait]
pub trait Recoverable: Send + Sync {
    /// Look for an object tagged with the cluster identity and store its
    /// reference. Returns whether one was adopted.
    async fn recover(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool>;
}

/// Fresh id for an object created by a task
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Reference written by an earlier task
pub(crate) fn require<'a>(
    reference: &'a Option<Reference>,
    task: &'static str,
    dependency: &'static str,
) -> Result<&'a Reference> {
    reference
        .as_ref()
        .ok_or(InfraError::MissingDependency { task, dependency })
}

/// Tier-1 gateway a nested object was created under, taken from its own path
///
/// Teardown uses this rather than the gateway reference, which may already
/// point at a recreated gateway or be gone.
pub(crate) fn parent_tier1(reference: &Reference, task: &'static str) -> Result<String> {
    paths::tier1_id_of(&reference.path)
        .map(str::to_string)
        .ok_or(InfraError::MissingDependency {
            task,
            dependency: "tier-1 gateway",
        })
}

/// Fetch the referenced object.
///
/// Yields `None` when there is no reference, or when the object vanished
/// upstream. The stale reference stays in place until the caller stores the
/// replacement it creates. The caller never comes back here within the same
/// run, which caps self-healing at one recreation.
pub(crate) async fn read_or_heal<T, F, Fut>(
    task: &'static str,
    reference: &mut Option<Reference>,
    fetch: F,
) -> Result<Option<T>>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = tierflow_nsxt::Result<T>>,
{
    let Some(current) = reference.as_ref() else {
        return Ok(None);
    };
    match fetch(current.id.clone()).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => {
            tracing::warn!(
                task,
                id = %current.id,
                "Referenced object no longer exists, recreating"
            );
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete the referenced object and clear the reference.
///
/// An object already gone upstream counts as nothing to delete.
pub(crate) async fn delete_referenced<F, Fut>(
    task: &'static str,
    reference: &mut Option<Reference>,
    delete: F,
) -> Result<bool>
where
    F: FnOnce(String) -> Fut,
    Fut: Future<Output = tierflow_nsxt::Result<()>>,
{
    let Some(current) = reference.as_ref() else {
        return Ok(false);
    };
    match delete(current.id.clone()).await {
        Ok(()) => {
            *reference = None;
            Ok(true)
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(task, id = %current.id, "Object already deleted");
            *reference = None;
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::context::EnsurerContext;
    use crate::spec::{Spec, sample};
    use std::sync::Arc;
    use std::time::Duration;
    use tierflow_nsxt::fake::FakeNsxt;

    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    pub fn context(fake: &Arc<FakeNsxt>) -> EnsurerContext {
        init_tracing();
        let spec = sample();
        EnsurerContext::new(fake.clone(), fake.clone(), spec.identity()).with_realization(
            crate::context::RealizationConfig {
                initial_interval: Duration::from_millis(1),
                max_interval: Duration::from_millis(5),
                timeout: Duration::from_millis(200),
            },
        )
    }

    pub fn spec() -> Spec {
        sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierflow_nsxt::NsxtError;

    #[tokio::test]
    async fn test_read_or_heal_keeps_missing_reference() {
        let mut reference = Some(Reference::new("gone", "/infra/tier-1s/gone"));
        let read: Option<()> = read_or_heal("tier1", &mut reference, |id| async move {
            Err(NsxtError::NotFound(id))
        })
        .await
        .unwrap();
        assert!(read.is_none());
        assert_eq!(reference.unwrap().id, "gone");
    }

    #[test]
    fn test_parent_tier1_from_child_path() {
        let rule = Reference::new("r1", paths::nat_rule("old", "r1"));
        assert_eq!(parent_tier1(&rule, "snat-rule").unwrap(), "old");

        let config = Reference::new("c", paths::dhcp_server_config("c"));
        assert!(matches!(
            parent_tier1(&config, "snat-rule"),
            Err(InfraError::MissingDependency { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_or_heal_keeps_reference_on_other_errors() {
        let mut reference = Some(Reference::new("t1", "/infra/tier-1s/t1"));
        let result: Result<Option<()>> = read_or_heal("tier1", &mut reference, |_| async {
            Err(NsxtError::Api {
                status: 500,
                code: None,
                message: "boom".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert!(reference.is_some());
    }

    #[tokio::test]
    async fn test_delete_without_reference_is_noop() {
        let mut reference = None;
        let deleted = delete_referenced("tier1", &mut reference, |_| async {
            Err(NsxtError::UnexpectedResponse("must not be called".into()))
        })
        .await
        .unwrap();
        assert!(!deleted);
    }
}
