//! Fixed task pipeline converging a cluster's infrastructure
//!
//! The order of the tasks is the dependency order of the remote objects:
//! every task only reads references written by tasks before it. Teardown
//! walks the same list backwards, so an object is never deleted while
//! something created after it still points at it.

use crate::action::Action;
use crate::context::EnsurerContext;
use crate::error::Result;
use crate::spec::Spec;
use crate::state::State;
use crate::task::{
    DhcpIpPoolTask, DhcpPortTask, DhcpProfileTask, DhcpServerConfigTask, DhcpServerTask,
    LocaleServiceTask, LogicalSwitchLookupTask, LookupTask, SegmentTask, SnatIpAllocationTask,
    SnatIpRealizationTask, SnatRuleTask, Task, Tier1GatewayTask,
};
use tierflow_nsxt::ApiGeneration;

/// Outcome of one task during a forward run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task: &'static str,
    pub action: Action,
}

pub struct Ensurer {
    generation: ApiGeneration,
    tasks: Vec<Box<dyn Task>>,
}

fn lookups() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(LookupTask::tier0_gateway()),
        Box::new(LookupTask::edge_cluster()),
        Box::new(LookupTask::transport_zone()),
        Box::new(LookupTask::snat_ip_pool()),
    ]
}

fn snat() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(SnatIpAllocationTask),
        Box::new(SnatIpRealizationTask),
        Box::new(SnatRuleTask),
    ]
}

fn manager_dhcp() -> Vec<Box<dyn Task>> {
    vec![
        Box::new(LogicalSwitchLookupTask),
        Box::new(DhcpProfileTask),
        Box::new(DhcpServerTask),
        Box::new(DhcpPortTask),
        Box::new(DhcpIpPoolTask),
    ]
}

impl Ensurer {
    pub fn new(generation: ApiGeneration) -> Self {
        let mut tasks = lookups();
        tasks.push(Box::new(Tier1GatewayTask));
        tasks.push(Box::new(LocaleServiceTask));
        match generation {
            ApiGeneration::V2 => {
                tasks.push(Box::new(SegmentTask));
                tasks.extend(snat());
                tasks.extend(manager_dhcp());
            }
            ApiGeneration::V3 => {
                tasks.push(Box::new(DhcpServerConfigTask));
                tasks.push(Box::new(SegmentTask));
                tasks.extend(snat());
            }
        }
        Self { generation, tasks }
    }

    /// Pipeline able to tear down `state`
    ///
    /// A state holding manager DHCP objects was built by the pre-3.0
    /// sequence. After an upgrade it may also hold a policy DHCP server
    /// config, so teardown then covers both DHCP flavours.
    pub fn for_teardown(generation: ApiGeneration, state: &State) -> Self {
        if state.advanced_dhcp.is_none() {
            return Self::new(generation);
        }
        let mut tasks = lookups();
        tasks.push(Box::new(Tier1GatewayTask));
        tasks.push(Box::new(LocaleServiceTask));
        tasks.push(Box::new(DhcpServerConfigTask));
        tasks.push(Box::new(SegmentTask));
        tasks.extend(snat());
        tasks.extend(manager_dhcp());
        Self { generation, tasks }
    }

    pub fn generation(&self) -> ApiGeneration {
        self.generation
    }

    /// Task labels in forward order
    pub fn labels(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.label()).collect()
    }

    /// Run all tasks in order, stopping at the first failure.
    ///
    /// References written before a failure stay in `state` so the next run
    /// resumes instead of starting over.
    pub async fn ensure_infrastructure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Vec<TaskOutcome>> {
        spec.validate()?;
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let label = task.label();
            self.recover(task.as_ref(), ctx, state)
                .await
                .map_err(|e| e.in_task(label))?;
            let action = task
                .ensure(ctx, spec, state)
                .await
                .map_err(|e| e.in_task(label))?;

            match action {
                Action::Unchanged => {
                    tracing::debug!(task = label, cluster = %ctx.identity.cluster_name, "Unchanged")
                }
                _ => tracing::info!(
                    task = label,
                    cluster = %ctx.identity.cluster_name,
                    id = task.reference(state).map(|r| r.id.as_str()).unwrap_or("-"),
                    "{}",
                    action
                ),
            }
            outcomes.push(TaskOutcome {
                task: label,
                action,
            });
        }
        Ok(outcomes)
    }

    /// Adopt an object by its tags when the reference is missing.
    async fn recover(&self, task: &dyn Task, ctx: &EnsurerContext, state: &mut State) -> Result<()> {
        if !ctx.recovery_enabled || task.reference(state).is_some() {
            return Ok(());
        }
        let Some(recoverable) = task.as_recoverable() else {
            return Ok(());
        };
        if recoverable.recover(ctx, state).await? {
            tracing::warn!(
                task = task.label(),
                cluster = %ctx.identity.cluster_name,
                id = task.reference(state).map(|r| r.id.as_str()).unwrap_or("-"),
                "Recovered object by identity tags"
            );
        }
        Ok(())
    }

    /// Tear down in reverse order, stopping at the first failure.
    ///
    /// Returns the labels of the tasks that deleted something.
    pub async fn ensure_infrastructure_deleted(
        &self,
        ctx: &EnsurerContext,
        state: &mut State,
    ) -> Result<Vec<&'static str>> {
        let mut deleted = Vec::new();
        for task in self.tasks.iter().rev() {
            let label = task.label();
            if task
                .ensure_deleted(ctx, state)
                .await
                .map_err(|e| e.in_task(label))?
            {
                tracing::info!(task = label, cluster = %ctx.identity.cluster_name, "Deleted");
                deleted.push(label);
            }
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InfraError;
    use crate::state::Reference;
    use crate::task::testing::{context, spec};
    use std::sync::Arc;
    use tierflow_nsxt::fake::FakeNsxt;

    /// References in the order the forward run must fill them
    fn filled(state: &State) -> Vec<&'static str> {
        let mut filled = Vec::new();
        let mut check = |name: &'static str, set: bool| {
            if set {
                filled.push(name);
            }
        };
        check("tier0", state.tier0_gateway_ref.is_some());
        check("edge-cluster", state.edge_cluster_ref.is_some());
        check("transport-zone", state.transport_zone_ref.is_some());
        check("ip-pool", state.snat_ip_pool_ref.is_some());
        check("tier1", state.tier1_gateway_ref.is_some());
        check("locale-service", state.locale_service_ref.is_some());
        check("segment", state.segment_ref.is_some() && state.segment_name.is_some());
        check("snat-alloc", state.snat_ip_address_alloc_ref.is_some());
        check("snat-ip", state.snat_ip_address.is_some());
        check("snat-rule", state.snat_rule_ref.is_some());
        filled
    }

    const ALL: [&str; 10] = [
        "tier0",
        "edge-cluster",
        "transport-zone",
        "ip-pool",
        "tier1",
        "locale-service",
        "segment",
        "snat-alloc",
        "snat-ip",
        "snat-rule",
    ];

    #[test]
    fn test_task_order() {
        assert_eq!(
            Ensurer::new(ApiGeneration::V3).labels(),
            vec![
                "tier0-gateway-lookup",
                "edge-cluster-lookup",
                "transport-zone-lookup",
                "snat-ip-pool-lookup",
                "tier1-gateway",
                "locale-service",
                "dhcp-server-config",
                "segment",
                "snat-ip-allocation",
                "snat-ip-realization",
                "snat-rule",
            ]
        );
        let v2 = Ensurer::new(ApiGeneration::V2).labels();
        assert_eq!(v2[6], "segment");
        assert_eq!(
            &v2[10..],
            &[
                "logical-switch-lookup",
                "dhcp-profile",
                "dhcp-server",
                "dhcp-port",
                "dhcp-ip-pool",
            ]
        );
    }

    #[test]
    fn test_teardown_follows_state() {
        let mut state = State::new();
        let ensurer = Ensurer::for_teardown(ApiGeneration::V3, &state);
        assert_eq!(ensurer.labels(), Ensurer::new(ApiGeneration::V3).labels());

        state.advanced_dhcp_mut();
        let labels = Ensurer::for_teardown(ApiGeneration::V3, &state).labels();
        assert_eq!(labels.len(), 16);
        assert!(labels.contains(&"dhcp-server-config"));
        assert!(labels.contains(&"dhcp-ip-pool"));
    }

    #[tokio::test]
    async fn test_end_to_end_v3() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ctx = context(&fake);
        let ensurer = Ensurer::new(ApiGeneration::V3);
        let mut state = State::new();

        let outcomes = ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert_eq!(filled(&state), ALL);
        assert!(state.dhcp_server_config_ref.is_some());
        assert!(state.advanced_dhcp.is_none());
        assert_eq!(outcomes.len(), 11);
        assert_eq!(
            state.tier0_gateway_ref,
            Some(Reference::new("t0-main", "/infra/tier-0s/t0-main"))
        );

        // Second run converges without touching anything
        let converged = state.clone();
        fake.clear_calls();
        let outcomes = ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert!(
            outcomes
                .iter()
                .all(|o| matches!(o.action, Action::Unchanged | Action::Found))
        );
        assert_eq!(state, converged);
        assert!(fake.mutations().is_empty());

        // Teardown in exact reverse order
        fake.clear_calls();
        let deleted = ensurer
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await
            .unwrap();
        assert_eq!(
            deleted,
            vec![
                "snat-rule",
                "snat-ip-allocation",
                "segment",
                "dhcp-server-config",
                "locale-service",
                "tier1-gateway",
            ]
        );
        assert!(state.holds_no_references());
        assert_eq!(fake.managed_object_count(), 0);
        let deletes: Vec<String> = fake
            .mutations()
            .into_iter()
            .map(|c| c.split(' ').next().unwrap_or_default().to_string())
            .collect();
        assert_eq!(
            deletes,
            vec![
                "delete_nat_rule",
                "delete_ip_allocation",
                "delete_segment",
                "delete_dhcp_server_config",
                "delete_locale_service",
                "delete_tier1",
            ]
        );

        // Nothing left to delete
        let deleted = ensurer
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await
            .unwrap();
        assert!(deleted.is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_v2() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ctx = context(&fake);
        let ensurer = Ensurer::new(ApiGeneration::V2);
        let mut state = State::new();

        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert_eq!(filled(&state), ALL);
        assert!(state.dhcp_server_config_ref.is_none());
        let dhcp = state.advanced_dhcp.clone().unwrap();
        let server_id = dhcp.server_ref.clone().unwrap().id;
        assert!(dhcp.logical_switch_ref.is_some());
        assert!(dhcp.profile_ref.is_some());
        assert!(dhcp.port_ref.is_some());
        assert!(dhcp.ip_pool_ref.is_some());

        let server = fake.dhcp_server(&server_id).unwrap();
        let ipv4 = server.ipv4_dhcp_server.unwrap();
        assert_eq!(ipv4.dhcp_server_ip.as_deref(), Some("10.250.0.2/16"));
        assert_eq!(ipv4.gateway_ip.as_deref(), Some("10.250.0.1"));

        fake.clear_calls();
        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert!(fake.mutations().is_empty());

        ensurer
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await
            .unwrap();
        assert!(state.holds_no_references());
        assert!(state.advanced_dhcp.is_none());
        assert_eq!(fake.managed_object_count(), 0);
    }

    #[tokio::test]
    async fn test_upgraded_state_tears_down_both_dhcp_flavours() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ctx = context(&fake);
        let mut state = State::new();
        Ensurer::new(ApiGeneration::V2)
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        Ensurer::new(ApiGeneration::V3)
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert!(state.advanced_dhcp.is_some());
        assert!(state.dhcp_server_config_ref.is_some());

        let deleted = Ensurer::for_teardown(ApiGeneration::V3, &state)
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await
            .unwrap();
        assert!(deleted.contains(&"dhcp-server-config"));
        assert!(deleted.contains(&"dhcp-server"));
        assert!(state.holds_no_references());
        assert_eq!(fake.managed_object_count(), 0);
    }

    #[tokio::test]
    async fn test_teardown_after_failed_gateway_recreation() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ctx = context(&fake);
        let ensurer = Ensurer::new(ApiGeneration::V3);
        let mut state = State::new();
        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();

        let tier1 = state.tier1_gateway_ref.clone().unwrap();
        fake.remove_tier1(&tier1.id);
        fake.fail_next("patch_tier1");
        let err = ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, InfraError::Task { task: "tier1-gateway", .. }));
        assert_eq!(state.tier1_gateway_ref, Some(tier1));

        ensurer
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await
            .unwrap();
        assert!(state.holds_no_references());
        assert_eq!(fake.managed_object_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_leaves_prefix_and_resumes() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ctx = context(&fake);
        let ensurer = Ensurer::new(ApiGeneration::V3);
        let mut state = State::new();

        fake.fail_next("patch_segment");
        let err = ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, InfraError::Task { task: "segment", .. }));
        assert_eq!(filled(&state), ALL[..6]);

        let tier1 = state.tier1_gateway_ref.clone();
        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert_eq!(filled(&state), ALL);
        assert_eq!(state.tier1_gateway_ref, tier1);
    }

    #[tokio::test]
    async fn test_teardown_stops_at_first_error() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ctx = context(&fake);
        let ensurer = Ensurer::new(ApiGeneration::V3);
        let mut state = State::new();
        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();

        fake.fail_next("delete_segment");
        let err = ensurer
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await
            .unwrap_err();
        assert!(matches!(err, InfraError::Task { task: "segment", .. }));
        assert!(state.snat_rule_ref.is_none());
        assert!(state.segment_ref.is_some());
        assert!(state.tier1_gateway_ref.is_some());

        ensurer
            .ensure_infrastructure_deleted(&ctx, &mut state)
            .await
            .unwrap();
        assert!(state.holds_no_references());
    }

    #[tokio::test]
    async fn test_lost_state_recovers_dhcp_objects() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ensurer = Ensurer::new(ApiGeneration::V2);
        let mut state = State::new();
        ensurer
            .ensure_infrastructure(&context(&fake), &spec(), &mut state)
            .await
            .unwrap();
        let original = state.advanced_dhcp.clone().unwrap();

        // The checkpoint is gone but policy objects use fresh ids anyway;
        // keep their references to isolate the DHCP sub-chain.
        state.advanced_dhcp = None;
        fake.clear_calls();

        let ctx = context(&fake).with_recovery(true);
        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert_eq!(state.advanced_dhcp, Some(original));
        assert!(fake.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_lost_state_without_recovery_duplicates() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ensurer = Ensurer::new(ApiGeneration::V2);
        let ctx = context(&fake);
        let mut state = State::new();
        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        let profile = state.advanced_dhcp.clone().unwrap().profile_ref;

        state.advanced_dhcp = None;
        ensurer
            .ensure_infrastructure(&ctx, &spec(), &mut state)
            .await
            .unwrap();
        assert_ne!(state.advanced_dhcp.unwrap().profile_ref, profile);
    }

    #[tokio::test]
    async fn test_deleted_dhcp_profile_heals() {
        let fake = Arc::new(FakeNsxt::with_region());
        let ctx = context(&fake);
        let spec = spec();
        let mut state = State::new();
        LookupTask::edge_cluster()
            .ensure(&ctx, &spec, &mut state)
            .await
            .unwrap();
        DhcpProfileTask.ensure(&ctx, &spec, &mut state).await.unwrap();
        let id = state.advanced_dhcp.clone().unwrap().profile_ref.unwrap().id;
        fake.remove_dhcp_profile(&id);

        let action = DhcpProfileTask.ensure(&ctx, &spec, &mut state).await.unwrap();
        assert_eq!(action, Action::Created);
        assert_ne!(state.advanced_dhcp.unwrap().profile_ref.unwrap().id, id);
    }
}
