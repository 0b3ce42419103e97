//! Policy DHCP server config serving the cluster segment (3.0 and later)

use super::{Task, delete_referenced, new_id, read_or_heal, require};
use crate::action::Action;
use crate::context::EnsurerContext;
use crate::error::Result;
use crate::spec::Spec;
use crate::state::{Reference, State};
use crate::tags::same_tags;
use async_trait::async_trait;
use tierflow_nsxt::model::DhcpServerConfig;
use tierflow_nsxt::paths;

/// Lease time of cluster DHCP leases in seconds
pub(crate) const LEASE_TIME: i64 = 7200;

pub struct DhcpServerConfigTask;

impl DhcpServerConfigTask {
    const LABEL: &'static str = "dhcp-server-config";

    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<DhcpServerConfig> {
        let edge_cluster = require(&state.edge_cluster_ref, Self::LABEL, "edge cluster")?;
        let plan = spec.address_plan()?;
        Ok(DhcpServerConfig {
            display_name: Some(spec.object_name()),
            edge_cluster_path: Some(edge_cluster.path.clone()),
            server_addresses: vec![plan.dhcp_server_cidr()],
            lease_time: Some(LEASE_TIME),
            tags: ctx.identity.tags(),
            ..DhcpServerConfig::default()
        })
    }

    fn differs(current: &DhcpServerConfig, desired: &DhcpServerConfig) -> bool {
        current.display_name != desired.display_name
            || current.edge_cluster_path != desired.edge_cluster_path
            || current.server_addresses != desired.server_addresses
            || current.lease_time != desired.lease_time
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for DhcpServerConfigTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let desired = Self::desired(ctx, spec, state)?;
        let policy = &ctx.policy;

        let current = read_or_heal(Self::LABEL, &mut state.dhcp_server_config_ref, |id| async move {
            policy.get_dhcp_server_config(&id).await
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &state.dhcp_server_config_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            policy
                .patch_dhcp_server_config(&reference.id, &desired)
                .await?;
            return Ok(Action::Updated);
        }

        let id = new_id();
        policy.patch_dhcp_server_config(&id, &desired).await?;
        state.dhcp_server_config_ref = Some(Reference::new(&id, paths::dhcp_server_config(&id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let policy = &ctx.policy;
        delete_referenced(Self::LABEL, &mut state.dhcp_server_config_ref, |id| async move {
            policy.delete_dhcp_server_config(&id).await
        })
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state.dhcp_server_config_ref.as_ref()
    }
}
