//! DHCP through the manager API (control planes before 3.0)
//!
//! The policy segment is realized as a logical switch. A DHCP server built
//! from a profile is attached to that switch by a logical port and hands out
//! addresses from its IP pool. Manager objects get their ids assigned by the
//! control plane, so these tasks support adopting objects by identity tags
//! when their references were lost.

use super::dhcp_config::LEASE_TIME;
use super::{Recoverable, Task, delete_referenced, read_or_heal, require};
use crate::action::Action;
use crate::context::EnsurerContext;
use crate::error::{InfraError, Result};
use crate::spec::Spec;
use crate::state::{AdvancedDhcpState, Reference, State};
use crate::tags::same_tags;
use async_trait::async_trait;
use tierflow_nsxt::model::{
    DhcpIpPool, DhcpProfile, IpPoolRange, Ipv4DhcpServer, LogicalDhcpServer, LogicalPort,
    LogicalPortAttachment, LogicalSwitch,
};
use tierflow_nsxt::paging::find_first;
use tierflow_nsxt::paths;

/// Tag scope linking a realized logical switch to its policy segment
const POLICY_PATH_SCOPE: &str = "policyPath";
const DHCP_ATTACHMENT: &str = "DHCP_SERVICE";
const ADMIN_STATE_UP: &str = "UP";

/// Snapshot of the DHCP references written so far
fn written(state: &State) -> AdvancedDhcpState {
    state.advanced_dhcp.clone().unwrap_or_default()
}

fn created_id(id: Option<String>, task: &'static str) -> Result<String> {
    id.ok_or_else(|| {
        InfraError::Nsxt(tierflow_nsxt::NsxtError::UnexpectedResponse(format!(
            "{} was created without an id",
            task
        )))
    })
}

/// Delete a DHCP object and drop the sub-state once it is empty.
async fn delete_dhcp_object<F, Fut>(
    task: &'static str,
    state: &mut State,
    slot: fn(&mut AdvancedDhcpState) -> &mut Option<Reference>,
    delete: F,
) -> Result<bool>
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = tierflow_nsxt::Result<()>>,
{
    let Some(dhcp) = state.advanced_dhcp.as_mut() else {
        return Ok(false);
    };
    let deleted = delete_referenced(task, slot(dhcp), delete).await?;
    state.prune_advanced_dhcp();
    Ok(deleted)
}

/// Logical switch realized for the cluster segment
pub struct LogicalSwitchLookupTask;

impl LogicalSwitchLookupTask {
    const LABEL: &'static str = "logical-switch-lookup";
}

#[async_trait]
impl Task for LogicalSwitchLookupTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        _spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let segment_path = require(&state.segment_ref, Self::LABEL, "segment")?
            .path
            .clone();
        let manager = &ctx.manager;
        let switch = find_first(
            |c| manager.list_logical_switches(c),
            |s: &LogicalSwitch| {
                s.tags
                    .iter()
                    .any(|t| t.scope == POLICY_PATH_SCOPE && t.tag == segment_path)
            },
        )
        .await?
        .ok_or_else(|| InfraError::LookupNotFound {
            kind: Self::LABEL,
            name: segment_path.clone(),
        })?;

        state.advanced_dhcp_mut().logical_switch_ref =
            Some(Reference::new(&switch.id, paths::logical_switch(&switch.id)));
        Ok(Action::Found)
    }

    async fn ensure_deleted(&self, _ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        if let Some(dhcp) = state.advanced_dhcp.as_mut() {
            dhcp.logical_switch_ref = None;
        }
        state.prune_advanced_dhcp();
        Ok(false)
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state
            .advanced_dhcp
            .as_ref()
            .and_then(|d| d.logical_switch_ref.as_ref())
    }
}

pub struct DhcpProfileTask;

impl DhcpProfileTask {
    const LABEL: &'static str = "dhcp-profile";

    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<DhcpProfile> {
        let edge_cluster = require(&state.edge_cluster_ref, Self::LABEL, "edge cluster")?;
        Ok(DhcpProfile {
            display_name: Some(spec.object_name()),
            edge_cluster_id: Some(edge_cluster.id.clone()),
            tags: ctx.identity.tags(),
            ..DhcpProfile::default()
        })
    }

    fn differs(current: &DhcpProfile, desired: &DhcpProfile) -> bool {
        current.display_name != desired.display_name
            || current.edge_cluster_id != desired.edge_cluster_id
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for DhcpProfileTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let mut desired = Self::desired(ctx, spec, state)?;
        let manager = &ctx.manager;
        let dhcp = state.advanced_dhcp_mut();

        let current = read_or_heal(Self::LABEL, &mut dhcp.profile_ref, |id| async move {
            manager.get_dhcp_profile(&id).await
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &dhcp.profile_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            desired.revision = current.revision;
            manager.update_dhcp_profile(&reference.id, &desired).await?;
            return Ok(Action::Updated);
        }

        let created = manager.create_dhcp_profile(&desired).await?;
        let id = created_id(created.id, Self::LABEL)?;
        dhcp.profile_ref = Some(Reference::new(&id, paths::dhcp_profile(&id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let manager = &ctx.manager;
        delete_dhcp_object(
            Self::LABEL,
            state,
            |d| &mut d.profile_ref,
            |id| async move { manager.delete_dhcp_profile(&id).await },
        )
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state
            .advanced_dhcp
            .as_ref()
            .and_then(|d| d.profile_ref.as_ref())
    }

    fn as_recoverable(&self) -> Option<&dyn Recoverable> {
        Some(self)
    }
}

#[async_trait]
impl Recoverable for DhcpProfileTask {
    async fn recover(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let manager = &ctx.manager;
        let found = find_first(
            |c| manager.list_dhcp_profiles(c),
            |p: &DhcpProfile| ctx.identity.is_tagged(&p.tags),
        )
        .await?;
        let Some(id) = found.and_then(|p| p.id) else {
            return Ok(false);
        };
        state.advanced_dhcp_mut().profile_ref = Some(Reference::new(&id, paths::dhcp_profile(&id)));
        Ok(true)
    }
}

pub struct DhcpServerTask;

impl DhcpServerTask {
    const LABEL: &'static str = "dhcp-server";

    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<LogicalDhcpServer> {
        let dhcp = written(state);
        let profile = require(&dhcp.profile_ref, Self::LABEL, "DHCP profile")?;
        let plan = spec.address_plan()?;
        Ok(LogicalDhcpServer {
            display_name: Some(spec.object_name()),
            dhcp_profile_id: Some(profile.id.clone()),
            ipv4_dhcp_server: Some(Ipv4DhcpServer {
                dhcp_server_ip: Some(plan.dhcp_server_cidr()),
                gateway_ip: Some(plan.gateway.to_string()),
                dns_nameservers: spec.dns_servers.clone(),
            }),
            tags: ctx.identity.tags(),
            ..LogicalDhcpServer::default()
        })
    }

    fn differs(current: &LogicalDhcpServer, desired: &LogicalDhcpServer) -> bool {
        current.display_name != desired.display_name
            || current.dhcp_profile_id != desired.dhcp_profile_id
            || current.ipv4_dhcp_server != desired.ipv4_dhcp_server
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for DhcpServerTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let mut desired = Self::desired(ctx, spec, state)?;
        let manager = &ctx.manager;
        let dhcp = state.advanced_dhcp_mut();

        let current = read_or_heal(Self::LABEL, &mut dhcp.server_ref, |id| async move {
            manager.get_dhcp_server(&id).await
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &dhcp.server_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            desired.revision = current.revision;
            manager.update_dhcp_server(&reference.id, &desired).await?;
            return Ok(Action::Updated);
        }

        let created = manager.create_dhcp_server(&desired).await?;
        let id = created_id(created.id, Self::LABEL)?;
        dhcp.server_ref = Some(Reference::new(&id, paths::dhcp_server(&id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let manager = &ctx.manager;
        delete_dhcp_object(
            Self::LABEL,
            state,
            |d| &mut d.server_ref,
            |id| async move { manager.delete_dhcp_server(&id).await },
        )
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state
            .advanced_dhcp
            .as_ref()
            .and_then(|d| d.server_ref.as_ref())
    }

    fn as_recoverable(&self) -> Option<&dyn Recoverable> {
        Some(self)
    }
}

#[async_trait]
impl Recoverable for DhcpServerTask {
    async fn recover(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let manager = &ctx.manager;
        let found = find_first(
            |c| manager.list_dhcp_servers(c),
            |s: &LogicalDhcpServer| ctx.identity.is_tagged(&s.tags),
        )
        .await?;
        let Some(id) = found.and_then(|s| s.id) else {
            return Ok(false);
        };
        state.advanced_dhcp_mut().server_ref = Some(Reference::new(&id, paths::dhcp_server(&id)));
        Ok(true)
    }
}

/// Logical port attaching the DHCP server to the segment's switch
pub struct DhcpPortTask;

impl DhcpPortTask {
    const LABEL: &'static str = "dhcp-port";

    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<LogicalPort> {
        let dhcp = written(state);
        let switch = require(&dhcp.logical_switch_ref, Self::LABEL, "logical switch")?;
        let server = require(&dhcp.server_ref, Self::LABEL, "DHCP server")?;
        Ok(LogicalPort {
            display_name: Some(spec.object_name()),
            logical_switch_id: Some(switch.id.clone()),
            admin_state: Some(ADMIN_STATE_UP.to_string()),
            attachment: Some(LogicalPortAttachment {
                attachment_type: DHCP_ATTACHMENT.to_string(),
                id: server.id.clone(),
            }),
            tags: ctx.identity.tags(),
            ..LogicalPort::default()
        })
    }

    fn differs(current: &LogicalPort, desired: &LogicalPort) -> bool {
        current.display_name != desired.display_name
            || current.logical_switch_id != desired.logical_switch_id
            || current.admin_state != desired.admin_state
            || current.attachment != desired.attachment
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for DhcpPortTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let mut desired = Self::desired(ctx, spec, state)?;
        let manager = &ctx.manager;
        let dhcp = state.advanced_dhcp_mut();

        let current = read_or_heal(Self::LABEL, &mut dhcp.port_ref, |id| async move {
            manager.get_logical_port(&id).await
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &dhcp.port_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            desired.revision = current.revision;
            manager.update_logical_port(&reference.id, &desired).await?;
            return Ok(Action::Updated);
        }

        let created = manager.create_logical_port(&desired).await?;
        let id = created_id(created.id, Self::LABEL)?;
        dhcp.port_ref = Some(Reference::new(&id, paths::logical_port(&id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let manager = &ctx.manager;
        delete_dhcp_object(
            Self::LABEL,
            state,
            |d| &mut d.port_ref,
            |id| async move { manager.delete_logical_port(&id).await },
        )
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state
            .advanced_dhcp
            .as_ref()
            .and_then(|d| d.port_ref.as_ref())
    }

    fn as_recoverable(&self) -> Option<&dyn Recoverable> {
        Some(self)
    }
}

#[async_trait]
impl Recoverable for DhcpPortTask {
    async fn recover(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let manager = &ctx.manager;
        let found = find_first(
            |c| manager.list_logical_ports(c),
            |p: &LogicalPort| ctx.identity.is_tagged(&p.tags),
        )
        .await?;
        let Some(id) = found.and_then(|p| p.id) else {
            return Ok(false);
        };
        state.advanced_dhcp_mut().port_ref = Some(Reference::new(&id, paths::logical_port(&id)));
        Ok(true)
    }
}

/// Address range served by the DHCP server
pub struct DhcpIpPoolTask;

impl DhcpIpPoolTask {
    const LABEL: &'static str = "dhcp-ip-pool";

    fn server_id(state: &State) -> Result<String> {
        let dhcp = written(state);
        Ok(require(&dhcp.server_ref, Self::LABEL, "DHCP server")?
            .id
            .clone())
    }

    fn desired(ctx: &EnsurerContext, spec: &Spec) -> Result<DhcpIpPool> {
        let plan = spec.address_plan()?;
        Ok(DhcpIpPool {
            display_name: Some(spec.object_name()),
            allocation_ranges: vec![IpPoolRange {
                start: plan.dhcp_range_start.to_string(),
                end: plan.dhcp_range_end.to_string(),
            }],
            gateway_ip: Some(plan.gateway.to_string()),
            lease_time: Some(LEASE_TIME),
            tags: ctx.identity.tags(),
            ..DhcpIpPool::default()
        })
    }

    fn differs(current: &DhcpIpPool, desired: &DhcpIpPool) -> bool {
        current.display_name != desired.display_name
            || current.allocation_ranges != desired.allocation_ranges
            || current.gateway_ip != desired.gateway_ip
            || current.lease_time != desired.lease_time
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for DhcpIpPoolTask {
    fn label(&self) -> &'static str {
        Self::LABEL
    }

    async fn ensure(
        &self,
        ctx: &EnsurerContext,
        spec: &Spec,
        state: &mut State,
    ) -> Result<Action> {
        let server_id = Self::server_id(state)?;
        let mut desired = Self::desired(ctx, spec)?;
        let manager = &ctx.manager;
        let dhcp = state.advanced_dhcp_mut();

        let current = read_or_heal(Self::LABEL, &mut dhcp.ip_pool_ref, |id| {
            let server_id = server_id.clone();
            async move { manager.get_dhcp_ip_pool(&server_id, &id).await }
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &dhcp.ip_pool_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            desired.revision = current.revision;
            manager
                .update_dhcp_ip_pool(&server_id, &reference.id, &desired)
                .await?;
            return Ok(Action::Updated);
        }

        let created = manager.create_dhcp_ip_pool(&server_id, &desired).await?;
        let id = created_id(created.id, Self::LABEL)?;
        dhcp.ip_pool_ref = Some(Reference::new(&id, paths::dhcp_ip_pool(&server_id, &id)));
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        if self.reference(state).is_none() {
            return Ok(false);
        }
        let server_id = Self::server_id(state)?;
        let manager = &ctx.manager;
        delete_dhcp_object(
            Self::LABEL,
            state,
            |d| &mut d.ip_pool_ref,
            |id| async move { manager.delete_dhcp_ip_pool(&server_id, &id).await },
        )
        .await
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state
            .advanced_dhcp
            .as_ref()
            .and_then(|d| d.ip_pool_ref.as_ref())
    }

    fn as_recoverable(&self) -> Option<&dyn Recoverable> {
        Some(self)
    }
}

#[async_trait]
impl Recoverable for DhcpIpPoolTask {
    async fn recover(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let Some(server_id) = written(state).server_ref.map(|r| r.id) else {
            return Ok(false);
        };
        let manager = &ctx.manager;
        let found = find_first(
            |c| manager.list_dhcp_ip_pools(&server_id, c),
            |p: &DhcpIpPool| ctx.identity.is_tagged(&p.tags),
        )
        .await?;
        let Some(id) = found.and_then(|p| p.id) else {
            return Ok(false);
        };
        state.advanced_dhcp_mut().ip_pool_ref =
            Some(Reference::new(&id, paths::dhcp_ip_pool(&server_id, &id)));
        Ok(true)
    }
}
