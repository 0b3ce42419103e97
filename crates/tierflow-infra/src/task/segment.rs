//! Workers segment attached to the cluster's tier-1 gateway

use super::dhcp_config::LEASE_TIME;
use super::{Task, delete_referenced, new_id, parent_tier1, read_or_heal, require};
use crate::action::Action;
use crate::context::EnsurerContext;
use crate::error::Result;
use crate::spec::Spec;
use crate::state::{Reference, State};
use crate::tags::same_tags;
use async_trait::async_trait;
use tierflow_nsxt::model::{Segment, SegmentDhcpV4Config, SegmentSubnet};
use tierflow_nsxt::paths;

const DHCP_V4_CONFIG: &str = "SegmentDhcpV4Config";

pub struct SegmentTask;

impl SegmentTask {
    const LABEL: &'static str = "segment";

    /// Segment as it should exist
    ///
    /// DHCP settings are only part of it when a policy DHCP server config was
    /// created before; older control planes serve DHCP through the manager
    /// API instead.
    fn desired(ctx: &EnsurerContext, spec: &Spec, state: &State) -> Result<Segment> {
        let tier1 = require(&state.tier1_gateway_ref, Self::LABEL, "tier-1 gateway")?;
        let transport_zone = require(&state.transport_zone_ref, Self::LABEL, "transport zone")?;
        let plan = spec.address_plan()?;

        let mut subnet = SegmentSubnet {
            gateway_address: Some(plan.gateway_cidr()),
            ..SegmentSubnet::default()
        };
        let mut dhcp_config_path = None;
        if let Some(dhcp) = &state.dhcp_server_config_ref {
            dhcp_config_path = Some(dhcp.path.clone());
            subnet.dhcp_ranges = vec![plan.dhcp_range()];
            subnet.dhcp_config = Some(SegmentDhcpV4Config {
                resource_type: DHCP_V4_CONFIG.to_string(),
                server_address: Some(plan.dhcp_server_cidr()),
                lease_time: Some(LEASE_TIME),
                dns_servers: spec.dns_servers.clone(),
            });
        }

        Ok(Segment {
            display_name: Some(spec.segment_name()),
            connectivity_path: Some(tier1.path.clone()),
            transport_zone_path: Some(transport_zone.path.clone()),
            dhcp_config_path,
            subnets: vec![subnet],
            tags: ctx.identity.tags(),
            ..Segment::default()
        })
    }

    fn differs(current: &Segment, desired: &Segment) -> bool {
        current.display_name != desired.display_name
            || current.connectivity_path != desired.connectivity_path
            || current.transport_zone_path != desired.transport_zone_path
            || current.dhcp_config_path != desired.dhcp_config_path
            || current.subnets != desired.subnets
            || !same_tags(&current.tags, &desired.tags)
    }
}

#[async_trait]
impl Task for SegmentTask {
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
        let tier1_id = require(&state.tier1_gateway_ref, Self::LABEL, "tier-1 gateway")?
            .id
            .clone();
        let policy = &ctx.policy;

        let current = read_or_heal(Self::LABEL, &mut state.segment_ref, |id| {
            let tier1_id = tier1_id.clone();
            async move { policy.get_segment(&tier1_id, &id).await }
        })
        .await?;
        if let (Some(current), Some(reference)) = (current, &state.segment_ref) {
            if !Self::differs(&current, &desired) {
                return Ok(Action::Unchanged);
            }
            policy
                .patch_segment(&tier1_id, &reference.id, &desired)
                .await?;
            state.segment_name = desired.display_name;
            return Ok(Action::Updated);
        }

        let id = new_id();
        policy.patch_segment(&tier1_id, &id, &desired).await?;
        state.segment_ref = Some(Reference::new(&id, paths::segment(&tier1_id, &id)));
        state.segment_name = desired.display_name;
        Ok(Action::Created)
    }

    async fn ensure_deleted(&self, ctx: &EnsurerContext, state: &mut State) -> Result<bool> {
        let Some(reference) = &state.segment_ref else {
            state.segment_name = None;
            return Ok(false);
        };
        let tier1_id = parent_tier1(reference, Self::LABEL)?;
        let policy = &ctx.policy;
        let deleted = delete_referenced(Self::LABEL, &mut state.segment_ref, |id| async move {
            policy.delete_segment(&tier1_id, &id).await
        })
        .await?;
        state.segment_name = None;
        Ok(deleted)
    }

    fn reference<'a>(&self, state: &'a State) -> Option<&'a Reference> {
        state.segment_ref.as_ref()
    }
}
